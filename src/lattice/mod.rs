//! Conformal lattice over a road network
//!
//! - `node`: lattice vertices and their links
//! - `engine`: construction, window maintenance and relative queries
//! - `shared`: lock-protected handle for multi-threaded use

pub mod engine;
pub mod node;
pub mod shared;

pub use engine::Lattice;
pub use node::{LatticeNode, Link, NodeId};
pub use shared::SharedLattice;
