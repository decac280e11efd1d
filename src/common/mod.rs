//! Common types, traits, and error definitions for road_lattice
//!
//! This module provides the foundational building blocks shared by the
//! router, the lattice engine and the road network implementations.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
