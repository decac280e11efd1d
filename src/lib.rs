//! road_lattice - conformal lattices over road networks
//!
//! This crate discretizes the lanes ahead of a vehicle into a grid of
//! nodes linked front/back along a lane and left/right across lanes, and
//! keeps that window sliding as the vehicle moves along a fixed route.

// Core modules
pub mod common;
pub mod config;
pub mod utils;

// Lattice modules
pub mod routing;
pub mod lattice;

// Re-export common types for convenience
pub use common::{LaneId, Location, PointId, RoadId, RoadLane, Side};
pub use common::{NetworkPoint, RoadNetwork, Router};
pub use common::{LatticeError, LatticeResult};
pub use config::{LatticeConfig, LatticeSettings};
pub use lattice::{Lattice, LatticeNode, Link, NodeId, SharedLattice};
pub use routing::{LoopRouter, RouteConfig};
