//! Utility modules for road_lattice

pub mod road_map;
pub mod visualization;

pub use road_map::*;
pub use visualization::{colors, LatticePlot, LineStyle, PointStyle};
