//! Route policies resolving branches of the road network

pub mod loop_router;

pub use loop_router::{LoopRouter, RouteConfig, REFERENCE_LOOP};
