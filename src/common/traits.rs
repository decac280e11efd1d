//! Common traits defining the seams between the lattice, the router and
//! the road network it is built on

use std::fmt;

use crate::common::error::LatticeResult;
use crate::common::types::*;

/// A located point on the external road graph.
///
/// Points are owned by the road network; the lattice only keeps clones.
pub trait NetworkPoint: Clone + fmt::Debug {
    /// Unique identifier of the point
    fn id(&self) -> PointId;

    /// Road (segment) the point belongs to
    fn road_id(&self) -> RoadId;

    /// Lane of the road the point belongs to
    fn lane_id(&self) -> LaneId;

    /// World frame position
    fn location(&self) -> Location;

    fn road_lane(&self) -> RoadLane {
        RoadLane::new(self.road_id(), self.lane_id())
    }

    /// Euclidean distance between this point and a location
    fn distance_to(&self, location: &Location) -> f64 {
        nalgebra::distance(&self.location(), location)
    }
}

/// Road topology queried on demand by the router.
pub trait RoadNetwork {
    type Point: NetworkPoint;

    /// Points reachable by travelling exactly `max_distance` forward along
    /// the lane of `point`. More than one point is returned only at branches.
    fn forward_reachable(&self, point: &Self::Point, max_distance: f64) -> Vec<Self::Point>;

    /// The point on the adjacent lane at the same location, if that lane exists there
    fn lane_neighbor(&self, point: &Self::Point, side: Side) -> Option<Self::Point>;

    /// Resolve a world location to the nearest point of the network
    fn project(&self, location: &Location) -> Option<Self::Point>;
}

/// Road traversal policy consumed by the lattice.
pub trait Router {
    type Point: NetworkPoint;

    /// The point `distance` ahead of `point`, resolving branches
    fn front_point(&self, point: &Self::Point, distance: f64) -> LatticeResult<Option<Self::Point>>;

    /// The point on the left lane of `point`
    fn left_point(&self, point: &Self::Point) -> Option<Self::Point>;

    /// The point on the right lane of `point`
    fn right_point(&self, point: &Self::Point) -> Option<Self::Point>;

    /// Resolve a world location to a network point
    fn project(&self, location: &Location) -> Option<Self::Point>;

    fn lateral_point(&self, point: &Self::Point, side: Side) -> Option<Self::Point> {
        match side {
            Side::Left => self.left_point(point),
            Side::Right => self.right_point(point),
        }
    }
}
