//! Common types used throughout road_lattice

use nalgebra::Point3;

/// Identifier of one road segment in the external topology
pub type RoadId = u32;

/// Identifier of a lane within a road. Driving lanes are negative,
/// `-1` being the leftmost one in the driving direction.
pub type LaneId = i32;

/// Unique identifier of a network point
pub type PointId = u64;

/// Position of a network point in the world frame
pub type Location = Point3<f64>;

/// Slack used when comparing accumulated longitudinal distances
pub const DISTANCE_EPSILON: f64 = 1e-6;

/// Lateral direction relative to the driving direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Key of the road+lane table: all points sharing one road and one lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadLane {
    pub road: RoadId,
    pub lane: LaneId,
}

impl RoadLane {
    pub fn new(road: RoadId, lane: LaneId) -> Self {
        Self { road, lane }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Left.opposite(), Side::Right);
        assert_eq!(Side::Right.opposite().opposite(), Side::Right);
    }

    #[test]
    fn test_road_lane_ordering() {
        let a = RoadLane::new(47, -1);
        let b = RoadLane::new(47, -2);
        let c = RoadLane::new(48, -2);
        assert!(b < a);
        assert!(a < c);
    }
}
