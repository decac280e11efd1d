//! Loop router
//!
//! Confines traversal of the road network to one fixed, cyclic sequence of
//! roads. Wherever the network branches, the branch that stays on the loop
//! wins, which makes lattices built on top of the router reproducible.

use std::collections::HashMap;

use itertools::Itertools;
use log::trace;
use serde::Deserialize;

use crate::common::*;

/// Lookahead used to find the immediate successors of a point [m]
const ON_ROUTE_LOOKAHEAD: f64 = 0.01;

/// One city-block circuit of the reference deployment
pub const REFERENCE_LOOP: [RoadId; 28] = [
    47, 558, 48, 887, 49, 717, 50, 42, 276, 43, 35, 636, 36, 540, 37, 1021, 38, 678, 39, 728,
    40, 841, 41, 6, 45, 103, 46, 659,
];

/// Ordered road sequence describing one loop of the network
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "default_roads")]
    pub roads: Vec<RoadId>,
}

fn default_roads() -> Vec<RoadId> {
    REFERENCE_LOOP.to_vec()
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { roads: default_roads() }
    }
}

impl RouteConfig {
    pub fn new(roads: Vec<RoadId>) -> Self {
        Self { roads }
    }

    /// The loop must be non-empty and visit each road once
    pub fn validate(&self) -> LatticeResult<()> {
        if self.roads.is_empty() {
            return Err(LatticeError::Config("route has no roads".to_string()));
        }
        if let Some(road) = self.roads.iter().duplicates().next() {
            return Err(LatticeError::Config(format!(
                "road {} appears more than once on the route",
                road
            )));
        }
        Ok(())
    }
}

/// Router following a fixed loop of roads
#[derive(Debug, Clone)]
pub struct LoopRouter<N> {
    network: N,
    road_sequence: Vec<RoadId>,
    road_index: HashMap<RoadId, usize>,
}

impl<N: RoadNetwork> LoopRouter<N> {
    pub fn new(network: N, config: RouteConfig) -> LatticeResult<Self> {
        config.validate()?;
        let road_index = config
            .roads
            .iter()
            .enumerate()
            .map(|(i, &road)| (road, i))
            .collect();

        Ok(Self {
            network,
            road_sequence: config.roads,
            road_index,
        })
    }

    /// Router over the reference loop
    pub fn with_reference_loop(network: N) -> LatticeResult<Self> {
        Self::new(network, RouteConfig::default())
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn road_sequence(&self) -> &[RoadId] {
        &self.road_sequence
    }

    pub fn is_on_route(&self, road: RoadId) -> bool {
        self.road_index.contains_key(&road)
    }

    fn position(&self, road: RoadId) -> LatticeResult<usize> {
        self.road_index
            .get(&road)
            .copied()
            .ok_or(LatticeError::NotOnRoute(road))
    }

    /// The road after `road` on the loop, wrapping from the last to the first
    pub fn next_road(&self, road: RoadId) -> LatticeResult<RoadId> {
        let i = self.position(road)?;
        Ok(self.road_sequence[(i + 1) % self.road_sequence.len()])
    }

    /// The road before `road` on the loop, wrapping from the first to the last
    pub fn prev_road(&self, road: RoadId) -> LatticeResult<RoadId> {
        let i = self.position(road)?;
        let n = self.road_sequence.len();
        Ok(self.road_sequence[(i + n - 1) % n])
    }

    pub fn next_road_of(&self, point: &N::Point) -> LatticeResult<RoadId> {
        self.next_road(point.road_id())
    }

    pub fn prev_road_of(&self, point: &N::Point) -> LatticeResult<RoadId> {
        self.prev_road(point.road_id())
    }

    /// The first immediate successor of `point` lying on the loop
    pub fn point_on_route(&self, point: &N::Point) -> Option<N::Point> {
        self.network
            .forward_reachable(point, ON_ROUTE_LOOKAHEAD)
            .into_iter()
            .find(|candidate| self.is_on_route(candidate.road_id()))
    }

    /// The point `distance` ahead of `point` without leaving the loop.
    ///
    /// Staying on the current road takes priority over entering the next
    /// one. At most one road transition is bridged per call, so distances
    /// spanning several roads must be covered by repeated calls.
    pub fn advance(&self, point: &N::Point, distance: f64) -> LatticeResult<Option<N::Point>> {
        if !(distance.is_finite() && distance > 0.0) {
            return Err(LatticeError::InvalidArgument(format!(
                "advance distance must be positive, got {}",
                distance
            )));
        }

        let this_road = point.road_id();
        let next_road = self.next_road(this_road)?;

        let mut next_point = None;
        for candidate in self.network.forward_reachable(point, distance) {
            if candidate.road_id() == this_road {
                return Ok(Some(candidate));
            }
            if candidate.road_id() == next_road && next_point.is_none() {
                next_point = Some(candidate);
            }
        }

        if next_point.is_none() {
            trace!("no on-route point {:.2}m ahead of {:?}", distance, point);
        }
        Ok(next_point)
    }
}

impl<N: RoadNetwork> Router for LoopRouter<N> {
    type Point = N::Point;

    fn front_point(&self, point: &N::Point, distance: f64) -> LatticeResult<Option<N::Point>> {
        self.advance(point, distance)
    }

    fn left_point(&self, point: &N::Point) -> Option<N::Point> {
        self.network.lane_neighbor(point, Side::Left)
    }

    fn right_point(&self, point: &N::Point) -> Option<N::Point> {
        self.network.lane_neighbor(point, Side::Right)
    }

    fn project(&self, location: &Location) -> Option<N::Point> {
        self.network.project(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RoadMap;
    use nalgebra::Point3;

    fn reference_router() -> LoopRouter<RoadMap> {
        let map = RoadMap::ring(&REFERENCE_LOOP, 30.0, 2).unwrap();
        LoopRouter::with_reference_loop(map).unwrap()
    }

    /// Road 1 forks into 2 (on route) and 3 (off route)
    fn fork_router() -> LoopRouter<RoadMap> {
        let mut builder = RoadMap::builder();
        builder
            .add_road(1, Point3::new(0.0, 0.0, 0.0), Point3::new(20.0, 0.0, 0.0), 1)
            .add_road(3, Point3::new(20.0, 0.0, 0.0), Point3::new(20.0, 20.0, 0.0), 1)
            .add_road(2, Point3::new(20.0, 0.0, 0.0), Point3::new(40.0, 0.0, 0.0), 1)
            .add_road(4, Point3::new(40.0, 0.0, 0.0), Point3::new(60.0, 0.0, 0.0), 1)
            .connect(1, 3)
            .connect(1, 2)
            .connect(2, 4);
        LoopRouter::new(builder.build().unwrap(), RouteConfig::new(vec![1, 2, 4])).unwrap()
    }

    #[test]
    fn test_reference_loop_neighbors() {
        let router = reference_router();
        assert_eq!(router.next_road(47).unwrap(), 558);
        assert_eq!(router.prev_road(558).unwrap(), 47);
        assert_eq!(router.next_road(659).unwrap(), 47);
        assert_eq!(router.prev_road(47).unwrap(), 659);
    }

    #[test]
    fn test_next_prev_are_inverse() {
        let router = reference_router();
        for &road in REFERENCE_LOOP.iter() {
            assert_eq!(router.next_road(router.prev_road(road).unwrap()).unwrap(), road);
            assert_eq!(router.prev_road(router.next_road(road).unwrap()).unwrap(), road);
        }
    }

    #[test]
    fn test_road_not_on_route() {
        let router = reference_router();
        assert!(matches!(router.next_road(1), Err(LatticeError::NotOnRoute(1))));
        assert!(matches!(router.prev_road(2), Err(LatticeError::NotOnRoute(2))));
    }

    #[test]
    fn test_route_config_validation() {
        assert!(RouteConfig::default().validate().is_ok());
        assert!(RouteConfig::new(vec![]).validate().is_err());
        assert!(RouteConfig::new(vec![1, 2, 1]).validate().is_err());
    }

    #[test]
    fn test_point_on_route_resolves_fork() {
        let router = fork_router();
        let point = router.network().point(1, -1, 20.0).unwrap();
        let on_route = router.point_on_route(&point).unwrap();
        assert_eq!(on_route.road_id(), 2);
    }

    #[test]
    fn test_point_on_route_absent() {
        let router = fork_router();
        // Road 4 is a dead end.
        let point = router.network().point(4, -1, 20.0).unwrap();
        assert!(router.point_on_route(&point).is_none());
    }

    #[test]
    fn test_advance_prefers_same_road() {
        let router = fork_router();
        let point = router.network().point(1, -1, 5.0).unwrap();
        let ahead = router.advance(&point, 10.0).unwrap().unwrap();
        assert_eq!(ahead.road_id(), 1);
        assert!((ahead.location().x - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_takes_next_road_at_fork() {
        let router = fork_router();
        let point = router.network().point(1, -1, 19.0).unwrap();
        let ahead = router.advance(&point, 2.0).unwrap().unwrap();
        assert_eq!(ahead.road_id(), 2);
    }

    #[test]
    fn test_advance_bridges_one_transition_only() {
        let router = fork_router();
        let point = router.network().point(1, -1, 19.0).unwrap();
        // 19 + 25 lands on road 4, two transitions away.
        assert!(router.advance(&point, 25.0).unwrap().is_none());
    }

    #[test]
    fn test_advance_rejects_non_positive_distance() {
        let router = fork_router();
        let point = router.network().point(1, -1, 5.0).unwrap();
        assert!(matches!(
            router.advance(&point, 0.0),
            Err(LatticeError::InvalidArgument(_))
        ));
        assert!(matches!(
            router.advance(&point, -1.0),
            Err(LatticeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_advance_off_route() {
        let router = fork_router();
        let point = router.network().point(3, -1, 5.0).unwrap();
        assert!(matches!(
            router.advance(&point, 1.0),
            Err(LatticeError::NotOnRoute(3))
        ));
    }

    #[test]
    fn test_lateral_points() {
        let map = RoadMap::ring(&[1, 2, 3], 30.0, 3).unwrap();
        let router = LoopRouter::new(map, RouteConfig::new(vec![1, 2, 3])).unwrap();
        let point = router.network().point(1, -2, 10.0).unwrap();
        assert_eq!(router.left_point(&point).unwrap().lane_id(), -1);
        assert_eq!(router.right_point(&point).unwrap().lane_id(), -3);
        assert_eq!(
            router.lateral_point(&point, Side::Right).unwrap().id(),
            router.right_point(&point).unwrap().id()
        );
    }
}
