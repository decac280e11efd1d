// In-memory road network made of straight multi-lane roads
//
// Lanes follow the usual OpenDRIVE convention for the driving direction:
// lane -1 is the leftmost lane, -2 sits to its right, and so on.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use ordered_float::OrderedFloat;

use crate::common::*;

/// Default lane width [m]
pub const DEFAULT_LANE_WIDTH: f64 = 3.5;

/// Longitudinal extent of one lane on its road
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneSpan {
    pub id: LaneId,
    pub s_start: f64,
    pub s_end: f64,
}

impl LaneSpan {
    pub fn contains(&self, s: f64) -> bool {
        s >= self.s_start - DISTANCE_EPSILON && s <= self.s_end + DISTANCE_EPSILON
    }
}

/// A straight road with parallel lanes
#[derive(Debug, Clone)]
pub struct Road {
    pub id: RoadId,
    pub start: Location,
    pub end: Location,
    pub lane_width: f64,
    pub lanes: Vec<LaneSpan>,
    pub successors: Vec<RoadId>,
    length: f64,
}

impl Road {
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn lane(&self, id: LaneId) -> Option<&LaneSpan> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    fn direction(&self) -> Vector3<f64> {
        (self.end - self.start) / self.length
    }

    /// Position of lane `lane` at arclength `s`
    pub fn location_at(&self, lane: LaneId, s: f64) -> Location {
        let dir = self.direction();
        let right = Vector3::new(dir.y, -dir.x, 0.0);
        let offset = (-lane) as f64 - 0.5;
        self.start + dir * s + right * (offset * self.lane_width)
    }
}

/// A point on a lane of a [`RoadMap`]
#[derive(Debug, Clone, PartialEq)]
pub struct RoadPoint {
    id: PointId,
    road: RoadId,
    lane: LaneId,
    s: f64,
    location: Location,
}

impl RoadPoint {
    /// Arclength of the point on its road
    pub fn s(&self) -> f64 {
        self.s
    }
}

impl NetworkPoint for RoadPoint {
    fn id(&self) -> PointId {
        self.id
    }

    fn road_id(&self) -> RoadId {
        self.road
    }

    fn lane_id(&self) -> LaneId {
        self.lane
    }

    fn location(&self) -> Location {
        self.location
    }
}

/// Largest road id that fits the 24 road bits of a point id
pub const MAX_ROAD_ID: RoadId = (1 << 24) - 1;

/// Lowest lane id that fits the 8 lane bits of a point id
pub const MIN_LANE_ID: LaneId = -255;

/// Pack (road, lane, s in millimetres) into one identifier
fn pack_point_id(road: RoadId, lane: LaneId, s: f64) -> PointId {
    let s_mm = ((s * 1000.0).round() as u64) & 0xFFFF_FFFF;
    let lane = (lane as i64 as u64) & 0xFF;
    ((road as u64) << 40) | (lane << 32) | s_mm
}

/// Road network held in memory
#[derive(Debug, Clone)]
pub struct RoadMap {
    roads: BTreeMap<RoadId, Road>,
}

impl RoadMap {
    pub fn builder() -> RoadMapBuilder {
        RoadMapBuilder::new()
    }

    /// Roads laid out as the sides of a regular polygon, each one leading
    /// into the next, the last one closing the loop.
    pub fn ring(road_ids: &[RoadId], road_length: f64, lanes: u8) -> LatticeResult<RoadMap> {
        if road_ids.len() < 3 {
            return Err(LatticeError::Config(
                "a ring needs at least three roads".to_string(),
            ));
        }

        let n = road_ids.len();
        let radius = road_length / (2.0 * (PI / n as f64).sin());
        let vertex = |i: usize| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            Point3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
        };

        let mut builder = RoadMap::builder();
        for (i, &id) in road_ids.iter().enumerate() {
            builder.add_road(id, vertex(i), vertex((i + 1) % n), lanes);
        }
        for (i, &id) in road_ids.iter().enumerate() {
            builder.connect(id, road_ids[(i + 1) % n]);
        }
        builder.build()
    }

    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(&id)
    }

    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// The point on `lane` of `road` at arclength `s`, if the lane exists there
    pub fn point(&self, road: RoadId, lane: LaneId, s: f64) -> Option<RoadPoint> {
        let r = self.roads.get(&road)?;
        let span = r.lane(lane)?;
        if !span.contains(s) {
            return None;
        }
        let s = s.clamp(0.0, r.length());
        Some(RoadPoint {
            id: pack_point_id(road, lane, s),
            road,
            lane,
            s,
            location: r.location_at(lane, s),
        })
    }

    fn walk_forward(
        &self,
        road: RoadId,
        lane: LaneId,
        s: f64,
        remaining: f64,
        reachable: &mut Vec<RoadPoint>,
    ) {
        let Some(r) = self.roads.get(&road) else { return };
        let Some(span) = r.lane(lane) else { return };

        if s + remaining <= span.s_end + DISTANCE_EPSILON {
            if let Some(point) = self.point(road, lane, (s + remaining).min(span.s_end)) {
                reachable.push(point);
            }
            return;
        }

        // The lane stops before the road does.
        if span.s_end < r.length() - DISTANCE_EPSILON {
            return;
        }

        let left_over = remaining - (r.length() - s);
        for &successor in &r.successors {
            let enters = self
                .roads
                .get(&successor)
                .and_then(|next| next.lane(lane))
                .map_or(false, |next_span| next_span.s_start <= DISTANCE_EPSILON);
            if enters {
                self.walk_forward(successor, lane, 0.0, left_over, reachable);
            }
        }
    }
}

impl RoadNetwork for RoadMap {
    type Point = RoadPoint;

    fn forward_reachable(&self, point: &RoadPoint, max_distance: f64) -> Vec<RoadPoint> {
        let mut reachable = Vec::new();
        if max_distance.is_finite() && max_distance >= 0.0 {
            self.walk_forward(point.road, point.lane, point.s, max_distance, &mut reachable);
        }
        reachable
    }

    fn lane_neighbor(&self, point: &RoadPoint, side: Side) -> Option<RoadPoint> {
        let lane = match side {
            Side::Left => point.lane + 1,
            Side::Right => point.lane - 1,
        };
        if lane >= 0 {
            return None;
        }
        self.point(point.road, lane, point.s)
    }

    fn project(&self, location: &Location) -> Option<RoadPoint> {
        self.roads
            .values()
            .flat_map(|road| road.lanes.iter().map(move |span| (road, span)))
            .map(|(road, span)| {
                let origin = road.location_at(span.id, 0.0);
                let s = (location - origin)
                    .dot(&road.direction())
                    .clamp(span.s_start, span.s_end);
                let gap = nalgebra::distance(&road.location_at(span.id, s), location);
                (road.id, span.id, s, gap)
            })
            .min_by_key(|&(_, _, _, gap)| OrderedFloat(gap))
            .and_then(|(road, lane, s, _)| self.point(road, lane, s))
    }
}

/// Incremental construction of a [`RoadMap`]
#[derive(Debug, Clone)]
pub struct RoadMapBuilder {
    lane_width: f64,
    roads: Vec<(RoadId, Location, Location, u8)>,
    spans: Vec<(RoadId, LaneSpan)>,
    connections: Vec<(RoadId, RoadId)>,
}

impl RoadMapBuilder {
    pub fn new() -> Self {
        Self {
            lane_width: DEFAULT_LANE_WIDTH,
            roads: Vec::new(),
            spans: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn lane_width(&mut self, width: f64) -> &mut Self {
        self.lane_width = width;
        self
    }

    /// Add a road with `lanes` full-length lanes `-1..=-lanes`
    pub fn add_road(&mut self, id: RoadId, start: Location, end: Location, lanes: u8) -> &mut Self {
        self.roads.push((id, start, end, lanes));
        self
    }

    /// Restrict (or add) lane `lane` of `road` to `[s_start, s_end]`
    pub fn lane_span(&mut self, road: RoadId, lane: LaneId, s_start: f64, s_end: f64) -> &mut Self {
        self.spans.push((road, LaneSpan { id: lane, s_start, s_end }));
        self
    }

    /// Let traffic leave `from` into `to`
    pub fn connect(&mut self, from: RoadId, to: RoadId) -> &mut Self {
        self.connections.push((from, to));
        self
    }

    pub fn build(&self) -> LatticeResult<RoadMap> {
        if !(self.lane_width.is_finite() && self.lane_width > 0.0) {
            return Err(LatticeError::Config(format!(
                "lane width must be positive, got {}",
                self.lane_width
            )));
        }

        let mut roads = BTreeMap::new();
        for &(id, start, end, lanes) in &self.roads {
            if id > MAX_ROAD_ID {
                return Err(LatticeError::Config(format!(
                    "road id {} exceeds the maximum of {}",
                    id, MAX_ROAD_ID
                )));
            }
            let length = nalgebra::distance(&start, &end);
            if length < DISTANCE_EPSILON {
                return Err(LatticeError::Config(format!("road {} has zero length", id)));
            }
            let road = Road {
                id,
                start,
                end,
                lane_width: self.lane_width,
                lanes: (1..=lanes as LaneId)
                    .map(|k| LaneSpan { id: -k, s_start: 0.0, s_end: length })
                    .collect(),
                successors: Vec::new(),
                length,
            };
            if roads.insert(id, road).is_some() {
                return Err(LatticeError::Config(format!("road {} added twice", id)));
            }
        }

        for &(road_id, span) in &self.spans {
            let road = roads
                .get_mut(&road_id)
                .ok_or_else(|| LatticeError::Config(format!("unknown road {}", road_id)))?;
            if !(MIN_LANE_ID..0).contains(&span.id)
                || span.s_start < 0.0
                || span.s_end > road.length + DISTANCE_EPSILON
                || span.s_start >= span.s_end
            {
                return Err(LatticeError::Config(format!(
                    "invalid span [{}, {}] for lane {} of road {}",
                    span.s_start, span.s_end, span.id, road_id
                )));
            }
            let span = LaneSpan { s_end: span.s_end.min(road.length), ..span };
            match road.lanes.iter_mut().find(|lane| lane.id == span.id) {
                Some(lane) => *lane = span,
                None => road.lanes.push(span),
            }
        }

        for &(from, to) in &self.connections {
            if !roads.contains_key(&to) {
                return Err(LatticeError::Config(format!("unknown road {}", to)));
            }
            roads
                .get_mut(&from)
                .ok_or_else(|| LatticeError::Config(format!("unknown road {}", from)))?
                .successors
                .push(to);
        }

        Ok(RoadMap { roads })
    }
}

impl Default for RoadMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> RoadMap {
        let mut builder = RoadMap::builder();
        builder
            .add_road(1, Point3::new(0.0, 0.0, 0.0), Point3::new(50.0, 0.0, 0.0), 2)
            .add_road(2, Point3::new(50.0, 0.0, 0.0), Point3::new(100.0, 0.0, 0.0), 2)
            .add_road(3, Point3::new(50.0, 0.0, 0.0), Point3::new(50.0, -50.0, 0.0), 1)
            .connect(1, 3)
            .connect(1, 2);
        builder.build().unwrap()
    }

    #[test]
    fn test_forward_reachable_same_road() {
        let map = corridor();
        let start = map.point(1, -1, 10.0).unwrap();
        let next = map.forward_reachable(&start, 5.0);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].road_id(), 1);
        assert!((next[0].s() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_forward_reachable_branches() {
        let map = corridor();
        let start = map.point(1, -1, 49.5).unwrap();
        let next = map.forward_reachable(&start, 1.0);
        let roads: Vec<RoadId> = next.iter().map(|p| p.road_id()).collect();
        assert_eq!(roads, vec![3, 2]);
        assert!(next.iter().all(|p| (p.s() - 0.5).abs() < 1e-9));

        // Lane -2 does not continue into road 3.
        let start = map.point(1, -2, 49.5).unwrap();
        let next = map.forward_reachable(&start, 1.0);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].road_id(), 2);
    }

    #[test]
    fn test_forward_reachable_lands_on_road_end() {
        let map = corridor();
        let start = map.point(1, -1, 49.0).unwrap();
        let next = map.forward_reachable(&start, 1.0);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].road_id(), 1);
        assert!((next[0].s() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_lane_neighbor() {
        let map = corridor();
        let point = map.point(1, -1, 10.0).unwrap();
        assert!(map.lane_neighbor(&point, Side::Left).is_none());
        let right = map.lane_neighbor(&point, Side::Right).unwrap();
        assert_eq!(right.lane_id(), -2);
        assert!((right.location().y - (-5.25)).abs() < 1e-9);
        assert!((point.location().y - (-1.75)).abs() < 1e-9);
    }

    #[test]
    fn test_lane_span_limits_points() {
        let mut builder = RoadMap::builder();
        builder
            .add_road(1, Point3::new(0.0, 0.0, 0.0), Point3::new(100.0, 0.0, 0.0), 1)
            .lane_span(1, -2, 20.0, 60.0);
        let map = builder.build().unwrap();

        assert!(map.point(1, -2, 10.0).is_none());
        assert!(map.point(1, -2, 20.0).is_some());
        let end = map.point(1, -2, 59.5).unwrap();
        assert!(map.forward_reachable(&end, 1.0).is_empty());
    }

    #[test]
    fn test_point_ids_are_unique_per_lane_and_station() {
        let map = corridor();
        let a = map.point(1, -1, 10.0).unwrap();
        let b = map.point(1, -2, 10.0).unwrap();
        let c = map.point(1, -1, 11.0).unwrap();
        let d = map.point(2, -1, 10.0).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_ne!(a.id(), d.id());
        assert_eq!(a.id(), map.point(1, -1, 10.0).unwrap().id());
    }

    #[test]
    fn test_project() {
        let map = corridor();
        let point = map.project(&Point3::new(20.2, -5.0, 0.0)).unwrap();
        assert_eq!(point.road_id(), 1);
        assert_eq!(point.lane_id(), -2);
        assert!((point.s() - 20.2).abs() < 1e-9);
    }

    #[test]
    fn test_ring_closes() {
        let map = RoadMap::ring(&[10, 11, 12, 13], 30.0, 2).unwrap();
        let road = map.road(13).unwrap();
        assert_eq!(road.successors, vec![10]);
        assert!((road.length() - 30.0).abs() < 1e-9);

        let last = map.point(13, -1, 29.5).unwrap();
        let next = map.forward_reachable(&last, 1.0);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].road_id(), 10);
    }

    #[test]
    fn test_builder_rejects_ids_outside_point_id_range() {
        let mut builder = RoadMap::builder();
        builder.add_road(MAX_ROAD_ID + 1, Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), 1);
        assert!(matches!(builder.build(), Err(LatticeError::Config(_))));

        let mut builder = RoadMap::builder();
        builder
            .add_road(1, Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), 1)
            .lane_span(1, MIN_LANE_ID - 1, 0.0, 10.0);
        assert!(matches!(builder.build(), Err(LatticeError::Config(_))));

        let mut builder = RoadMap::builder();
        builder
            .add_road(MAX_ROAD_ID, Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), 1)
            .add_road(MAX_ROAD_ID - 1, Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), 1);
        let map = builder.build().unwrap();
        let a = map.point(MAX_ROAD_ID, -1, 5.0).unwrap();
        let b = map.point(MAX_ROAD_ID - 1, -1, 5.0).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_builder_rejects_unknown_roads() {
        let mut builder = RoadMap::builder();
        builder
            .add_road(1, Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), 1)
            .connect(1, 2);
        assert!(matches!(builder.build(), Err(LatticeError::Config(_))));
    }
}
