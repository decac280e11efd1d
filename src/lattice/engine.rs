//! Conformal lattice over the road network
//!
//! The lattice discretizes the lanes ahead of a start point into nodes
//! spaced `resolution` meters apart. Nodes of one lane are chained through
//! their `front`/`back` links, nodes of adjacent lanes at the same
//! longitudinal offset through their `left`/`right` links. The window can be
//! grown, trimmed and slid forward without rebuilding it.
//!
//! Nodes live in an arena owned by the lattice. Links are arena keys, so a
//! removed node can never be reached through a stale link.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, trace, warn};
use ordered_float::OrderedFloat;
use slotmap::SlotMap;

use super::node::{LatticeNode, Link, NodeId};
use crate::common::*;
use crate::config::LatticeSettings;

#[derive(Debug, Clone, Copy)]
enum Traverse {
    /// Follow a link for the query range
    Walk(Link),
    /// Follow a link exactly once
    Step(Link),
}

/// Lattice of nodes over the lanes reachable from a start point
pub struct Lattice<R: Router> {
    router: Arc<R>,
    nodes: SlotMap<NodeId, LatticeNode<R::Point>>,
    /// A node with the minimum distance, i.e. 0.0
    entry: NodeId,
    /// A node with the maximum distance
    exit: NodeId,
    point_to_node: HashMap<PointId, NodeId>,
    roadlane_to_points: HashMap<RoadLane, Vec<PointId>>,
    resolution: f64,
    query_tolerance: f64,
}

impl<R: Router> Lattice<R> {
    /// Build a lattice of `range` meters ahead of `start`
    ///
    /// # Arguments
    /// * `start` - Network point of the lattice entry
    /// * `range` - Longitudinal extent of the lattice [m]
    /// * `resolution` - Distance between consecutive nodes of one lane [m]
    /// * `router` - Policy used to find front and lateral points
    pub fn new(start: R::Point, range: f64, resolution: f64, router: Arc<R>) -> LatticeResult<Self> {
        Self::with_settings(start, &LatticeSettings::new(range, resolution), router)
    }

    pub fn with_settings(
        start: R::Point,
        settings: &LatticeSettings,
        router: Arc<R>,
    ) -> LatticeResult<Self> {
        settings.validate()?;

        let mut nodes: SlotMap<NodeId, LatticeNode<R::Point>> = SlotMap::with_key();
        let entry = nodes.insert_with_key(|id| LatticeNode::new(id, start, 0.0));

        let mut lattice = Self {
            router,
            nodes,
            entry,
            exit: entry,
            point_to_node: HashMap::new(),
            roadlane_to_points: HashMap::new(),
            resolution: settings.resolution,
            query_tolerance: settings.query_tolerance(),
        };
        lattice.augment_tables(entry);
        lattice.extend(settings.range)?;

        debug!(
            "lattice built from {:?}: {} nodes over {:.2}m",
            lattice.entry().point(),
            lattice.len(),
            lattice.range()
        );
        Ok(lattice)
    }

    /// Build a lattice starting at the network point closest to `location`
    pub fn from_location(
        location: &Location,
        settings: &LatticeSettings,
        router: Arc<R>,
    ) -> LatticeResult<Self> {
        let start = router.project(location).ok_or(LatticeError::OffNetwork {
            x: location.x,
            y: location.y,
            z: location.z,
        })?;
        Self::with_settings(start, settings, router)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// A node with distance 0.0
    pub fn entry(&self) -> &LatticeNode<R::Point> {
        &self.nodes[self.entry]
    }

    /// A node whose distance equals the range of the lattice
    pub fn exit(&self) -> &LatticeNode<R::Point> {
        &self.nodes[self.exit]
    }

    pub fn range(&self) -> f64 {
        self.exit().distance() - self.entry().distance()
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn query_tolerance(&self) -> f64 {
        self.query_tolerance
    }

    pub fn router(&self) -> &Arc<R> {
        &self.router
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&LatticeNode<R::Point>> {
        self.nodes.get(id)
    }

    /// The node wrapping the network point `point_id`
    pub fn node_of(&self, point_id: PointId) -> Option<&LatticeNode<R::Point>> {
        self.point_to_node.get(&point_id).and_then(|&id| self.nodes.get(id))
    }

    pub fn contains(&self, point: &R::Point) -> bool {
        self.point_to_node.contains_key(&point.id())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LatticeNode<R::Point>> {
        self.nodes.values()
    }

    /// Resolve one link of `node`
    pub fn neighbor(&self, node: &LatticeNode<R::Point>, link: Link) -> Option<&LatticeNode<R::Point>> {
        self.step(node.id(), link).map(|id| &self.nodes[id])
    }

    // ========================================================================
    // Window Maintenance
    // ========================================================================

    /// Extend the lattice to `range` meters. Nothing happens if the lattice
    /// already covers `range`.
    pub fn extend(&mut self, range: f64) -> LatticeResult<()> {
        if !range.is_finite() {
            return Err(LatticeError::InvalidArgument(format!(
                "lattice range must be finite, got {}",
                range
            )));
        }
        if range <= self.range() + DISTANCE_EPSILON {
            return Ok(());
        }

        let before = self.len();
        let limit = self.entry().distance() + range;
        let exit_distance = self.exit().distance();

        let queue: VecDeque<NodeId> = self
            .nodes
            .values()
            .filter(|node| {
                node.front().is_none() && (node.distance() - exit_distance).abs() < DISTANCE_EPSILON
            })
            .map(|node| node.id())
            .collect();

        let grown = self.grow(queue, limit);

        // Derived state is refreshed even when routing fails part way.
        self.update_node_distance();
        self.update_exit();
        self.check_link_symmetry();
        grown?;

        if range - self.range() >= self.resolution - DISTANCE_EPSILON {
            warn!(
                "lattice reaches {:.2}m of the requested {:.2}m: route ends or closes on itself",
                self.range(),
                range
            );
        }
        debug!(
            "lattice extended to {:.2}m: {} new nodes, {} total",
            self.range(),
            self.len() - before,
            self.len()
        );
        Ok(())
    }

    /// Shorten the lattice to `range` meters by removing the nodes beyond
    /// it. Nothing happens if the lattice is already shorter.
    pub fn shorten(&mut self, range: f64) -> LatticeResult<()> {
        if !(range.is_finite() && range > 0.0) {
            return Err(LatticeError::InvalidArgument(format!(
                "lattice range must be positive, got {}",
                range
            )));
        }
        if range >= self.range() - DISTANCE_EPSILON {
            return Ok(());
        }

        let limit = self.entry().distance() + range + DISTANCE_EPSILON;
        let doomed: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.distance() > limit)
            .sorted_by_key(|node| Reverse(OrderedFloat(node.distance())))
            .map(|node| node.id())
            .collect();

        for &id in &doomed {
            self.remove_node(id);
        }

        self.update_node_distance();
        self.update_exit();
        self.check_link_symmetry();

        debug!(
            "lattice shortened to {:.2}m: {} nodes removed, {} left",
            self.range(),
            doomed.len(),
            self.len()
        );
        Ok(())
    }

    /// Slide the window forward while keeping its range.
    ///
    /// The movement is taken in whole resolution steps; the distance actually
    /// shifted is returned so callers can carry the remainder over.
    pub fn shift(&mut self, movement: f64) -> LatticeResult<f64> {
        if !(movement.is_finite() && movement >= 0.0) {
            return Err(LatticeError::InvalidArgument(format!(
                "shift movement must be non-negative, got {}",
                movement
            )));
        }

        let steps = (movement / self.resolution + DISTANCE_EPSILON).floor() as usize;
        if steps == 0 {
            return Ok(0.0);
        }

        let range = self.range();
        self.extend(range + steps as f64 * self.resolution)?;
        let shifted = self.drop_behind(steps);

        debug!(
            "lattice shifted by {:.2}m: entry now {:?}",
            shifted,
            self.entry().point()
        );
        Ok(shifted)
    }

    fn grow(&mut self, mut queue: VecDeque<NodeId>, limit: f64) -> LatticeResult<()> {
        while let Some(id) = queue.pop_front() {
            self.extend_front(id, limit, &mut queue)?;
            self.extend_lateral(id, Side::Left, &mut queue);
            self.extend_lateral(id, Side::Right, &mut queue);
        }
        Ok(())
    }

    fn extend_front(&mut self, id: NodeId, limit: f64, queue: &mut VecDeque<NodeId>) -> LatticeResult<()> {
        let node = &self.nodes[id];
        let distance = node.distance() + self.resolution;
        if node.front().is_some() || distance > limit + DISTANCE_EPSILON {
            return Ok(());
        }

        let Some(point) = self.router.front_point(node.point(), self.resolution)? else {
            return Ok(());
        };
        let front = self.find_or_insert(point, distance, queue);
        self.link(id, Link::Front, front);
        Ok(())
    }

    fn extend_lateral(&mut self, id: NodeId, side: Side, queue: &mut VecDeque<NodeId>) {
        let link = Link::from(side);
        let node = &self.nodes[id];
        if node.neighbor(link).is_some() {
            return;
        }

        let distance = node.distance();
        let Some(point) = self.router.lateral_point(node.point(), side) else {
            return;
        };
        let target = self.find_or_insert(point, distance, queue);
        self.link(id, link, target);
    }

    /// Drop every node less than `steps` hops ahead of the entry and
    /// re-anchor the entry `steps` hops along its own lane.
    ///
    /// Returns how far the entry moved, which is less than `steps` hops when
    /// the window runs into the end of the route.
    fn drop_behind(&mut self, steps: usize) -> f64 {
        let origin = self.entry().distance();
        let cutoff = (origin + steps as f64 * self.resolution)
            .min(self.exit().distance())
            - DISTANCE_EPSILON;
        let anchor = self.walk(self.entry, Link::Front, steps);

        let doomed: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.distance() < cutoff)
            .sorted_by_key(|node| OrderedFloat(node.distance()))
            .map(|node| node.id())
            .collect();

        for &id in &doomed {
            self.remove_node(id);
        }

        let entry = anchor.filter(|id| self.nodes.contains_key(*id)).or_else(|| {
            self.nodes
                .values()
                .min_by_key(|node| OrderedFloat(node.distance()))
                .map(|node| node.id())
        });
        if let Some(entry) = entry {
            self.entry = entry;
        }
        let moved = self.entry().distance() - origin;

        self.update_node_distance();
        self.update_exit();
        self.check_link_symmetry();
        trace!("{} nodes dropped behind the new entry", doomed.len());
        moved
    }

    // ========================================================================
    // Node Bookkeeping
    // ========================================================================

    fn find_or_insert(&mut self, point: R::Point, distance: f64, queue: &mut VecDeque<NodeId>) -> NodeId {
        if let Some(&existing) = self.point_to_node.get(&point.id()) {
            return existing;
        }

        let id = self
            .nodes
            .insert_with_key(|id| LatticeNode::new(id, point, distance));
        self.augment_tables(id);
        queue.push_back(id);
        trace!("node added at {:.2}m: {:?}", distance, self.nodes[id].point());
        id
    }

    /// Point `from` at `to` through `link`, and `to` back at `from` unless
    /// `to` already has a node on that side (lanes merging).
    fn link(&mut self, from: NodeId, link: Link, to: NodeId) {
        self.nodes[from].set_neighbor(link, Some(to));
        let target = &mut self.nodes[to];
        if target.neighbor(link.reverse()).is_none() {
            target.set_neighbor(link.reverse(), Some(from));
        }
    }

    fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };

        for link in Link::ALL {
            let neighbor = node
                .neighbor(link)
                .and_then(|neighbor| self.nodes.get_mut(neighbor));
            if let Some(neighbor) = neighbor {
                if neighbor.neighbor(link.reverse()) == Some(id) {
                    neighbor.set_neighbor(link.reverse(), None);
                }
            }
        }

        self.reduce_tables(node.point());
        trace!("node removed at {:.2}m: {:?}", node.distance(), node.point());
    }

    fn augment_tables(&mut self, id: NodeId) {
        let point = self.nodes[id].point();
        self.point_to_node.insert(point.id(), id);
        self.roadlane_to_points
            .entry(point.road_lane())
            .or_default()
            .push(point.id());
    }

    fn reduce_tables(&mut self, point: &R::Point) {
        self.point_to_node.remove(&point.id());

        let key = point.road_lane();
        if let Some(points) = self.roadlane_to_points.get_mut(&key) {
            points.retain(|&id| id != point.id());
            if points.is_empty() {
                self.roadlane_to_points.remove(&key);
            }
        }
    }

    /// Recompute node distances from the entry, which sits at 0.0.
    ///
    /// Nodes that can no longer be reached from the entry are removed.
    fn update_node_distance(&mut self) {
        loop {
            let visited = self.propagate_distances();
            if visited.len() == self.nodes.len() {
                return;
            }

            let orphans: Vec<NodeId> = self
                .nodes
                .keys()
                .filter(|id| !visited.contains(id))
                .collect();
            warn!("removing {} nodes unreachable from the lattice entry", orphans.len());
            for id in orphans {
                self.remove_node(id);
            }
        }
    }

    /// Breadth-first walk from the entry. Clears links to removed nodes and
    /// restores missing reverse links on the way.
    fn propagate_distances(&mut self) -> HashSet<NodeId> {
        let mut visited = HashSet::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();

        self.nodes[self.entry].set_distance(0.0);
        visited.insert(self.entry);
        queue.push_back(self.entry);

        while let Some(id) = queue.pop_front() {
            let distance = self.nodes[id].distance();
            for link in Link::ALL {
                let Some(target) = self.nodes[id].neighbor(link) else {
                    continue;
                };
                if !self.nodes.contains_key(target) {
                    self.nodes[id].set_neighbor(link, None);
                    continue;
                }

                let node = &mut self.nodes[target];
                if node.neighbor(link.reverse()).is_none() {
                    node.set_neighbor(link.reverse(), Some(id));
                }
                if visited.insert(target) {
                    node.set_distance(distance + link.offset(self.resolution));
                    queue.push_back(target);
                }
            }
        }

        visited
    }

    /// Prefer the end of the entry's own lane when it reaches the maximum distance
    fn update_exit(&mut self) {
        let Some(max_distance) = self.nodes.values().map(|node| OrderedFloat(node.distance())).max()
        else {
            return;
        };

        let mut chain_end = self.entry;
        for _ in 0..self.nodes.len() {
            match self.step(chain_end, Link::Front) {
                Some(next) => chain_end = next,
                None => break,
            }
        }

        let at_max = |node: &LatticeNode<R::Point>| {
            (node.distance() - max_distance.0).abs() < DISTANCE_EPSILON
        };
        if at_max(&self.nodes[chain_end]) {
            self.exit = chain_end;
        } else if let Some(node) = self.nodes.values().find(|node| at_max(*node)) {
            self.exit = node.id();
        }
    }

    fn check_link_symmetry(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for node in self.nodes.values() {
            for link in Link::ALL {
                let Some(target) = node.neighbor(link) else {
                    continue;
                };
                let consistent = self
                    .nodes
                    .get(target)
                    .and_then(|target| target.neighbor(link.reverse()))
                    .and_then(|reverse| self.nodes.get(reverse))
                    .map_or(false, |reverse| reverse.neighbor(link) == Some(target));
                debug_assert!(
                    consistent,
                    "{:?} link of node at {:.2}m has no matching reverse link",
                    link,
                    node.distance()
                );
            }
        }
    }

    // ========================================================================
    // Node Query
    // ========================================================================

    /// The node on the same road and lane as `point` closest to it, if it
    /// lies within `tolerance` meters
    pub fn closest_node(&self, point: &R::Point, tolerance: f64) -> Option<&LatticeNode<R::Point>> {
        self.closest_node_id(point, tolerance).map(|id| &self.nodes[id])
    }

    fn closest_node_id(&self, point: &R::Point, tolerance: f64) -> Option<NodeId> {
        let location = point.location();
        self.roadlane_to_points
            .get(&point.road_lane())?
            .iter()
            .filter_map(|point_id| self.point_to_node.get(point_id))
            .map(|&id| (id, self.nodes[id].point().distance_to(&location)))
            .min_by_key(|&(_, gap)| OrderedFloat(gap))
            .filter(|&(_, gap)| gap <= tolerance)
            .map(|(id, _)| id)
    }

    fn step(&self, id: NodeId, link: Link) -> Option<NodeId> {
        self.nodes
            .get(id)?
            .neighbor(link)
            .filter(|target| self.nodes.contains_key(*target))
    }

    fn walk(&self, start: NodeId, link: Link, hops: usize) -> Option<NodeId> {
        (0..hops).try_fold(start, |current, _| self.step(current, link))
    }

    fn hops(&self, range: f64) -> usize {
        (range / self.resolution - DISTANCE_EPSILON).ceil().max(0.0) as usize
    }

    fn relative(
        &self,
        query: &R::Point,
        range: f64,
        moves: &[Traverse],
    ) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        if !(range.is_finite() && range >= 0.0) {
            return Err(LatticeError::InvalidArgument(format!(
                "query range must be non-negative, got {}",
                range
            )));
        }

        let Some(mut current) = self.closest_node_id(query, self.query_tolerance) else {
            return Ok(None);
        };
        for &traverse in moves {
            let next = match traverse {
                Traverse::Walk(link) => self.walk(current, link, self.hops(range)),
                Traverse::Step(link) => self.step(current, link),
            };
            match next {
                Some(id) => current = id,
                None => return Ok(None),
            }
        }
        Ok(self.nodes.get(current))
    }

    /// The node `range` meters ahead of `query` on its lane
    pub fn front(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Walk(Link::Front)])
    }

    /// The node `range` meters behind `query` on its lane
    pub fn back(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Walk(Link::Back)])
    }

    /// Move to the left lane first, then `range` meters ahead.
    ///
    /// This can differ from [`front_left`](Self::front_left) where the left
    /// lane does not exist along the whole span.
    pub fn left_front(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Step(Link::Left), Traverse::Walk(Link::Front)])
    }

    /// Move `range` meters ahead first, then to the left lane
    pub fn front_left(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Walk(Link::Front), Traverse::Step(Link::Left)])
    }

    pub fn left_back(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Step(Link::Left), Traverse::Walk(Link::Back)])
    }

    pub fn back_left(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Walk(Link::Back), Traverse::Step(Link::Left)])
    }

    pub fn right_front(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Step(Link::Right), Traverse::Walk(Link::Front)])
    }

    pub fn front_right(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Walk(Link::Front), Traverse::Step(Link::Right)])
    }

    pub fn right_back(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Step(Link::Right), Traverse::Walk(Link::Back)])
    }

    pub fn back_right(&self, query: &R::Point, range: f64) -> LatticeResult<Option<&LatticeNode<R::Point>>> {
        self.relative(query, range, &[Traverse::Walk(Link::Back), Traverse::Step(Link::Right)])
    }
}

impl<R: Router> Clone for Lattice<R> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            nodes: self.nodes.clone(),
            entry: self.entry,
            exit: self.exit,
            point_to_node: self.point_to_node.clone(),
            roadlane_to_points: self.roadlane_to_points.clone(),
            resolution: self.resolution,
            query_tolerance: self.query_tolerance,
        }
    }
}

impl<R: Router> fmt::Debug for Lattice<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lattice")
            .field("entry", self.entry().point())
            .field("exit", self.exit().point())
            .field("range", &self.range())
            .field("resolution", &self.resolution)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
