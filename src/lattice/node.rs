//! Lattice node

use slotmap::new_key_type;

use crate::common::{NetworkPoint, Side};

new_key_type! {
    /// Handle of a node within the arena of its [`Lattice`](super::Lattice).
    pub struct NodeId;
}

/// The four neighbor relations of a lattice node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Front,
    Back,
    Left,
    Right,
}

impl Link {
    pub const ALL: [Link; 4] = [Link::Front, Link::Back, Link::Left, Link::Right];

    pub fn reverse(self) -> Link {
        match self {
            Link::Front => Link::Back,
            Link::Back => Link::Front,
            Link::Left => Link::Right,
            Link::Right => Link::Left,
        }
    }

    /// Change in lattice distance when following this link
    pub fn offset(self, resolution: f64) -> f64 {
        match self {
            Link::Front => resolution,
            Link::Back => -resolution,
            Link::Left | Link::Right => 0.0,
        }
    }
}

impl From<Side> for Link {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Link::Left,
            Side::Right => Link::Right,
        }
    }
}

/// Vertex of the lattice: one network point and its neighbors.
///
/// `distance` is measured along the lattice from its entry, which is not
/// the arclength of the point on its own road.
#[derive(Debug, Clone)]
pub struct LatticeNode<P> {
    id: NodeId,
    point: P,
    distance: f64,
    front: Option<NodeId>,
    back: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl<P: NetworkPoint> LatticeNode<P> {
    pub(crate) fn new(id: NodeId, point: P, distance: f64) -> Self {
        Self {
            id,
            point,
            distance,
            front: None,
            back: None,
            left: None,
            right: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn point(&self) -> &P {
        &self.point
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub(crate) fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }

    pub fn front(&self) -> Option<NodeId> {
        self.front
    }

    pub fn back(&self) -> Option<NodeId> {
        self.back
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    pub fn neighbor(&self, link: Link) -> Option<NodeId> {
        match link {
            Link::Front => self.front,
            Link::Back => self.back,
            Link::Left => self.left,
            Link::Right => self.right,
        }
    }

    pub(crate) fn set_neighbor(&mut self, link: Link, node: Option<NodeId>) {
        match link {
            Link::Front => self.front = node,
            Link::Back => self.back = node,
            Link::Left => self.left = node,
            Link::Right => self.right = node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RoadMap;
    use nalgebra::Point3;
    use slotmap::SlotMap;

    #[test]
    fn test_link_reverse() {
        for link in Link::ALL {
            assert_eq!(link.reverse().reverse(), link);
            assert!((link.offset(2.0) + link.reverse().offset(2.0)).abs() < 1e-12);
        }
        assert_eq!(Link::from(Side::Left), Link::Left);
    }

    #[test]
    fn test_node_neighbors() {
        let mut builder = RoadMap::builder();
        builder.add_road(1, Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0), 1);
        let map = builder.build().unwrap();

        let mut arena: SlotMap<NodeId, LatticeNode<_>> = SlotMap::with_key();
        let a = arena.insert_with_key(|id| LatticeNode::new(id, map.point(1, -1, 0.0).unwrap(), 0.0));
        let b = arena.insert_with_key(|id| LatticeNode::new(id, map.point(1, -1, 1.0).unwrap(), 1.0));

        arena[a].set_neighbor(Link::Front, Some(b));
        assert_eq!(arena[a].front(), Some(b));
        assert_eq!(arena[a].neighbor(Link::Front), Some(b));
        assert!(arena[a].back().is_none());
        assert_eq!(arena[b].id(), b);

        arena[a].set_neighbor(Link::Front, None);
        assert!(arena[a].front().is_none());
    }
}
