//! Graph entities: nodes, arcs, cluster shortcuts and transitions
//!
//! Every cross reference is an integer id. The owning [`PathingGraph`]
//! resolves ids through its index map.
//!
//! [`PathingGraph`]: super::PathingGraph

use std::fmt;

use glam::Vec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Identifier of a [`PathingNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifier of a [`PathingArc`] (shared by the arc's transition)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ArcId(pub u32);

/// Identifier of a level actor (pickup, trigger or agent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u32);

/// Identifier of a k-means cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arc#{}", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster#{}", self.0)
    }
}

/// How an arc is traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArcType {
    /// Grounded walking
    Move,
    /// Walking off a ledge followed by a gravity fall
    Fall,
    /// A jump from standing
    Jump,
    /// Launched by a push trigger (jump pad)
    Push,
    /// Relocated by a teleport trigger
    Teleport,
}

impl ArcType {
    /// All arc types in wire order
    pub const ALL: [ArcType; 5] = [
        ArcType::Move,
        ArcType::Fall,
        ArcType::Jump,
        ArcType::Push,
        ArcType::Teleport,
    ];

    /// Wire code used by the binary graph format
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            ArcType::Move => 0,
            ArcType::Fall => 1,
            ArcType::Jump => 2,
            ArcType::Push => 3,
            ArcType::Teleport => 4,
        }
    }

    /// Inverse of [`ArcType::code`]
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// A directed, time-weighted edge owned by its source node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathingArc {
    pub id: ArcId,
    pub kind: ArcType,
    pub target: NodeId,
    /// Simulated traversal time in seconds
    pub weight: f32,
}

/// A precomputed first hop toward a cluster representative or a pickup node.
///
/// `kind` names the router that produced it: [`ArcType::Jump`] routes may use
/// every arc type, [`ArcType::Move`] routes never use jump arcs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathingCluster {
    pub kind: ArcType,
    /// Pickup this shortcut leads to, `None` for plain cluster shortcuts
    pub actor: Option<ActorId>,
    /// First arc of the fastest known route
    pub arc: ArcId,
    /// Node reached by `arc`
    pub node: NodeId,
    /// Final node of the route
    pub target: NodeId,
    /// Total route time in seconds
    pub weight: f32,
}

/// Waypoint-level detail of a single arc
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathingTransition {
    /// Same id as the arc this transition details
    pub id: ArcId,
    pub kind: Option<ArcType>,
    /// Waypoint positions in traversal order
    pub positions: Vec<Vec3>,
    /// Time spent reaching each waypoint from the previous one
    pub weights: Vec<f32>,
    /// Nodes whose tolerance covers a waypoint, in traversal order
    pub nodes: Vec<NodeId>,
}

impl PathingTransition {
    /// Create an empty transition for `kind`
    #[must_use]
    pub fn new(kind: ArcType) -> Self {
        Self {
            id: ArcId(0),
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Append a waypoint reached after `weight` seconds
    pub fn push(&mut self, position: Vec3, weight: f32) {
        self.positions.push(position);
        self.weights.push(weight);
    }

    /// Number of waypoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the transition holds no waypoints
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of segment weights
    #[must_use]
    pub fn total_weight(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Position reached after `time` seconds along the transition.
    ///
    /// Interpolates linearly inside the segment that contains `time`, starting
    /// from `origin` (the source node position).
    #[must_use]
    pub fn interpolate(&self, origin: Vec3, time: f32) -> Vec3 {
        let mut from = origin;
        let mut elapsed = 0.0;
        for (&to, &weight) in self.positions.iter().zip(&self.weights) {
            if elapsed + weight >= time {
                if weight <= 0.0 {
                    return to;
                }
                return from.lerp(to, ((time - elapsed) / weight).clamp(0.0, 1.0));
            }
            elapsed += weight;
            from = to;
        }
        from
    }
}

/// A sampled traversable position
#[derive(Debug, Clone, PartialEq)]
pub struct PathingNode {
    pub id: NodeId,
    /// Actor standing on this node (pickup or trigger), updated by events
    pub actor: Option<ActorId>,
    pub position: Vec3,
    pub cluster: ClusterId,
    /// Radius inside which a position snaps to this node
    pub tolerance: f32,
    pub arcs: SmallVec<[PathingArc; 8]>,
    pub clusters: Vec<PathingCluster>,
    pub transitions: Vec<PathingTransition>,
    /// Mutually visible nodes and their distance
    pub visibles: FxHashMap<NodeId, f32>,
}

impl PathingNode {
    /// Create an unconnected node
    #[must_use]
    pub fn new(id: NodeId, position: Vec3, tolerance: f32) -> Self {
        Self {
            id,
            actor: None,
            position,
            cluster: ClusterId(0),
            tolerance,
            arcs: SmallVec::new(),
            clusters: Vec::new(),
            transitions: Vec::new(),
            visibles: FxHashMap::default(),
        }
    }

    /// Find an outgoing arc by id
    #[must_use]
    pub fn arc(&self, id: ArcId) -> Option<&PathingArc> {
        self.arcs.iter().find(|arc| arc.id == id)
    }

    /// Whether an arc of `kind` to `target` already exists
    #[must_use]
    pub fn has_arc(&self, kind: ArcType, target: NodeId) -> bool {
        self.arcs
            .iter()
            .any(|arc| arc.kind == kind && arc.target == target)
    }

    /// Find the transition detailing arc `id`
    #[must_use]
    pub fn transition(&self, id: ArcId) -> Option<&PathingTransition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Whether `other` is in this node's visibility list
    #[must_use]
    pub fn is_visible(&self, other: NodeId) -> bool {
        other == self.id || self.visibles.contains_key(&other)
    }

    /// Cluster shortcut of `kind` toward `target`, optionally restricted to an actor filter
    #[must_use]
    pub fn cluster_to(
        &self,
        kind: ArcType,
        target: NodeId,
        actor: Option<ActorId>,
    ) -> Option<&PathingCluster> {
        self.clusters
            .iter()
            .find(|c| c.kind == kind && c.target == target && c.actor == actor)
            .or_else(|| {
                self.clusters
                    .iter()
                    .find(|c| c.kind == kind && c.target == target)
            })
    }

    /// Cluster-actor shortcuts produced by the router `kind`
    pub fn actor_clusters(&self, kind: ArcType) -> impl Iterator<Item = &PathingCluster> {
        self.clusters
            .iter()
            .filter(move |c| c.kind == kind && c.actor.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_type_codes() {
        for kind in ArcType::ALL {
            assert_eq!(ArcType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ArcType::from_code(9), None);
    }

    #[test]
    fn test_default_transition_is_empty() {
        let transition = PathingTransition::default();
        assert_eq!(transition.id, ArcId(0));
        assert_eq!(transition.kind, None);
        assert!(transition.is_empty());

        let walk = PathingTransition::new(ArcType::Move);
        assert_eq!(walk.id, ArcId::default());
        assert_eq!(walk.kind, Some(ArcType::Move));
    }

    #[test]
    fn test_transition_interpolation() {
        let mut transition = PathingTransition::new(ArcType::Move);
        transition.push(Vec3::new(10.0, 0.0, 0.0), 1.0);
        transition.push(Vec3::new(20.0, 0.0, 0.0), 1.0);

        assert_eq!(transition.total_weight(), 2.0);
        let mid = transition.interpolate(Vec3::ZERO, 1.5);
        assert!((mid.x - 15.0).abs() < 1e-4);

        // Past the end clamps to the last waypoint
        let end = transition.interpolate(Vec3::ZERO, 5.0);
        assert_eq!(end, Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn test_cluster_lookup_prefers_actor_match() {
        let mut node = PathingNode::new(NodeId(1), Vec3::ZERO, 16.0);
        let plain = PathingCluster {
            kind: ArcType::Jump,
            actor: None,
            arc: ArcId(1),
            node: NodeId(2),
            target: NodeId(3),
            weight: 2.0,
        };
        let actor = PathingCluster {
            actor: Some(ActorId(7)),
            arc: ArcId(2),
            ..plain
        };
        node.clusters.push(plain);
        node.clusters.push(actor);

        let found = node
            .cluster_to(ArcType::Jump, NodeId(3), Some(ActorId(7)))
            .unwrap();
        assert_eq!(found.arc, ArcId(2));
        assert_eq!(node.actor_clusters(ArcType::Jump).count(), 1);
        assert!(node.cluster_to(ArcType::Move, NodeId(3), None).is_none());
    }
}
