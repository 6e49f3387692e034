//! Arena that owns every node, arc, cluster shortcut and transition

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use super::node::{
    ActorId, ArcId, ArcType, ClusterId, NodeId, PathingArc, PathingCluster, PathingNode,
    PathingTransition,
};
use super::plan::NodePlan;

/// Traversability graph of a level.
///
/// Nodes live in a flat vector; every cross reference is an id resolved
/// through `index`. The graph is populated once by the builder and the
/// clusterer and afterwards only the node occupants change.
#[derive(Debug, Default, Clone)]
pub struct PathingGraph {
    nodes: Vec<PathingNode>,
    index: FxHashMap<NodeId, usize>,
    visible_clusters: FxHashSet<(ClusterId, ClusterId)>,
    next_node: u32,
    next_arc: u32,
}

/// Frontier entry for the weighted search
#[derive(Debug, Clone, Copy)]
struct Frontier {
    node: NodeId,
    cost: f32,
    order: u32,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap, earlier pushes first on equal cost
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PathingGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_node: 1,
            next_arc: 1,
            ..Default::default()
        }
    }

    /// Whether the graph has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of arcs over all nodes
    #[must_use]
    pub fn arc_count(&self) -> usize {
        self.nodes.iter().map(|n| n.arcs.len()).sum()
    }

    /// Number of cluster shortcuts over all nodes
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.nodes.iter().map(|n| n.clusters.len()).sum()
    }

    /// Number of transitions over all nodes
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.nodes.iter().map(|n| n.transitions.len()).sum()
    }

    /// All nodes in insertion order
    #[must_use]
    pub fn nodes(&self) -> &[PathingNode] {
        &self.nodes
    }

    /// Ids of all nodes in insertion order
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    // -------------------------------------------------------------------------
    // Population
    // -------------------------------------------------------------------------

    /// Create a node and return its id
    pub fn insert_node(&mut self, position: Vec3, tolerance: f32) -> NodeId {
        let id = NodeId(self.next_node.max(1));
        self.insert_node_with(PathingNode::new(id, position, tolerance));
        id
    }

    /// Insert a fully formed node, keeping its id.
    ///
    /// # Panics
    ///
    /// Panics when a node with the same id already exists.
    pub fn insert_node_with(&mut self, node: PathingNode) {
        assert!(
            !self.index.contains_key(&node.id),
            "duplicate {} inserted into pathing graph",
            node.id
        );
        self.next_node = self.next_node.max(node.id.0 + 1);
        for arc in &node.arcs {
            self.next_arc = self.next_arc.max(arc.id.0 + 1);
        }
        self.index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
    }

    /// Create an arc from `source` to `target` and return its id.
    ///
    /// # Panics
    ///
    /// Panics when either node is missing, when the arc would loop on its
    /// source, or when the weight is negative.
    pub fn insert_arc(
        &mut self,
        source: NodeId,
        kind: ArcType,
        target: NodeId,
        weight: f32,
    ) -> ArcId {
        let id = ArcId(self.next_arc.max(1));
        self.insert_arc_with(
            source,
            PathingArc {
                id,
                kind,
                target,
                weight,
            },
        );
        id
    }

    /// Insert an arc keeping its id
    ///
    /// # Panics
    ///
    /// See [`PathingGraph::insert_arc`].
    pub fn insert_arc_with(&mut self, source: NodeId, arc: PathingArc) {
        assert!(arc.target != source, "{} cannot target its own source", arc.id);
        assert!(
            arc.weight >= 0.0,
            "{} has negative weight {}",
            arc.id,
            arc.weight
        );
        assert!(
            self.index.contains_key(&arc.target),
            "{} targets missing {}",
            arc.id,
            arc.target
        );
        self.next_arc = self.next_arc.max(arc.id.0 + 1);
        self.find_node_mut(source).arcs.push(arc);
    }

    /// Add a cluster shortcut to `source`.
    ///
    /// Returns `false` and leaves the node untouched when a shortcut with the
    /// same kind, actor and target already exists.
    pub fn insert_cluster(&mut self, source: NodeId, cluster: PathingCluster) -> bool {
        let node = self.find_node_mut(source);
        let duplicate = node.clusters.iter().any(|c| {
            c.kind == cluster.kind && c.target == cluster.target && c.actor == cluster.actor
        });
        if duplicate {
            return false;
        }
        node.clusters.push(cluster);
        true
    }

    /// Attach the transition detailing one of `source`'s arcs
    ///
    /// # Panics
    ///
    /// Panics when `source` owns no arc with the transition's id.
    pub fn insert_transition(&mut self, source: NodeId, transition: PathingTransition) {
        let node = self.find_node_mut(source);
        assert!(
            node.arc(transition.id).is_some(),
            "transition for missing {} on {}",
            transition.id,
            source
        );
        node.transitions.push(transition);
    }

    /// Record that clusters `a` and `b` can see each other
    pub fn insert_visible_cluster(&mut self, a: ClusterId, b: ClusterId) {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.visible_clusters.insert(key);
    }

    /// Whether clusters `a` and `b` can see each other
    #[must_use]
    pub fn is_cluster_visible(&self, a: ClusterId, b: ClusterId) -> bool {
        let key = if a <= b { (a, b) } else { (b, a) };
        a == b || self.visible_clusters.contains(&key)
    }

    /// Memoized visible cluster pairs, sorted
    #[must_use]
    pub fn visible_clusters(&self) -> Vec<(ClusterId, ClusterId)> {
        let mut pairs: Vec<_> = self.visible_clusters.iter().copied().collect();
        pairs.sort_unstable();
        pairs
    }

    /// Tag a node with the actor currently occupying it
    pub fn set_occupant(&mut self, node: NodeId, actor: Option<ActorId>) {
        self.find_node_mut(node).actor = actor;
    }

    pub(crate) fn find_node_mut(&mut self, id: NodeId) -> &mut PathingNode {
        match self.index.get(&id) {
            Some(&index) => &mut self.nodes[index],
            None => panic!("{id} missing from pathing graph"),
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Look up a node that must exist.
    ///
    /// # Panics
    ///
    /// Panics when the id is unknown; a dangling id is a programming error.
    #[must_use]
    pub fn find_node(&self, id: NodeId) -> &PathingNode {
        match self.node(id) {
            Some(node) => node,
            None => panic!("{id} missing from pathing graph"),
        }
    }

    /// Look up a node by id
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&PathingNode> {
        self.index.get(&id).map(|&index| &self.nodes[index])
    }

    /// Whether a node id is known
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Look up an arc of `source` that must exist
    ///
    /// # Panics
    ///
    /// Panics when the node or the arc is unknown.
    #[must_use]
    pub fn find_arc(&self, source: NodeId, arc: ArcId) -> &PathingArc {
        match self.find_node(source).arc(arc) {
            Some(arc) => arc,
            None => panic!("{arc} missing from {source}"),
        }
    }

    /// Transition detailing an arc of `source`
    #[must_use]
    pub fn find_transition(&self, source: NodeId, arc: ArcId) -> Option<&PathingTransition> {
        self.node(source).and_then(|node| node.transition(arc))
    }

    /// Nearest node to `position`.
    ///
    /// Linear scan; the first node found wins ties. With `require_grounded`
    /// nodes without outgoing arcs are skipped.
    #[must_use]
    pub fn find_closest_node(&self, position: Vec3, require_grounded: bool) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for node in &self.nodes {
            if require_grounded && node.arcs.is_empty() {
                continue;
            }
            let distance = node.position.distance_squared(position);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((node.id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Node occupied by `actor`
    #[must_use]
    pub fn find_actor_node(&self, actor: ActorId) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.actor == Some(actor))
            .map(|node| node.id)
    }

    /// Distinct cluster ids, sorted
    #[must_use]
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        let mut ids: Vec<_> = self
            .nodes
            .iter()
            .map(|n| n.cluster)
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Plain cluster shortcut of `kind` from `node` toward `cluster`
    #[must_use]
    pub fn find_cluster(
        &self,
        node: NodeId,
        kind: ArcType,
        cluster: ClusterId,
    ) -> Option<&PathingCluster> {
        self.find_node(node).clusters.iter().find(|c| {
            c.kind == kind
                && c.actor.is_none()
                && self.node(c.target).is_some_and(|t| t.cluster == cluster)
        })
    }

    /// Fastest plans from `source` to every reachable node of `targets`.
    ///
    /// Weighted breadth-first search over arcs. Arcs of type `skip` are not
    /// followed and nodes farther than `limit` seconds are not expanded.
    /// `source` itself never appears in the result.
    #[must_use]
    pub fn find_plans(
        &self,
        source: NodeId,
        targets: &FxHashSet<NodeId>,
        skip: Option<ArcType>,
        limit: f32,
    ) -> FxHashMap<NodeId, NodePlan> {
        let mut plans = FxHashMap::default();
        if targets.is_empty() || !self.contains(source) {
            return plans;
        }

        let mut open = BinaryHeap::new();
        let mut came_from: FxHashMap<NodeId, (NodeId, PathingArc)> = FxHashMap::default();
        let mut cost: FxHashMap<NodeId, f32> = FxHashMap::default();
        let mut closed: FxHashSet<NodeId> = FxHashSet::default();
        let mut order = 0u32;

        cost.insert(source, 0.0);
        open.push(Frontier {
            node: source,
            cost: 0.0,
            order,
        });

        let mut remaining = targets.len() - usize::from(targets.contains(&source));
        while let Some(current) = open.pop() {
            if !closed.insert(current.node) {
                continue;
            }
            if current.node != source && targets.contains(&current.node) {
                plans.insert(current.node, self.rebuild(source, current.node, &came_from));
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }

            for arc in &self.find_node(current.node).arcs {
                if Some(arc.kind) == skip || closed.contains(&arc.target) {
                    continue;
                }
                let tentative = current.cost + arc.weight;
                if tentative > limit {
                    continue;
                }
                if tentative < *cost.get(&arc.target).unwrap_or(&f32::MAX) {
                    cost.insert(arc.target, tentative);
                    came_from.insert(arc.target, (current.node, *arc));
                    order += 1;
                    open.push(Frontier {
                        node: arc.target,
                        cost: tentative,
                        order,
                    });
                }
            }
        }

        plans
    }

    /// Fastest plan from `source` to `target`, if one exists within `limit`
    #[must_use]
    pub fn find_plan(
        &self,
        source: NodeId,
        target: NodeId,
        skip: Option<ArcType>,
        limit: f32,
    ) -> Option<NodePlan> {
        let targets = std::iter::once(target).collect();
        self.find_plans(source, &targets, skip, limit).remove(&target)
    }

    fn rebuild(
        &self,
        source: NodeId,
        target: NodeId,
        came_from: &FxHashMap<NodeId, (NodeId, PathingArc)>,
    ) -> NodePlan {
        let mut arcs = Vec::new();
        let mut current = target;
        while current != source {
            let Some(&(previous, arc)) = came_from.get(&current) else {
                break;
            };
            arcs.push(arc);
            current = previous;
        }
        arcs.reverse();
        NodePlan::from_arcs(source, arcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A -> B (move 2), B -> C (move 3), A -> C (jump 10), C -> A (fall 1)
    fn chain() -> (PathingGraph, NodeId, NodeId, NodeId) {
        let mut graph = PathingGraph::new();
        let a = graph.insert_node(Vec3::new(0.0, 0.0, 0.0), 16.0);
        let b = graph.insert_node(Vec3::new(100.0, 0.0, 0.0), 16.0);
        let c = graph.insert_node(Vec3::new(200.0, 0.0, 0.0), 16.0);
        graph.insert_arc(a, ArcType::Move, b, 2.0);
        graph.insert_arc(b, ArcType::Move, c, 3.0);
        graph.insert_arc(a, ArcType::Jump, c, 10.0);
        graph.insert_arc(c, ArcType::Fall, a, 1.0);
        (graph, a, b, c)
    }

    #[test]
    fn test_closest_node_exact_position() {
        let (graph, a, b, c) = chain();
        for id in [a, b, c] {
            let position = graph.find_node(id).position;
            assert_eq!(graph.find_closest_node(position, true), Some(id));
        }
    }

    #[test]
    fn test_closest_node_first_found_wins_ties() {
        let (graph, a, b, _) = chain();
        // Halfway between A and B
        assert_eq!(graph.find_closest_node(Vec3::new(50.0, 0.0, 0.0), false), Some(a));
        assert_eq!(graph.find_closest_node(Vec3::new(51.0, 0.0, 0.0), false), Some(b));
    }

    #[test]
    fn test_closest_node_grounded_skips_isolated() {
        let (mut graph, _, _, _) = chain();
        let lone = graph.insert_node(Vec3::new(500.0, 0.0, 0.0), 16.0);
        assert_eq!(graph.find_closest_node(Vec3::new(500.0, 0.0, 0.0), false), Some(lone));
        assert_ne!(graph.find_closest_node(Vec3::new(500.0, 0.0, 0.0), true), Some(lone));
    }

    #[test]
    fn test_find_plans_prefers_fastest() {
        let (graph, a, b, c) = chain();
        let plan = graph.find_plan(a, c, None, f32::MAX).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.arcs()[0].target, b);
        assert_eq!(plan.weight(), 5.0);
    }

    #[test]
    fn test_find_plans_skips_arc_type() {
        let mut graph = PathingGraph::new();
        let a = graph.insert_node(Vec3::ZERO, 16.0);
        let b = graph.insert_node(Vec3::X * 100.0, 16.0);
        graph.insert_arc(a, ArcType::Jump, b, 1.0);

        assert!(graph.find_plan(a, b, None, 10.0).is_some());
        assert!(graph.find_plan(a, b, Some(ArcType::Jump), 10.0).is_none());
    }

    #[test]
    fn test_find_plans_respects_limit() {
        let (graph, a, _, c) = chain();
        assert!(graph.find_plan(a, c, None, 4.0).is_none());
        assert!(graph.find_plan(a, c, None, 5.0).is_some());
    }

    #[test]
    fn test_find_plans_excludes_source() {
        let (graph, a, b, _) = chain();
        let targets = [a, b].into_iter().collect();
        let plans = graph.find_plans(a, &targets, None, f32::MAX);
        assert_eq!(plans.len(), 1);
        assert!(plans.contains_key(&b));
    }

    #[test]
    fn test_duplicate_cluster_skipped() {
        let (mut graph, a, b, c) = chain();
        let arc = graph.find_node(a).arcs[0];
        let cluster = PathingCluster {
            kind: ArcType::Jump,
            actor: None,
            arc: arc.id,
            node: b,
            target: c,
            weight: 5.0,
        };
        assert!(graph.insert_cluster(a, cluster));
        assert!(!graph.insert_cluster(a, cluster));
        assert_eq!(graph.cluster_count(), 1);
    }

    #[test]
    fn test_visible_clusters_symmetric() {
        let mut graph = PathingGraph::new();
        graph.insert_visible_cluster(ClusterId(4), ClusterId(2));
        assert!(graph.is_cluster_visible(ClusterId(2), ClusterId(4)));
        assert!(graph.is_cluster_visible(ClusterId(4), ClusterId(2)));
        assert!(!graph.is_cluster_visible(ClusterId(1), ClusterId(2)));
        assert_eq!(graph.visible_clusters(), vec![(ClusterId(2), ClusterId(4))]);
    }

    #[test]
    #[should_panic(expected = "missing from pathing graph")]
    fn test_find_node_missing_panics() {
        let graph = PathingGraph::new();
        let _ = graph.find_node(NodeId(42));
    }

    #[test]
    #[should_panic(expected = "cannot target its own source")]
    fn test_self_arc_rejected() {
        let mut graph = PathingGraph::new();
        let a = graph.insert_node(Vec3::ZERO, 16.0);
        graph.insert_arc(a, ArcType::Move, a, 1.0);
    }
}
