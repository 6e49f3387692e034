//! k-means clustering and shortcut precomputation
//!
//! Nodes are grouped by position. Each cluster is represented by the member
//! closest to its centre; every node then records the first hop of its
//! fastest route to each representative and to nearby pickups, once for a
//! router that may jump and once for a walking-only router.

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ai::{ItemCategory, ItemRegistry};
use crate::core::ClusterConfig;
use crate::graph::{
    ActorId, ArcType, ClusterId, NodeId, NodePlan, PathingCluster, PathingGraph,
};

/// Routers shortcuts are built for: the shortcut kind and the arc type it skips
const ROUTERS: [(ArcType, Option<ArcType>); 2] =
    [(ArcType::Jump, None), (ArcType::Move, Some(ArcType::Jump))];

/// Summary of one clustering run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    /// Clusters holding at least one node
    pub clusters: usize,
    /// k-means iterations run
    pub iterations: usize,
    /// Shortcuts recorded, cluster-actor ones included
    pub shortcuts: usize,
}

/// Clusters a finished graph in place
pub struct Clusterer<'a> {
    config: &'a ClusterConfig,
}

impl<'a> Clusterer<'a> {
    #[must_use]
    pub fn new(config: &'a ClusterConfig) -> Self {
        Self { config }
    }

    /// Assign clusters and record every shortcut.
    ///
    /// The requested cluster count is clamped to the node count; an empty
    /// graph is left untouched.
    pub fn run(&self, graph: &mut PathingGraph, items: &ItemRegistry) -> ClusterStats {
        if graph.is_empty() {
            return ClusterStats::default();
        }

        let (representatives, iterations) = self.assign(graph);
        let mut stats = ClusterStats {
            clusters: representatives.len(),
            iterations,
            shortcuts: 0,
        };

        let mut shortcuts = self.cluster_shortcuts(graph, &representatives);
        shortcuts.extend(self.actor_shortcuts(graph, items));
        for (source, shortcut) in shortcuts {
            if graph.insert_cluster(source, shortcut) {
                stats.shortcuts += 1;
            }
        }

        for id in graph.node_ids() {
            graph.find_node_mut(id).clusters.sort_by(|a, b| {
                (a.kind, a.actor)
                    .cmp(&(b.kind, b.actor))
                    .then_with(|| a.weight.total_cmp(&b.weight))
                    .then_with(|| a.target.cmp(&b.target))
            });
        }

        self.link_visible_clusters(graph);
        log::info!(
            "Clustered {} nodes into {} clusters in {} iterations, {} shortcuts",
            graph.node_count(),
            stats.clusters,
            stats.iterations,
            stats.shortcuts
        );
        stats
    }

    /// Run k-means, write cluster ids and return each cluster's representative
    fn assign(&self, graph: &mut PathingGraph) -> (Vec<NodeId>, usize) {
        let ids = graph.node_ids();
        let positions: Vec<Vec3> = ids.iter().map(|&id| graph.find_node(id).position).collect();
        let k = self.config.clusters.clamp(1, positions.len());
        if k < self.config.clusters {
            log::debug!("Clamped cluster count {} to {}", self.config.clusters, k);
        }

        let mut centres = seed_centres(&positions, k, self.config.seed);
        let mut labels = vec![usize::MAX; positions.len()];

        let mut iterations = 0;
        while iterations < self.config.iterations.max(1) {
            iterations += 1;
            let mut changed = false;
            for (label, position) in labels.iter_mut().zip(&positions) {
                let nearest = nearest(&centres, *position);
                if *label != nearest {
                    *label = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            let mut sums = vec![(Vec3::ZERO, 0u32); k];
            for (&label, position) in labels.iter().zip(&positions) {
                sums[label].0 += *position;
                sums[label].1 += 1;
            }
            for (centre, (sum, count)) in centres.iter_mut().zip(sums) {
                if count > 0 {
                    *centre = sum / count as f32;
                }
            }
        }

        let mut best: Vec<Option<(usize, f32)>> = vec![None; k];
        for (i, (&label, position)) in labels.iter().zip(&positions).enumerate() {
            let distance = position.distance_squared(centres[label]);
            if best[label].is_none_or(|(_, d)| distance < d) {
                best[label] = Some((i, distance));
            }
        }

        for (&id, &label) in ids.iter().zip(&labels) {
            graph.find_node_mut(id).cluster = ClusterId(label as u32);
        }
        let representatives = best.into_iter().flatten().map(|(i, _)| ids[i]).collect();
        (representatives, iterations)
    }

    /// First hops toward every representative within `cluster_search_limit`
    fn cluster_shortcuts(
        &self,
        graph: &PathingGraph,
        representatives: &[NodeId],
    ) -> Vec<(NodeId, PathingCluster)> {
        let targets: FxHashSet<NodeId> = representatives.iter().copied().collect();
        let mut shortcuts = Vec::new();
        for source in graph.node_ids() {
            for (kind, skip) in ROUTERS {
                let limit = self.config.cluster_search_limit;
                let plans = graph.find_plans(source, &targets, skip, limit);
                shortcuts.extend(first_hops(source, kind, plans, |_| None));
            }
        }
        shortcuts
    }

    /// First hops toward pickups within `actor_search_limit`, per category
    fn actor_shortcuts(
        &self,
        graph: &PathingGraph,
        items: &ItemRegistry,
    ) -> Vec<(NodeId, PathingCluster)> {
        let mut by_category: FxHashMap<ItemCategory, FxHashSet<NodeId>> = FxHashMap::default();
        let mut occupants: FxHashMap<NodeId, ActorId> = FxHashMap::default();
        for node in graph.nodes() {
            let Some(pickup) = node.actor.and_then(|actor| items.get(actor)) else {
                continue;
            };
            by_category.entry(pickup.category).or_default().insert(node.id);
            occupants.insert(node.id, pickup.actor);
        }

        let mut shortcuts = Vec::new();
        for source in graph.node_ids() {
            for category in ItemCategory::ALL {
                let Some(targets) = by_category.get(&category) else {
                    continue;
                };
                for (kind, skip) in ROUTERS {
                    let limit = self.config.actor_search_limit;
                    let plans = graph.find_plans(source, targets, skip, limit);
                    shortcuts.extend(first_hops(source, kind, plans, |target| {
                        occupants.get(&target).copied()
                    }));
                }
            }
        }
        shortcuts
    }

    /// Memoize cluster pairs that contain mutually visible nodes
    fn link_visible_clusters(&self, graph: &mut PathingGraph) {
        let mut pairs = FxHashSet::default();
        for node in graph.nodes() {
            for other in node.visibles.keys() {
                let Some(other) = graph.node(*other) else {
                    continue;
                };
                if other.cluster != node.cluster {
                    pairs.insert((node.cluster, other.cluster));
                }
            }
        }
        for (a, b) in pairs {
            graph.insert_visible_cluster(a, b);
        }
    }
}

/// Pick `k` initial centres: one at random, then repeatedly the position
/// farthest from every centre chosen so far
fn seed_centres(positions: &[Vec3], k: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let first = positions[rng.random_range(0..positions.len())];
    let mut gaps: Vec<f32> = positions.iter().map(|p| p.distance_squared(first)).collect();
    let mut centres = vec![first];
    while centres.len() < k {
        let mut farthest = (0, -1.0);
        for (i, gap) in gaps.iter().enumerate() {
            if *gap > farthest.1 {
                farthest = (i, *gap);
            }
        }
        let centre = positions[farthest.0];
        for (gap, position) in gaps.iter_mut().zip(positions) {
            *gap = gap.min(position.distance_squared(centre));
        }
        centres.push(centre);
    }
    centres
}

/// Index of the centre nearest to `position`, first one on ties
fn nearest(centres: &[Vec3], position: Vec3) -> usize {
    let mut best = (0, f32::MAX);
    for (i, centre) in centres.iter().enumerate() {
        let distance = centre.distance_squared(position);
        if distance < best.1 {
            best = (i, distance);
        }
    }
    best.0
}

/// Shortcuts recording the first arc of each plan, in target order
fn first_hops(
    source: NodeId,
    kind: ArcType,
    plans: FxHashMap<NodeId, NodePlan>,
    actor_of: impl Fn(NodeId) -> Option<ActorId>,
) -> Vec<(NodeId, PathingCluster)> {
    let mut plans: Vec<_> = plans.into_iter().collect();
    plans.sort_unstable_by_key(|(target, _)| *target);
    plans
        .into_iter()
        .filter_map(|(target, plan)| {
            let first = plan.arcs().first()?;
            Some((
                source,
                PathingCluster {
                    kind,
                    actor: actor_of(target),
                    arc: first.id,
                    node: first.target,
                    target,
                    weight: plan.weight(),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Pickup;

    fn config(clusters: usize) -> ClusterConfig {
        ClusterConfig {
            clusters,
            ..Default::default()
        }
    }

    /// Three groups of nodes far apart, joined by a two-way corridor
    fn corridor() -> (PathingGraph, Vec<NodeId>) {
        let mut graph = PathingGraph::new();
        let mut ids = Vec::new();
        for group in 0..3 {
            for i in 0..3 {
                let position = Vec3::new(group as f32 * 1000.0 + i as f32 * 50.0, 0.0, 0.0);
                ids.push(graph.insert_node(position, 16.0));
            }
        }
        for pair in ids.windows(2) {
            let a = graph.find_node(pair[0]).position;
            let b = graph.find_node(pair[1]).position;
            let weight = a.distance(b) / 320.0;
            graph.insert_arc(pair[0], ArcType::Move, pair[1], weight);
            graph.insert_arc(pair[1], ArcType::Move, pair[0], weight);
        }
        (graph, ids)
    }

    #[test]
    fn test_two_nodes_clamp_cluster_count() {
        let mut graph = PathingGraph::new();
        let a = graph.insert_node(Vec3::ZERO, 16.0);
        let b = graph.insert_node(Vec3::new(100.0, 0.0, 0.0), 16.0);
        graph.insert_arc(a, ArcType::Move, b, 0.5);
        graph.insert_arc(b, ArcType::Move, a, 0.5);

        let stats = Clusterer::new(&config(200)).run(&mut graph, &ItemRegistry::new());
        assert_eq!(stats.clusters, 2);
        assert_eq!(graph.cluster_ids().len(), 2);
        assert_ne!(graph.find_node(a).cluster, graph.find_node(b).cluster);

        // Each node knows the way to the other's cluster with both routers
        let target = graph.find_node(b).cluster;
        for kind in [ArcType::Jump, ArcType::Move] {
            let shortcut = graph.find_cluster(a, kind, target).unwrap();
            assert_eq!(shortcut.target, b);
            assert_eq!(shortcut.weight, 0.5);
        }
    }

    #[test]
    fn test_empty_graph_is_untouched() {
        let mut graph = PathingGraph::new();
        let stats = Clusterer::new(&config(200)).run(&mut graph, &ItemRegistry::new());
        assert_eq!(stats, ClusterStats::default());
    }

    #[test]
    fn test_groups_become_clusters() {
        let (mut graph, ids) = corridor();
        let stats = Clusterer::new(&config(3)).run(&mut graph, &ItemRegistry::new());
        assert_eq!(stats.clusters, 3);

        for group in ids.chunks(3) {
            let cluster = graph.find_node(group[0]).cluster;
            assert!(group.iter().all(|id| graph.find_node(*id).cluster == cluster));
        }

        // The middle of each group is its representative
        let last = graph.find_node(ids[7]).cluster;
        let shortcut = graph.find_cluster(ids[0], ArcType::Jump, last).unwrap();
        assert_eq!(shortcut.target, ids[7]);
        assert_eq!(shortcut.node, ids[1]);
    }

    #[test]
    fn test_clustering_is_reproducible() {
        let (mut first, _) = corridor();
        let (mut second, _) = corridor();
        Clusterer::new(&config(4)).run(&mut first, &ItemRegistry::new());
        Clusterer::new(&config(4)).run(&mut second, &ItemRegistry::new());
        let labels = |graph: &PathingGraph| -> Vec<ClusterId> {
            graph.nodes().iter().map(|node| node.cluster).collect()
        };
        assert_eq!(labels(&first), labels(&second));
    }

    #[test]
    fn test_actor_shortcuts_respect_limit() {
        let (mut graph, ids) = corridor();
        let near = ActorId(1);
        let far = ActorId(2);
        graph.set_occupant(ids[2], Some(near));
        graph.set_occupant(ids[8], Some(far));
        let items: ItemRegistry = [near, far]
            .into_iter()
            .map(|actor| Pickup {
                actor,
                category: ItemCategory::Health,
                code: 0,
                amount: 25,
                ammo: 0,
                respawn_time: 35.0,
            })
            .collect();

        Clusterer::new(&config(3)).run(&mut graph, &items);

        let start = graph.find_node(ids[0]);
        let actors: Vec<_> = start.actor_clusters(ArcType::Move).collect();
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].actor, Some(near));
        assert_eq!(actors[0].target, ids[2]);
        assert_eq!(actors[0].node, ids[1]);
        assert_eq!(start.actor_clusters(ArcType::Jump).count(), 1);
    }

    #[test]
    fn test_shortcuts_sorted_by_kind_then_weight() {
        let (mut graph, ids) = corridor();
        Clusterer::new(&config(3)).run(&mut graph, &ItemRegistry::new());
        let clusters = &graph.find_node(ids[4]).clusters;
        assert!(!clusters.is_empty());
        for pair in clusters.windows(2) {
            assert!(pair[0].kind <= pair[1].kind);
            if pair[0].kind == pair[1].kind && pair[0].actor == pair[1].actor {
                assert!(pair[0].weight <= pair[1].weight);
            }
        }
    }

    #[test]
    fn test_visible_nodes_link_clusters() {
        let mut graph = PathingGraph::new();
        let a = graph.insert_node(Vec3::ZERO, 16.0);
        let b = graph.insert_node(Vec3::new(5000.0, 0.0, 0.0), 16.0);
        graph.find_node_mut(a).visibles.insert(b, 5000.0);
        graph.find_node_mut(b).visibles.insert(a, 5000.0);

        Clusterer::new(&config(2)).run(&mut graph, &ItemRegistry::new());
        let (ca, cb) = (graph.find_node(a).cluster, graph.find_node(b).cluster);
        assert!(graph.is_cluster_visible(ca, cb));
        assert_eq!(graph.visible_clusters().len(), 1);
    }
}
