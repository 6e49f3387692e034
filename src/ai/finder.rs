//! Utility-greedy item planner
//!
//! Searches over cluster-actor shortcuts rather than raw arcs. Every hop
//! claims one pickup on a hypothetical copy of the agent's state; the search
//! keeps the hop with the best item utility that still reaches the goal
//! cluster within the caller's time budget.
//!
//! The open list is ordered by heuristic, not by path cost, and the result is
//! the highest heuristic ever popped with the first one found winning ties.
//! That makes the planner greedy rather than cost optimal: an earlier node
//! can beat a later one of equal value that happens to be cheaper.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::{HeuristicConfig, PlannerConfig};
use crate::graph::{ActorId, ArcType, ClusterId, NodeId, NodePlan, PathingCluster, PathingGraph};

use super::heuristic::{can_item_be_grabbed, item_utility};
use super::items::{ExcludeActors, ItemRegistry};
use super::state::NodeState;

/// One hop of a partial plan
#[derive(Debug, Clone)]
struct AiPlanNode {
    node: NodeId,
    parent: Option<usize>,
    /// Shortcut taken from the parent
    shortcut: Option<PathingCluster>,
    /// Seconds from the start
    weight: f32,
    state: NodeState,
}

/// Open list entry: highest heuristic first, earlier discoveries first on ties
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    heuristic: f32,
    index: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.heuristic
            .partial_cmp(&other.heuristic)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Planner over a read-only graph and item registry.
///
/// Holds no per-call state; one finder can serve any number of agents.
pub struct AiFinder<'a> {
    graph: &'a PathingGraph,
    items: &'a ItemRegistry,
    planner: &'a PlannerConfig,
    heuristic: &'a HeuristicConfig,
}

impl<'a> AiFinder<'a> {
    #[must_use]
    pub fn new(
        graph: &'a PathingGraph,
        items: &'a ItemRegistry,
        planner: &'a PlannerConfig,
        heuristic: &'a HeuristicConfig,
    ) -> Self {
        Self {
            graph,
            items,
            planner,
            heuristic,
        }
    }

    /// Router whose shortcuts the search follows
    fn kind(&self) -> ArcType {
        if self.planner.allow_jump {
            ArcType::Jump
        } else {
            ArcType::Move
        }
    }

    /// Plan from `state.node` toward `goal`, collecting items on the way.
    ///
    /// Claims already recorded on `state` are ignored; the search starts from
    /// a clean claim list. Items claimed by the returned plan are written into
    /// `exclude` as the time at which they are available again. The plan is
    /// empty when the start already is the goal target, or when nothing
    /// reaches the goal within `threshold` seconds.
    pub fn find_path(
        &self,
        state: &NodeState,
        goal: ClusterId,
        exclude: &mut ExcludeActors,
        threshold: f32,
    ) -> NodePlan {
        let start = state.node;
        let mut plan = NodePlan::new(start);
        if !self.graph.contains(start) {
            log::warn!("Planning from unknown {}", start);
            return plan;
        }
        match self.goal_leg(start, goal) {
            Some((target, _)) if target == start => return plan,
            None => {
                log::debug!("No route from {} to cluster {}", start, goal);
                return plan;
            }
            Some(_) => {}
        }

        let mut root = state.clone();
        root.items.clear();
        root.heuristic = 0.0;

        let mut arena = vec![AiPlanNode {
            node: start,
            parent: None,
            shortcut: None,
            weight: 0.0,
            state: root,
        }];
        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            heuristic: 0.0,
            index: 0,
        });

        let kind = self.kind();
        let mut best: Option<(usize, f32)> = None;
        let mut expansions = 0;

        while let Some(entry) = open.pop() {
            let current = &arena[entry.index];
            let Some((_, leg)) = self.goal_leg(current.node, goal) else {
                continue;
            };
            if current.weight + leg > threshold {
                continue;
            }
            if best.is_none_or(|(_, heuristic)| entry.heuristic > heuristic) {
                best = Some((entry.index, entry.heuristic));
            }

            expansions += 1;
            if expansions > self.planner.max_expansions {
                log::debug!(
                    "Planner hit {} expansions from {}",
                    self.planner.max_expansions,
                    start
                );
                break;
            }

            let mut children = Vec::new();
            for shortcut in self.graph.find_node(current.node).actor_clusters(kind) {
                let Some(pickup) = shortcut.actor.and_then(|actor| self.items.get(actor)) else {
                    continue;
                };
                let arrival = current.weight + shortcut.weight;
                if arrival > threshold
                    || !can_item_be_grabbed(&current.state, pickup, exclude, arrival)
                {
                    continue;
                }
                let mut next = current.state.clone();
                next.node = shortcut.target;
                next.pickup_item(pickup, arrival);
                next.heuristic = item_utility(&next, self.heuristic);
                children.push(AiPlanNode {
                    node: shortcut.target,
                    parent: Some(entry.index),
                    shortcut: Some(*shortcut),
                    weight: arrival,
                    state: next,
                });
            }

            for child in children {
                open.push(OpenEntry {
                    heuristic: child.state.heuristic,
                    index: arena.len(),
                });
                arena.push(child);
            }
        }

        let Some((best, _)) = best else {
            log::debug!("No admissible plan from {} within {}s", start, threshold);
            return plan;
        };

        let mut hops = Vec::new();
        let mut cursor = Some(best);
        while let Some(index) = cursor {
            if let Some(shortcut) = arena[index].shortcut {
                hops.push(shortcut);
            }
            cursor = arena[index].parent;
        }
        hops.reverse();

        for hop in &hops {
            if !self.expand(&mut plan, hop.target, hop.actor) {
                return NodePlan::new(start);
            }
        }
        let Some((target, _)) = self.goal_leg(plan.destination(), goal) else {
            return NodePlan::new(start);
        };
        if !self.expand(&mut plan, target, None) {
            return NodePlan::new(start);
        }
        if plan.weight() > threshold + 1e-4 {
            log::debug!(
                "Rebuilt plan from {} weighs {}s over {}s",
                start,
                plan.weight(),
                threshold
            );
            return NodePlan::new(start);
        }

        for item in &arena[best].state.items {
            let respawn = self
                .items
                .get(item.actor)
                .map_or(0.0, |pickup| pickup.respawn_time);
            let available = item.time + respawn;
            exclude
                .entry(item.actor)
                .and_modify(|time| *time = time.max(available))
                .or_insert(available);
        }
        plan
    }

    /// Goal target reachable from `node` and the time to get there
    fn goal_leg(&self, node: NodeId, goal: ClusterId) -> Option<(NodeId, f32)> {
        match self.graph.find_cluster(node, self.kind(), goal) {
            Some(shortcut) => Some((shortcut.target, shortcut.weight)),
            None if self.graph.find_node(node).cluster == goal => Some((node, 0.0)),
            None => None,
        }
    }

    /// Append the concrete arcs from `plan`'s destination to `target`.
    ///
    /// Follows shortcut first hops node by node and falls back to a direct
    /// search where a hop is missing. Returns `false` when `target` cannot be
    /// reached.
    fn expand(&self, plan: &mut NodePlan, target: NodeId, actor: Option<ActorId>) -> bool {
        let kind = self.kind();
        let skip = (kind == ArcType::Move).then_some(ArcType::Jump);
        let mut current = plan.destination();
        let mut hops = 0;
        while current != target {
            hops += 1;
            if hops > self.graph.node_count() {
                log::warn!("Shortcut loop from {} to {}", current, target);
                return false;
            }
            match self.graph.find_node(current).cluster_to(kind, target, actor) {
                Some(shortcut) => {
                    let arc = *self.graph.find_arc(current, shortcut.arc);
                    plan.push(arc);
                    current = arc.target;
                }
                None => {
                    let Some(leg) = self.graph.find_plan(current, target, skip, f32::MAX) else {
                        return false;
                    };
                    plan.extend(&leg);
                    return true;
                }
            }
        }
        true
    }
}
