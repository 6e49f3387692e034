//! Concrete arc sequences

use std::sync::atomic::{AtomicU32, Ordering};

use super::node::{NodeId, PathingArc};

/// Global counter for plan identities
static NEXT_PLAN_ID: AtomicU32 = AtomicU32::new(1);

fn next_id() -> u32 {
    NEXT_PLAN_ID.fetch_add(1, Ordering::Relaxed)
}

/// An ordered arc sequence anchored at a node.
///
/// `weight` always equals the sum of the arc weights; the mutators keep it in
/// step.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePlan {
    id: u32,
    node: NodeId,
    arcs: Vec<PathingArc>,
    weight: f32,
}

impl NodePlan {
    /// Create an empty plan anchored at `node`
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            id: next_id(),
            node,
            arcs: Vec::new(),
            weight: 0.0,
        }
    }

    /// Create a plan from an arc sequence
    #[must_use]
    pub fn from_arcs(node: NodeId, arcs: Vec<PathingArc>) -> Self {
        let weight = arcs.iter().map(|arc| arc.weight).sum();
        Self {
            id: next_id(),
            node,
            arcs,
            weight,
        }
    }

    /// Plan identity
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Node the plan starts from
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Arcs in traversal order
    #[must_use]
    pub fn arcs(&self) -> &[PathingArc] {
        &self.arcs
    }

    /// Cumulative arc weight
    #[must_use]
    pub const fn weight(&self) -> f32 {
        self.weight
    }

    /// Whether the plan has no arcs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Number of arcs
    #[must_use]
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Final node of the plan
    #[must_use]
    pub fn destination(&self) -> NodeId {
        self.arcs.last().map_or(self.node, |arc| arc.target)
    }

    /// Append an arc
    pub fn push(&mut self, arc: PathingArc) {
        self.weight += arc.weight;
        self.arcs.push(arc);
    }

    /// Append every arc of `other`
    pub fn extend(&mut self, other: &NodePlan) {
        for arc in &other.arcs {
            self.push(*arc);
        }
    }

    /// Consume the head arc, moving the anchor to its target
    pub fn advance(&mut self) -> Option<PathingArc> {
        if self.arcs.is_empty() {
            return None;
        }
        let arc = self.arcs.remove(0);
        self.node = arc.target;
        self.weight = self.arcs.iter().map(|arc| arc.weight).sum();
        Some(arc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ArcId, ArcType};

    fn arc(id: u32, target: u32, weight: f32) -> PathingArc {
        PathingArc {
            id: ArcId(id),
            kind: ArcType::Move,
            target: NodeId(target),
            weight,
        }
    }

    #[test]
    fn test_plan_weight_tracks_arcs() {
        let mut plan = NodePlan::new(NodeId(1));
        plan.push(arc(1, 2, 2.0));
        plan.push(arc(2, 3, 3.0));
        assert_eq!(plan.weight(), 5.0);
        assert_eq!(plan.destination(), NodeId(3));

        let head = plan.advance().unwrap();
        assert_eq!(head.target, NodeId(2));
        assert_eq!(plan.node(), NodeId(2));
        assert_eq!(plan.weight(), 3.0);
    }

    #[test]
    fn test_plan_ids_are_unique() {
        let a = NodePlan::new(NodeId(1));
        let b = NodePlan::new(NodeId(1));
        assert_ne!(a.id(), b.id());
    }
}
