//! Pathing graph module
//!
//! Nodes, arcs, cluster shortcuts and transitions stored in one arena, plus
//! the binary persistence format.

mod graph;
mod node;
mod persist;
mod plan;

pub use graph::PathingGraph;
pub use node::{
    ActorId, ArcId, ArcType, ClusterId, NodeId, PathingArc, PathingCluster, PathingNode,
    PathingTransition,
};
pub use persist::GraphError;
pub use plan::NodePlan;
