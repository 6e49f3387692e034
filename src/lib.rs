//! Pathing graphs and planning for arena bots
//!
//! This crate provides:
//! - Graph building by replaying agent motion through a physics simulator
//! - k-means clustering with precomputed shortcuts
//! - A utility-greedy item planner and an opponent belief model
//! - Binary graph persistence

pub mod ai;
pub mod build;
pub mod core;
pub mod graph;
pub mod physics;

// Re-exports for convenience
pub use glam;
pub use rapier3d;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{AiFinder, AiManager, ExcludeActors, ItemRegistry, NodeState};
    pub use crate::build::{ClusterStats, Clusterer, GraphBuilder, Level};
    pub use crate::core::{EventQueue, OccupancyEvent, PathingConfig};
    pub use crate::graph::{ActorId, ArcType, ClusterId, NodeId, NodePlan, PathingGraph};
    pub use crate::physics::{RapierSimulator, Simulator};
    pub use glam::{Quat, Vec3};
}
