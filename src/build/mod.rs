//! Offline graph construction
//!
//! Levels, the simulation-driven [`GraphBuilder`] and the k-means
//! [`Clusterer`] that precomputes shortcuts on the finished graph.

mod builder;
mod cluster;
mod level;

pub use builder::GraphBuilder;
pub use cluster::{ClusterStats, Clusterer};
pub use level::{ActorKind, Level, LevelActor, LevelBox};
