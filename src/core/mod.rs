//! Core module
//!
//! Configuration and the occupancy event queue

mod config;
mod events;

pub use config::{
    BuilderConfig, CategoryProfile, ClusterConfig, ConfigError, HeuristicConfig, PathingConfig,
    PlannerConfig,
};
pub use events::{EventQueue, OccupancyEvent};
