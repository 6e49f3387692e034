//! Tunable constants for graph building, clustering, planning and scoring
//!
//! Every section has defaults suited to an arena shooter measured in game
//! units (a standing agent is about 56 units tall, walks at 320 units/s).
//! Configurations round-trip through RON and JSON files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::ItemCategory;

/// Errors that can occur while reading or writing a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

/// Physics replay parameters for [`GraphBuilder`](crate::build::GraphBuilder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Fixed simulation timestep in seconds
    pub time_step: f32,
    /// Number of discretized headings per node
    pub headings: u32,
    /// Walking speed in units per second
    pub move_speed: f32,
    /// Horizontal air speed during jumps and falls
    pub air_speed: f32,
    /// Snap radius of new nodes
    pub node_tolerance: f32,
    /// Displacement between recorded waypoints
    pub sample_distance: f32,
    /// Minimum progress over `stall_window` before a walk counts as stalled
    pub stall_distance: f32,
    /// Rolling window for the stall test in seconds
    pub stall_window: f32,
    /// Walk distance after which an arc is cut
    pub step_distance: f32,
    /// Upper bound on any single fall or jump replay in seconds
    pub max_fall_time: f32,
    /// Horizontal displacement a jump needs to count
    pub min_jump_distance: f32,
    /// Height gain a jump needs to count when it travels less than `min_jump_distance`
    pub min_jump_height: f32,
    /// Maximum distance between mutually visible nodes
    pub visibility_range: f32,
    /// Eye height above the node position used by visibility rays
    pub eye_height: f32,
    /// Hard cap on created nodes
    pub max_nodes: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 30.0,
            headings: 72,
            move_speed: 320.0,
            air_speed: 320.0,
            node_tolerance: 24.0,
            sample_distance: 16.0,
            stall_distance: 4.0,
            stall_window: 0.5,
            step_distance: 96.0,
            max_fall_time: 10.0,
            min_jump_distance: 48.0,
            min_jump_height: 24.0,
            visibility_range: 2048.0,
            eye_height: 20.0,
            max_nodes: 20_000,
        }
    }
}

/// k-means and shortcut parameters for [`Clusterer`](crate::build::Clusterer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Requested number of clusters, clamped to the node count
    pub clusters: usize,
    /// Iteration cap for k-means
    pub iterations: usize,
    /// Seed for picking initial centres
    pub seed: u64,
    /// Longest route, in seconds, recorded as a cluster shortcut
    pub cluster_search_limit: f32,
    /// Longest route, in seconds, recorded as a cluster-actor shortcut
    pub actor_search_limit: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusters: 200,
            iterations: 50,
            seed: 0x5eed,
            cluster_search_limit: 60.0,
            actor_search_limit: 4.0,
        }
    }
}

/// Search parameters for [`AiFinder`](crate::ai::AiFinder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Use shortcuts that may contain jump arcs
    pub allow_jump: bool,
    /// Expansion cap per search
    pub max_expansions: usize,
    /// Default cumulative weight threshold for callers that have none
    pub threshold: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            allow_jump: true,
            max_expansions: 10_000,
            threshold: 8.0,
        }
    }
}

/// Scoring profile of one item category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    /// Amount that saturates the utility
    pub max_amount: f32,
    /// Time cost at which an item stops being worth anything
    pub max_time: f32,
    /// Category weight before the comfort adjustment
    pub weight: f32,
    /// Reserve above which the weight is halved
    pub comfort: f32,
}

/// Weights for item utility and the zero-sum evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub health: CategoryProfile,
    pub armor: CategoryProfile,
    pub weapon: CategoryProfile,
    pub ammo: CategoryProfile,
    /// Weight of the item utility difference in the zero-sum score
    pub item_weight: f32,
    /// Weight per point of health/armor difference in the zero-sum score
    pub combat_weight: f32,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            health: CategoryProfile {
                max_amount: 100.0,
                max_time: 8.0,
                weight: 1.0,
                comfort: 100.0,
            },
            armor: CategoryProfile {
                max_amount: 100.0,
                max_time: 8.0,
                weight: 0.8,
                comfort: 100.0,
            },
            weapon: CategoryProfile {
                max_amount: 1.0,
                max_time: 10.0,
                weight: 1.2,
                comfort: 3.0,
            },
            ammo: CategoryProfile {
                max_amount: 50.0,
                max_time: 6.0,
                weight: 0.5,
                comfort: 100.0,
            },
            item_weight: 1.0,
            combat_weight: 0.01,
        }
    }
}

impl HeuristicConfig {
    /// Profile of `category`
    #[must_use]
    pub fn profile(&self, category: ItemCategory) -> &CategoryProfile {
        match category {
            ItemCategory::Health => &self.health,
            ItemCategory::Armor => &self.armor,
            ItemCategory::Weapon => &self.weapon,
            ItemCategory::Ammo => &self.ammo,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathingConfig {
    pub builder: BuilderConfig,
    pub cluster: ClusterConfig,
    pub planner: PlannerConfig,
    pub heuristic: HeuristicConfig,
}

impl PathingConfig {
    /// Save the configuration to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        ron::from_str(&content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Load a configuration, picking the format from the file extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::load_json(path),
            _ => Self::load_ron(path),
        }
    }
}
