//! Level description consumed by the graph builder
//!
//! A level lists static boxes, spawn points and actors (pickups, jump pads and
//! teleporters). Positions are floor points; the builder lifts them to the
//! agent's standing height. Levels are stored as RON or JSON.

use std::fs;
use std::path::Path;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::ai::{ItemCategory, ItemRegistry, Pickup};
use crate::core::ConfigError;
use crate::graph::ActorId;
use crate::physics::RapierSimulator;

/// A static solid box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

/// What a level actor does to an agent touching it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActorKind {
    /// Item pickup
    Pickup {
        category: ItemCategory,
        #[serde(default)]
        code: u32,
        amount: i32,
        #[serde(default)]
        ammo: i32,
        respawn_time: f32,
    },
    /// Jump pad launching the agent with `velocity`
    Push { velocity: Vec3 },
    /// Teleporter moving the agent to the floor point `destination`
    Teleport { destination: Vec3 },
}

/// A placed actor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelActor {
    pub id: ActorId,
    pub position: Vec3,
    pub kind: ActorKind,
}

impl LevelActor {
    /// Pickup view of this actor, if it is one
    #[must_use]
    pub fn pickup(&self) -> Option<Pickup> {
        match self.kind {
            ActorKind::Pickup {
                category,
                code,
                amount,
                ammo,
                respawn_time,
            } => Some(Pickup {
                actor: self.id,
                category,
                code,
                amount,
                ammo,
                respawn_time,
            }),
            ActorKind::Push { .. } | ActorKind::Teleport { .. } => None,
        }
    }

    /// Whether touching this actor moves the agent
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        !matches!(self.kind, ActorKind::Pickup { .. })
    }
}

/// A complete level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Level name
    pub name: String,
    #[serde(default)]
    pub boxes: Vec<LevelBox>,
    #[serde(default)]
    pub spawns: Vec<Vec3>,
    #[serde(default)]
    pub actors: Vec<LevelActor>,
}

impl Level {
    /// Create a new empty level
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Every pickup in the level
    #[must_use]
    pub fn items(&self) -> ItemRegistry {
        self.actors.iter().filter_map(LevelActor::pickup).collect()
    }

    /// Actor with `id`
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&LevelActor> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    /// Add every box to `sim` as static geometry
    pub fn populate(&self, sim: &mut RapierSimulator) {
        for level_box in &self.boxes {
            sim.add_static_box(level_box.center, level_box.half_extents, level_box.rotation);
        }
    }

    /// Save the level to a RON file
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

    /// Load a level from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        ron::from_str(&content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }

    /// Load a level from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Deserialize(e.to_string()))
    }
}
