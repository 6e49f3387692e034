//! AI planning module
//!
//! Agent resource snapshots, item and damage evaluators, the utility-greedy
//! item planner, the opponent belief model and the shared manager that ties
//! them to a runtime graph.

mod finder;
mod heuristic;
mod items;
mod manager;
mod opponent;
mod state;

pub use finder::AiFinder;
pub use heuristic::{
    Engagement, can_item_be_grabbed, damage_potential, item_utility, zero_sum_score,
};
pub use items::{
    ExcludeActors, Falloff, ItemCategory, ItemRegistry, MAX_AMMO, MAX_ARMOR, MAX_HEALTH, Pickup,
    SOFT_MAX_HEALTH, WEAPON_COUNT, WeaponKind, WeaponSpec,
};
pub use manager::{AiManager, ManagerError};
pub use opponent::{Guess, GuessUpdate, OpponentModel, WorldProbe};
pub use state::{ClaimedItem, NodeState};
