//! Pickups, weapons and the item registry

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::graph::ActorId;

/// Hard health cap reachable only through mega pickups
pub const MAX_HEALTH: i32 = 200;
/// Health cap for ordinary pickups
pub const SOFT_MAX_HEALTH: i32 = 100;
/// Armor cap
pub const MAX_ARMOR: i32 = 200;
/// Ammo cap per weapon
pub const MAX_AMMO: i32 = 200;
/// Number of weapon kinds
pub const WEAPON_COUNT: usize = 8;

/// Item category of a pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Ammo,
    Weapon,
    Health,
    Armor,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 4] = [
        ItemCategory::Ammo,
        ItemCategory::Weapon,
        ItemCategory::Health,
        ItemCategory::Armor,
    ];
}

/// How a weapon's damage decays with the engagement geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Falloff {
    /// Full damage at any range
    None,
    /// Linear decay reaching zero at `range`
    Linear { range: f32 },
    /// Full damage inside `range`, nothing beyond
    Cutoff { range: f32 },
    /// Splash weapons: `above` when the shooter is more than `band` units
    /// higher than the target, `level` otherwise
    HeightBand { band: f32, above: f32, level: f32 },
}

impl Falloff {
    /// Damage multiplier at `distance` with the shooter `height` units above the target
    #[must_use]
    pub fn factor(self, distance: f32, height: f32) -> f32 {
        match self {
            Falloff::None => 1.0,
            Falloff::Linear { range } => (1.0 - distance / range).clamp(0.0, 1.0),
            Falloff::Cutoff { range } => {
                if distance <= range {
                    1.0
                } else {
                    0.0
                }
            }
            Falloff::HeightBand { band, above, level } => {
                if height > band {
                    above
                } else {
                    level
                }
            }
        }
    }
}

/// Static weapon characteristics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    /// Seconds between shots
    pub fire_interval: f32,
    /// Damage of one landed shot
    pub damage: f32,
    pub falloff: Falloff,
    /// Whether the weapon fires without ammo
    pub infinite: bool,
}

/// Weapon kinds, indexed by pickup code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Gauntlet,
    MachineGun,
    Shotgun,
    GrenadeLauncher,
    RocketLauncher,
    LightningGun,
    Railgun,
    PlasmaGun,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; WEAPON_COUNT] = [
        WeaponKind::Gauntlet,
        WeaponKind::MachineGun,
        WeaponKind::Shotgun,
        WeaponKind::GrenadeLauncher,
        WeaponKind::RocketLauncher,
        WeaponKind::LightningGun,
        WeaponKind::Railgun,
        WeaponKind::PlasmaGun,
    ];

    /// Slot index in ammo/ownership arrays
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Weapon with pickup code `code`
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Static characteristics
    #[must_use]
    pub fn spec(self) -> WeaponSpec {
        let (fire_interval, damage, falloff, infinite) = match self {
            WeaponKind::Gauntlet => (0.4, 50.0, Falloff::Cutoff { range: 64.0 }, true),
            WeaponKind::MachineGun => (0.1, 7.0, Falloff::Linear { range: 2048.0 }, false),
            WeaponKind::Shotgun => (1.0, 110.0, Falloff::Linear { range: 768.0 }, false),
            WeaponKind::GrenadeLauncher => (
                0.8,
                100.0,
                Falloff::HeightBand {
                    band: 64.0,
                    above: 0.8,
                    level: 0.4,
                },
                false,
            ),
            WeaponKind::RocketLauncher => (
                0.8,
                100.0,
                Falloff::HeightBand {
                    band: 32.0,
                    above: 1.0,
                    level: 0.6,
                },
                false,
            ),
            WeaponKind::LightningGun => (0.05, 8.0, Falloff::Cutoff { range: 768.0 }, false),
            WeaponKind::Railgun => (1.5, 100.0, Falloff::None, false),
            WeaponKind::PlasmaGun => (0.1, 20.0, Falloff::Linear { range: 2048.0 }, false),
        };
        WeaponSpec {
            fire_interval,
            damage,
            falloff,
            infinite,
        }
    }
}

/// A pickup as exposed by the level's pickup component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub actor: ActorId,
    pub category: ItemCategory,
    /// Weapon code for ammo and weapon pickups
    pub code: u32,
    /// Health, armor or ammo granted
    pub amount: i32,
    /// Ammo granted by a weapon pickup
    pub ammo: i32,
    /// Seconds until the pickup reappears once taken
    pub respawn_time: f32,
}

impl Pickup {
    /// Weapon this pickup feeds, for ammo and weapon pickups
    #[must_use]
    pub fn weapon(&self) -> Option<WeaponKind> {
        match self.category {
            ItemCategory::Ammo | ItemCategory::Weapon => WeaponKind::from_code(self.code),
            ItemCategory::Health | ItemCategory::Armor => None,
        }
    }

    /// Health pickups large enough to push past the soft cap
    #[must_use]
    pub fn is_mega(&self) -> bool {
        self.category == ItemCategory::Health && self.amount >= SOFT_MAX_HEALTH
    }
}

/// Seconds until each contested item is available again
pub type ExcludeActors = FxHashMap<ActorId, f32>;

/// Read-only lookup of the level's pickups
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    items: FxHashMap<ActorId, Pickup>,
}

impl ItemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pickup, replacing any previous entry for the same actor
    pub fn insert(&mut self, pickup: Pickup) {
        self.items.insert(pickup.actor, pickup);
    }

    #[must_use]
    pub fn get(&self, actor: ActorId) -> Option<&Pickup> {
        self.items.get(&actor)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pickup> {
        self.items.values()
    }
}

impl FromIterator<Pickup> for ItemRegistry {
    fn from_iter<T: IntoIterator<Item = Pickup>>(iter: T) -> Self {
        let mut registry = Self::new();
        for pickup in iter {
            registry.insert(pickup);
        }
        registry
    }
}
