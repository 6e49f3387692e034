//! Per-agent resource snapshot

use crate::graph::{ActorId, NodeId};

use super::items::{
    ItemCategory, MAX_AMMO, MAX_ARMOR, MAX_HEALTH, Pickup, SOFT_MAX_HEALTH, WEAPON_COUNT,
    WeaponKind,
};

/// An item claimed along a (possibly hypothetical) plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimedItem {
    pub actor: ActorId,
    pub category: ItemCategory,
    pub weapon: Option<WeaponKind>,
    /// Amount actually gained after capping (1 for a newly owned weapon)
    pub amount: i32,
    /// Ammo gained alongside a weapon pickup
    pub ammo: i32,
    /// Seconds from the plan start until the item is reached
    pub time: f32,
}

impl ClaimedItem {
    /// Contribution of this claim to the `category` resource (ammo per weapon)
    #[must_use]
    pub fn gained(&self, category: ItemCategory, weapon: Option<WeaponKind>) -> i32 {
        match category {
            ItemCategory::Ammo if weapon.is_some() && self.weapon == weapon => {
                if self.category == ItemCategory::Ammo {
                    self.amount
                } else {
                    self.ammo
                }
            }
            ItemCategory::Ammo => 0,
            _ if self.category == category => self.amount,
            _ => 0,
        }
    }
}

/// An agent's stats, inventory, claimed items and heuristic score.
///
/// Snapshots are cheap to clone; the planner clones one per hypothetical
/// pickup.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    /// Agent this snapshot describes
    pub player: Option<ActorId>,
    /// Node the agent stands on
    pub node: NodeId,
    pub health: i32,
    pub armor: i32,
    pub weapons: [bool; WEAPON_COUNT],
    pub ammo: [i32; WEAPON_COUNT],
    /// Selected weapon
    pub weapon: WeaponKind,
    /// Selected target
    pub target: Option<ActorId>,
    /// Items claimed in claim order
    pub items: Vec<ClaimedItem>,
    pub heuristic: f32,
}

impl NodeState {
    /// Fresh spawn loadout at `node`: full health, gauntlet and machine gun
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        let mut weapons = [false; WEAPON_COUNT];
        let mut ammo = [0; WEAPON_COUNT];
        weapons[WeaponKind::Gauntlet.index()] = true;
        weapons[WeaponKind::MachineGun.index()] = true;
        ammo[WeaponKind::MachineGun.index()] = 100;
        Self {
            player: None,
            node,
            health: SOFT_MAX_HEALTH,
            armor: 0,
            weapons,
            ammo,
            weapon: WeaponKind::MachineGun,
            target: None,
            items: Vec::new(),
            heuristic: 0.0,
        }
    }

    /// Same snapshot tagged with the agent it describes
    #[must_use]
    pub fn with_player(mut self, player: ActorId) -> Self {
        self.player = Some(player);
        self
    }

    /// Whether `weapon` is owned
    #[must_use]
    pub fn owns(&self, weapon: WeaponKind) -> bool {
        self.weapons[weapon.index()]
    }

    /// Ammo of `weapon`
    #[must_use]
    pub fn ammo_of(&self, weapon: WeaponKind) -> i32 {
        self.ammo[weapon.index()]
    }

    /// Whether `actor` was already claimed
    #[must_use]
    pub fn has_item(&self, actor: ActorId) -> bool {
        self.items.iter().any(|item| item.actor == actor)
    }

    /// Number of owned weapons
    #[must_use]
    pub fn weapon_count(&self) -> usize {
        self.weapons.iter().filter(|owned| **owned).count()
    }

    /// Whether the resource `pickup` feeds is already full
    #[must_use]
    pub fn is_full_for(&self, pickup: &Pickup) -> bool {
        match pickup.category {
            ItemCategory::Health => {
                let cap = if pickup.is_mega() {
                    MAX_HEALTH
                } else {
                    SOFT_MAX_HEALTH
                };
                self.health >= cap
            }
            ItemCategory::Armor => self.armor >= MAX_ARMOR,
            ItemCategory::Ammo => pickup
                .weapon()
                .is_none_or(|weapon| self.ammo_of(weapon) >= MAX_AMMO),
            ItemCategory::Weapon => pickup
                .weapon()
                .is_none_or(|weapon| self.owns(weapon) && self.ammo_of(weapon) >= MAX_AMMO),
        }
    }

    /// Reserve of the resource `category` held before any claimed item.
    ///
    /// For weapons this is the number of owned weapons; for ammo, the ammo of
    /// `weapon`.
    #[must_use]
    pub fn reserve(&self, category: ItemCategory, weapon: Option<WeaponKind>) -> i32 {
        let gained: i32 = self
            .items
            .iter()
            .map(|item| item.gained(category, weapon))
            .sum();
        let current = match (category, weapon) {
            (ItemCategory::Health, _) => self.health,
            (ItemCategory::Armor, _) => self.armor,
            (ItemCategory::Weapon, _) => self.weapon_count() as i32,
            (ItemCategory::Ammo, Some(weapon)) => self.ammo_of(weapon),
            (ItemCategory::Ammo, None) => return 0,
        };
        current - gained
    }

    /// Apply `pickup` reached after `time` seconds and record the claim.
    ///
    /// Gains are capped; the recorded amount is what was actually gained.
    pub fn pickup_item(&mut self, pickup: &Pickup, time: f32) -> ClaimedItem {
        let weapon = pickup.weapon();
        let mut ammo = 0;
        let amount = match pickup.category {
            ItemCategory::Health => {
                let cap = if pickup.is_mega() {
                    MAX_HEALTH
                } else {
                    SOFT_MAX_HEALTH
                };
                let gained = pickup.amount.min(cap - self.health).max(0);
                self.health += gained;
                gained
            }
            ItemCategory::Armor => {
                let gained = pickup.amount.min(MAX_ARMOR - self.armor).max(0);
                self.armor += gained;
                gained
            }
            ItemCategory::Ammo => match weapon {
                Some(weapon) => {
                    let slot = weapon.index();
                    let gained = pickup.amount.min(MAX_AMMO - self.ammo[slot]).max(0);
                    self.ammo[slot] += gained;
                    gained
                }
                None => 0,
            },
            ItemCategory::Weapon => match weapon {
                Some(weapon) => {
                    let slot = weapon.index();
                    let newly = !self.weapons[slot];
                    self.weapons[slot] = true;
                    ammo = pickup.ammo.min(MAX_AMMO - self.ammo[slot]).max(0);
                    self.ammo[slot] += ammo;
                    i32::from(newly)
                }
                None => 0,
            },
        };

        let item = ClaimedItem {
            actor: pickup.actor,
            category: pickup.category,
            weapon,
            amount,
            ammo,
            time,
        };
        self.items.push(item);
        item
    }
}
