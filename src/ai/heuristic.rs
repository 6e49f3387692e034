//! Item utility and damage evaluators
//!
//! All functions are pure: they score snapshots and never touch the graph.

use crate::core::HeuristicConfig;

use super::items::{ExcludeActors, ItemCategory, Pickup, WeaponKind};
use super::state::NodeState;

/// Sight line between two agents, seen from the first one
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Engagement {
    /// Seconds the agents are expected to see each other
    pub visible_time: f32,
    /// Distance between them
    pub distance: f32,
    /// Height of the first agent above the second
    pub height: f32,
}

impl Engagement {
    /// The same engagement seen from the other agent
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            height: -self.height,
            ..self
        }
    }
}

/// Utility of every item claimed by `state`.
///
/// Each claim contributes `min(gained / max, 1) * max(1 - time / max_time, 0)
/// * weight`. The weight is halved when the reserve the agent held before its
/// claims already exceeds the category's comfort level. Weapon claims also
/// score the ammo they came with.
#[must_use]
pub fn item_utility(state: &NodeState, config: &HeuristicConfig) -> f32 {
    state
        .items
        .iter()
        .map(|item| {
            let mut utility = claim_utility(
                state,
                config,
                (item.category, item.weapon),
                item.amount,
                item.time,
            );
            if item.category == ItemCategory::Weapon && item.ammo > 0 {
                utility += claim_utility(
                    state,
                    config,
                    (ItemCategory::Ammo, item.weapon),
                    item.ammo,
                    item.time,
                );
            }
            utility
        })
        .sum()
}

fn claim_utility(
    state: &NodeState,
    config: &HeuristicConfig,
    (category, weapon): (ItemCategory, Option<WeaponKind>),
    amount: i32,
    time: f32,
) -> f32 {
    let profile = config.profile(category);
    let amount = (amount.max(0) as f32 / profile.max_amount).min(1.0);
    let freshness = (1.0 - time / profile.max_time).max(0.0);
    let weight = if state.reserve(category, weapon) as f32 > profile.comfort {
        profile.weight * 0.5
    } else {
        profile.weight
    };
    amount * freshness * weight
}

/// Whether `state` may claim `pickup` when arriving after `arrival` seconds.
///
/// Full resources reject the item whatever the timers say. An item in
/// `exclude` is grabbable only if it is available again by `arrival`.
#[must_use]
pub fn can_item_be_grabbed(
    state: &NodeState,
    pickup: &Pickup,
    exclude: &ExcludeActors,
    arrival: f32,
) -> bool {
    if state.has_item(pickup.actor) || state.is_full_for(pickup) {
        return false;
    }
    exclude
        .get(&pickup.actor)
        .is_none_or(|available| *available <= arrival)
}

/// Best weapon of `state` for `engagement` and the damage it lands.
///
/// Per owned weapon `shots = min(ammo, round(visible_time / fire_interval))`;
/// the first weapon wins ties.
#[must_use]
pub fn damage_potential(state: &NodeState, engagement: Engagement) -> (WeaponKind, f32) {
    let mut best = (state.weapon, 0.0);
    for weapon in WeaponKind::ALL {
        if !state.owns(weapon) {
            continue;
        }
        let spec = weapon.spec();
        let fired = (engagement.visible_time / spec.fire_interval).round();
        let shots = if spec.infinite {
            fired
        } else {
            fired.min(state.ammo_of(weapon).max(0) as f32)
        };
        let damage =
            shots * spec.damage * spec.falloff.factor(engagement.distance, engagement.height);
        if damage > best.1 {
            best = (weapon, damage);
        }
    }
    best
}

/// Static zero-sum evaluation of `a` against `b`, historically called the
/// minimax score.
///
/// Combines the item utility difference with each side's health and armor
/// left after taking the other's damage potential. Writes the score into
/// `a.heuristic` and its negation into `b.heuristic`, selects each side's
/// weapon and points them at each other.
pub fn zero_sum_score(
    a: &mut NodeState,
    b: &mut NodeState,
    engagement: Engagement,
    config: &HeuristicConfig,
) -> f32 {
    let items = item_utility(a, config) - item_utility(b, config);

    let (weapon_a, damage_a) = damage_potential(a, engagement);
    let (weapon_b, damage_b) = damage_potential(b, engagement.reversed());
    let survive_a = (a.health + a.armor) as f32 - damage_b;
    let survive_b = (b.health + b.armor) as f32 - damage_a;

    let score = config.item_weight * items + config.combat_weight * (survive_a - survive_b);

    a.heuristic = score;
    b.heuristic = -score;
    a.weapon = weapon_a;
    b.weapon = weapon_b;
    a.target = b.player;
    b.target = a.player;
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::items::{MAX_ARMOR, SOFT_MAX_HEALTH};
    use crate::graph::{ActorId, NodeId};

    fn health(amount: i32) -> Pickup {
        Pickup {
            actor: ActorId(3),
            category: ItemCategory::Health,
            code: 0,
            amount,
            ammo: 0,
            respawn_time: 35.0,
        }
    }

    fn claimed(amount: i32, time: f32) -> f32 {
        let mut state = NodeState::new(NodeId(1));
        state.health = 10;
        state.pickup_item(&health(amount), time);
        item_utility(&state, &HeuristicConfig::default())
    }

    #[test]
    fn test_utility_monotonic_in_amount() {
        let mut previous = 0.0;
        for amount in [0, 5, 25, 50, 90] {
            let utility = claimed(amount, 2.0);
            assert!(utility >= previous, "{amount}: {utility} < {previous}");
            previous = utility;
        }
    }

    #[test]
    fn test_utility_decays_with_time() {
        let mut previous = f32::MAX;
        for time in [0.0, 1.0, 4.0, 7.9, 8.0, 20.0] {
            let utility = claimed(25, time);
            assert!(utility <= previous, "{time}: {utility} > {previous}");
            previous = utility;
        }
        assert_eq!(claimed(25, 20.0), 0.0);
    }

    #[test]
    fn test_comfortable_reserve_halves_weight() {
        let config = HeuristicConfig::default();
        let armor = Pickup {
            category: ItemCategory::Armor,
            amount: 50,
            ..health(0)
        };

        let mut poor = NodeState::new(NodeId(1));
        poor.pickup_item(&armor, 0.0);
        let mut rich = NodeState::new(NodeId(1));
        rich.armor = 120;
        rich.pickup_item(&armor, 0.0);

        let ratio = item_utility(&rich, &config) / item_utility(&poor, &config);
        assert!((ratio - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_grab_rejected_at_capacity_whatever_the_timer() {
        let mut state = NodeState::new(NodeId(1));
        state.health = SOFT_MAX_HEALTH;
        state.armor = MAX_ARMOR;
        let mut exclude = ExcludeActors::default();
        let armor = Pickup {
            category: ItemCategory::Armor,
            ..health(50)
        };

        assert!(!can_item_be_grabbed(&state, &health(25), &exclude, 0.0));
        assert!(!can_item_be_grabbed(&state, &armor, &exclude, 0.0));
        exclude.insert(ActorId(3), -1.0);
        assert!(!can_item_be_grabbed(&state, &armor, &exclude, 100.0));
    }

    #[test]
    fn test_grab_waits_for_respawn() {
        let mut state = NodeState::new(NodeId(1));
        state.health = 50;
        let mut exclude = ExcludeActors::default();
        exclude.insert(ActorId(3), 5.0);

        assert!(!can_item_be_grabbed(&state, &health(25), &exclude, 4.0));
        assert!(can_item_be_grabbed(&state, &health(25), &exclude, 5.0));

        state.pickup_item(&health(25), 5.0);
        assert!(!can_item_be_grabbed(&state, &health(25), &ExcludeActors::default(), 9.0));
    }

    #[test]
    fn test_damage_prefers_railgun_at_range() {
        let mut state = NodeState::new(NodeId(1));
        state.weapons[WeaponKind::Railgun.index()] = true;
        state.ammo[WeaponKind::Railgun.index()] = 5;
        let far = Engagement {
            visible_time: 3.0,
            distance: 3000.0,
            height: 0.0,
        };
        let (weapon, damage) = damage_potential(&state, far);
        assert_eq!(weapon, WeaponKind::Railgun);
        assert_eq!(damage, 200.0);

        // Ammo bounds the landed shots
        state.ammo[WeaponKind::Railgun.index()] = 1;
        assert_eq!(damage_potential(&state, far).1, 100.0);
    }

    #[test]
    fn test_gauntlet_fires_without_ammo() {
        let mut state = NodeState::new(NodeId(1));
        state.weapons[WeaponKind::MachineGun.index()] = false;
        let close = Engagement {
            visible_time: 0.8,
            distance: 32.0,
            height: 0.0,
        };
        assert_eq!(damage_potential(&state, close), (WeaponKind::Gauntlet, 100.0));
    }

    #[test]
    fn test_zero_sum_assigns_opposite_scores() {
        let config = HeuristicConfig::default();
        let mut a = NodeState::new(NodeId(1)).with_player(ActorId(1));
        let mut b = NodeState::new(NodeId(2)).with_player(ActorId(2));
        a.armor = 50;
        let engagement = Engagement {
            visible_time: 1.0,
            distance: 512.0,
            height: 0.0,
        };

        let score = zero_sum_score(&mut a, &mut b, engagement, &config);
        assert!(score > 0.0);
        assert_eq!(a.heuristic, score);
        assert_eq!(b.heuristic, -score);
        assert_eq!(a.target, Some(ActorId(2)));
        assert_eq!(b.target, Some(ActorId(1)));
    }
}
