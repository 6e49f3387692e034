//! Belief about unseen opponents
//!
//! While an opponent is out of sight the observer keeps playing its last known
//! plan forward in time, crediting the items it would pick up on the way.
//! Seeing the opponent again, or finding the world disagree with the guess,
//! snaps the belief back to ground truth.

use glam::Vec3;

use crate::graph::{ActorId, NodeId, NodePlan, PathingArc, PathingGraph};
use crate::physics::RayHit;

use super::items::{ExcludeActors, ItemRegistry};
use super::state::NodeState;

/// World queries the opponent model needs
pub trait WorldProbe {
    /// First hit between two points, `None` when the segment is clear
    fn cast_ray(&self, from: Vec3, to: Vec3) -> Option<RayHit>;

    /// Whether the pickup `actor` is currently available
    fn is_item_present(&self, actor: ActorId) -> bool;
}

/// Believed state and plan of one opponent
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub state: NodeState,
    pub plan: NodePlan,
    /// Items believed taken and the seconds until each respawns
    pub items: ExcludeActors,
    /// Time spent on the plan's head arc
    pub elapsed: f32,
    /// Time since the opponent was last seen
    pub unseen: f32,
}

impl Guess {
    /// A guess that matches ground truth
    #[must_use]
    pub fn from_truth(state: &NodeState, plan: &NodePlan) -> Self {
        Self {
            state: state.clone(),
            plan: plan.clone(),
            items: ExcludeActors::default(),
            elapsed: 0.0,
            unseen: 0.0,
        }
    }

    /// Snap back to ground truth, keeping known respawn timers
    pub fn reset(&mut self, state: &NodeState, plan: &NodePlan) {
        self.state = state.clone();
        self.plan = plan.clone();
        self.elapsed = 0.0;
        self.unseen = 0.0;
    }
}

/// What an update did to the guess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessUpdate {
    /// The guess was replaced by ground truth
    Reset,
    /// The guess consumed this many arcs
    Advanced(usize),
}

/// Advances guesses over a read-only graph
pub struct OpponentModel<'a> {
    graph: &'a PathingGraph,
    items: &'a ItemRegistry,
    eye_height: f32,
}

impl<'a> OpponentModel<'a> {
    /// Eye height used for sanity rays unless configured otherwise
    pub const DEFAULT_EYE_HEIGHT: f32 = 20.0;

    #[must_use]
    pub fn new(graph: &'a PathingGraph, items: &'a ItemRegistry) -> Self {
        Self {
            graph,
            items,
            eye_height: Self::DEFAULT_EYE_HEIGHT,
        }
    }

    #[must_use]
    pub fn with_eye_height(mut self, eye_height: f32) -> Self {
        self.eye_height = eye_height;
        self
    }

    /// Move `guess` forward by `dt` seconds as seen from `observer`.
    ///
    /// `truth` is the opponent's real state and plan; it is only copied into
    /// the guess when the observer can see the opponent or the world
    /// contradicts the guess.
    pub fn update(
        &self,
        guess: &mut Guess,
        observer: NodeId,
        truth: (&NodeState, &NodePlan),
        dt: f32,
        probe: &impl WorldProbe,
    ) -> GuessUpdate {
        guess.items.retain(|_, remaining| {
            *remaining -= dt;
            *remaining > 0.0
        });

        let Some(eye) = self.graph.node(observer) else {
            guess.reset(truth.0, truth.1);
            return GuessUpdate::Reset;
        };
        if eye.is_visible(guess.state.node) || eye.is_visible(truth.0.node) {
            guess.reset(truth.0, truth.1);
            return GuessUpdate::Reset;
        }

        guess.elapsed += dt;
        guess.unseen += dt;
        let mut advanced = 0;
        while let Some(head) = guess.plan.arcs().first().copied() {
            if guess.elapsed <= head.weight {
                break;
            }
            guess.elapsed -= head.weight;
            let source = guess.plan.node();
            guess.plan.advance();
            self.credit(guess, source, head);
            advanced += 1;
        }
        if guess.plan.is_empty() {
            guess.elapsed = 0.0;
        }

        if self.contradicted(guess, observer, probe) {
            log::debug!("Guess for {:?} contradicted from {}", truth.0.player, observer);
            guess.reset(truth.0, truth.1);
            return GuessUpdate::Reset;
        }
        GuessUpdate::Advanced(advanced)
    }

    /// Credit the items on `arc`'s waypoints and target to the guess
    fn credit(&self, guess: &mut Guess, source: NodeId, arc: PathingArc) {
        guess.state.node = arc.target;
        let waypoints = self
            .graph
            .find_transition(source, arc.id)
            .map(|transition| transition.nodes.clone())
            .unwrap_or_default();

        for node in waypoints.into_iter().chain(std::iter::once(arc.target)) {
            let Some(actor) = self.graph.node(node).and_then(|n| n.actor) else {
                continue;
            };
            let Some(pickup) = self.items.get(actor) else {
                continue;
            };
            if guess.items.contains_key(&actor) || guess.state.is_full_for(pickup) {
                continue;
            }
            guess.state.pickup_item(pickup, guess.unseen);
            guess.items.insert(actor, pickup.respawn_time);
        }
    }

    /// Whether a pickup in plain sight of `observer` disagrees with the guess.
    ///
    /// An item seen missing that the guess never took means someone else
    /// moved through; the guess is wrong. An item seen back early only drops
    /// its timer.
    fn contradicted(&self, guess: &mut Guess, observer: NodeId, probe: &impl WorldProbe) -> bool {
        let eye = self.graph.find_node(observer);
        let from = eye.position + Vec3::Y * self.eye_height;

        let mut seen: Vec<NodeId> = eye.visibles.keys().copied().collect();
        seen.push(observer);
        seen.sort_unstable();

        for id in seen {
            let Some(node) = self.graph.node(id) else {
                continue;
            };
            let Some(actor) = node.actor.filter(|actor| self.items.get(*actor).is_some()) else {
                continue;
            };
            let to = node.position + Vec3::Y * self.eye_height;
            if id != observer && probe.cast_ray(from, to).is_some() {
                continue;
            }
            let believed_taken = guess.items.contains_key(&actor);
            match (probe.is_item_present(actor), believed_taken) {
                (false, false) => return true,
                (true, true) => {
                    guess.items.remove(&actor);
                }
                _ => {}
            }
        }
        false
    }
}
