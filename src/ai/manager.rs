//! Shared planning front end
//!
//! Owns the runtime graph, the item registry and the per-agent records.
//! Planners read the graph concurrently; occupancy events queue up and are
//! applied between ticks under the write lock. Per-agent records sit behind
//! one coarse lock and are only reachable through id-keyed getters and
//! setters.

use std::sync::{Mutex, RwLock};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::{EventQueue, OccupancyEvent, PathingConfig};
use crate::graph::{ActorId, ClusterId, NodeId, NodePlan, PathingGraph};

use super::finder::AiFinder;
use super::items::{ExcludeActors, ItemRegistry};
use super::opponent::{Guess, GuessUpdate, OpponentModel, WorldProbe};
use super::state::NodeState;

/// Errors raised by [`AiManager`]
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A thread panicked while holding one of the manager's locks
    #[error("lock poisoned")]
    LockPoisoned,
    /// The agent has no recorded state
    #[error("no state recorded for {0}")]
    UnknownAgent(ActorId),
}

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Everything the manager tracks for one agent
#[derive(Debug, Clone, Default)]
struct AgentRecord {
    state: Option<NodeState>,
    plan: Option<NodePlan>,
    guess: Option<Guess>,
    updated: bool,
    guess_updated: bool,
}

/// Per-agent records keyed by actor id
#[derive(Debug, Default)]
struct AgentStore {
    agents: FxHashMap<ActorId, AgentRecord>,
}

impl AgentStore {
    fn get(&self, actor: ActorId) -> Option<&AgentRecord> {
        self.agents.get(&actor)
    }

    fn entry(&mut self, actor: ActorId) -> &mut AgentRecord {
        self.agents.entry(actor).or_default()
    }

    /// Guess of `actor`, seeded from its ground truth on first use
    fn guess_mut(&mut self, actor: ActorId) -> Option<&mut Guess> {
        let record = self.agents.get_mut(&actor)?;
        if record.guess.is_none() {
            let state = record.state.as_ref()?;
            let plan = record
                .plan
                .clone()
                .unwrap_or_else(|| NodePlan::new(state.node));
            record.guess = Some(Guess::from_truth(state, &plan));
        }
        record.guess.as_mut()
    }
}

/// Runtime owner of the graph and the agents planning over it
pub struct AiManager {
    graph: RwLock<PathingGraph>,
    items: ItemRegistry,
    config: PathingConfig,
    agents: Mutex<AgentStore>,
    events: Mutex<EventQueue>,
}

impl AiManager {
    #[must_use]
    pub fn new(graph: PathingGraph, items: ItemRegistry, config: PathingConfig) -> Self {
        Self {
            graph: RwLock::new(graph),
            items,
            config,
            agents: Mutex::new(AgentStore::default()),
            events: Mutex::new(EventQueue::new()),
        }
    }

    /// Read access to the graph
    pub fn with_graph<T>(&self, f: impl FnOnce(&PathingGraph) -> T) -> Result<T> {
        let graph = self.graph.read().map_err(|_| ManagerError::LockPoisoned)?;
        Ok(f(&graph))
    }

    #[must_use]
    pub fn items(&self) -> &ItemRegistry {
        &self.items
    }

    #[must_use]
    pub fn config(&self) -> &PathingConfig {
        &self.config
    }

    // =========================================================================
    // Agent records
    // =========================================================================

    fn read<T>(
        &self,
        actor: ActorId,
        f: impl FnOnce(&AgentRecord) -> Option<T>,
    ) -> Result<Option<T>> {
        let agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;
        Ok(agents.get(actor).and_then(f))
    }

    fn write(&self, actor: ActorId, f: impl FnOnce(&mut AgentRecord)) -> Result<()> {
        let mut agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;
        f(agents.entry(actor));
        Ok(())
    }

    pub fn state(&self, actor: ActorId) -> Result<Option<NodeState>> {
        self.read(actor, |record| record.state.clone())
    }

    pub fn set_state(&self, actor: ActorId, state: NodeState) -> Result<()> {
        self.write(actor, |record| record.state = Some(state))
    }

    pub fn plan(&self, actor: ActorId) -> Result<Option<NodePlan>> {
        self.read(actor, |record| record.plan.clone())
    }

    pub fn set_plan(&self, actor: ActorId, plan: NodePlan) -> Result<()> {
        self.write(actor, |record| record.plan = Some(plan))
    }

    pub fn guess_state(&self, actor: ActorId) -> Result<Option<NodeState>> {
        self.read(actor, |record| record.guess.as_ref().map(|g| g.state.clone()))
    }

    /// Overwrite the believed state of `actor`
    ///
    /// Returns [`ManagerError::UnknownAgent`] when no guess or ground truth
    /// exists to attach it to.
    pub fn set_guess_state(&self, actor: ActorId, state: NodeState) -> Result<()> {
        let mut agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;
        let guess = agents
            .guess_mut(actor)
            .ok_or(ManagerError::UnknownAgent(actor))?;
        guess.state = state;
        Ok(())
    }

    pub fn guess_plan(&self, actor: ActorId) -> Result<Option<NodePlan>> {
        self.read(actor, |record| record.guess.as_ref().map(|g| g.plan.clone()))
    }

    /// Overwrite the believed plan of `actor`
    pub fn set_guess_plan(&self, actor: ActorId, plan: NodePlan) -> Result<()> {
        let mut agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;
        let guess = agents
            .guess_mut(actor)
            .ok_or(ManagerError::UnknownAgent(actor))?;
        guess.plan = plan;
        guess.elapsed = 0.0;
        Ok(())
    }

    pub fn guess_items(&self, actor: ActorId) -> Result<Option<ExcludeActors>> {
        self.read(actor, |record| record.guess.as_ref().map(|g| g.items.clone()))
    }

    pub fn set_guess_items(&self, actor: ActorId, items: ExcludeActors) -> Result<()> {
        let mut agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;
        let guess = agents
            .guess_mut(actor)
            .ok_or(ManagerError::UnknownAgent(actor))?;
        guess.items = items;
        Ok(())
    }

    pub fn is_updated(&self, actor: ActorId) -> Result<bool> {
        Ok(self.read(actor, |record| Some(record.updated))?.unwrap_or(false))
    }

    pub fn set_updated(&self, actor: ActorId, updated: bool) -> Result<()> {
        self.write(actor, |record| record.updated = updated)
    }

    pub fn is_guess_updated(&self, actor: ActorId) -> Result<bool> {
        Ok(self
            .read(actor, |record| Some(record.guess_updated))?
            .unwrap_or(false))
    }

    pub fn set_guess_updated(&self, actor: ActorId, updated: bool) -> Result<()> {
        self.write(actor, |record| record.guess_updated = updated)
    }

    /// Forget everything about `actor`
    pub fn remove_agent(&self, actor: ActorId) -> Result<()> {
        let mut agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;
        agents.agents.remove(&actor);
        Ok(())
    }

    // =========================================================================
    // Planning
    // =========================================================================

    /// Plan for `state` toward `goal`; see [`AiFinder::find_path`]
    pub fn find_path(
        &self,
        state: &NodeState,
        goal: ClusterId,
        exclude: &mut ExcludeActors,
        threshold: f32,
    ) -> Result<NodePlan> {
        let graph = self.graph.read().map_err(|_| ManagerError::LockPoisoned)?;
        let finder = AiFinder::new(
            &graph,
            &self.items,
            &self.config.planner,
            &self.config.heuristic,
        );
        Ok(finder.find_path(state, goal, exclude, threshold))
    }

    /// Advance the observer's belief about `opponent` by `dt` seconds.
    ///
    /// Sets the opponent's guess-updated flag. Returns `None` when the
    /// opponent has no recorded ground truth yet.
    pub fn update_guess(
        &self,
        observer: NodeId,
        opponent: ActorId,
        dt: f32,
        probe: &impl WorldProbe,
    ) -> Result<Option<GuessUpdate>> {
        let graph = self.graph.read().map_err(|_| ManagerError::LockPoisoned)?;
        let mut agents = self.agents.lock().map_err(|_| ManagerError::LockPoisoned)?;

        let Some(record) = agents.get(opponent) else {
            return Ok(None);
        };
        let Some(state) = record.state.clone() else {
            return Ok(None);
        };
        let plan = record
            .plan
            .clone()
            .unwrap_or_else(|| NodePlan::new(state.node));
        let Some(guess) = agents.guess_mut(opponent) else {
            return Ok(None);
        };

        let model = OpponentModel::new(&graph, &self.items)
            .with_eye_height(self.config.builder.eye_height);
        let update = model.update(guess, observer, (&state, &plan), dt, probe);
        agents.entry(opponent).guess_updated = true;
        Ok(Some(update))
    }

    // =========================================================================
    // Occupancy
    // =========================================================================

    /// Queue an occupancy change reported from a physics callback
    pub fn queue_event(&self, event: OccupancyEvent) -> Result<()> {
        let mut events = self.events.lock().map_err(|_| ManagerError::LockPoisoned)?;
        events.push(event);
        Ok(())
    }

    /// Apply every event queued since the previous call.
    ///
    /// Call between planning ticks; blocks until running planners release the
    /// graph.
    pub fn apply_events(&self) -> Result<usize> {
        let mut events = self.events.lock().map_err(|_| ManagerError::LockPoisoned)?;
        events.swap();
        if events.is_empty() {
            return Ok(0);
        }
        let mut graph = self.graph.write().map_err(|_| ManagerError::LockPoisoned)?;
        let applied = events.apply(&mut graph);
        log::trace!("Applied {} occupancy events", applied);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ArcType;
    use crate::physics::RayHit;
    use glam::Vec3;
    use std::sync::Arc;

    struct Blind;

    impl WorldProbe for Blind {
        fn cast_ray(&self, _from: Vec3, _to: Vec3) -> Option<RayHit> {
            None
        }

        fn is_item_present(&self, _actor: ActorId) -> bool {
            true
        }
    }

    /// A -> B (2s) plus an observer node that sees neither
    fn manager() -> (AiManager, NodeId, NodeId, NodeId) {
        let mut graph = PathingGraph::new();
        let a = graph.insert_node(Vec3::ZERO, 16.0);
        let b = graph.insert_node(Vec3::new(100.0, 0.0, 0.0), 16.0);
        let o = graph.insert_node(Vec3::new(0.0, 0.0, 1000.0), 16.0);
        graph.insert_arc(a, ArcType::Move, b, 2.0);
        let manager = AiManager::new(graph, ItemRegistry::new(), PathingConfig::default());
        (manager, a, b, o)
    }

    #[test]
    fn test_agent_records_round_trip() {
        let (manager, a, _, _) = manager();
        let actor = ActorId(1);
        assert_eq!(manager.state(actor).unwrap(), None);
        assert!(!manager.is_updated(actor).unwrap());

        let state = NodeState::new(a).with_player(actor);
        manager.set_state(actor, state.clone()).unwrap();
        manager.set_updated(actor, true).unwrap();
        assert_eq!(manager.state(actor).unwrap(), Some(state.clone()));
        assert!(manager.is_updated(actor).unwrap());

        // The guess starts from ground truth
        let mut items = ExcludeActors::default();
        items.insert(ActorId(9), 3.0);
        manager.set_guess_items(actor, items.clone()).unwrap();
        assert_eq!(manager.guess_state(actor).unwrap(), Some(state));
        assert_eq!(manager.guess_items(actor).unwrap(), Some(items));

        manager.remove_agent(actor).unwrap();
        assert_eq!(manager.state(actor).unwrap(), None);
    }

    #[test]
    fn test_guess_needs_ground_truth() {
        let (manager, a, _, _) = manager();
        let result = manager.set_guess_state(ActorId(4), NodeState::new(a));
        assert!(matches!(result, Err(ManagerError::UnknownAgent(ActorId(4)))));
    }

    #[test]
    fn test_update_guess_advances_plan() {
        let (manager, a, b, observer) = manager();
        let opponent = ActorId(2);
        assert_eq!(manager.update_guess(observer, opponent, 1.0, &Blind).unwrap(), None);

        let plan = manager
            .with_graph(|graph| graph.find_plan(a, b, None, f32::MAX))
            .unwrap()
            .unwrap();
        manager.set_state(opponent, NodeState::new(a)).unwrap();
        manager.set_plan(opponent, plan).unwrap();

        let update = manager.update_guess(observer, opponent, 2.5, &Blind).unwrap();
        assert_eq!(update, Some(GuessUpdate::Advanced(1)));
        assert_eq!(manager.guess_state(opponent).unwrap().map(|s| s.node), Some(b));
        assert!(manager.guess_plan(opponent).unwrap().unwrap().is_empty());
        assert!(manager.is_guess_updated(opponent).unwrap());

        // Ground truth itself is untouched
        assert_eq!(manager.state(opponent).unwrap().map(|s| s.node), Some(a));
    }

    #[test]
    fn test_events_apply_between_ticks() {
        let (manager, a, _, _) = manager();
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    manager
                        .queue_event(OccupancyEvent::Entered {
                            node: a,
                            actor: ActorId(10 + i),
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.with_graph(|g| g.find_node(a).actor).unwrap(), None);
        assert_eq!(manager.apply_events().unwrap(), 4);
        assert!(manager.with_graph(|g| g.find_node(a).actor).unwrap().is_some());
        assert_eq!(manager.apply_events().unwrap(), 0);
    }
}
