//! Offline graph construction by physics replay
//!
//! Starting from spawn points and level actors, the builder drops a simulated
//! agent on every open node and replays walks and jumps along evenly spaced
//! headings. Where a replay ends becomes an arc target: an existing node when
//! the end lies inside its tolerance, a new open node otherwise. Trigger nodes
//! replay their launch or relocation instead of walking.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::BuilderConfig;
use crate::graph::{ActorId, ArcType, NodeId, PathingGraph, PathingTransition};
use crate::physics::{Simulator, Transform};

use super::level::{ActorKind, Level};

/// How a replay starts
#[derive(Debug, Clone, Copy)]
enum Launch {
    Walk,
    Jump,
    Push(Vec3),
    Teleport(Vec3),
}

/// Outcome of one replay
#[derive(Debug)]
struct Trace {
    kind: ArcType,
    transition: PathingTransition,
    end: Vec3,
    weight: f32,
}

/// Waypoint sampler shared by every replay
struct Recorder {
    transition: PathingTransition,
    last: Vec3,
    last_time: f32,
    spacing: f32,
}

impl Recorder {
    fn new(start: Vec3, spacing: f32) -> Self {
        Self {
            transition: PathingTransition::default(),
            last: start,
            last_time: 0.0,
            spacing,
        }
    }

    fn sample(&mut self, position: Vec3, time: f32) {
        if position.distance(self.last) > self.spacing {
            self.push(position, time);
        }
    }

    fn push(&mut self, position: Vec3, time: f32) {
        self.transition.push(position, time - self.last_time);
        self.last = position;
        self.last_time = time;
    }

    fn finish(mut self, kind: ArcType, end: Vec3, weight: f32) -> Trace {
        if end != self.last {
            self.push(end, weight);
        }
        self.transition.kind = Some(kind);
        Trace {
            kind,
            transition: self.transition,
            end,
            weight,
        }
    }
}

/// Builds a [`PathingGraph`] for one level by driving a [`Simulator`]
pub struct GraphBuilder<'a, S: Simulator> {
    sim: &'a mut S,
    config: &'a BuilderConfig,
    graph: PathingGraph,
    open: VecDeque<NodeId>,
    closed: FxHashSet<NodeId>,
    triggers: FxHashMap<ActorId, ActorKind>,
    rejected: usize,
}

impl<'a, S: Simulator> GraphBuilder<'a, S> {
    #[must_use]
    pub fn new(sim: &'a mut S, config: &'a BuilderConfig) -> Self {
        Self {
            sim,
            config,
            graph: PathingGraph::new(),
            open: VecDeque::new(),
            closed: FxHashSet::default(),
            triggers: FxHashMap::default(),
            rejected: 0,
        }
    }

    /// Run every pass and hand over the finished graph
    pub fn build(mut self, level: &Level) -> PathingGraph {
        log::info!("Building pathing graph for '{}'", level.name);
        self.seed(level);

        while let Some(id) = self.open.pop_front() {
            if !self.closed.insert(id) {
                continue;
            }
            self.expand(id);
        }
        log::info!(
            "Expanded {} nodes, {} arcs ({} replays rejected)",
            self.graph.node_count(),
            self.graph.arc_count(),
            self.rejected
        );

        self.resolve_waypoints();
        self.compute_visibility();
        self.graph
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    fn seed(&mut self, level: &Level) {
        for &spawn in &level.spawns {
            let Some(position) = self.settle(spawn) else {
                log::warn!("Spawn at {} never reaches the ground", spawn);
                continue;
            };
            let id = match self.snap(position) {
                Some(id) => id,
                None => self.graph.insert_node(position, self.config.node_tolerance),
            };
            self.open.push_back(id);
        }

        for actor in &level.actors {
            let Some(position) = self.settle(actor.position) else {
                log::warn!("{} at {} never reaches the ground", actor.id, actor.position);
                continue;
            };
            let id = self.graph.insert_node(position, self.config.node_tolerance);
            self.graph.set_occupant(id, Some(actor.id));
            if actor.is_trigger() {
                self.triggers.insert(actor.id, actor.kind);
            }
            self.open.push_back(id);
        }
        log::debug!("Seeded {} nodes", self.graph.node_count());
    }

    /// Standing position of an agent dropped on the floor point `point`
    fn settle(&mut self, point: Vec3) -> Option<Vec3> {
        let lifted = point + Vec3::Y * self.sim.scale();
        self.sim.set_transform(Transform::from_position(lifted));
        let mut air_time = 0.0;
        while !self.sim.on_ground() {
            if air_time > self.config.max_fall_time {
                return None;
            }
            self.sim.fall_direction(Vec3::ZERO);
            self.sim.step(self.config.time_step);
            air_time += self.config.time_step;
        }
        Some(self.sim.transform().position)
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    fn expand(&mut self, id: NodeId) {
        let node = self.graph.find_node(id);
        let origin = node.position;
        let trigger = node.actor.and_then(|actor| self.triggers.get(&actor).copied());

        match trigger {
            Some(ActorKind::Push { velocity }) => {
                if let Some(trace) = self.replay(origin, Vec3::ZERO, Launch::Push(velocity)) {
                    self.commit(id, trace);
                }
            }
            Some(ActorKind::Teleport { destination }) => {
                let lifted = destination + Vec3::Y * self.sim.scale();
                if let Some(trace) = self.replay(origin, Vec3::ZERO, Launch::Teleport(lifted)) {
                    self.commit(id, trace);
                }
            }
            Some(ActorKind::Pickup { .. }) | None => {
                let headings = self.config.headings.max(1);
                for step in 0..headings {
                    let yaw = TAU * step as f32 / headings as f32;
                    let heading = Transform::from_yaw(origin, yaw).forward();
                    for launch in [Launch::Walk, Launch::Jump] {
                        if let Some(trace) = self.replay(origin, heading, launch) {
                            self.commit(id, trace);
                        }
                    }
                }
            }
        }
    }

    /// Replay one launch from `origin` until the agent stops or lands.
    ///
    /// Returns `None` when the agent cannot start (not grounded) or when a
    /// fall outlasts `max_fall_time`.
    fn replay(&mut self, origin: Vec3, heading: Vec3, launch: Launch) -> Option<Trace> {
        let config = self.config;
        let dt = config.time_step;
        self.sim.set_transform(Transform::from_position(origin));

        let mut recorder = Recorder::new(origin, config.sample_distance);
        let (mut kind, mut airborne) = match launch {
            Launch::Walk => {
                if !self.sim.on_ground() {
                    return None;
                }
                self.sim.walk_direction(heading * config.move_speed);
                (ArcType::Move, false)
            }
            Launch::Jump => {
                if !self.sim.on_ground() {
                    return None;
                }
                let speed = self.sim.jump_speed();
                self.sim.jump(heading * config.air_speed + Vec3::Y * speed);
                self.sim.fall_direction(heading * config.air_speed);
                (ArcType::Jump, true)
            }
            Launch::Push(velocity) => {
                self.sim.jump(velocity);
                self.sim.fall_direction(Vec3::new(velocity.x, 0.0, velocity.z));
                (ArcType::Push, true)
            }
            Launch::Teleport(destination) => {
                self.sim.set_transform(Transform::from_position(destination));
                recorder.push(destination, 0.0);
                (ArcType::Teleport, true)
            }
        };

        let mut window: VecDeque<(f32, Vec3)> = VecDeque::new();
        window.push_back((0.0, origin));
        let mut elapsed = 0.0;
        let mut air_time = 0.0;

        loop {
            self.sim.step(dt);
            elapsed += dt;
            let position = self.sim.transform().position;
            recorder.sample(position, elapsed);

            if airborne {
                air_time += dt;
                if self.sim.on_ground() {
                    break;
                }
                if air_time > config.max_fall_time {
                    log::trace!("{:?} replay from {} never landed", kind, origin);
                    return None;
                }
                continue;
            }

            if !self.sim.on_ground() {
                airborne = true;
                kind = ArcType::Fall;
                self.sim.fall_direction(heading * config.air_speed);
                continue;
            }

            window.push_back((elapsed, position));
            while window
                .front()
                .is_some_and(|(time, _)| *time < elapsed - config.stall_window)
            {
                window.pop_front();
            }
            if elapsed >= config.stall_window {
                if let Some(&(since, start)) = window.front() {
                    if start.distance(position) < config.stall_distance {
                        elapsed = since;
                        break;
                    }
                }
            }

            let travelled = (position - origin) * Vec3::new(1.0, 0.0, 1.0);
            if travelled.length() >= config.step_distance {
                break;
            }
            if elapsed > config.max_fall_time {
                return None;
            }
        }

        let end = self.sim.transform().position;
        Some(recorder.finish(kind, end, elapsed))
    }

    /// Turn a trace into an arc from `source`, creating the target node when
    /// needed. Returns whether an arc was added.
    fn commit(&mut self, source: NodeId, trace: Trace) -> bool {
        let config = self.config;
        let source_node = self.graph.find_node(source);
        let origin = source_node.position;
        let owner = source_node.actor;

        if trace.kind == ArcType::Jump {
            let horizontal = ((trace.end - origin) * Vec3::new(1.0, 0.0, 1.0)).length();
            let rise = trace.end.y - origin.y;
            if horizontal < config.min_jump_distance && rise < config.min_jump_height {
                return self.reject();
            }
        }

        let existing = self.snap(trace.end);
        let destination = match existing {
            Some(target) => {
                let target_node = self.graph.find_node(target);
                let (position, occupant) = (target_node.position, target_node.actor);
                if target == source || self.graph.find_node(source).has_arc(trace.kind, target) {
                    return self.reject();
                }
                if owner.is_some() && occupant == owner {
                    return self.reject();
                }
                position
            }
            None => trace.end,
        };

        // Walks must not cut through geometry; everything else only needs a
        // clear snap from where it landed
        let blocked = match trace.kind {
            ArcType::Move => self.sim.convex_sweep(origin, destination).is_some(),
            _ => existing.is_some() && self.sim.convex_sweep(trace.end, destination).is_some(),
        };
        if blocked {
            return self.reject();
        }

        let target = match existing {
            Some(target) => target,
            None => {
                if self.graph.node_count() >= config.max_nodes {
                    log::debug!("Node cap {} reached", config.max_nodes);
                    return self.reject();
                }
                let id = self.graph.insert_node(trace.end, config.node_tolerance);
                self.open.push_back(id);
                id
            }
        };

        let arc = self.graph.insert_arc(source, trace.kind, target, trace.weight.max(0.0));
        let mut transition = trace.transition;
        transition.id = arc;
        self.graph.insert_transition(source, transition);
        true
    }

    fn reject(&mut self) -> bool {
        self.rejected += 1;
        false
    }

    /// Existing node whose tolerance covers `position`
    fn snap(&self, position: Vec3) -> Option<NodeId> {
        let id = self.graph.find_closest_node(position, false)?;
        let node = self.graph.find_node(id);
        (node.position.distance(position) <= node.tolerance).then_some(id)
    }

    // =========================================================================
    // Post passes
    // =========================================================================

    /// Record the nodes each transition passes through.
    ///
    /// A waypoint outside the tolerance of every node passes none.
    fn resolve_waypoints(&mut self) {
        let mut resolved = Vec::new();
        for node in self.graph.nodes() {
            for (index, transition) in node.transitions.iter().enumerate() {
                let mut nodes: Vec<NodeId> = transition
                    .positions
                    .iter()
                    .filter_map(|&p| self.snap(p))
                    .collect();
                nodes.dedup();
                resolved.push((node.id, index, nodes));
            }
        }
        for (id, index, nodes) in resolved {
            self.graph.find_node_mut(id).transitions[index].nodes = nodes;
        }
    }

    /// Fill visibility lists with eye-height ray casts
    fn compute_visibility(&mut self) {
        let config = self.config;
        let eye = Vec3::Y * config.eye_height;
        let points: Vec<(NodeId, Vec3)> = self
            .graph
            .nodes()
            .iter()
            .map(|node| (node.id, node.position))
            .collect();

        let mut pairs = Vec::new();
        for (i, &(a, pa)) in points.iter().enumerate() {
            for &(b, pb) in &points[i + 1..] {
                let distance = pa.distance(pb);
                if distance > config.visibility_range {
                    continue;
                }
                if self.sim.cast_ray(pa + eye, pb + eye).is_none() {
                    pairs.push((a, b, distance));
                }
            }
        }

        log::debug!("{} mutually visible node pairs", pairs.len());
        for (a, b, distance) in pairs {
            self.graph.find_node_mut(a).visibles.insert(b, distance);
            self.graph.find_node_mut(b).visibles.insert(a, distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::level::LevelActor;
    use crate::physics::testing::{Block, BlockWorld};

    fn config() -> BuilderConfig {
        BuilderConfig {
            headings: 8,
            max_fall_time: 1.0,
            ..Default::default()
        }
    }

    fn spawn_at(point: Vec3) -> Level {
        let mut level = Level::new("test");
        level.spawns.push(point);
        level
    }

    fn assert_consistent(graph: &PathingGraph) {
        for node in graph.nodes() {
            for arc in &node.arcs {
                assert_ne!(arc.target, node.id, "{} loops on {}", arc.id, node.id);
                assert!(arc.weight >= 0.0);
                assert!(graph.contains(arc.target));
                let transition = node
                    .transition(arc.id)
                    .unwrap_or_else(|| panic!("{} has no transition", arc.id));
                assert_eq!(transition.kind, Some(arc.kind));
                for passed in &transition.nodes {
                    let passed = graph.find_node(*passed);
                    assert!(
                        transition
                            .positions
                            .iter()
                            .any(|p| p.distance(passed.position) <= passed.tolerance),
                        "{} credits {} without reaching it",
                        arc.id,
                        passed.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_flat_floor_graph() {
        let mut world = BlockWorld::floor(160.0);
        let config = config();
        let graph = GraphBuilder::new(&mut world, &config).build(&spawn_at(Vec3::ZERO));

        assert!(graph.node_count() > 8);
        let moves = graph
            .nodes()
            .iter()
            .flat_map(|node| node.arcs.iter())
            .filter(|arc| arc.kind == ArcType::Move)
            .count();
        assert!(moves > 0);
        assert_consistent(&graph);

        // Standing height above the floor top
        let standing = Vec3::new(0.0, 24.0, 0.0);
        let spawn = graph.find_closest_node(standing, false);
        assert_eq!(spawn.map(|id| graph.find_node(id).position), Some(standing));

        // Open floor: everything sees everything
        let first = &graph.nodes()[0];
        assert_eq!(first.visibles.len(), graph.node_count() - 1);
    }

    #[test]
    fn test_ledge_only_falls_down() {
        let mut world = BlockWorld::new(vec![
            Block::new(Vec3::new(-200.0, -16.0, -200.0), Vec3::new(200.0, 0.0, 200.0)),
            Block::new(Vec3::new(-64.0, 0.0, -64.0), Vec3::new(64.0, 64.0, 64.0)),
        ]);
        let config = BuilderConfig {
            step_distance: 48.0,
            ..config()
        };
        let level = spawn_at(Vec3::new(0.0, 64.0, 0.0));
        let graph = GraphBuilder::new(&mut world, &config).build(&level);
        assert_consistent(&graph);

        let high = |id: NodeId| graph.find_node(id).position.y > 60.0;
        let mut falls = 0;
        for node in graph.nodes() {
            for arc in &node.arcs {
                assert!(
                    high(node.id) || !high(arc.target),
                    "{:?} {} climbs onto the platform",
                    arc.kind,
                    arc.id
                );
                if arc.kind == ArcType::Fall {
                    assert!(high(node.id) && !high(arc.target));
                    falls += 1;
                }
            }
        }
        assert!(falls > 0);
    }

    #[test]
    fn test_jump_pad_and_teleporter() {
        let mut world = BlockWorld::floor(400.0);
        let config = config();
        let mut level = spawn_at(Vec3::ZERO);
        level.actors.push(LevelActor {
            id: ActorId(1),
            position: Vec3::new(96.0, 0.0, 0.0),
            kind: ActorKind::Push {
                velocity: Vec3::new(200.0, 300.0, 0.0),
            },
        });
        level.actors.push(LevelActor {
            id: ActorId(2),
            position: Vec3::new(-96.0, 0.0, 0.0),
            kind: ActorKind::Teleport {
                destination: Vec3::new(0.0, 0.0, 300.0),
            },
        });

        let graph = GraphBuilder::new(&mut world, &config).build(&level);
        assert_consistent(&graph);

        let pad = graph.find_actor_node(ActorId(1)).unwrap();
        let pushes: Vec<_> = graph.find_node(pad).arcs.iter().collect();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].kind, ArcType::Push);
        // 200 units/s for about 0.75s of flight
        assert!(graph.find_node(pushes[0].target).position.x > 200.0);

        let teleporter = graph.find_actor_node(ActorId(2)).unwrap();
        let teleports = &graph.find_node(teleporter).arcs;
        assert_eq!(teleports.len(), 1);
        assert_eq!(teleports[0].kind, ArcType::Teleport);
        let landing = graph.find_node(teleports[0].target).position;
        assert!(landing.distance(Vec3::new(0.0, 24.0, 300.0)) <= config.node_tolerance);
    }

    #[test]
    fn test_walk_into_wall_stops_at_wall() {
        let mut world = BlockWorld::new(vec![
            Block::new(Vec3::new(-400.0, -16.0, -400.0), Vec3::new(400.0, 0.0, 400.0)),
            Block::new(Vec3::new(-400.0, 0.0, -60.0), Vec3::new(400.0, 200.0, -40.0)),
        ]);
        let config = config();
        let graph = GraphBuilder::new(&mut world, &config).build(&spawn_at(Vec3::ZERO));
        assert_consistent(&graph);

        // Nothing gets past the wall
        assert!(graph.nodes().iter().all(|node| node.position.z > -40.0));

        // Walking straight at it ends against it once progress stalls
        let spawn = graph.find_closest_node(Vec3::new(0.0, 24.0, 0.0), false).unwrap();
        let blocked = graph
            .find_node(spawn)
            .arcs
            .iter()
            .find(|arc| {
                let end = graph.find_node(arc.target).position;
                arc.kind == ArcType::Move && end.x.abs() < 1.0 && end.z < -24.0
            })
            .copied()
            .unwrap();
        let end = graph.find_node(blocked.target).position;
        assert!((end.z + 32.0).abs() < 0.5, "walk ended at {end}");
        // Time stops counting where the agent stopped moving
        assert!(blocked.weight > 0.05 && blocked.weight < 0.2, "{}", blocked.weight);
    }

    #[test]
    fn test_jump_in_place_is_rejected() {
        let mut world = BlockWorld::floor(160.0);
        let config = BuilderConfig {
            air_speed: 0.0,
            ..config()
        };
        let graph = GraphBuilder::new(&mut world, &config).build(&spawn_at(Vec3::ZERO));
        assert_consistent(&graph);

        let arcs: Vec<_> = graph.nodes().iter().flat_map(|node| node.arcs.iter()).collect();
        assert!(arcs.iter().any(|arc| arc.kind == ArcType::Move));
        assert!(arcs.iter().all(|arc| arc.kind != ArcType::Jump));
    }

    #[test]
    fn test_waypoints_only_credit_nearby_nodes() {
        let mut world = BlockWorld::floor(400.0);
        let config = config();
        let graph = GraphBuilder::new(&mut world, &config).build(&spawn_at(Vec3::ZERO));
        assert_consistent(&graph);

        let mut credited = 0;
        for node in graph.nodes() {
            for transition in &node.transitions {
                for passed in &transition.nodes {
                    let passed = graph.find_node(*passed);
                    let nearest = transition
                        .positions
                        .iter()
                        .map(|p| p.distance(passed.position))
                        .fold(f32::MAX, f32::min);
                    assert!(nearest <= passed.tolerance, "{nearest} from {}", passed.id);
                    credited += 1;
                }
            }
        }
        assert!(credited > 0);
    }
}
