//! Offline graph builder
//!
//! Usage: `botnav [level.ron|level.json] [out.nav] [config.ron]`
//!
//! Without a level a small demo arena is built. The graph is saved, reloaded
//! and a sample item plan is logged.

use std::env;
use std::process::ExitCode;

use botnav::ai::{ItemCategory, WeaponKind};
use botnav::build::{ActorKind, LevelActor, LevelBox};
use botnav::prelude::*;

const DEFAULT_OUTPUT: &str = "arena.nav";

/// Floor, a raised platform, a jump pad onto it, a teleporter and some items
fn demo_level() -> Level {
    let mut level = Level::new("demo");
    level.boxes.push(LevelBox {
        center: Vec3::new(0.0, -8.0, 0.0),
        half_extents: Vec3::new(768.0, 8.0, 768.0),
        rotation: Quat::IDENTITY,
    });
    level.boxes.push(LevelBox {
        center: Vec3::new(512.0, 64.0, 0.0),
        half_extents: Vec3::new(128.0, 64.0, 256.0),
        rotation: Quat::IDENTITY,
    });
    level.spawns.push(Vec3::new(-512.0, 0.0, 0.0));
    level.spawns.push(Vec3::new(0.0, 0.0, 512.0));

    let actor = |id: u32, position: Vec3, kind: ActorKind| LevelActor {
        id: ActorId(id),
        position,
        kind,
    };
    level.actors.push(actor(
        1,
        Vec3::new(256.0, 0.0, 0.0),
        ActorKind::Push {
            velocity: Vec3::new(320.0, 560.0, 0.0),
        },
    ));
    level.actors.push(actor(
        2,
        Vec3::new(-512.0, 0.0, -512.0),
        ActorKind::Teleport {
            destination: Vec3::new(512.0, 128.0, 128.0),
        },
    ));
    level.actors.push(actor(
        3,
        Vec3::new(512.0, 128.0, -128.0),
        ActorKind::Pickup {
            category: ItemCategory::Weapon,
            code: WeaponKind::Railgun as u32,
            amount: 1,
            ammo: 10,
            respawn_time: 5.0,
        },
    ));
    level.actors.push(actor(
        4,
        Vec3::new(-256.0, 0.0, 256.0),
        ActorKind::Pickup {
            category: ItemCategory::Health,
            code: 0,
            amount: 25,
            ammo: 0,
            respawn_time: 35.0,
        },
    ));
    level.actors.push(actor(
        5,
        Vec3::new(0.0, 0.0, -384.0),
        ActorKind::Pickup {
            category: ItemCategory::Armor,
            code: 0,
            amount: 50,
            ammo: 0,
            respawn_time: 25.0,
        },
    ));
    level
}

fn load_level(path: Option<&String>) -> Result<Level, String> {
    let Some(path) = path else {
        return Ok(demo_level());
    };
    let loaded = if path.ends_with(".json") {
        Level::load_json(path)
    } else {
        Level::load_ron(path)
    };
    loaded.map_err(|e| format!("Failed to load level {path}: {e}"))
}

fn run(args: &[String]) -> Result<(), String> {
    let level = load_level(args.first())?;
    let output = args.get(1).map_or(DEFAULT_OUTPUT, String::as_str);
    let config = match args.get(2) {
        Some(path) => {
            PathingConfig::load(path).map_err(|e| format!("Failed to load {path}: {e}"))?
        }
        None => PathingConfig::default(),
    };

    let mut sim = RapierSimulator::new();
    level.populate(&mut sim);
    log::info!("Building level {:?}: {} boxes", level.name, sim.collider_count());

    let mut graph = GraphBuilder::new(&mut sim, &config.builder).build(&level);
    let items = level.items();
    let stats = Clusterer::new(&config.cluster).run(&mut graph, &items);
    log::info!(
        "{} nodes, {} arcs, {} transitions, {} clusters",
        graph.node_count(),
        graph.arc_count(),
        graph.transition_count(),
        stats.clusters
    );

    graph
        .save_to_file(output)
        .map_err(|e| format!("Failed to save {output}: {e}"))?;
    let graph = PathingGraph::load_or_empty(output);

    let Some(start) = level
        .spawns
        .first()
        .and_then(|spawn| graph.find_closest_node(*spawn + Vec3::Y * sim.scale(), true))
    else {
        log::warn!("No grounded node near the first spawn");
        return Ok(());
    };
    let Some(goal) = graph.cluster_ids().last().copied() else {
        return Ok(());
    };

    let threshold = config.planner.threshold;
    let manager = AiManager::new(graph, items, config);
    let mut state = NodeState::new(start).with_player(ActorId(0));
    state.health = 40;
    let mut exclude = ExcludeActors::default();
    let plan = manager
        .find_path(&state, goal, &mut exclude, threshold)
        .map_err(|e| e.to_string())?;
    log::info!(
        "Plan from {} to {}: {} arcs, {:.2}s, {} items claimed",
        start,
        goal,
        plan.len(),
        plan.weight(),
        exclude.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
