//! Whole-world scenarios: threading equivalence, damage, walls, grid upkeep

use super::*;
use crate::bodies::{Body, BodyRef, BodyRegistry, Presentation};
use crate::core::{BoundaryMode, CollisionStrategy, ConfigError, SimulationConfig};
use crate::foundation::math::{Vec2, Vec3};
use crate::physics::{CollisionResolver, GridResolver, ResolveContext};
use crate::scheduler::SchedulerError;
use approx::assert_relative_eq;

type Snapshot = Vec<(Vec2, Vec2, i32)>;

fn busy_config(strategy: CollisionStrategy) -> SimulationConfig {
    SimulationConfig {
        population: 600,
        spawn_range: 200.0,
        velocity_range: 40.0,
        partitions: 10,
        contact_scale: 1.0,
        seed: Some(7),
        strategy,
        fixed_delta: Some(0.05),
        multithreading: false,
        ..SimulationConfig::default()
    }
}

fn snapshot(world: &SimulationWorld) -> Snapshot {
    let registry = world.registry();
    registry
        .blocking()
        .iter()
        .zip(registry.blocking_info())
        .chain(registry.moving().iter().zip(registry.moving_info()))
        .map(|(body, info)| (body.position, body.velocity, info.health.get()))
        .collect()
}

fn run(world: &mut SimulationWorld, frames: usize) -> (usize, usize, usize) {
    let (mut bodies, mut walls, mut relocated) = (0, 0, 0);
    for _ in 0..frames {
        let report = world.step(0.05).expect("frame");
        bodies += report.body_contacts;
        walls += report.wall_contacts;
        relocated += report.relocated;
    }
    (bodies, walls, relocated)
}

/// Grid search that fails on the first moving body
#[derive(Debug)]
struct FaultyResolver;

impl CollisionResolver for FaultyResolver {
    fn first_body_contact(&self, ctx: &ResolveContext<'_>, subject: BodyRef) -> Option<(BodyRef, Vec2)> {
        assert_ne!(subject, BodyRef::moving(0), "resolver fault");
        GridResolver.first_body_contact(ctx, subject)
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}

fn pair_world(multithreading: bool) -> SimulationWorld {
    let mut registry = BodyRegistry::new();
    registry.push_moving(
        Body::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 1.0),
        Presentation::new("A", Vec3::zeros(), 100),
    );
    registry.push_moving(
        Body::new(Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0), 1.0),
        Presentation::new("B", Vec3::zeros(), 100),
    );
    let config = SimulationConfig::default()
        .with_multithreading(multithreading)
        .with_worker_threads(1);
    WorldBuilder::new(config)
        .with_registry(registry)
        .build()
        .expect("world")
}

#[test]
fn test_single_and_multi_threaded_runs_match() {
    for strategy in [CollisionStrategy::Grid, CollisionStrategy::Sweep, CollisionStrategy::BruteForce] {
        let mut single = SimulationWorld::new(busy_config(strategy)).expect("single");
        let mut multi = SimulationWorld::new(busy_config(strategy).with_multithreading(true).with_worker_threads(3))
            .expect("multi");
        assert_eq!(snapshot(&single), snapshot(&multi), "{strategy:?} initial state");
        assert_eq!(multi.worker_count(), 3);

        let single_totals = run(&mut single, 60);
        let multi_totals = run(&mut multi, 60);

        assert_eq!(single_totals, multi_totals, "{strategy:?} contact counts");
        assert_eq!(snapshot(&single), snapshot(&multi), "{strategy:?} final state");
        assert_eq!(single.drain_events().len(), multi.drain_events().len());
        assert!(single_totals.0 > 0, "{strategy:?} produced no body contacts");
    }
}

#[test]
fn test_toggling_threads_mid_run_matches_single_threaded() {
    let mut reference = SimulationWorld::new(busy_config(CollisionStrategy::Grid)).expect("reference");
    let mut toggled = SimulationWorld::new(busy_config(CollisionStrategy::Grid).with_worker_threads(2)).expect("toggled");

    run(&mut reference, 40);
    run(&mut toggled, 10);
    toggled.set_multithreading(true).expect("enable");
    assert!(toggled.is_multithreaded());
    run(&mut toggled, 20);
    toggled.set_multithreading(false).expect("disable");
    run(&mut toggled, 10);

    assert_eq!(snapshot(&reference), snapshot(&toggled));
    assert_eq!(toggled.frame(), 40);
}

#[test]
fn test_grid_stays_consistent_while_bodies_move() {
    let mut world = SimulationWorld::new(busy_config(CollisionStrategy::Grid).with_multithreading(true).with_worker_threads(4))
        .expect("world");
    world.verify().expect("initial grid");
    let mut relocated = 0;
    for _ in 0..50 {
        relocated += world.step(0.05).expect("frame").relocated;
        world.verify().expect("grid after frame");
    }
    assert!(relocated > 0);
    assert_eq!(world.grid().len(), 600);
}

#[test]
fn test_wrapping_grid_stays_consistent() {
    let config = SimulationConfig {
        boundary: BoundaryMode::Wrap,
        ..busy_config(CollisionStrategy::Grid)
    };
    let mut single = SimulationWorld::new(config.clone()).expect("single");
    let mut multi = SimulationWorld::new(config.with_multithreading(true).with_worker_threads(2)).expect("multi");
    run(&mut single, 30);
    run(&mut multi, 30);
    single.verify().expect("single grid");
    multi.verify().expect("multi grid");
    assert_eq!(snapshot(&single), snapshot(&multi));
}

#[test]
fn test_head_on_pair_each_take_both_hits() {
    let mut world = pair_world(false);
    let report = world.step(1.0).expect("frame");

    assert_eq!(report.body_contacts, 2);
    let info = world.registry().moving_info();
    assert_eq!(info[0].health.get(), 60);
    assert_eq!(info[1].health.get(), 60);

    let moving = world.registry().moving();
    assert_relative_eq!(moving[0].velocity, Vec2::new(-1.0, 0.0));
    assert_relative_eq!(moving[1].velocity, Vec2::new(1.0, 0.0));
    assert_relative_eq!(moving[0].position, Vec2::new(-1.0, 0.0));
    assert_relative_eq!(moving[1].position, Vec2::new(2.0, 0.0));

    let lines: Vec<String> = world.drain_events().iter().map(|e| {
        let text = e.to_string();
        text[text.find(']').map_or(0, |i| i + 2)..].to_owned()
    }).collect();
    assert_eq!(
        lines,
        vec![
            "Collision: A, Health : 80 with B, Health : 80".to_owned(),
            "Collision: B, Health : 60 with A, Health : 60".to_owned(),
        ]
    );
    assert!(world.events().is_empty());
}

#[test]
fn test_head_on_pair_multithreaded() {
    let mut world = pair_world(true);
    assert_eq!(world.worker_count(), 1);
    world.step(1.0).expect("frame");
    let info = world.registry().moving_info();
    assert_eq!(info[0].health.get(), 60);
    assert_eq!(info[1].health.get(), 60);
    assert_eq!(world.drain_events().len(), 2);
}

#[test]
fn test_body_hit_while_hitting_another_takes_both_hits() {
    let mut registry = BodyRegistry::new();
    registry.push_blocking(Body::stationary(Vec2::new(30.0, 0.0), 1.0), Presentation::new("X", Vec3::zeros(), 100));
    registry.push_moving(Body::new(Vec2::zeros(), Vec2::zeros(), 1.0), Presentation::new("A", Vec3::zeros(), 100));
    registry.push_moving(Body::new(Vec2::new(15.0, 0.0), Vec2::zeros(), 1.0), Presentation::new("B", Vec3::zeros(), 100));
    let mut world = WorldBuilder::new(SimulationConfig::default().with_multithreading(false))
        .with_registry(registry)
        .build()
        .expect("world");

    let report = world.step(0.1).expect("frame");
    assert_eq!(report.body_contacts, 2);
    assert_eq!(world.registry().info(BodyRef::moving(0)).health.get(), 80);
    assert_eq!(world.registry().info(BodyRef::moving(1)).health.get(), 60);
    assert_eq!(world.registry().info(BodyRef::blocking(0)).health.get(), 80);

    let events = world.drain_events();
    assert_eq!(events[0].name_b, "B");
    assert_eq!(events[0].health_b, 80);
    assert_eq!(events[1].name_b, "X");
    assert_eq!(events[1].health_a, 60);
}

#[test]
fn test_worker_fault_aborts_frame() {
    let mut world = WorldBuilder::new(SimulationConfig::default().with_worker_threads(1))
        .with_registry(pair_world(false).registry().clone())
        .with_resolver(&FaultyResolver)
        .build()
        .expect("world");
    assert!(world.is_multithreaded());

    match world.step(0.1) {
        Err(SimulationError::Scheduler(SchedulerError::WorkerPanicked { worker, message })) => {
            assert_eq!(worker, 0);
            assert!(message.contains("resolver fault"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(world.frame(), 0);
    assert_eq!(world.registry().moving()[0].position, Vec2::zeros());
}

#[test]
fn test_blocker_hit_damages_blocker() {
    let mut registry = BodyRegistry::new();
    registry.push_blocking(Body::stationary(Vec2::new(5.0, 0.0), 1.0), Presentation::new("wall-ish", Vec3::zeros(), 100));
    registry.push_moving(Body::new(Vec2::zeros(), Vec2::new(1.0, 0.0), 1.0), Presentation::new("mover", Vec3::zeros(), 100));
    let mut world = WorldBuilder::new(SimulationConfig::default().with_multithreading(false))
        .with_registry(registry)
        .build()
        .expect("world");

    world.step(0.5).expect("frame");
    assert_eq!(world.registry().blocking_info()[0].health.get(), 80);
    assert_eq!(world.registry().moving_info()[0].health.get(), 80);
    assert_eq!(world.registry().blocking()[0].position, Vec2::new(5.0, 0.0));
}

#[test]
fn test_body_on_wall_bounces_back() {
    let mut registry = BodyRegistry::new();
    registry.push_moving(
        Body::new(Vec2::new(2000.0, 0.0), Vec2::new(3.0, 1.0), 1.0),
        Presentation::new("edge", Vec3::zeros(), 100),
    );
    let mut world = WorldBuilder::new(SimulationConfig::default().with_multithreading(false))
        .with_registry(registry)
        .build()
        .expect("world");

    let report = world.step(1.0).expect("frame");
    assert_eq!(report.wall_contacts, 1);
    let body = world.registry().moving()[0];
    assert!(body.velocity.x < 0.0);
    assert_relative_eq!(body.velocity, Vec2::new(-3.0, 1.0));
    assert!(body.position.x < 2000.0);
    assert_eq!(world.registry().moving_info()[0].health.get(), 100);
    assert!(world.drain_events().is_empty());

    // Now heading back inside: free flight
    let report = world.step(1.0).expect("frame");
    assert_eq!(report.wall_contacts, 0);
    world.verify().expect("grid");
}

#[test]
fn test_shutdown_falls_back_to_single_thread() {
    let mut world = SimulationWorld::new(busy_config(CollisionStrategy::Grid).with_multithreading(true).with_worker_threads(2))
        .expect("world");
    world.step(0.05).expect("pooled frame");
    world.shutdown();
    assert_eq!(world.worker_count(), 0);
    assert!(!world.is_multithreaded());
    let report = world.step(0.05).expect("single frame");
    assert!(!report.multithreaded);
    assert_eq!(report.frame, 2);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = SimulationWorld::new(SimulationConfig::default().with_population(0));
    assert!(matches!(result, Err(SimulationError::Config(ConfigError::Invalid { field: "population", .. }))));

    let result = WorldBuilder::new(SimulationConfig::default()).with_registry(BodyRegistry::new()).build();
    assert!(result.is_err());
}

#[test]
fn test_blocking_only_world_steps() {
    let mut registry = BodyRegistry::new();
    registry.push_blocking(Body::stationary(Vec2::zeros(), 1.0), Presentation::new("rock", Vec3::zeros(), 100));
    let mut world = WorldBuilder::new(SimulationConfig::default().with_worker_threads(2))
        .with_registry(registry)
        .build()
        .expect("world");
    let report = world.step(0.1).expect("frame");
    assert_eq!(report.body_contacts, 0);
    assert_eq!(world.registry().info(BodyRef::blocking(0)).health.get(), 100);
}
