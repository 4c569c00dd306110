//! End-to-end tick scenarios through the public `SimWorld` API.

use strata_sim::observer::{ObserverRegistry, MAX_Z_LAYERS};
use strata_sim::world::{unpack_chunk_key, MAX_FLOOR_CHUNKS};
use strata_sim::{
    rebuild_activation, tags, Command, FixedStepClock, FloorTable, ObserverDesc, Prototype,
    RawCommand, SimConfig, SimWorld, Snapshot,
};

fn paused_sim() -> SimWorld {
    SimWorld::with_config(SimConfig {
        start_paused: true,
        ..Default::default()
    })
}

fn spawn_walkers(sim: &mut SimWorld, n: u32) {
    let proto = sim.register_prototype(Prototype::new("walker").with_anim_flags(0));
    for i in 0..n {
        sim.spawn_entity(proto, i as f32 * 2.0, 1.0, 0);
    }
}

/// Hot/warm sets are disjoint and only hold chunks of the floor's grid.
fn assert_activation_consistent(sim: &SimWorld, z: i32) {
    let floor = sim.floor(z).unwrap();
    assert!(floor.hot_chunks().is_disjoint(floor.warm_chunks()));
    for &key in floor.hot_chunks().iter().chain(floor.warm_chunks()) {
        let (cx, cy) = unpack_chunk_key(key);
        assert!(floor.has_chunk(cx, cy), "chunk ({cx}, {cy}) outside floor {z}");
    }
}

fn raw(tag: u32, id: u32, a: u64, b: u64, x: f32, y: f32, z: f32) -> RawCommand {
    RawCommand { tag, id, a, b, x, y, z }
}

fn command_mix() -> Vec<Command> {
    vec![
        Command::Move { entity: 5, dx: 1.0, dy: 0.0 },
        Command::SetPosition { entity: 2, x: 30.0, y: 12.0 },
        Command::Move { entity: 2, dx: -4.0, dy: 2.5 },
        Command::SetFloor { entity: 3, z: -2 },
        Command::Move { entity: 3, dx: 0.5, dy: 0.5 },
        Command::Destroy { entity: 4 },
        Command::Move { entity: 4, dx: 9.0, dy: 9.0 },
        Command::SetPosition { entity: 5, x: 0.0, y: 0.0 },
        Command::Move { entity: 5, dx: 1.0, dy: 1.0 },
    ]
}

fn final_snapshot(sim: &SimWorld) -> Snapshot {
    (*sim.snapshot_current().unwrap()).clone()
}

#[test]
fn test_batched_commands_match_one_by_one() {
    let mut batched = paused_sim();
    spawn_walkers(&mut batched, 6);
    for cmd in command_mix() {
        batched.enqueue(cmd);
    }
    batched.step_ticks(1);

    let mut stepped = paused_sim();
    spawn_walkers(&mut stepped, 6);
    let mix = command_mix();
    for cmd in &mix {
        stepped.enqueue(cmd.clone());
        stepped.step_ticks(1);
    }
    let a = final_snapshot(&batched);
    let b = final_snapshot(&stepped);
    assert_eq!(a.records, b.records);
    assert_eq!(batched.entity_count(), 5);
}

#[test]
fn test_activation_rebuild_is_idempotent() {
    let mut floors = FloorTable::new();
    floors.spawn(0, 8, 8, 32, 32);
    floors.spawn(1, 2, 2, 32, 32);
    floors.spawn(-1, 8, 8, 16, 16);
    let mut observers = ObserverRegistry::new();
    observers.register(ObserverDesc {
        z: 0,
        tile_x: 100,
        tile_y: 70,
        hot_radius: 40,
        warm_radius: 90,
        hot_z_layers: 1,
        warm_z_layers: 1,
    });
    observers.register(ObserverDesc::at(-1, 5, 5));

    rebuild_activation(&mut floors, &observers, 0, 1, 8);
    let first: Vec<_> = floors
        .iter()
        .map(|f| (f.z, f.hot_chunks().clone(), f.warm_chunks().clone()))
        .collect();
    rebuild_activation(&mut floors, &observers, 0, 1, 8);
    let second: Vec<_> = floors
        .iter()
        .map(|f| (f.z, f.hot_chunks().clone(), f.warm_chunks().clone()))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_accumulator_bounds_over_random_frames() {
    let mut clock = FixedStepClock::new(60.0, 0.25, 8);
    let mut seed: u32 = 12345;
    for _ in 0..5000 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let dt = (seed >> 8) as f64 / (1u64 << 24) as f64 * 0.3;
        let report = clock.advance(dt, || {});
        assert!(report.ticks <= 8);
        assert!(clock.accumulator() >= 0.0 && clock.accumulator() < clock.fixed_dt());
        assert!(report.alpha >= 0.0 && report.alpha < 1.0);
    }
}

#[test]
fn test_snapshot_rows_track_entity_count() {
    let mut sim = paused_sim();
    sim.step_ticks(1);
    assert!(sim.snapshot_current().is_none());
    assert_eq!(sim.snapshot_row_count(), 0);

    spawn_walkers(&mut sim, 4);
    sim.step_ticks(1);
    assert_eq!(sim.snapshot_row_count(), 4);

    sim.enqueue(Command::Destroy { entity: 2 });
    sim.step_ticks(1);
    assert_eq!(sim.snapshot_row_count(), 3);
    assert_eq!(sim.snapshot_previous().unwrap().len(), 4);
}

#[test]
fn test_move_command_scenario() {
    let mut sim = paused_sim();
    spawn_walkers(&mut sim, 5);
    let before = sim.entity_transform(5).unwrap();

    sim.enqueue_raw(RawCommand {
        tag: tags::MOVE,
        id: 5,
        x: 1.0,
        y: 0.0,
        ..Default::default()
    });
    sim.step_ticks(1);

    let after = sim.entity_transform(5).unwrap();
    assert_eq!(after.grid_x, before.grid_x + 1.0);
    assert_eq!(after.grid_y, before.grid_y);
    assert_eq!(after.floor_z, before.floor_z);
}

#[test]
fn test_tile_radius_converts_to_chunks() {
    let mut sim = paused_sim();
    sim.spawn_floor(0, 8, 8, 32, 32);
    sim.register_observer(ObserverDesc {
        z: 0,
        tile_x: 4 * 32,
        tile_y: 4 * 32,
        hot_radius: 40,
        warm_radius: 40,
        hot_z_layers: 0,
        warm_z_layers: 0,
    });
    sim.step_ticks(1);

    let floor = sim.floor(0).unwrap();
    // ceil(40 / 32) = 2 chunks each way around chunk (4, 4).
    assert_eq!(floor.hot_chunks().len(), 25);
    assert!(floor.is_hot(2, 2) && floor.is_hot(6, 6));
    assert!(!floor.is_hot(7, 4));
}

#[test]
fn test_follow_tracks_same_tick_move() {
    let mut sim = paused_sim();
    spawn_walkers(&mut sim, 1);
    let observer = sim.register_observer(ObserverDesc::at(0, 0, 0));
    sim.enqueue(Command::FollowEntity { observer, entity: 1 });
    sim.step_ticks(1);

    sim.enqueue(Command::Move { entity: 1, dx: 3.0, dy: 0.0 });
    sim.step_ticks(1);

    let t = sim.entity_transform(1).unwrap();
    let o = sim.observer(observer).unwrap();
    assert_eq!((o.tile_x, o.tile_y, o.z), (t.grid_x.floor() as i32, t.grid_y.floor() as i32, 0));
    assert_eq!(o.tile_x, 3);
}

#[test]
fn test_long_stall_runs_capped_ticks() {
    let mut sim = SimWorld::with_config(SimConfig {
        max_frame_dt: 10.0,
        ..Default::default()
    });
    let alpha = sim.advance(2.0);
    assert_eq!(sim.current_tick(), 8);
    assert!((0.0..1.0).contains(&alpha));

    let alpha = sim.advance(0.0);
    assert_eq!(sim.current_tick(), 8);
    assert!((0.0..1.0).contains(&alpha));
}

#[test]
fn test_entity_without_transform_is_zeroed() {
    let mut sim = paused_sim();
    let proto = sim.register_prototype(Prototype::new("ledger").without_transform());
    let id = sim.spawn_entity(proto, 9.0, 9.0, 3).unwrap();
    sim.step_ticks(1);

    let snap = sim.snapshot_current().unwrap();
    let r = snap.get(id).unwrap();
    assert_eq!(r.id, id);
    assert_eq!((r.x, r.y, r.z, r.vx, r.vy, r.angle, r.flags), (0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0));
    assert!(sim.floor(3).is_none());
}

#[test]
fn test_independent_worlds_do_not_share_state() {
    let mut a = paused_sim();
    let mut b = paused_sim();
    spawn_walkers(&mut a, 3);
    a.step_ticks(2);
    b.step_ticks(1);
    assert_eq!(a.entity_count(), 3);
    assert_eq!(b.entity_count(), 0);
    assert_eq!(a.current_tick(), 2);
    assert_eq!(b.current_tick(), 1);
}

#[test]
fn test_unknown_raw_tag_is_skipped() {
    let mut sim = paused_sim();
    spawn_walkers(&mut sim, 1);
    sim.enqueue_raw(RawCommand {
        tag: 200,
        id: 1,
        ..Default::default()
    });
    sim.enqueue(Command::Move { entity: 1, dx: 2.0, dy: 0.0 });
    sim.step_ticks(1);
    assert_eq!(sim.entity_transform(1).unwrap().grid_x, 2.0);
    assert_eq!(sim.pending_commands(), 0);
}

#[test]
fn test_saturated_floor_z_keeps_ticking() {
    let mut sim = paused_sim();
    sim.enqueue_raw(raw(tags::SPAWN_FLOOR, 0, 4, 4, 0.0, 0.0, 1e10));
    sim.enqueue_raw(raw(tags::SPAWN_FLOOR, 0, 4, 4, 0.0, 0.0, -1e10));
    sim.enqueue_raw(raw(tags::SET_OBSERVER_POSITION, 0, 0, 0, 40.0, 40.0, 1e10));
    assert_eq!(sim.step_ticks(2), 2);

    assert!(sim.floor(i32::MAX).unwrap().is_hot(1, 1));
    assert_activation_consistent(&sim, i32::MAX);

    let deep = sim.register_observer(ObserverDesc {
        hot_z_layers: i32::MAX,
        warm_z_layers: i32::MAX,
        ..ObserverDesc::at(i32::MIN, 0, 0)
    });
    assert_eq!(sim.step_ticks(1), 1);
    assert!(sim.floor(i32::MIN).unwrap().is_hot(0, 0));
    assert_activation_consistent(&sim, i32::MIN);
    assert!(sim.observer(deep).unwrap().hot_layers(0) <= MAX_Z_LAYERS);
}

#[test]
fn test_oversized_floor_is_clamped_to_key_range() {
    let mut sim = paused_sim();
    sim.enqueue_raw(raw(tags::SPAWN_FLOOR, 0, u64::MAX, 1, 0.0, 0.0, 0.0));
    sim.enqueue_raw(raw(tags::SPAWN_FLOOR, 0, 70_000, 0, 0.0, 0.0, -1.0));
    // Tile 65536 * 32 would alias chunk (0, 0) without the clamp.
    sim.enqueue_raw(raw(tags::SET_OBSERVER_POSITION, 0, 0, 0, 65_536.0 * 32.0, 0.0, 0.0));
    assert_eq!(sim.step_ticks(1), 1);

    for z in [0, -1] {
        let floor = sim.floor(z).unwrap();
        assert_eq!(floor.chunks_w, MAX_FLOOR_CHUNKS);
        assert_eq!(floor.chunks_h, 1);
        assert!(!floor.is_hot(0, 0));
        assert!(floor.hot_chunks().is_empty());
        assert_activation_consistent(&sim, z);
    }

    sim.enqueue_raw(raw(tags::SET_OBSERVER_POSITION, 0, 0, 0, 1e12, -1e12, 0.0));
    assert_eq!(sim.step_ticks(1), 1);
    assert!(sim.floor(0).unwrap().hot_chunks().is_empty());
}

#[test]
fn test_extreme_positions_do_not_halt_ticks() {
    let mut sim = paused_sim();
    spawn_walkers(&mut sim, 2);
    sim.enqueue(Command::FollowEntity { observer: 0, entity: 1 });
    sim.enqueue_raw(raw(tags::SET_POSITION, 1, 0, 0, f32::MAX, f32::MIN, 0.0));
    sim.enqueue_raw(raw(tags::MOVE, 2, 0, 0, f32::INFINITY, f32::NAN, 0.0));
    sim.enqueue_raw(raw(tags::SET_FLOOR, 2, 0, 0, 0.0, 0.0, f32::NAN));
    assert_eq!(sim.step_ticks(3), 3);

    assert_eq!(sim.current_tick(), 3);
    assert_eq!(sim.snapshot_row_count(), 2);
    assert_activation_consistent(&sim, 0);
}
