//! Basic demonstration of the Strata simulation core.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=strata_sim=debug` for per-command logging.

use strata_sim::{
    hash_name, state_keys, tags, Command, InventorySlot, ItemType, ObserverDesc, Production,
    Prototype, RawCommand, SimWorld,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Strata - Simulation Demo ===\n");

    let mut sim = SimWorld::new();
    sim.spawn_floor(0, 4, 4, 32, 32);
    sim.spawn_floor(1, 2, 2, 32, 32);
    sim.spawn_floor(-1, 4, 4, 32, 32);

    let walker = sim.register_prototype(Prototype::new("walker").with_anim_flags(0));
    sim.register_prototype(
        Prototype::new("stone_drill")
            .with_inventory(vec![InventorySlot::output()])
            .with_production(Production::new(ItemType::Stone, 30)),
    );

    let observer = sim.register_observer(ObserverDesc::at(0, 16, 16));

    // Spawn through the raw ABI, exactly as a scripting host would.
    sim.enqueue_raw(RawCommand {
        tag: tags::SPAWN,
        a: walker,
        x: 16.0,
        y: 16.0,
        z: 0.0,
        ..Default::default()
    });
    sim.enqueue_raw(RawCommand {
        tag: tags::SPAWN,
        a: hash_name("stone_drill"),
        x: 70.0,
        y: 40.0,
        z: -1.0,
        ..Default::default()
    });
    sim.enqueue(Command::FollowEntity { observer, entity: 1 });
    sim.enqueue(Command::SetStateFlag {
        entity: 1,
        key: state_keys::MOVING,
        value: state_keys::TRUE,
    });
    sim.enqueue(Command::SetStateFlag {
        entity: 1,
        key: state_keys::FACING,
        value: state_keys::EAST,
    });

    sim.set_tick_listener(|signal| {
        tracing::debug!(tick = signal.tick, ran = signal.ticks_run, "tick signal");
    });

    // Two seconds of uneven host frames.
    let frames = [0.016, 0.017, 0.033, 0.008, 0.016];
    let mut elapsed = 0.0;
    let mut frame = 0;
    while elapsed < 2.0 {
        let dt = frames[frame % frames.len()];
        sim.enqueue(Command::Move { entity: 1, dx: 0.25, dy: 0.0 });
        let alpha = sim.advance(dt);
        elapsed += dt;
        frame += 1;

        if frame % 30 == 0 {
            print_state(&sim, alpha);
        }
    }

    // A long stall: the tick cap keeps the catch-up bounded.
    let before = sim.current_tick();
    sim.advance(1.0);
    println!("\nStall of 1s ran {} ticks\n", sim.current_tick() - before);

    println!("=== Stats (JSON) ===\n{}\n", sim.stats_json());
    println!("=== Final Snapshot (JSON) ===\n{}", sim.snapshot_json());
}

fn print_state(sim: &SimWorld, alpha: f32) {
    let Some(snapshot) = sim.snapshot_current() else {
        println!("tick {}: no entities", sim.current_tick());
        return;
    };
    println!("--- Tick {} (alpha {:.2}) ---", snapshot.tick, alpha);
    for r in &snapshot.records {
        println!(
            "  entity {}: pos=({:.2}, {:.2}) z={} angle={:.2} flags={:#04x}",
            r.id, r.x, r.y, r.z, r.angle, r.flags
        );
    }
    if let Some(o) = sim.observer(1) {
        println!("  observer 1: z={} tile=({}, {})", o.z, o.tile_x, o.tile_y);
    }
    let stats = sim.stats();
    for f in &stats.floor_stats {
        println!("  floor {:>2}: hot={} warm={}", f.z, f.hot, f.warm);
    }
}
