use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_sim::observer::ObserverRegistry;
use strata_sim::{rebuild_activation, Command, FloorTable, ObserverDesc, Prototype, SimConfig, SimWorld};

fn crowded_floors() -> (FloorTable, ObserverRegistry) {
    let mut floors = FloorTable::new();
    for z in -4..=0 {
        floors.spawn(z, 32, 32, 32, 32);
    }
    let mut observers = ObserverRegistry::new();
    for i in 0..16 {
        observers.register(ObserverDesc {
            z: -(i % 5),
            tile_x: 64 * i,
            tile_y: 48 * i,
            hot_radius: 64,
            warm_radius: 160,
            hot_z_layers: 1,
            warm_z_layers: 2,
        });
    }
    (floors, observers)
}

fn bench_rebuild(c: &mut Criterion) {
    let (mut floors, observers) = crowded_floors();
    c.bench_function("rebuild_activation_16_observers", |b| {
        b.iter(|| rebuild_activation(black_box(&mut floors), black_box(&observers), 0, 1, 8))
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut sim = SimWorld::with_config(SimConfig {
        start_paused: true,
        ..Default::default()
    });
    sim.spawn_floor(0, 16, 16, 32, 32);
    sim.register_observer(ObserverDesc::at(0, 256, 256));
    let proto = sim.register_prototype(Prototype::new("walker").with_anim_flags(0));
    for i in 0..1000 {
        sim.spawn_entity(proto, (i % 500) as f32, (i / 2) as f32, 0);
    }

    c.bench_function("tick_1000_entities", |b| {
        b.iter(|| {
            for id in 1..=100 {
                sim.enqueue(Command::Move { entity: id, dx: 0.1, dy: 0.0 });
            }
            sim.step_ticks(1)
        })
    });
}

criterion_group!(benches, bench_rebuild, bench_tick);
criterion_main!(benches);
