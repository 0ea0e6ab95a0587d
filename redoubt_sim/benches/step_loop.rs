// Benchmark of the Simulation::step hot loop under a realistic load: a
// harvesting economy plus a guard line, all with active tasks.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use redoubt_sim::combat::StandGuardTask;
use redoubt_sim::config::GameConfig;
use redoubt_sim::faction::Faction;
use redoubt_sim::harvest::HarvestTask;
use redoubt_sim::sim::Simulation;
use redoubt_sim::task::AnyTask;
use redoubt_sim::types::{FactionId, Point, ResourceKind};

fn busy_simulation() -> Simulation {
    let config = GameConfig::standard();
    let mut sim = Simulation::new(config);
    sim.world.register_faction(Faction::new(FactionId(1), "north", 1000, 1000));
    sim.world.register_faction(Faction::new(FactionId(2), "south", 1000, 1000));

    let keep_proto = sim.config.prototype("keep").unwrap().clone();
    let worker_proto = sim.config.prototype("worker").unwrap().clone();
    let warrior_proto = sim.config.prototype("warrior").unwrap().clone();

    sim.world.spawn_unit(&keep_proto, FactionId(1), Point::new(60, 60), false);

    for i in 0..8 {
        sim.world.spawn_node(ResourceKind::Aladdium, 10_000, Point::new(20 + i * 10, 20), 2);
    }

    for i in 0..50u32 {
        let cell = Point::new(10 + (i as i32 % 20) * 2, 40 + (i as i32 / 20) * 2);
        let worker = sim.world.spawn_unit(&worker_proto, FactionId(1), cell, false);
        let node = sim.world.node_at(Point::new(20 + (i as i32 % 8) * 10, 20)).unwrap();
        sim.give_order(worker, AnyTask::Harvest(HarvestTask::new(worker, node)));
    }

    for i in 0..20u32 {
        let cell = Point::new(10 + (i as i32) * 2, 80);
        let guard = sim.world.spawn_unit(&warrior_proto, FactionId(1), cell, false);
        sim.give_order(guard, AnyTask::StandGuard(StandGuardTask::new(guard)));
    }

    // Warm up: let paths get computed and phases settle.
    sim.run(20);
    sim
}

fn bench_step(c: &mut Criterion) {
    let sim = busy_simulation();
    c.bench_function("step_70_active_tasks", |b| {
        b.iter_batched(
            || sim.clone(),
            |mut s| {
                s.run(10);
                s
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
