// Scenario builder for lockstep parity tests.
//
// Lockstep multiplayer only works if every peer stepping the same order
// stream reaches bit-identical state. These helpers build a deterministic
// "match": two factions with keeps, an economy, a construction project,
// production, research, and fighting across the middle — so a single run
// exercises every task kind the engine has. The integration tests in
// `tests/` build the match twice (or snapshot it mid-run) and compare full
// serialized state.
//
// Everything here uses only public `redoubt_sim` API, the same calls a real
// command pipeline would make.

use redoubt_sim::combat::{AttackTask, HealTask, StandGuardTask, ZoneAttackTask};
use redoubt_sim::config::GameConfig;
use redoubt_sim::construction::{BuildTask, BuildingPlan};
use redoubt_sim::faction::Faction;
use redoubt_sim::harvest::HarvestTask;
use redoubt_sim::production::{ResearchTask, TrainTask};
use redoubt_sim::sim::Simulation;
use redoubt_sim::task::AnyTask;
use redoubt_sim::transport::EmbarkTask;
use redoubt_sim::types::{EntityId, FactionId, Point, ResourceKind};

pub const NORTH: FactionId = FactionId(1);
pub const SOUTH: FactionId = FactionId(2);

fn spawn(sim: &mut Simulation, proto: &str, faction: FactionId, cell: Point) -> EntityId {
    let proto = sim.config.prototype(proto).unwrap().clone();
    sim.world.spawn_unit(&proto, faction, cell, false)
}

/// Build the standard match and issue its opening orders. Pure function of
/// nothing: two calls produce identical simulations.
pub fn build_match() -> Simulation {
    let mut sim = Simulation::new(GameConfig::standard());
    sim.world.register_faction(Faction::new(NORTH, "north", 600, 600));
    sim.world.register_faction(Faction::new(SOUTH, "south", 600, 600));

    // Bases.
    let north_keep = spawn(&mut sim, "keep", NORTH, Point::new(10, 10));
    let _south_keep = spawn(&mut sim, "keep", SOUTH, Point::new(50, 50));

    // Economy: two nodes, two harvesters.
    let aladdium_node = sim.world.spawn_node(ResourceKind::Aladdium, 200, Point::new(20, 10), 2);
    let alagene_node = sim.world.spawn_node(ResourceKind::Alagene, 150, Point::new(12, 20), 2);
    let miner_a = spawn(&mut sim, "worker", NORTH, Point::new(15, 10));
    let miner_b = spawn(&mut sim, "worker", NORTH, Point::new(11, 15));
    sim.give_order(miner_a, AnyTask::Harvest(HarvestTask::new(miner_a, aladdium_node)));
    sim.give_order(miner_b, AnyTask::Harvest(HarvestTask::new(miner_b, alagene_node)));

    // Construction.
    let builder = spawn(&mut sim, "worker", NORTH, Point::new(14, 14));
    let plan = BuildingPlan::new(NORTH, "house", Point::new(16, 16));
    sim.give_order(builder, AnyTask::Build(BuildTask::new(builder, plan)));

    // Production and research at the north keep; rally on the aladdium
    // node so the trained worker goes straight to mining.
    sim.world.get_mut(north_keep).unwrap().rally_point = Some(Point::new(20, 10));
    sim.give_order(north_keep, AnyTask::Train(TrainTask::new(north_keep, "worker")));
    let researcher = spawn(&mut sim, "keep", NORTH, Point::new(4, 20));
    sim.give_order(researcher, AnyTask::Research(ResearchTask::new(researcher, "deep_extraction")));

    // Defense and offense across the middle.
    let guard = spawn(&mut sim, "warrior", NORTH, Point::new(18, 12));
    sim.give_order(guard, AnyTask::StandGuard(StandGuardTask::new(guard)));
    let raider = spawn(&mut sim, "warrior", SOUTH, Point::new(40, 40));
    sim.give_order(raider, AnyTask::ZoneAttack(ZoneAttackTask::new(raider, Point::new(14, 8))));

    // A direct attack order with a live victim.
    let skirmisher = spawn(&mut sim, "warrior", SOUTH, Point::new(30, 14));
    let picket = spawn(&mut sim, "worker", NORTH, Point::new(24, 14));
    sim.give_order(skirmisher, AnyTask::Attack(AttackTask::new(skirmisher, picket)));

    // Field medicine.
    let medic = spawn(&mut sim, "medic", SOUTH, Point::new(44, 44));
    let wounded = spawn(&mut sim, "warrior", SOUTH, Point::new(46, 44));
    if let Some(h) = sim.world.get_mut(wounded).unwrap().health.as_mut() {
        h.current = 30.0;
    }
    sim.give_order(medic, AnyTask::Heal(HealTask::new(medic, wounded)));

    // Transport.
    let barge = spawn(&mut sim, "barge", SOUTH, Point::new(54, 44));
    let passenger = spawn(&mut sim, "worker", SOUTH, Point::new(52, 48));
    sim.give_order(passenger, AnyTask::Embark(EmbarkTask::new(passenger, barge)));

    sim
}

/// Serialized snapshot used for peer comparison.
pub fn state_hash(sim: &Simulation) -> String {
    sim.to_json().expect("simulation state must serialize")
}
