// redoubt_sim — pure Rust RTS task-engine library.
//
// This crate contains the per-entity behavior engine of Redoubt: the
// component that turns a queued high-level order ("attack X", "harvest node
// N", "build a house at P") into a frame-by-frame state machine driving
// movement, combat, resource extraction, construction and production. It
// has zero rendering or networking dependencies and runs headless; the
// command pipeline and the simulation shell live outside and talk to
// `Simulation` through orders and events.
//
// Module overview:
// - `sim.rs`:          Top-level Simulation, tick loop, order hooks, death sweep.
// - `world.rs`:        Terrain grid + generational entity arena + spatial queries.
// - `entity.rs`:       Entities and their optional capability components.
// - `faction.rs`:      Resource ledgers, food, research registers, diplomacy.
// - `task.rs`:         Task contract, the closed task sum type, per-entity queues.
// - `movement.rs`:     Move (repathing waypoint-follower) and Follow (hysteresis).
// - `combat.rs`:       Attack, Heal, Stand Guard, Zone Attack.
// - `harvest.rs`:      Extract/deliver shuttle with depot re-search.
// - `construction.rs`: Building plans, Build, credit-funded Repair.
// - `production.rs`:   Train (deploy-ring search, rally orders) and Research.
// - `transport.rs`:    Embark (board a transporter).
// - `credit.rs`:       Fractional-cost credit protocol over integer ledgers.
// - `pathfinding.rs`:  Best-effort grid A* behind the `find_path` seam.
// - `event.rs`:        SimEvent output stream (including faction warnings).
// - `config.rs`:       GameConfig + prototype/technology tables.
// - `types.rs`:        Handles, cells, regions, resource kinds, time step.
//
// **Critical constraint: determinism.** The simulation is driven by a
// lockstep command stream: every peer steps the same orders and must reach
// bit-identical state. No wall clock, no OS entropy, no hash-map iteration;
// ordered collections are `BTreeMap`/`Vec` and every nearest-X query breaks
// ties on entity handle. Use `lockstep_tests` to check end-to-end parity.

pub mod combat;
pub mod config;
pub mod construction;
pub mod credit;
pub mod entity;
pub mod event;
pub mod faction;
pub mod harvest;
pub mod movement;
pub mod pathfinding;
pub mod production;
pub mod sim;
pub mod task;
#[cfg(test)]
pub(crate) mod testutil;
pub mod transport;
pub mod types;
pub mod world;
