// The simulation stepper: fixed-timestep tick loop over entities and their
// task queues.
//
// `Simulation` owns the `World`, the `GameConfig`, and one `TaskQueue` per
// ordered entity. Each `step()` advances one tick: entities are visited in
// deterministic handle order, the live task at the front of each queue gets
// exactly one `update`, follow-up orders emitted during the update are
// applied in emission order, and a death sweep closes the tick — removing
// every entity whose health reached zero and disposing its queue (which is
// how a cancelled research registration unwinds, see `production.rs`).
//
// The command pipeline that creates tasks lives outside this crate; its
// hooks are `give_order` (override the queue) and `enqueue_order` (append).
// Events raised by those calls between ticks are delivered with the next
// step's result.
//
// Save/load doubles as lockstep state transfer: the whole simulation
// serializes to JSON (`to_json`/`from_json`); two peers stepping identical
// order streams must produce byte-identical snapshots.
//
// See also: `task.rs` for queues and the update context, `world.rs` for the
// arena, `event.rs` for the emitted events.
//
// **Critical constraint: determinism.** Entity visit order is arena slot
// order; queue bookkeeping uses `BTreeMap`; no randomness anywhere in the
// engine. Any divergence between peers is a bug in this file or below it.

use crate::config::GameConfig;
use crate::event::{SimEvent, SimEventKind};
use crate::task::{AnyTask, Task, TaskCtx, TaskQueue};
use crate::types::{EntityId, TimeStep};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The result of advancing the simulation one tick.
pub struct StepResult {
    /// Events emitted during this step, for the embedding shell.
    pub events: Vec<SimEvent>,
}

/// Top-level simulation state: world, config, and per-entity task queues.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Simulation {
    /// Current simulation tick.
    pub tick: u64,
    pub config: GameConfig,
    pub world: World,
    queues: BTreeMap<EntityId, TaskQueue>,
    /// Events raised between ticks (order management), delivered with the
    /// next step.
    pending_events: Vec<SimEvent>,
}

impl Simulation {
    /// Create a simulation with an empty world sized from the config.
    pub fn new(config: GameConfig) -> Self {
        let (width, height) = config.world_size;
        Self::with_world(config, World::new(width, height))
    }

    pub fn with_world(config: GameConfig, world: World) -> Self {
        Self {
            tick: 0,
            config,
            world,
            queues: BTreeMap::new(),
            pending_events: Vec::new(),
        }
    }

    // -- order management (the command pipeline's hooks) -------------------

    /// Cancel whatever the entity is doing (disposing the outgoing tasks)
    /// and install a new active task.
    pub fn give_order(&mut self, entity: EntityId, task: AnyTask) {
        self.queues
            .entry(entity)
            .or_default()
            .override_with(task, &mut self.world, &mut self.pending_events);
    }

    /// Append a task behind everything the entity already has queued.
    pub fn enqueue_order(&mut self, entity: EntityId, task: AnyTask) {
        self.queues.entry(entity).or_default().enqueue(task);
    }

    pub fn queue(&self, entity: EntityId) -> Option<&TaskQueue> {
        self.queues.get(&entity)
    }

    /// Description of what an entity is currently doing, if anything.
    pub fn current_activity(&self, entity: EntityId) -> Option<String> {
        self.queues
            .get(&entity)
            .and_then(TaskQueue::current)
            .map(Task::description)
    }

    // -- tick loop ---------------------------------------------------------

    /// Advance exactly one tick.
    pub fn step(&mut self) -> StepResult {
        self.tick += 1;
        let step = TimeStep { tick: self.tick, delta: self.config.tick_duration_secs };
        let mut events = std::mem::take(&mut self.pending_events);
        let mut followups: Vec<(EntityId, AnyTask)> = Vec::new();

        // Snapshot the entity list: entities spawned mid-tick (trained
        // units, placed buildings) are first updated next tick.
        for id in self.world.entity_ids() {
            let Some(mut queue) = self.queues.remove(&id) else { continue };
            queue.advance(&mut self.world, &mut events);
            let queued_behind = queue.len().saturating_sub(1);
            if let Some(task) = queue.current_mut() {
                let mut ctx = TaskCtx {
                    world: &mut self.world,
                    config: &self.config,
                    events: &mut events,
                    step,
                    queued_behind,
                    followups: &mut followups,
                };
                task.update(&mut ctx);
            }
            queue.advance(&mut self.world, &mut events);
            if !queue.is_empty() {
                self.queues.insert(id, queue);
            }
            // Follow-up orders land immediately, in emission order.
            for (target, task) in followups.drain(..) {
                self.queues.entry(target).or_default().enqueue(task);
            }
        }

        self.sweep(&mut events);
        StepResult { events }
    }

    /// Advance `ticks` ticks, collecting all events.
    pub fn run(&mut self, ticks: u64) -> Vec<SimEvent> {
        let mut all = Vec::new();
        for _ in 0..ticks {
            all.extend(self.step().events);
        }
        all
    }

    /// End-of-tick death sweep: entities at zero health leave the world,
    /// and every queue whose entity is gone is disposed (releasing held
    /// registrations) and dropped.
    fn sweep(&mut self, events: &mut Vec<SimEvent>) {
        let dead: Vec<EntityId> = self
            .world
            .entities()
            .filter(|e| e.health.is_some_and(|h| h.current <= 0.0))
            .map(|e| e.id)
            .collect();
        for id in dead {
            self.world.despawn(id);
            events.push(SimEvent { tick: self.tick, kind: SimEventKind::EntityDied { entity: id } });
        }

        // Tasks may also have removed entities (depleted nodes, carried
        // units of a destroyed transporter): their queues go too.
        let orphaned: Vec<EntityId> = self
            .queues
            .keys()
            .copied()
            .filter(|id| !self.world.is_alive(*id))
            .collect();
        for id in orphaned {
            if let Some(mut queue) = self.queues.remove(&id) {
                queue.dispose_all(&mut self.world, events);
            }
        }
    }

    // -- save/load ---------------------------------------------------------

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::AttackTask;
    use crate::faction::Faction;
    use crate::movement::MoveTask;
    use crate::pathfinding::PathDestination;
    use crate::production::ResearchTask;
    use crate::types::{FactionId, Point, ResourceKind};

    fn two_faction_sim() -> Simulation {
        let mut sim = Simulation::new(GameConfig::standard());
        sim.world.register_faction(Faction::new(FactionId(1), "north", 500, 500));
        sim.world.register_faction(Faction::new(FactionId(2), "south", 500, 500));
        sim
    }

    fn spawn(sim: &mut Simulation, proto: &str, faction: u32, cell: Point) -> EntityId {
        let proto = sim.config.prototype(proto).unwrap().clone();
        sim.world.spawn_unit(&proto, FactionId(faction), cell, false)
    }

    #[test]
    fn attacker_falls_back_to_last_known_position() {
        let mut sim = two_faction_sim();
        let attacker = spawn(&mut sim, "warrior", 1, Point::new(1, 4));
        let victim = spawn(&mut sim, "worker", 2, Point::new(8, 4));

        sim.give_order(attacker, AnyTask::Attack(AttackTask::new(attacker, victim)));
        sim.run(10);
        assert!(sim.world.is_alive(victim));

        // The victim dies mid-approach (zero health; the sweep removes it).
        if let Some(h) = sim.world.get_mut(victim).unwrap().health.as_mut() {
            h.current = 0.0;
        }
        let events = sim.run(2);
        assert!(events.iter().any(|e| matches!(
            e.kind,
            SimEventKind::EntityDied { entity } if entity == victim
        )));

        // The fallback move order took the queue over and walks the
        // attacker to the victim's last known cell.
        assert!(sim
            .current_activity(attacker)
            .is_some_and(|d| d.starts_with("moving to")));
        sim.run(400);
        let cell = sim.world.get(attacker).unwrap().spatial.as_ref().unwrap().cell();
        assert_eq!(cell, Point::new(8, 4));
        assert!(sim.queue(attacker).is_none_or(TaskQueue::is_empty));
    }

    #[test]
    fn override_disposes_in_flight_research() {
        let mut sim = two_faction_sim();
        let keep = spawn(&mut sim, "keep", 1, Point::new(8, 8));
        let before = sim.world.faction(FactionId(1)).unwrap().resource(ResourceKind::Aladdium);

        sim.give_order(keep, AnyTask::Research(ResearchTask::new(keep, "hardened_plating")));
        sim.run(20);
        let f = sim.world.faction(FactionId(1)).unwrap();
        assert!(f.is_researching("hardened_plating"));
        assert_eq!(f.resource(ResourceKind::Aladdium), before - 150);

        // A new order cancels the research through the disposal hook.
        sim.give_order(keep, AnyTask::Research(ResearchTask::new(keep, "deep_extraction")));
        let f = sim.world.faction(FactionId(1)).unwrap();
        assert!(!f.is_researching("hardened_plating"));
        assert_eq!(f.resource(ResourceKind::Aladdium), before);
    }

    #[test]
    fn dying_researcher_reimburses_through_queue_disposal() {
        let mut sim = two_faction_sim();
        let keep = spawn(&mut sim, "keep", 1, Point::new(8, 8));
        let before = sim.world.faction(FactionId(1)).unwrap().resource(ResourceKind::Alagene);

        sim.give_order(keep, AnyTask::Research(ResearchTask::new(keep, "deep_extraction")));
        sim.run(5);
        assert!(sim.world.faction(FactionId(1)).unwrap().is_researching("deep_extraction"));

        if let Some(h) = sim.world.get_mut(keep).unwrap().health.as_mut() {
            h.current = 0.0;
        }
        sim.run(1);
        assert!(!sim.world.is_alive(keep));
        let f = sim.world.faction(FactionId(1)).unwrap();
        assert!(!f.is_researching("deep_extraction"));
        assert_eq!(f.resource(ResourceKind::Alagene), before);
    }

    #[test]
    fn tasks_get_one_update_and_finished_tasks_advance() {
        let mut sim = two_faction_sim();
        let worker = spawn(&mut sim, "worker", 1, Point::new(2, 2));
        sim.give_order(worker, AnyTask::Move(MoveTask::new(worker, PathDestination::Cell(Point::new(4, 2)))));
        sim.enqueue_order(worker, AnyTask::Move(MoveTask::new(worker, PathDestination::Cell(Point::new(6, 2)))));

        sim.run(800);
        let cell = sim.world.get(worker).unwrap().spatial.as_ref().unwrap().cell();
        assert_eq!(cell, Point::new(6, 2), "queued orders must run in sequence");
        assert!(sim.queue(worker).is_none_or(TaskQueue::is_empty));
    }

    #[test]
    fn binary_snapshot_roundtrip() {
        let mut sim = two_faction_sim();
        let worker = spawn(&mut sim, "worker", 1, Point::new(2, 2));
        sim.give_order(
            worker,
            AnyTask::Move(MoveTask::new(worker, PathDestination::Cell(Point::new(10, 10)))),
        );
        sim.run(30);

        let bytes = bincode::serialize(&sim).unwrap();
        let restored: Simulation = bincode::deserialize(&bytes).unwrap();
        assert_eq!(sim.to_json().unwrap(), restored.to_json().unwrap());
    }

    #[test]
    fn snapshot_roundtrip_preserves_state() {
        let mut sim = two_faction_sim();
        let worker = spawn(&mut sim, "worker", 1, Point::new(2, 2));
        sim.give_order(
            worker,
            AnyTask::Move(MoveTask::new(worker, PathDestination::Cell(Point::new(20, 20)))),
        );
        sim.run(50);

        let json = sim.to_json().unwrap();
        let mut restored = Simulation::from_json(&json).unwrap();

        // Both copies must continue identically.
        sim.run(100);
        restored.run(100);
        assert_eq!(sim.to_json().unwrap(), restored.to_json().unwrap());
    }
}
