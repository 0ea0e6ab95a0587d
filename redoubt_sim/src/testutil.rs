// Test-support rig: a small world with two hostile factions and helpers to
// drive a single task tick by tick, outside the full `Simulation` stepper.
//
// Unit tests for task state machines want precise control: spawn exactly
// these entities, advance exactly this many ticks, inspect events and
// follow-up orders. The rig owns the pieces a `TaskCtx` borrows and
// reproduces the stepper's per-tick wiring without its queue management.

use crate::config::{GameConfig, Prototype};
use crate::event::SimEvent;
use crate::faction::Faction;
use crate::task::{AnyTask, Task, TaskCtx};
use crate::types::{EntityId, FactionId, Point, ResourceKind, TimeStep};
use crate::world::World;

pub(crate) struct Rig {
    pub world: World,
    pub config: GameConfig,
    pub tick: u64,
    pub events: Vec<SimEvent>,
    pub followups: Vec<(EntityId, AnyTask)>,
    /// Value fed to `TaskCtx::queued_behind`; tests that simulate a
    /// non-empty queue set this.
    pub queued_behind: usize,
}

impl Rig {
    /// 32x32 world, factions 1 ("north") and 2 ("south"), mutually hostile
    /// by default, each with a 500/500 stockpile.
    pub fn new() -> Self {
        let mut world = World::new(32, 32);
        world.register_faction(Faction::new(FactionId(1), "north", 500, 500));
        world.register_faction(Faction::new(FactionId(2), "south", 500, 500));
        Self {
            world,
            config: GameConfig::standard(),
            tick: 0,
            events: Vec::new(),
            followups: Vec::new(),
            queued_behind: 0,
        }
    }

    /// Register a bespoke prototype so tests can pin exact stats.
    pub fn add_prototype(&mut self, proto: Prototype) {
        self.config.prototypes.insert(proto.name.clone(), proto);
    }

    pub fn spawn(&mut self, proto: &str, faction: u32, cell: Point) -> EntityId {
        let proto = self
            .config
            .prototype(proto)
            .unwrap_or_else(|| panic!("no prototype named {proto}"))
            .clone();
        self.world.spawn_unit(&proto, FactionId(faction), cell, false)
    }

    pub fn spawn_node(
        &mut self,
        kind: ResourceKind,
        amount: u32,
        cell: Point,
    ) -> EntityId {
        self.world.spawn_node(kind, amount, cell, 1)
    }

    /// Advance one tick, updating a single task.
    pub fn drive(&mut self, task: &mut dyn Task) {
        self.tick += 1;
        let mut ctx = TaskCtx {
            world: &mut self.world,
            config: &self.config,
            events: &mut self.events,
            step: TimeStep { tick: self.tick, delta: self.config.tick_duration_secs },
            queued_behind: self.queued_behind,
            followups: &mut self.followups,
        };
        task.update(&mut ctx);
    }

    /// Drive until the task ends or `max_ticks` elapse. Returns the ticks
    /// spent; asserts the task actually ended.
    pub fn drive_to_end(&mut self, task: &mut dyn Task, max_ticks: u64) -> u64 {
        for spent in 0..max_ticks {
            if task.has_ended() {
                return spent;
            }
            self.drive(task);
        }
        assert!(task.has_ended(), "task still running after {max_ticks} ticks");
        max_ticks
    }

    pub fn health(&self, id: EntityId) -> f32 {
        self.world.get(id).and_then(|e| e.health).map(|h| h.current).unwrap_or(0.0)
    }

    pub fn cell(&self, id: EntityId) -> Point {
        self.world
            .get(id)
            .and_then(|e| e.spatial.as_ref())
            .map(|s| s.cell())
            .unwrap_or(Point::new(-1, -1))
    }
}
