// The task contract, the closed task sum type, and per-entity task queues.
//
// A task is one entity's current behavior state machine: it receives exactly
// one `update` per simulation tick while active, mutates world state
// directly, and ends itself at most once. The lifecycle is strictly one-way
// (Running → Ended); updating an ended task or ending a task twice is an
// engine bug and asserts, not a recoverable condition.
//
// Task kinds are a closed sum (`AnyTask`) rather than boxed trait objects
// so the whole queue — and therefore the whole simulation — stays
// serializable for save/load and lockstep state comparison. The `Task`
// trait still names the contract, and compound tasks hold their sub-tasks
// (follow/move) by value as concrete types.
//
// Liveness is polled: tasks re-resolve every entity handle through the
// world each tick instead of subscribing to death events. There is nothing
// to unsubscribe, so `dispose` is a no-op for every task except Research,
// which must unwind its faction registration (see `production.rs`).
//
// See also: `sim.rs` for the stepper that drives queues, `movement.rs` /
// `combat.rs` / `harvest.rs` / `construction.rs` / `production.rs` /
// `transport.rs` for the task kinds.
//
// **Critical constraint: determinism.** Follow-up orders issued during an
// update go through `TaskCtx::followups` and are applied by the stepper in
// emission order, never by mutating another entity's queue mid-iteration.

use crate::config::GameConfig;
use crate::event::{SimEvent, SimEventKind, Warning};
use crate::types::{EntityId, FactionId, TimeStep};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::combat::{AttackTask, HealTask, StandGuardTask, ZoneAttackTask};
use crate::construction::{BuildTask, RepairTask};
use crate::harvest::HarvestTask;
use crate::movement::{FollowTask, MoveTask};
use crate::production::{ResearchTask, TrainTask};
use crate::transport::EmbarkTask;

// ---------------------------------------------------------------------------
// Update context
// ---------------------------------------------------------------------------

/// Everything a task may touch during one update.
pub struct TaskCtx<'a> {
    pub world: &'a mut World,
    pub config: &'a GameConfig,
    pub events: &'a mut Vec<SimEvent>,
    pub step: TimeStep,
    /// Tasks queued behind the one currently updating. Fallback orders are
    /// auto-queued only when this is 0, so a player's queued orders are
    /// never clobbered.
    pub queued_behind: usize,
    /// Orders issued during this update; the stepper applies them after the
    /// update returns.
    pub followups: &'a mut Vec<(EntityId, AnyTask)>,
}

impl TaskCtx<'_> {
    /// Raise a faction warning, debounced through a task-held onset flag:
    /// warns when the flag is clear, then sets it. Tasks clear the flag
    /// themselves once the stall resolves.
    pub fn warn_once(&mut self, flag: &mut bool, faction: FactionId, warning: Warning) {
        if !*flag {
            *flag = true;
            self.events.push(SimEvent {
                tick: self.step.tick,
                kind: SimEventKind::Warning { faction, warning },
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// The one-way Running → Ended flag every task embeds.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    ended: bool,
}

impl Lifecycle {
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Transition to Ended. Asserts if already ended — a double transition
    /// means the engine itself is broken.
    pub fn mark_ended(&mut self) {
        assert!(!self.ended, "task marked as ended twice");
        self.ended = true;
    }
}

// ---------------------------------------------------------------------------
// Task contract
// ---------------------------------------------------------------------------

/// The behavior contract every task kind implements.
pub trait Task {
    /// Advance one tick. Must not be called after the task has ended.
    fn update(&mut self, ctx: &mut TaskCtx<'_>);

    fn has_ended(&self) -> bool;

    /// Human-readable description of what the entity is doing.
    fn description(&self) -> String;

    /// Completion fraction in [0, 1], when meaningfully computable.
    fn progress(&self) -> Option<f32> {
        None
    }

    /// Release anything held outside the task itself. Called exactly once,
    /// on natural completion or cancellation.
    fn dispose(&mut self, world: &mut World, events: &mut Vec<SimEvent>) {
        let _ = (world, events);
    }
}

/// Closed sum of every task kind, dispatched through the `Task` trait.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AnyTask {
    Move(MoveTask),
    Follow(FollowTask),
    Attack(AttackTask),
    Heal(HealTask),
    Repair(RepairTask),
    Build(BuildTask),
    Harvest(HarvestTask),
    Train(TrainTask),
    Research(ResearchTask),
    StandGuard(StandGuardTask),
    ZoneAttack(ZoneAttackTask),
    Embark(EmbarkTask),
}

macro_rules! dispatch {
    ($self:expr, $task:ident => $body:expr) => {
        match $self {
            AnyTask::Move($task) => $body,
            AnyTask::Follow($task) => $body,
            AnyTask::Attack($task) => $body,
            AnyTask::Heal($task) => $body,
            AnyTask::Repair($task) => $body,
            AnyTask::Build($task) => $body,
            AnyTask::Harvest($task) => $body,
            AnyTask::Train($task) => $body,
            AnyTask::Research($task) => $body,
            AnyTask::StandGuard($task) => $body,
            AnyTask::ZoneAttack($task) => $body,
            AnyTask::Embark($task) => $body,
        }
    };
}

impl Task for AnyTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        // The base contract's fatal assertion, enforced at the dispatch
        // seam so no task kind can forget it.
        assert!(!self.has_ended(), "task updated after completion");
        dispatch!(self, task => task.update(ctx))
    }

    fn has_ended(&self) -> bool {
        dispatch!(self, task => task.has_ended())
    }

    fn description(&self) -> String {
        dispatch!(self, task => task.description())
    }

    fn progress(&self) -> Option<f32> {
        dispatch!(self, task => task.progress())
    }

    fn dispose(&mut self, world: &mut World, events: &mut Vec<SimEvent>) {
        dispatch!(self, task => task.dispose(world, events))
    }
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

/// One entity's active task (front) plus pending follow-ups.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskQueue {
    tasks: VecDeque<AnyTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total tasks held, active one included.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn current(&self) -> Option<&AnyTask> {
        self.tasks.front()
    }

    pub fn current_mut(&mut self) -> Option<&mut AnyTask> {
        self.tasks.front_mut()
    }

    /// Append a task to run after everything already queued.
    pub fn enqueue(&mut self, task: AnyTask) {
        self.tasks.push_back(task);
    }

    /// Cancel everything queued — disposing each task — and install a
    /// replacement. This is the cooperative-cancellation point: the
    /// outgoing tasks' `dispose` runs before the new task is in place.
    pub fn override_with(
        &mut self,
        task: AnyTask,
        world: &mut World,
        events: &mut Vec<SimEvent>,
    ) {
        self.dispose_all(world, events);
        self.tasks.push_back(task);
    }

    /// Drop ended tasks from the front, disposing each, so `current` is
    /// either `None` or a live task.
    pub fn advance(&mut self, world: &mut World, events: &mut Vec<SimEvent>) {
        while self.tasks.front().is_some_and(Task::has_ended) {
            if let Some(mut done) = self.tasks.pop_front() {
                done.dispose(world, events);
            }
        }
    }

    /// Dispose and drop every task. Used on entity death and by
    /// `override_with`.
    pub fn dispose_all(&mut self, world: &mut World, events: &mut Vec<SimEvent>) {
        for mut task in self.tasks.drain(..) {
            task.dispose(world, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MoveTask;
    use crate::pathfinding::PathDestination;
    use crate::types::Point;

    fn dummy_move() -> AnyTask {
        AnyTask::Move(MoveTask::new(
            EntityId { index: 0, generation: 0 },
            PathDestination::Cell(Point::new(3, 3)),
        ))
    }

    #[test]
    fn lifecycle_is_one_way() {
        let mut life = Lifecycle::default();
        assert!(!life.has_ended());
        life.mark_ended();
        assert!(life.has_ended());
    }

    #[test]
    #[should_panic(expected = "task marked as ended twice")]
    fn double_end_asserts() {
        let mut life = Lifecycle::default();
        life.mark_ended();
        life.mark_ended();
    }

    #[test]
    fn queue_override_replaces_pending_tasks() {
        let mut world = World::new(8, 8);
        let mut events = Vec::new();
        let mut queue = TaskQueue::new();
        queue.enqueue(dummy_move());
        queue.enqueue(dummy_move());
        assert_eq!(queue.len(), 2);

        queue.override_with(dummy_move(), &mut world, &mut events);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn queue_serialization_roundtrip() {
        let mut queue = TaskQueue::new();
        queue.enqueue(dummy_move());
        let json = serde_json::to_string(&queue).unwrap();
        let restored: TaskQueue = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 1);
        assert!(matches!(restored.current(), Some(AnyTask::Move(_))));
    }
}
