// Production: training new units and researching technologies.
//
// Training accumulates "hit points trained" at the trainer's speed, funded
// through the credit protocol so the prototype's full price lands on the
// ledger over the run, and gated on faction food — a food shortage stalls
// the accumulation with a one-shot warning instead of cancelling the order.
// On completion the trainer searches the free-cell ring around its
// footprint for a deploy cell (preferring the one nearest its rally point),
// places the unit, and hands it its first order: a move to the rally point,
// or a harvest when the rally point sits on a node the unit can work.
//
// Research is deliberately not incrementally funded: the whole technology
// cost is withdrawn atomically at start (an informational failure — warn
// and end — when the ledger is short), the technology is registered as
// in-progress on the faction, and a fixed duration later it completes. The
// in-progress registration is cleared ONLY by completion or by `dispose`;
// a research task cancelled through the queue reimburses the cost and
// unregisters from its disposal hook, and nothing else may touch that
// state.
//
// See also: `credit.rs` for funding, `faction.rs` for the research
// registers, `harvest.rs`/`movement.rs` for the rally-point follow-ups.

use crate::credit::{per_point_rates, ResourceCredit};
use crate::entity::ResourceCost;
use crate::event::{SimEvent, SimEventKind, Warning};
use crate::harvest::HarvestTask;
use crate::movement::MoveTask;
use crate::pathfinding::PathDestination;
use crate::task::{AnyTask, Lifecycle, Task, TaskCtx};
use crate::types::{EntityId, Point, Region, ResourceKind, Vec2};
use crate::world::World;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TrainTask
// ---------------------------------------------------------------------------

/// Train one unit of a prototype at a producing building.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainTask {
    entity: EntityId,
    prototype: String,
    /// Hit points trained so far, out of the prototype's max health.
    points: f32,
    /// The prototype's max health, cached on first update for `progress`.
    goal: f32,
    credit: ResourceCredit,
    warned_food: bool,
    warned_room: bool,
    life: Lifecycle,
}

impl TrainTask {
    pub fn new(entity: EntityId, prototype: &str) -> Self {
        Self {
            entity,
            prototype: prototype.to_string(),
            points: 0.0,
            goal: 0.0,
            credit: ResourceCredit::new(),
            warned_food: false,
            warned_room: false,
            life: Lifecycle::default(),
        }
    }

    /// Pick the deploy cell: a ring cell around the trainer where the new
    /// unit's footprint fits, nearest to the rally point (or the trainer
    /// itself), ties broken by cell order.
    fn deploy_cell(
        world: &World,
        trainer_region: Region,
        unit_size: u32,
        layer: crate::types::CollisionLayer,
        prefer: Vec2,
    ) -> Option<Point> {
        trainer_region
            .ring()
            .into_iter()
            .filter(|cell| world.is_free(Region::new(*cell, unit_size), layer, None))
            .map(|cell| (cell.center().distance(prefer), cell))
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, cell)| cell)
    }
}

impl Task for TrainTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let trainer_state = ctx.world.get(self.entity).and_then(|e| {
            let s = e.spatial.as_ref()?;
            let speed = e.train_speed?;
            let f = e.faction?;
            Some((s.region(), speed, f, e.rally_point))
        });
        let Some((trainer_region, train_speed, faction, rally)) = trainer_state else {
            self.life.mark_ended();
            return;
        };
        let Some(proto) = ctx.config.prototype(&self.prototype).cloned() else {
            self.life.mark_ended();
            return;
        };
        self.goal = proto.max_health;

        if self.points < proto.max_health {
            // Food gate: stall (with a one-shot warning) while short.
            let food_ok = ctx
                .world
                .faction(faction)
                .is_some_and(|f| f.remaining_food() >= proto.food_cost);
            if !food_ok {
                let mut warned = self.warned_food;
                ctx.warn_once(&mut warned, faction, Warning::NotEnoughFood);
                self.warned_food = warned;
                return;
            }
            self.warned_food = false;

            let rates = per_point_rates(
                ResourceCost { aladdium: proto.aladdium_cost, alagene: proto.alagene_cost },
                proto.max_health,
            );
            let desired = (train_speed * ctx.step.delta).min(proto.max_health - self.points);
            let Some(f) = ctx.world.faction_mut(faction) else {
                self.life.mark_ended();
                return;
            };
            self.points += self.credit.fund(desired, rates, f, ctx.events, ctx.step.tick);
            if proto.max_health - self.points <= 1e-3 {
                self.points = proto.max_health;
            }
            if self.points < proto.max_health {
                return;
            }
        }

        // Fully trained: place the unit, or stall until a cell frees up.
        let prefer = rally.map(Point::center).unwrap_or_else(|| trainer_region.center());
        let Some(cell) =
            Self::deploy_cell(ctx.world, trainer_region, proto.size, proto.layer, prefer)
        else {
            let mut warned = self.warned_room;
            ctx.warn_once(&mut warned, faction, Warning::NoDeployRoom);
            self.warned_room = warned;
            return;
        };

        let unit = ctx.world.spawn_unit(&proto, faction, cell, false);
        ctx.events.push(SimEvent {
            tick: ctx.step.tick,
            kind: SimEventKind::UnitTrained { trainer: self.entity, unit },
        });

        // First order for the newborn: rally, opportunistically harvesting.
        if let Some(rally) = rally {
            let node = ctx.world.node_at(rally);
            match node {
                Some(node) if proto.harvest.is_some() => {
                    ctx.followups.push((unit, AnyTask::Harvest(HarvestTask::new(unit, node))));
                }
                _ => {
                    ctx.followups.push((
                        unit,
                        AnyTask::Move(MoveTask::new(unit, PathDestination::Cell(rally))),
                    ));
                }
            }
        }
        self.life.mark_ended();
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("training {}", self.prototype)
    }

    fn progress(&self) -> Option<f32> {
        if self.goal > 0.0 {
            Some((self.points / self.goal).min(1.0))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// ResearchTask
// ---------------------------------------------------------------------------

/// Research a technology for the owning faction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResearchTask {
    entity: EntityId,
    technology: String,
    started: bool,
    completed: bool,
    /// Amounts withdrawn at start, kept for reimbursement on cancellation.
    paid: [u32; 2],
    elapsed: f32,
    duration: f32,
    life: Lifecycle,
}

impl ResearchTask {
    pub fn new(entity: EntityId, technology: &str) -> Self {
        Self {
            entity,
            technology: technology.to_string(),
            started: false,
            completed: false,
            paid: [0, 0],
            elapsed: 0.0,
            duration: 0.0,
            life: Lifecycle::default(),
        }
    }
}

impl Task for ResearchTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let Some(faction) = ctx.world.get(self.entity).and_then(|e| e.faction) else {
            self.life.mark_ended();
            return;
        };
        let Some(tech) = ctx.config.technology(&self.technology).cloned() else {
            self.life.mark_ended();
            return;
        };

        if !self.started {
            let Some(f) = ctx.world.faction_mut(faction) else {
                self.life.mark_ended();
                return;
            };
            if f.has_researched(&self.technology) || f.is_researching(&self.technology) {
                self.life.mark_ended();
                return;
            }
            // Atomic up-front payment: research is not incrementally
            // fundable. A short ledger is an informational failure — warn
            // and end, no stall.
            let affordable = f.resource(ResourceKind::Aladdium) >= tech.aladdium_cost
                && f.resource(ResourceKind::Alagene) >= tech.alagene_cost;
            if !affordable {
                let kind = if f.resource(ResourceKind::Aladdium) < tech.aladdium_cost {
                    ResourceKind::Aladdium
                } else {
                    ResourceKind::Alagene
                };
                ctx.events.push(SimEvent {
                    tick: ctx.step.tick,
                    kind: SimEventKind::Warning {
                        faction,
                        warning: Warning::ResourceMissing { kind },
                    },
                });
                self.life.mark_ended();
                return;
            }
            f.withdraw(ResourceKind::Aladdium, tech.aladdium_cost);
            f.withdraw(ResourceKind::Alagene, tech.alagene_cost);
            f.begin_research(&self.technology);
            self.paid = [tech.aladdium_cost, tech.alagene_cost];
            self.started = true;
            self.duration = tech.duration_secs;
        }

        self.elapsed += ctx.step.delta;
        if self.elapsed >= self.duration {
            if let Some(f) = ctx.world.faction_mut(faction) {
                f.complete_research(&self.technology);
            }
            self.completed = true;
            ctx.events.push(SimEvent {
                tick: ctx.step.tick,
                kind: SimEventKind::ResearchCompleted {
                    faction,
                    technology: self.technology.clone(),
                },
            });
            self.life.mark_ended();
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("researching {}", self.technology)
    }

    fn progress(&self) -> Option<f32> {
        if self.started && self.duration > 0.0 {
            Some((self.elapsed / self.duration).min(1.0))
        } else {
            None
        }
    }

    /// The one place the in-progress registration is unwound: cancelled
    /// before completion, the faction gets the cost back and the
    /// registration is cleared. After completion this is a no-op.
    fn dispose(&mut self, world: &mut World, _events: &mut Vec<SimEvent>) {
        if self.started && !self.completed {
            if let Some(faction) = world.get(self.entity).and_then(|e| e.faction) {
                if let Some(f) = world.faction_mut(faction) {
                    f.cancel_research(&self.technology);
                    f.credit(ResourceKind::Aladdium, self.paid[0]);
                    f.credit(ResourceKind::Alagene, self.paid[1]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Rig;
    use crate::types::FactionId;

    fn stock(rig: &Rig, kind: ResourceKind) -> u32 {
        rig.world.faction(FactionId(1)).unwrap().resource(kind)
    }

    #[test]
    fn train_pays_full_price_and_deploys() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        let before = stock(&rig, ResourceKind::Aladdium);

        let mut task = TrainTask::new(keep, "worker");
        // Worker: 50 hp at 10 hp/s = 5s = 100 ticks, plus the deploy tick.
        rig.drive_to_end(&mut task, 200);

        assert_eq!(before - stock(&rig, ResourceKind::Aladdium), 50);
        let trained = rig
            .events
            .iter()
            .find_map(|e| match e.kind {
                SimEventKind::UnitTrained { unit, .. } => Some(unit),
                _ => None,
            })
            .expect("no UnitTrained event");
        let unit = rig.world.get(trained).unwrap();
        assert_eq!(unit.prototype.as_deref(), Some("worker"));
        // Deployed on the ring around the keep.
        let keep_region = rig.world.get(keep).unwrap().region().unwrap();
        assert_eq!(unit.region().unwrap().gap(&keep_region), 1);
    }

    #[test]
    fn train_stalls_on_food_and_recovers() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        // Eat the whole food budget.
        rig.world.faction_mut(FactionId(1)).unwrap().used_food = 10;

        let mut task = TrainTask::new(keep, "worker");
        for _ in 0..40 {
            rig.drive(&mut task);
        }
        assert!(!task.has_ended());
        assert_eq!(task.points, 0.0);
        let food_warnings = rig
            .events
            .iter()
            .filter(|e| {
                matches!(e.kind, SimEventKind::Warning { warning: Warning::NotEnoughFood, .. })
            })
            .count();
        assert_eq!(food_warnings, 1, "food warning must fire once per onset");

        // Food frees up: training resumes and completes.
        rig.world.faction_mut(FactionId(1)).unwrap().used_food = 0;
        rig.drive_to_end(&mut task, 200);
    }

    #[test]
    fn train_stalls_when_no_deploy_cell() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        // Brick up the ring.
        let region = rig.world.get(keep).unwrap().region().unwrap();
        for cell in region.ring() {
            rig.world.set_walkable(cell, false);
        }

        let mut task = TrainTask::new(keep, "worker");
        for _ in 0..200 {
            rig.drive(&mut task);
        }
        assert!(!task.has_ended(), "no deploy room stalls, it does not fail");
        let room_warnings = rig
            .events
            .iter()
            .filter(|e| {
                matches!(e.kind, SimEventKind::Warning { warning: Warning::NoDeployRoom, .. })
            })
            .count();
        assert_eq!(room_warnings, 1);

        // Open one cell; the unit appears there.
        rig.world.set_walkable(Point::new(7, 8), true);
        rig.drive_to_end(&mut task, 10);
        let trained = rig
            .events
            .iter()
            .find_map(|e| match e.kind {
                SimEventKind::UnitTrained { unit, .. } => Some(unit),
                _ => None,
            })
            .unwrap();
        assert_eq!(rig.cell(trained), Point::new(7, 8));
    }

    #[test]
    fn rally_on_node_queues_harvest_for_harvesters() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        let node = rig.spawn_node(ResourceKind::Aladdium, 100, Point::new(14, 8));
        rig.world.get_mut(keep).unwrap().rally_point = Some(Point::new(14, 8));

        let mut task = TrainTask::new(keep, "worker");
        rig.drive_to_end(&mut task, 200);

        assert_eq!(rig.followups.len(), 1);
        match &rig.followups[0].1 {
            AnyTask::Harvest(h) => assert_eq!(h.node(), node),
            other => panic!("expected a harvest order, got {}", other.description()),
        }
    }

    #[test]
    fn rally_without_node_queues_move() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        rig.world.get_mut(keep).unwrap().rally_point = Some(Point::new(2, 2));

        let mut task = TrainTask::new(keep, "worker");
        rig.drive_to_end(&mut task, 200);
        assert!(matches!(rig.followups[0].1, AnyTask::Move(_)));
    }

    #[test]
    fn research_registers_pays_and_completes() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        let before_a = stock(&rig, ResourceKind::Aladdium);
        let before_g = stock(&rig, ResourceKind::Alagene);

        let mut task = ResearchTask::new(keep, "hardened_plating");
        rig.drive(&mut task);
        // Cost withdrawn atomically at start: 150 / 50.
        assert_eq!(before_a - stock(&rig, ResourceKind::Aladdium), 150);
        assert_eq!(before_g - stock(&rig, ResourceKind::Alagene), 50);
        assert!(rig.world.faction(FactionId(1)).unwrap().is_researching("hardened_plating"));
        assert!(task.progress().unwrap() < 0.01);

        // 30s at 0.05s/tick.
        rig.drive_to_end(&mut task, 700);
        let faction = rig.world.faction(FactionId(1)).unwrap();
        assert!(faction.has_researched("hardened_plating"));
        assert!(!faction.is_researching("hardened_plating"));
        assert!(rig.events.iter().any(|e| matches!(
            e.kind,
            SimEventKind::ResearchCompleted { .. }
        )));
    }

    #[test]
    fn cancelled_research_reimburses_and_unregisters() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        let before_a = stock(&rig, ResourceKind::Aladdium);
        let before_g = stock(&rig, ResourceKind::Alagene);

        let mut task = ResearchTask::new(keep, "deep_extraction");
        for _ in 0..20 {
            rig.drive(&mut task);
        }
        assert!(rig.world.faction(FactionId(1)).unwrap().is_researching("deep_extraction"));

        // Cancellation path: the queue calls dispose on override.
        let mut events = Vec::new();
        task.dispose(&mut rig.world, &mut events);

        let faction = rig.world.faction(FactionId(1)).unwrap();
        assert!(!faction.is_researching("deep_extraction"));
        assert!(!faction.has_researched("deep_extraction"));
        assert_eq!(stock(&rig, ResourceKind::Aladdium), before_a);
        assert_eq!(stock(&rig, ResourceKind::Alagene), before_g);
    }

    #[test]
    fn research_without_funds_warns_and_ends() {
        let mut rig = Rig::new();
        let keep = rig.spawn("keep", 1, Point::new(8, 8));
        let f = rig.world.faction_mut(FactionId(1)).unwrap();
        let excess = f.resource(ResourceKind::Aladdium);
        assert!(f.withdraw(ResourceKind::Aladdium, excess));

        let mut task = ResearchTask::new(keep, "hardened_plating");
        rig.drive(&mut task);
        assert!(task.has_ended());
        assert!(!rig.world.faction(FactionId(1)).unwrap().is_researching("hardened_plating"));
        assert!(rig.events.iter().any(|e| matches!(
            e.kind,
            SimEventKind::Warning { warning: Warning::ResourceMissing { .. }, .. }
        )));
    }
}
