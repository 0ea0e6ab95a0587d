// Construction and repair: building plans, the build task, and the
// credit-funded repair task that drives both construction progress and
// post-damage repair.
//
// A `BuildingPlan` records the intent: faction, prototype, location. The
// build task walks its builder to the site, places the building (stalling
// with a one-shot warning while the footprint is blocked), then hands the
// rest to an embedded repair task. The plan transitions Unscheduled →
// building-created exactly once and is discarded with the task; it owns
// the only reference to the building it spawned.
//
// Repair branches on the target's state: an under-construction building
// accumulates construction progress until full health, at which point it
// becomes a standing building (food capacity included); a damaged complete
// building runs the same per-hit-point accumulation as plain repair. Both
// branches pay the faction ledger through the credit protocol at per-point
// rates derived from the target's cost and max health, so the total paid
// over a full build equals the prototype's price.
//
// See also: `credit.rs` for the funding protocol, `movement.rs` for the
// travel/follow legs, `world.rs` for placement checks and
// `complete_construction`.

use crate::credit::{per_point_rates, ResourceCredit};
use crate::event::{SimEvent, SimEventKind, Warning};
use crate::movement::{FollowTask, MoveTask};
use crate::pathfinding::PathDestination;
use crate::task::{Lifecycle, Task, TaskCtx};
use crate::types::{Diplomacy, EntityId, FactionId, Point, Region};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BuildingPlan
// ---------------------------------------------------------------------------

/// A recorded intent to construct `prototype` at `location` for `faction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildingPlan {
    pub faction: FactionId,
    pub prototype: String,
    pub location: Point,
    /// The building this plan spawned, once it exists. Setting this is the
    /// plan's one and only state transition.
    pub building: Option<EntityId>,
}

impl BuildingPlan {
    pub fn new(faction: FactionId, prototype: &str, location: Point) -> Self {
        Self { faction, prototype: prototype.to_string(), location, building: None }
    }
}

// ---------------------------------------------------------------------------
// RepairTask
// ---------------------------------------------------------------------------

/// Walk to a building (or any healthy-capable ally entity) and drive its
/// health up — construction progress if it is still a site, repair if it is
/// damaged. Funding goes through the credit protocol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepairTask {
    entity: EntityId,
    target: EntityId,
    follow: Option<FollowTask>,
    credit: ResourceCredit,
    life: Lifecycle,
}

impl RepairTask {
    pub fn new(entity: EntityId, target: EntityId) -> Self {
        Self {
            entity,
            target,
            follow: None,
            credit: ResourceCredit::new(),
            life: Lifecycle::default(),
        }
    }
}

impl Task for RepairTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let Some(repairer) = ctx.world.get(self.entity) else {
            self.life.mark_ended();
            return;
        };
        let (Some(spatial), Some(build_speed)) = (&repairer.spatial, repairer.build_speed) else {
            self.life.mark_ended();
            return;
        };
        let my_region = spatial.region();
        let mobile = repairer.mobile.is_some();
        let Some(faction) = repairer.faction else {
            self.life.mark_ended();
            return;
        };

        // The target must be a living, placed, allied thing with health.
        let target_state = ctx.world.get(self.target).and_then(|t| {
            let s = t.spatial.as_ref()?;
            let h = t.health?;
            let tf = t.faction?;
            Some((s.region(), h, tf, t.cost, t.under_construction))
        });
        let Some((target_region, health, target_faction, cost, under_construction)) = target_state
        else {
            self.life.mark_ended();
            return;
        };
        let allied = ctx
            .world
            .faction(faction)
            .is_some_and(|f| f.stance(target_faction) == Diplomacy::Ally);
        if !allied {
            self.life.mark_ended();
            return;
        }

        if health.is_full() && !under_construction {
            self.life.mark_ended(); // nothing left to do
            return;
        }

        if my_region.gap(&target_region) <= 1 {
            // In range: apply credit-funded progress; no pursuit this tick.
            let target_center = target_region.center();
            if let Some(s) = ctx.world.get_mut(self.entity).and_then(|e| e.spatial.as_mut()) {
                s.face(target_center);
            }
            let rates = per_point_rates(cost, health.max);
            let desired = (build_speed * ctx.step.delta).min(health.missing());
            let Some(f) = ctx.world.faction_mut(faction) else {
                self.life.mark_ended();
                return;
            };
            let applied = self.credit.fund(desired, rates, f, ctx.events, ctx.step.tick);
            let mut now_full = false;
            if let Some(h) = ctx.world.get_mut(self.target).and_then(|t| t.health.as_mut()) {
                h.current = (h.current + applied).min(h.max);
                // Snap away sub-tolerance residue so rounding in the credit
                // clamp can never strand a repair a hair short of full.
                if h.missing() <= 1e-3 {
                    h.current = h.max;
                }
                now_full = h.is_full();
            }
            if now_full {
                if under_construction && ctx.world.complete_construction(self.target) {
                    ctx.events.push(SimEvent {
                        tick: ctx.step.tick,
                        kind: SimEventKind::ConstructionCompleted { building: self.target },
                    });
                }
                self.life.mark_ended();
            }
        } else {
            if !mobile {
                self.life.mark_ended();
                return;
            }
            if self.follow.is_none() {
                self.follow = Some(FollowTask::new(self.entity, self.target));
            }
            if let Some(follow) = &mut self.follow {
                follow.update(ctx);
                if follow.has_ended() {
                    if follow.has_reached_target() {
                        self.follow = None;
                    } else {
                        self.life.mark_ended();
                    }
                }
            }
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("repairing {}", self.target)
    }
}

// ---------------------------------------------------------------------------
// BuildTask
// ---------------------------------------------------------------------------

/// Execute a building plan: walk to the site, place the building, then
/// construct it to completion via an embedded repair task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildTask {
    entity: EntityId,
    plan: BuildingPlan,
    travel: Option<MoveTask>,
    construction: Option<RepairTask>,
    warned_blocked: bool,
    life: Lifecycle,
}

impl BuildTask {
    pub fn new(entity: EntityId, plan: BuildingPlan) -> Self {
        Self {
            entity,
            plan,
            travel: None,
            construction: None,
            warned_blocked: false,
            life: Lifecycle::default(),
        }
    }

    pub fn plan(&self) -> &BuildingPlan {
        &self.plan
    }
}

impl Task for BuildTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let builder_ok = ctx
            .world
            .get(self.entity)
            .is_some_and(|e| e.spatial.is_some() && e.build_speed.is_some());
        if !builder_ok {
            self.life.mark_ended();
            return;
        }

        // Once the building exists, construction progress is the whole job.
        if let Some(construction) = &mut self.construction {
            construction.update(ctx);
            if construction.has_ended() {
                self.life.mark_ended();
            }
            return;
        }

        let Some(proto) = ctx.config.prototype(&self.plan.prototype).cloned() else {
            self.life.mark_ended();
            return;
        };
        let site = Region::new(self.plan.location, proto.size);
        let my_region = ctx
            .world
            .get(self.entity)
            .and_then(|e| e.region())
            .unwrap_or(Region::new(self.plan.location, 1));

        if my_region.gap(&site) > 1 {
            // Approach leg.
            let leg = self
                .travel
                .get_or_insert_with(|| MoveTask::new(self.entity, PathDestination::Near(site)));
            leg.update(ctx);
            if leg.has_ended() {
                if leg.has_reached_destination() {
                    self.travel = None;
                } else {
                    self.life.mark_ended(); // site unreachable
                }
            }
            return;
        }

        // At the site: place the building, or stall while the footprint is
        // blocked (one-shot warning, retried every tick).
        if !ctx.world.is_free(site, proto.layer, None) {
            let mut warned = self.warned_blocked;
            ctx.warn_once(&mut warned, self.plan.faction, Warning::BuildSiteBlocked);
            self.warned_blocked = warned;
            return;
        }
        self.warned_blocked = false;
        let building =
            ctx.world
                .spawn_unit(&proto, self.plan.faction, self.plan.location, true);
        self.plan.building = Some(building);
        ctx.events.push(SimEvent {
            tick: ctx.step.tick,
            kind: SimEventKind::ConstructionStarted { building, location: self.plan.location },
        });
        self.construction = Some(RepairTask::new(self.entity, building));
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("building {} at {}", self.plan.prototype, self.plan.location)
    }
}
