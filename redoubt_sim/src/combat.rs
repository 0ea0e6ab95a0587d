// Combat tasks: attack, heal, stand guard, zone attack.
//
// Attack and heal share the compound-task shape: re-validate actor and
// target every tick, act when the footprints are within range, otherwise
// delegate the tick to an embedded follow sub-task — never both in one
// tick, the range check takes priority over continued pursuit. All target
// tracking is poll-based: a dead, embarked or out-of-sight target is
// detected by re-resolving the handle, not by subscription.
//
// When an attack's target vanishes while the attacker was still
// approaching, the attacker is handed a plain move order toward the
// target's last known cell — but only when its queue holds no further
// tasks, so a queued player order is never clobbered, and never for the
// throwaway attacks spawned by stand-guard/zone-attack.
//
// Stand guard and zone attack scan for enemies on an explicit
// `next_scan_tick` schedule (staggered by entity handle so a thousand idle
// guards do not all scan on the same frame) rather than every tick; between
// scans the embedded attack task re-validates its own target.
//
// See also: `movement.rs` for the follow/move sub-tasks, `world.rs` for
// `nearest_enemy_in_sight` and visibility.

use crate::movement::{FollowTask, MoveTask};
use crate::pathfinding::PathDestination;
use crate::task::{AnyTask, Lifecycle, Task, TaskCtx};
use crate::types::{Diplomacy, EntityId, Point, Region, Vec2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AttackTask
// ---------------------------------------------------------------------------

/// Pursue a target and strike it on the attack-delay cooldown until one of
/// the two is gone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackTask {
    entity: EntityId,
    target: EntityId,
    follow: Option<FollowTask>,
    /// Whether a vanished target may leave behind a fallback move order.
    fallback: bool,
    /// Seconds until the next strike is allowed.
    cooldown: f32,
    last_known_cell: Option<Point>,
    was_in_range: bool,
    life: Lifecycle,
}

impl AttackTask {
    /// A player-ordered attack: chases, and falls back to the target's last
    /// known position if it vanishes mid-approach.
    pub fn new(entity: EntityId, target: EntityId) -> Self {
        Self {
            entity,
            target,
            follow: None,
            fallback: true,
            cooldown: 0.0,
            last_known_cell: None,
            was_in_range: false,
            life: Lifecycle::default(),
        }
    }

    /// An attack spawned by a scanning task (stand guard, zone attack):
    /// same behavior, but a vanished target never queues a fallback move.
    pub fn opportunistic(entity: EntityId, target: EntityId) -> Self {
        Self { fallback: false, ..Self::new(entity, target) }
    }

    pub fn target(&self) -> EntityId {
        self.target
    }

    /// End because the target is gone, queueing the fallback move when it
    /// applies: we were still approaching (follow exists, not in range) and
    /// nothing else is queued for this entity.
    fn end_target_gone(&mut self, ctx: &mut TaskCtx<'_>) {
        if self.fallback && self.follow.is_some() && !self.was_in_range && ctx.queued_behind == 0 {
            if let Some(cell) = self.last_known_cell {
                ctx.followups.push((
                    self.entity,
                    AnyTask::Move(MoveTask::new(self.entity, PathDestination::Cell(cell))),
                ));
            }
        }
        self.life.mark_ended();
    }
}

impl Task for AttackTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let Some(attacker) = ctx.world.get(self.entity) else {
            self.life.mark_ended();
            return;
        };
        let (Some(spatial), Some(attack)) = (&attacker.spatial, attacker.attack) else {
            self.life.mark_ended();
            return;
        };
        let my_region = spatial.region();
        let mobile = attacker.mobile.is_some();
        let faction = attacker.faction;

        self.cooldown = (self.cooldown - ctx.step.delta).max(0.0);

        let Some((target_region, target_center)) = resolve_target(ctx, self.target) else {
            self.end_target_gone(ctx);
            return;
        };
        if let Some(f) = faction {
            if !ctx.world.can_see(f, self.target) {
                self.end_target_gone(ctx);
                return;
            }
        }
        self.last_known_cell = Some(target_center.cell());

        if my_region.gap(&target_region) <= attack.range {
            self.was_in_range = true;
            if let Some(s) = ctx.world.get_mut(self.entity).and_then(|e| e.spatial.as_mut()) {
                s.face(target_center);
            }
            if self.cooldown <= 0.0 {
                if let Some(h) = ctx.world.get_mut(self.target).and_then(|e| e.health.as_mut()) {
                    h.current -= (attack.power - h.armor).max(1.0);
                }
                self.cooldown = attack.delay_secs;
            }
            // In range: the follow sub-task does not advance this tick.
        } else {
            self.was_in_range = false;
            if !mobile {
                // Range-only attacker with the target out of reach.
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
                        self.follow = None; // range check takes over next tick
                    } else {
                        self.life.mark_ended(); // pursuit failed
                    }
                }
            }
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("attacking {}", self.target)
    }
}

/// Resolve a combat target's footprint and center, requiring it to be
/// alive, in the world, and damageable.
fn resolve_target(ctx: &TaskCtx<'_>, target: EntityId) -> Option<(Region, Vec2)> {
    let t = ctx.world.get(target)?;
    t.health?;
    let s = t.spatial.as_ref()?;
    Some((s.region(), s.center()))
}

// ---------------------------------------------------------------------------
// HealTask
// ---------------------------------------------------------------------------

/// Follow a wounded ally and restore its health; ends when it is full.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealTask {
    entity: EntityId,
    target: EntityId,
    follow: Option<FollowTask>,
    life: Lifecycle,
}

impl HealTask {
    pub fn new(entity: EntityId, target: EntityId) -> Self {
        Self { entity, target, follow: None, life: Lifecycle::default() }
    }
}

impl Task for HealTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        if self.target == self.entity {
            self.life.mark_ended();
            return;
        }
        let Some(healer) = ctx.world.get(self.entity) else {
            self.life.mark_ended();
            return;
        };
        let (Some(spatial), Some(heal)) = (&healer.spatial, healer.heal) else {
            self.life.mark_ended();
            return;
        };
        let my_region = spatial.region();
        let mobile = healer.mobile.is_some();
        let Some(faction) = healer.faction else {
            self.life.mark_ended();
            return;
        };

        // The patient must be a visible, living ally.
        let Some((target_region, target_center)) = resolve_target(ctx, self.target) else {
            self.life.mark_ended();
            return;
        };
        let target_faction = ctx.world.get(self.target).and_then(|t| t.faction);
        let allied = target_faction.is_some_and(|tf| {
            ctx.world.faction(faction).is_some_and(|f| f.stance(tf) == Diplomacy::Ally)
        });
        if !allied || !ctx.world.can_see(faction, self.target) {
            self.life.mark_ended();
            return;
        }

        if ctx.world.get(self.target).and_then(|t| t.health).is_some_and(|h| h.is_full()) {
            self.life.mark_ended();
            return;
        }

        if my_region.gap(&target_region) <= heal.range {
            if let Some(s) = ctx.world.get_mut(self.entity).and_then(|e| e.spatial.as_mut()) {
                s.face(target_center);
            }
            if let Some(h) = ctx.world.get_mut(self.target).and_then(|e| e.health.as_mut()) {
                h.current = (h.current + heal.speed * ctx.step.delta).min(h.max);
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
        format!("healing {}", self.target)
    }
}

// ---------------------------------------------------------------------------
// StandGuardTask
// ---------------------------------------------------------------------------

/// Hold position, periodically scanning for the nearest enemy in sight and
/// engaging it. Never ends on its own; a player order overrides it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StandGuardTask {
    entity: EntityId,
    attack: Option<AttackTask>,
    /// Explicit scan schedule: next tick this task may scan. Initialized
    /// staggered by entity handle so guards spread their scans across
    /// frames instead of all paying on the same tick.
    next_scan_tick: u64,
    life: Lifecycle,
}

impl StandGuardTask {
    pub fn new(entity: EntityId) -> Self {
        Self { entity, attack: None, next_scan_tick: 0, life: Lifecycle::default() }
    }
}

impl Task for StandGuardTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let guard_ok = ctx
            .world
            .get(self.entity)
            .is_some_and(|e| e.spatial.is_some() && e.attack.is_some());
        if !guard_ok {
            self.life.mark_ended();
            return;
        }

        // Engaged: the embedded attack re-validates its target every tick;
        // no scan needed until it ends.
        if let Some(attack) = &mut self.attack {
            attack.update(ctx);
            if attack.has_ended() {
                self.attack = None;
            }
            return;
        }

        if self.next_scan_tick == 0 {
            // First update: stagger this guard's scan phase by its handle.
            self.next_scan_tick =
                ctx.step.tick + u64::from(self.entity.index) % ctx.config.scan_interval_ticks;
        }
        if ctx.step.tick >= self.next_scan_tick {
            self.next_scan_tick = ctx.step.tick + ctx.config.scan_interval_ticks;
            if let Some(enemy) = ctx.world.nearest_enemy_in_sight(self.entity) {
                self.attack = Some(AttackTask::opportunistic(self.entity, enemy));
            }
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        match &self.attack {
            Some(attack) => format!("guarding, {}", attack.description()),
            None => "standing guard".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ZoneAttackTask
// ---------------------------------------------------------------------------

/// Fight toward a destination: advance the move leg, but engage any enemy
/// discovered by a throttled scan along the way. Ends when the move leg
/// does.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneAttackTask {
    entity: EntityId,
    destination: Point,
    travel: MoveTask,
    attack: Option<AttackTask>,
    /// Same explicit scan schedule as stand guard.
    next_scan_tick: u64,
    life: Lifecycle,
}

impl ZoneAttackTask {
    pub fn new(entity: EntityId, destination: Point) -> Self {
        Self {
            entity,
            destination,
            travel: MoveTask::new(entity, PathDestination::Cell(destination)),
            attack: None,
            next_scan_tick: 0,
            life: Lifecycle::default(),
        }
    }
}

impl Task for ZoneAttackTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let fit = ctx
            .world
            .get(self.entity)
            .is_some_and(|e| e.spatial.is_some() && e.attack.is_some());
        if !fit {
            self.life.mark_ended();
            return;
        }

        if let Some(attack) = &mut self.attack {
            attack.update(ctx);
            if attack.has_ended() {
                self.attack = None;
            }
            return;
        }

        if self.next_scan_tick == 0 {
            self.next_scan_tick =
                ctx.step.tick + u64::from(self.entity.index) % ctx.config.scan_interval_ticks;
        }
        if ctx.step.tick >= self.next_scan_tick {
            self.next_scan_tick = ctx.step.tick + ctx.config.scan_interval_ticks;
            if let Some(enemy) = ctx.world.nearest_enemy_in_sight(self.entity) {
                self.attack = Some(AttackTask::opportunistic(self.entity, enemy));
                return;
            }
        }

        if self.travel.has_ended() {
            self.life.mark_ended();
            return;
        }
        self.travel.update(ctx);
        if self.travel.has_ended() {
            self.life.mark_ended();
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("attack-moving to {}", self.destination)
    }
}
