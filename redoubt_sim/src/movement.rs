// Movement: the repathing waypoint-follower every relocating task builds on,
// and the follow task that re-aims it at a moving target.
//
// `MoveTask` is the only code that changes an entity's position. It walks
// the current `Path` by linear interpolation, advancing the waypoint index
// as each cell corner is reached or passed, and re-checks the next cell for
// dynamic obstacles before committing to enter it — the pathfinder plans
// around static entities only, so two units crossing paths are resolved
// here, by forcing a repath instead of stepping into the blocker.
//
// Two timers bound the failure modes: `since_attempt` throttles pathfinder
// calls (no thrashing against a moving obstacle), and `no_progress_secs`
// accumulates whenever the entity fails to advance along a path — covering
// both "no route found" and "route found but perpetually blocked". Past the
// failure window the task gives up and ends unreached.
//
// `FollowTask` wraps a `MoveTask` aimed near the target's footprint and
// replaces it only when the target has drifted more than a configured
// fraction of the remaining distance (hysteresis) — a slowly drifting
// target does not cost a repath per tick.
//
// See also: `pathfinding.rs` for `Path`/`PathDestination`, `world.rs` for
// `can_step_to` and `find_path`, `combat.rs`/`harvest.rs` for the tasks
// that embed these.

use crate::pathfinding::{Path, PathDestination};
use crate::task::{Lifecycle, Task, TaskCtx};
use crate::types::{EntityId, Vec2};
use serde::{Deserialize, Serialize};

/// Sentinel for "never attempted": large enough that the first update
/// always clears the repath throttle, finite so it serializes cleanly.
const NEVER_ATTEMPTED: f32 = 1.0e9;

// ---------------------------------------------------------------------------
// MoveTask
// ---------------------------------------------------------------------------

/// Walk an entity toward a destination, repathing as needed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveTask {
    entity: EntityId,
    destination: PathDestination,
    path: Option<Path>,
    next_point: usize,
    /// Seconds since the last pathfinder attempt.
    since_attempt: f32,
    /// Seconds since the entity last advanced along a path. Hitting the
    /// failure window ends the task unreached.
    no_progress_secs: f32,
    reached: bool,
    life: Lifecycle,
}

impl MoveTask {
    pub fn new(entity: EntityId, destination: PathDestination) -> Self {
        Self {
            entity,
            destination,
            path: None,
            next_point: 0,
            since_attempt: NEVER_ATTEMPTED,
            no_progress_secs: 0.0,
            reached: false,
            life: Lifecycle::default(),
        }
    }

    /// Whether the task ended by arriving (as opposed to giving up).
    /// Dependent tasks use this to decide whether to still act.
    pub fn has_reached_destination(&self) -> bool {
        self.reached
    }

    pub fn destination(&self) -> &PathDestination {
        &self.destination
    }

    /// A path is worth keeping if it can produce movement: it reaches the
    /// destination, or it is a partial route with at least one step in it.
    fn usable(path: &Path) -> bool {
        path.complete || path.points.len() > 1
    }
}

impl Task for MoveTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let dt = ctx.step.delta;

        // Re-validate the mover every tick. Losing the movement capability
        // (or dying) is a silent, non-retryable termination.
        let Some(entity) = ctx.world.get(self.entity) else {
            self.life.mark_ended();
            return;
        };
        let (Some(spatial), Some(mobile)) = (&entity.spatial, &entity.mobile) else {
            self.life.mark_ended();
            return;
        };
        let speed = mobile.speed;
        let size = spatial.size;
        let cell = spatial.cell();
        let mut position = spatial.position;

        // Arrived without needing to move (queued order to where we stand)?
        if self.path.is_none() && self.destination.distance_from(cell, size) == 0 {
            self.reached = true;
            self.life.mark_ended();
            return;
        }

        self.since_attempt = (self.since_attempt + dt).min(NEVER_ATTEMPTED);
        self.no_progress_secs += dt;
        if self.no_progress_secs > ctx.config.path_failure_window_secs {
            // Bounded give-up: no route (or no way through) for too long.
            self.life.mark_ended();
            return;
        }

        if self.path.is_none() {
            if self.since_attempt < ctx.config.repath_min_interval_secs {
                return; // throttled; try again later
            }
            self.since_attempt = 0.0;
            let found = ctx
                .world
                .find_path(self.entity, &self.destination, ctx.config.max_path_expansions);
            match found {
                Some(path) if Self::usable(&path) => {
                    self.path = Some(path);
                    self.next_point = 0;
                }
                _ => return, // nothing workable this attempt
            }
        }

        // Walk the path: consume waypoints until this tick's displacement
        // is spent, the path runs out, or an obstacle blocks the next cell.
        let Some(path) = &self.path else { return };
        let mut remaining = speed * dt;
        let mut moved = false;
        let mut heading: Option<Vec2> = None;
        let mut blocked = false;

        while remaining > 1e-6 {
            let Some(&waypoint) = path.points.get(self.next_point) else {
                break;
            };
            let target = Vec2::new(waypoint.x as f32, waypoint.y as f32);
            let to_target = target - position;
            let dist = position.distance(target);
            if dist <= 1e-6 {
                self.next_point += 1;
                continue;
            }
            // Obstacle re-check: never commit to entering an occupied or
            // unwalkable cell; force a repath instead.
            if !ctx.world.can_step_to(self.entity, waypoint) {
                blocked = true;
                break;
            }
            if dist <= remaining {
                position = target;
                remaining -= dist;
                self.next_point += 1;
            } else {
                position = position + to_target * (remaining / dist);
                remaining = 0.0;
            }
            moved = true;
            heading = Some(to_target);
        }

        let exhausted = self
            .path
            .as_ref()
            .is_some_and(|p| self.next_point >= p.points.len());
        let was_complete = self.path.as_ref().is_some_and(|p| p.complete);

        position = ctx.world.clamp_position(position, size);
        if let Some(e) = ctx.world.get_mut(self.entity) {
            if let Some(s) = e.spatial.as_mut() {
                s.position = position;
                if let Some(dir) = heading {
                    if dir.x != 0.0 || dir.y != 0.0 {
                        s.angle = dir.y.atan2(dir.x);
                    }
                }
            }
        }
        if moved {
            self.no_progress_secs = 0.0;
        }

        if blocked {
            self.path = None;
            return;
        }
        if exhausted {
            let cell = position.cell();
            if was_complete && self.destination.distance_from(cell, size) == 0 {
                self.reached = true;
                self.life.mark_ended();
            } else {
                // Partial route spent (or the world shifted): plan again.
                self.path = None;
            }
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        match &self.destination {
            PathDestination::Cell(p) => format!("moving to {p}"),
            PathDestination::Near(r) => format!("moving next to {}", r.min),
        }
    }
}

// ---------------------------------------------------------------------------
// FollowTask
// ---------------------------------------------------------------------------

/// Keep an entity adjacent to a (possibly moving) target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FollowTask {
    entity: EntityId,
    target: EntityId,
    inner: Option<MoveTask>,
    /// Target center when the current inner move was aimed.
    anchor: Option<Vec2>,
    /// Number of times the inner move was (re)issued. Diagnostic; the
    /// hysteresis tests read it.
    pub(crate) repaths: u32,
    reached: bool,
    life: Lifecycle,
}

impl FollowTask {
    pub fn new(entity: EntityId, target: EntityId) -> Self {
        Self {
            entity,
            target,
            inner: None,
            anchor: None,
            repaths: 0,
            reached: false,
            life: Lifecycle::default(),
        }
    }

    pub fn target(&self) -> EntityId {
        self.target
    }

    /// Whether the task ended with the footprints adjacent (success).
    pub fn has_reached_target(&self) -> bool {
        self.reached
    }
}

impl Task for FollowTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let Some(entity) = ctx.world.get(self.entity) else {
            self.life.mark_ended();
            return;
        };
        let (Some(spatial), Some(_)) = (&entity.spatial, &entity.mobile) else {
            self.life.mark_ended();
            return;
        };
        let my_region = spatial.region();
        let my_center = spatial.center();
        let faction = entity.faction;

        // Poll the target: dead, out of the world, or out of sight ends the
        // pursuit.
        let Some(target) = ctx.world.get(self.target) else {
            self.life.mark_ended();
            return;
        };
        let Some(target_spatial) = &target.spatial else {
            self.life.mark_ended();
            return;
        };
        let target_region = target_spatial.region();
        let target_center = target_spatial.center();
        if let Some(f) = faction {
            if !ctx.world.can_see(f, self.target) {
                self.life.mark_ended();
                return;
            }
        }

        // Success: footprints adjacent or intersecting. Region adjacency,
        // not point distance — units occupy footprints, not points.
        if my_region.adjacent_or_intersects(&target_region) {
            self.reached = true;
            self.life.mark_ended();
            return;
        }

        // Hysteresis: re-aim only when the target has drifted by more than
        // the configured fraction of the remaining distance.
        let remaining = my_center.distance(target_center);
        let drifted = self
            .anchor
            .map_or(true, |a| a.distance(target_center) > ctx.config.follow_repath_fraction * remaining);
        if self.inner.is_none() || drifted {
            self.inner = Some(MoveTask::new(self.entity, PathDestination::Near(target_region)));
            self.anchor = Some(target_center);
            self.repaths += 1;
        }

        if let Some(inner) = &mut self.inner {
            inner.update(ctx);
            if inner.has_ended() {
                if inner.has_reached_destination() {
                    // Arrived where the target used to be; re-aim next tick
                    // unless the adjacency check above ends us first.
                    self.inner = None;
                } else {
                    // The approach gave up — pursuit failed.
                    self.life.mark_ended();
                }
            }
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("following {}", self.target)
    }
}
