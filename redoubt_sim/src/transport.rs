// Embarking: loading a unit into a transporter.
//
// The unit walks up to the transporter (which may itself be moving — the
// approach is a follow, not a plain move) and, once the footprints touch,
// steps out of the world: its spatial component is stowed and its handle
// joins the transporter's carried list. A carried unit is alive but not in
// the world — invisible, untargetable, immobile — until `World::unload`
// puts it back on a cell beside the transporter.
//
// The compound-task shape applies: transporter death, a full hold, or a
// failed approach all end the task gracefully.
//
// See also: `world.rs` for `unload`, `entity.rs` for
// `stow_spatial`/`place_at`, `movement.rs` for the follow leg.

use crate::movement::FollowTask;
use crate::task::{Lifecycle, Task, TaskCtx};
use crate::types::EntityId;
use serde::{Deserialize, Serialize};

/// Board a transporter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbarkTask {
    entity: EntityId,
    transporter: EntityId,
    follow: Option<FollowTask>,
    life: Lifecycle,
}

impl EmbarkTask {
    pub fn new(entity: EntityId, transporter: EntityId) -> Self {
        Self { entity, transporter, follow: None, life: Lifecycle::default() }
    }
}

impl Task for EmbarkTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let unit_state = ctx.world.get(self.entity).and_then(|e| {
            let s = e.spatial.as_ref()?;
            e.mobile?;
            Some((s.region(), e.faction))
        });
        let Some((my_region, faction)) = unit_state else {
            self.life.mark_ended();
            return;
        };

        // The ride must be alive, placed, ours, and have room.
        let ride_state = ctx.world.get(self.transporter).and_then(|t| {
            let s = t.spatial.as_ref()?;
            let hold = t.transporter.as_ref()?;
            Some((s.region(), t.faction, hold.is_full()))
        });
        let Some((ride_region, ride_faction, full)) = ride_state else {
            self.life.mark_ended();
            return;
        };
        if full || ride_faction != faction {
            self.life.mark_ended();
            return;
        }

        if my_region.adjacent_or_intersects(&ride_region) {
            // Board: leave the world, join the hold.
            if let Some(unit) = ctx.world.get_mut(self.entity) {
                unit.stow_spatial();
            }
            if let Some(hold) = ctx
                .world
                .get_mut(self.transporter)
                .and_then(|t| t.transporter.as_mut())
            {
                hold.carried.push(self.entity);
            }
            self.life.mark_ended();
            return;
        }

        if self.follow.is_none() {
            self.follow = Some(FollowTask::new(self.entity, self.transporter));
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

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        format!("boarding {}", self.transporter)
    }
}
