// Harvesting: shuttle resources from a node to a faction depot.
//
// The task is a phase machine: walk to the node, extract until the carry
// limit, walk to the nearest standing depot, wait out the deposit delay,
// credit the ledger with the whole load in one shot, repeat. Extraction
// accumulates a fractional counter at the harvester's extract speed and
// moves one whole unit from node to carrier each time it crosses 1.0 — the
// node's integer stock never leaks fractions.
//
// Failure shape, per the error-handling design: an emptied node with an
// empty carrier ends the task; with cargo aboard it diverts to delivery
// first so nothing already mined is lost. A lost depot triggers a re-search
// (one-shot warning and a per-tick retry while the faction has no standing
// depot at all); only an unreachable route ends the task.
//
// See also: `movement.rs` for the travel legs, `world.rs` for
// `nearest_depot`, `event.rs` for the delivery event.

use crate::event::{SimEvent, SimEventKind, Warning};
use crate::movement::MoveTask;
use crate::pathfinding::PathDestination;
use crate::task::{Lifecycle, Task, TaskCtx};
use crate::types::{EntityId, FactionId, Region, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
enum HarvestPhase {
    /// Walking up to the node. The travel leg is created on first update,
    /// once the node's footprint is known.
    ToNode { travel: Option<MoveTask> },
    /// Adjacent to the node, accumulating the extraction counter.
    Extracting { counter: f32 },
    /// Hauling a load to a depot.
    ToDepot { depot: EntityId, travel: MoveTask },
    /// At the depot, waiting out the deposit delay.
    Depositing { depot: EntityId, elapsed: f32 },
}

/// What an update decided to do next; applied after the phase borrow ends.
enum Next {
    Stay,
    End,
    Phase(HarvestPhase),
    SeekDepot,
}

/// Harvest a resource node, delivering loads to the faction's depots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestTask {
    entity: EntityId,
    node: EntityId,
    phase: HarvestPhase,
    carried: u32,
    /// Kind of the resource being carried; set by the first extraction.
    kind: Option<ResourceKind>,
    warned_no_depot: bool,
    life: Lifecycle,
}

impl HarvestTask {
    pub fn new(entity: EntityId, node: EntityId) -> Self {
        Self {
            entity,
            node,
            phase: HarvestPhase::ToNode { travel: None },
            carried: 0,
            kind: None,
            warned_no_depot: false,
            life: Lifecycle::default(),
        }
    }

    pub fn node(&self) -> EntityId {
        self.node
    }

    /// Divert to the nearest standing depot, or warn (once per onset) and
    /// hold position until one exists again.
    fn seek_depot(&mut self, ctx: &mut TaskCtx<'_>, faction: FactionId) {
        let from = ctx
            .world
            .get(self.entity)
            .and_then(|e| e.center())
            .unwrap_or_default();
        match ctx.world.nearest_depot(faction, from) {
            Some(depot) => {
                self.warned_no_depot = false;
                let region = ctx
                    .world
                    .get(depot)
                    .and_then(|d| d.region())
                    .unwrap_or(Region::new(from.cell(), 1));
                self.phase = HarvestPhase::ToDepot {
                    depot,
                    travel: MoveTask::new(self.entity, PathDestination::Near(region)),
                };
            }
            None => {
                let mut warned = self.warned_no_depot;
                ctx.warn_once(&mut warned, faction, Warning::NoDepot);
                self.warned_no_depot = warned;
            }
        }
    }
}

impl Task for HarvestTask {
    fn update(&mut self, ctx: &mut TaskCtx<'_>) {
        let Some(harvester) = ctx.world.get(self.entity) else {
            self.life.mark_ended();
            return;
        };
        let (Some(spatial), Some(stats)) = (&harvester.spatial, harvester.harvest) else {
            self.life.mark_ended();
            return;
        };
        let Some(faction) = harvester.faction else {
            self.life.mark_ended();
            return;
        };
        let my_region = spatial.region();

        // Node status, polled fresh every tick.
        let node_region = ctx
            .world
            .get(self.node)
            .filter(|n| n.is_harvestable())
            .and_then(|n| n.region());

        let next = match &mut self.phase {
            HarvestPhase::ToNode { travel } => match node_region {
                None if self.carried > 0 => Next::SeekDepot,
                None => Next::End,
                Some(region) if my_region.adjacent_or_intersects(&region) => {
                    Next::Phase(HarvestPhase::Extracting { counter: 0.0 })
                }
                Some(region) => {
                    let leg = travel.get_or_insert_with(|| {
                        MoveTask::new(self.entity, PathDestination::Near(region))
                    });
                    leg.update(ctx);
                    if leg.has_ended() {
                        if leg.has_reached_destination() {
                            *travel = None; // adjacency check decides next tick
                            Next::Stay
                        } else {
                            Next::End // node unreachable
                        }
                    } else {
                        Next::Stay
                    }
                }
            },
            HarvestPhase::Extracting { counter } => {
                match node_region {
                    None if self.carried > 0 => Next::SeekDepot,
                    None => Next::End,
                    Some(_) => {
                        *counter += stats.extract_speed * ctx.step.delta;
                        while *counter >= 1.0 && self.carried < stats.capacity {
                            let Some(node) = ctx
                                .world
                                .get_mut(self.node)
                                .and_then(|n| n.resource_node.as_mut())
                            else {
                                break;
                            };
                            if node.amount == 0 {
                                break;
                            }
                            node.amount -= 1;
                            self.kind = Some(node.kind);
                            self.carried += 1;
                            *counter -= 1.0;
                        }
                        // A drained node leaves the world immediately.
                        let emptied = ctx
                            .world
                            .get(self.node)
                            .and_then(|n| n.resource_node)
                            .is_some_and(|n| n.amount == 0);
                        if emptied {
                            ctx.world.despawn(self.node);
                        }
                        if self.carried >= stats.capacity {
                            Next::SeekDepot
                        } else if emptied {
                            if self.carried > 0 { Next::SeekDepot } else { Next::End }
                        } else {
                            Next::Stay
                        }
                    }
                }
            }
            HarvestPhase::ToDepot { depot, travel } => {
                let depot_region = ctx
                    .world
                    .get(*depot)
                    .filter(|d| d.accepts_resources_for(faction))
                    .and_then(|d| d.region());
                match depot_region {
                    None => Next::SeekDepot, // depot lost mid-delivery
                    Some(region) if my_region.adjacent_or_intersects(&region) => {
                        Next::Phase(HarvestPhase::Depositing { depot: *depot, elapsed: 0.0 })
                    }
                    Some(_) => {
                        travel.update(ctx);
                        if travel.has_ended() && !travel.has_reached_destination() {
                            Next::End // no route to any depot
                        } else {
                            Next::Stay
                        }
                    }
                }
            }
            HarvestPhase::Depositing { depot, elapsed } => {
                let depot_ok = ctx
                    .world
                    .get(*depot)
                    .is_some_and(|d| d.accepts_resources_for(faction));
                if !depot_ok {
                    Next::SeekDepot
                } else {
                    *elapsed += ctx.step.delta;
                    if *elapsed < ctx.config.deposit_delay_secs {
                        Next::Stay
                    } else {
                        // The whole load lands on the ledger in one shot.
                        if let (Some(kind), Some(f)) =
                            (self.kind, ctx.world.faction_mut(faction))
                        {
                            f.credit(kind, self.carried);
                            ctx.events.push(SimEvent {
                                tick: ctx.step.tick,
                                kind: SimEventKind::ResourcesDelivered {
                                    faction,
                                    kind,
                                    amount: self.carried,
                                },
                            });
                        }
                        self.carried = 0;
                        if node_region.is_some() {
                            Next::Phase(HarvestPhase::ToNode { travel: None })
                        } else {
                            Next::End
                        }
                    }
                }
            }
        };

        match next {
            Next::Stay => {}
            Next::End => self.life.mark_ended(),
            Next::Phase(phase) => self.phase = phase,
            Next::SeekDepot => self.seek_depot(ctx, faction),
        }
    }

    fn has_ended(&self) -> bool {
        self.life.has_ended()
    }

    fn description(&self) -> String {
        match self.phase {
            HarvestPhase::ToNode { .. } | HarvestPhase::Extracting { .. } => {
                "harvesting".to_string()
            }
            HarvestPhase::ToDepot { .. } | HarvestPhase::Depositing { .. } => {
                "delivering resources".to_string()
            }
        }
    }
}
