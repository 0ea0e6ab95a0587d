// Player-visible simulation events.
//
// The engine has no logging framework: everything the embedding shell (UI,
// headless runner, replay checker) needs to surface is emitted as a
// `SimEvent` from `Simulation::step`. This includes the fire-and-forget
// faction warnings raised by stalled tasks ("not enough aladdium", "no room
// to deploy") — tasks debounce these at onset so a stalled task warns once,
// not every tick.
//
// See also: `sim.rs` which collects events during the tick loop, `task.rs`
// for the task contexts that push them.
//
// **Critical constraint: determinism.** Events are outputs only; nothing in
// the simulation reads them back. Their order still matters for replay
// comparison, so they are emitted in entity-update order.

use crate::types::{EntityId, FactionId, Point, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-facing warning raised by a task on behalf of a faction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// The faction ledger has none of the named resource left.
    ResourceMissing { kind: ResourceKind },
    /// Training is gated on food the faction does not have.
    NotEnoughFood,
    /// No free cell around the producing building to place a new unit.
    NoDeployRoom,
    /// The build site is blocked by another entity.
    BuildSiteBlocked,
    /// A harvester holds cargo but the faction has no standing depot.
    NoDepot,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ResourceMissing { kind } => write!(f, "not enough {kind}"),
            Warning::NotEnoughFood => write!(f, "not enough food"),
            Warning::NoDeployRoom => write!(f, "no room to deploy unit"),
            Warning::BuildSiteBlocked => write!(f, "build site is blocked"),
            Warning::NoDepot => write!(f, "no depot to deliver resources to"),
        }
    }
}

/// A narrative event emitted by the simulation for the embedding shell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

/// Types of events visible outside the sim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A task raised a faction warning (stall onset, debounced).
    Warning { faction: FactionId, warning: Warning },
    /// A trainer finished a unit and placed it in the world.
    UnitTrained { trainer: EntityId, unit: EntityId },
    /// A building reached full health and left construction.
    ConstructionCompleted { building: EntityId },
    /// A construction site was placed in the world.
    ConstructionStarted { building: EntityId, location: Point },
    /// A faction finished researching a technology.
    ResearchCompleted { faction: FactionId, technology: String },
    /// An entity died or was destroyed and left the world.
    EntityDied { entity: EntityId },
    /// A harvester deposited its cargo at a depot.
    ResourcesDelivered {
        faction: FactionId,
        kind: ResourceKind,
        amount: u32,
    },
}
