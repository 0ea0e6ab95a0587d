// The resource-credit protocol: fractional spending against an integer
// ledger.
//
// Build, repair and training progress accrue continuously (fractional hit
// points per tick) but faction stockpiles are integers. Paying "a fraction
// of a resource" every tick would either leak value to rounding or
// double-charge. Instead each funded task carries a small credit balance
// per resource kind: when a balance runs dry and that kind is still owed,
// exactly one whole unit moves from the ledger into the balance, and the
// progress applied each tick is clamped so its fractional cost never
// exceeds any balance.
//
// Invariant: over a task's lifetime, whole units withdrawn equal fractional
// cost consumed plus the remaining balance (< 1 unit per kind), and neither
// the ledger nor a balance ever goes negative — under any sequence of time
// deltas.
//
// A faction with zero of a needed resource stalls the task: `fund` returns
// no progress and raises a one-shot warning, cleared silently once the
// resource flows again. Resource insufficiency never terminates a task.
//
// See also: `construction.rs` and `production.rs` for the consumers,
// `faction.rs` for the ledger this draws on.

use crate::entity::ResourceCost;
use crate::event::{SimEvent, SimEventKind, Warning};
use crate::faction::Faction;
use crate::types::ResourceKind;
use serde::{Deserialize, Serialize};

/// Per-kind fractional cost of one hit point of progress.
pub fn per_point_rates(cost: ResourceCost, max_health: f32) -> [f32; 2] {
    let mut rates = [0.0; 2];
    if max_health > 0.0 {
        for kind in ResourceKind::ALL {
            rates[kind.index()] = cost.amount(kind) as f32 / max_health;
        }
    }
    rates
}

/// One task's credit balances. See the module header for the protocol.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceCredit {
    balances: [f32; 2],
    /// Whole units withdrawn from the ledger so far, per kind.
    withdrawn: [u32; 2],
    /// Set while the faction cannot fund the next unit; debounces the
    /// warning to once per onset.
    stalled: bool,
}

impl ResourceCredit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, kind: ResourceKind) -> f32 {
        self.balances[kind.index()]
    }

    pub fn withdrawn(&self, kind: ResourceKind) -> u32 {
        self.withdrawn[kind.index()]
    }

    /// Fund up to `desired` hit points of progress at the given per-point
    /// rates, topping balances up from the faction ledger as needed.
    /// Returns the progress actually funded, which the caller must apply in
    /// full. Returns 0.0 and warns (once per onset) while a needed resource
    /// is missing.
    pub fn fund(
        &mut self,
        desired: f32,
        rates: [f32; 2],
        faction: &mut Faction,
        events: &mut Vec<SimEvent>,
        tick: u64,
    ) -> f32 {
        if desired <= 0.0 {
            return 0.0;
        }

        // Top up every exhausted balance that is still owed, one whole unit
        // at a time. Withdrawal failure stalls the task without ending it.
        for kind in ResourceKind::ALL {
            let i = kind.index();
            if rates[i] > 0.0 && self.balances[i] <= 0.0 {
                if faction.withdraw(kind, 1) {
                    self.balances[i] += 1.0;
                    self.withdrawn[i] += 1;
                } else {
                    if !self.stalled {
                        self.stalled = true;
                        events.push(SimEvent {
                            tick,
                            kind: SimEventKind::Warning {
                                faction: faction.id,
                                warning: Warning::ResourceMissing { kind },
                            },
                        });
                    }
                    return 0.0;
                }
            }
        }
        self.stalled = false;

        // Clamp so no balance is overdrawn, even under a large time delta.
        let mut applied = desired;
        for i in 0..2 {
            if rates[i] > 0.0 {
                applied = applied.min(self.balances[i] / rates[i]);
            }
        }
        for i in 0..2 {
            self.balances[i] -= applied * rates[i];
            debug_assert!(self.balances[i] >= -1e-4, "credit balance went negative");
        }
        applied
    }
}
