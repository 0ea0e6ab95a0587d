// Factions: resource ledgers, food accounting, research state, diplomacy.
//
// The ledger holds integer stockpiles of the two resource kinds. It is
// mutated only through `withdraw`/`credit` so it can never go negative —
// the fields are private and every debit is checked. Fractional spending is
// a task-side concern (see `credit.rs`); by the time an amount reaches the
// ledger it is whole units.
//
// Food is a capacity model: living units consume `food_cost`, standing
// buildings grant `food_provided`. `world.rs` keeps both sums current on
// spawn and death.
//
// See also: `credit.rs` for the fractional-cost protocol, `production.rs`
// for the research registration contract, `world.rs` for visibility
// queries (which need entity positions and so live on `World`).
//
// **Critical constraint: determinism.** Research sets and stance tables are
// `BTreeSet`/`BTreeMap` for deterministic iteration.

use crate::types::{Diplomacy, FactionId, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One player faction's economic and diplomatic state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    aladdium: u32,
    alagene: u32,
    /// Food consumed by living units.
    pub used_food: u32,
    /// Food granted by standing buildings.
    pub food_capacity: u32,
    researched: BTreeSet<String>,
    /// Technologies currently being researched. Registered at research
    /// start and cleared only by task completion or disposal — see
    /// `ResearchTask` for the contract.
    researching: BTreeSet<String>,
    stances: BTreeMap<FactionId, Diplomacy>,
}

impl Faction {
    pub fn new(id: FactionId, name: &str, aladdium: u32, alagene: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            aladdium,
            alagene,
            used_food: 0,
            food_capacity: 0,
            researched: BTreeSet::new(),
            researching: BTreeSet::new(),
            stances: BTreeMap::new(),
        }
    }

    // -- ledger ------------------------------------------------------------

    pub fn resource(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Aladdium => self.aladdium,
            ResourceKind::Alagene => self.alagene,
        }
    }

    /// Remove `amount` units from the stockpile. Returns `false` (and
    /// changes nothing) when the stockpile is short.
    pub fn withdraw(&mut self, kind: ResourceKind, amount: u32) -> bool {
        let slot = match kind {
            ResourceKind::Aladdium => &mut self.aladdium,
            ResourceKind::Alagene => &mut self.alagene,
        };
        if *slot < amount {
            return false;
        }
        *slot -= amount;
        true
    }

    /// Add `amount` units to the stockpile.
    pub fn credit(&mut self, kind: ResourceKind, amount: u32) {
        match kind {
            ResourceKind::Aladdium => self.aladdium += amount,
            ResourceKind::Alagene => self.alagene += amount,
        }
    }

    // -- food --------------------------------------------------------------

    pub fn remaining_food(&self) -> u32 {
        self.food_capacity.saturating_sub(self.used_food)
    }

    // -- research ----------------------------------------------------------

    pub fn has_researched(&self, technology: &str) -> bool {
        self.researched.contains(technology)
    }

    pub fn is_researching(&self, technology: &str) -> bool {
        self.researching.contains(technology)
    }

    /// Register a technology as in progress.
    pub fn begin_research(&mut self, technology: &str) {
        self.researching.insert(technology.to_string());
    }

    /// Drop an in-progress registration without completing it.
    pub fn cancel_research(&mut self, technology: &str) {
        self.researching.remove(technology);
    }

    /// Move a technology from in-progress to researched.
    pub fn complete_research(&mut self, technology: &str) {
        self.researching.remove(technology);
        self.researched.insert(technology.to_string());
    }

    // -- diplomacy ---------------------------------------------------------

    /// Stance toward another faction. A faction is allied with itself;
    /// everyone else defaults to `Enemy` until a stance is set.
    pub fn stance(&self, other: FactionId) -> Diplomacy {
        if other == self.id {
            return Diplomacy::Ally;
        }
        self.stances.get(&other).copied().unwrap_or(Diplomacy::Enemy)
    }

    pub fn set_stance(&mut self, other: FactionId, stance: Diplomacy) {
        self.stances.insert(other, stance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_refuses_overdraft() {
        let mut faction = Faction::new(FactionId(1), "north", 5, 0);
        assert!(faction.withdraw(ResourceKind::Aladdium, 5));
        assert_eq!(faction.resource(ResourceKind::Aladdium), 0);
        assert!(!faction.withdraw(ResourceKind::Aladdium, 1));
        assert_eq!(faction.resource(ResourceKind::Aladdium), 0);
        assert!(!faction.withdraw(ResourceKind::Alagene, 1));
    }

    #[test]
    fn credit_then_withdraw() {
        let mut faction = Faction::new(FactionId(1), "north", 0, 0);
        faction.credit(ResourceKind::Alagene, 7);
        assert!(faction.withdraw(ResourceKind::Alagene, 7));
        assert_eq!(faction.resource(ResourceKind::Alagene), 0);
    }

    #[test]
    fn research_lifecycle() {
        let mut faction = Faction::new(FactionId(1), "north", 0, 0);
        faction.begin_research("hardened_plating");
        assert!(faction.is_researching("hardened_plating"));
        assert!(!faction.has_researched("hardened_plating"));

        faction.complete_research("hardened_plating");
        assert!(!faction.is_researching("hardened_plating"));
        assert!(faction.has_researched("hardened_plating"));

        faction.begin_research("deep_extraction");
        faction.cancel_research("deep_extraction");
        assert!(!faction.is_researching("deep_extraction"));
        assert!(!faction.has_researched("deep_extraction"));
    }

    #[test]
    fn default_stance_is_enemy_except_self() {
        let mut faction = Faction::new(FactionId(1), "north", 0, 0);
        assert_eq!(faction.stance(FactionId(1)), Diplomacy::Ally);
        assert_eq!(faction.stance(FactionId(2)), Diplomacy::Enemy);
        faction.set_stance(FactionId(2), Diplomacy::Ally);
        assert_eq!(faction.stance(FactionId(2)), Diplomacy::Ally);
    }

    #[test]
    fn remaining_food_saturates() {
        let mut faction = Faction::new(FactionId(1), "north", 0, 0);
        faction.food_capacity = 3;
        faction.used_food = 5;
        assert_eq!(faction.remaining_food(), 0);
    }
}
