// Data-driven game configuration.
//
// All tunable simulation parameters live in `GameConfig`, loaded from JSON
// at startup or built from `GameConfig::standard()`. The sim never uses
// magic numbers — tasks read the repath throttle, hysteresis fraction,
// deposit delay and scan intervals from here, and every unit or building is
// instantiated from a `Prototype` entry. This enables balance iteration
// without recompilation, and in lockstep multiplayer all peers must run
// identical configs.
//
// See also: `entity.rs` for how prototype stats become entity components,
// `sim.rs` which owns the `GameConfig` as part of `Simulation`,
// `production.rs` for the `Technology` table consumers.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. All peers must use identical configs for identical
// results.

use crate::types::CollisionLayer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Prototype — per-unit-type stats
// ---------------------------------------------------------------------------

/// Attack capability stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackStats {
    /// Hit points removed per strike, before armor.
    pub power: f32,
    /// Maximum closest-cell gap at which the attack lands, in cells.
    /// 1 = melee (adjacent regions).
    pub range: u32,
    /// Seconds between strikes.
    pub delay_secs: f32,
}

/// Heal capability stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealStats {
    /// Hit points restored per second.
    pub speed: f32,
    /// Maximum closest-cell gap at which healing works, in cells.
    pub range: u32,
}

/// Harvest capability stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestStats {
    /// Resource units extracted per second.
    pub extract_speed: f32,
    /// Units carried before the harvester must deliver.
    pub capacity: u32,
}

/// Everything needed to instantiate one kind of unit or building.
///
/// A prototype is a bag of optional capabilities: a field left `None` means
/// entities of this kind never have that capability. Stats are copied onto
/// the entity's components at spawn (see `entity.rs`), so tasks answer
/// "get stat S of entity E" without a config lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub name: String,
    /// Footprint side length in cells.
    pub size: u32,
    pub layer: CollisionLayer,
    /// Sight radius in cells, from the footprint center.
    pub sight_range: f32,
    pub max_health: f32,
    pub armor: f32,
    pub aladdium_cost: u32,
    pub alagene_cost: u32,
    /// Food consumed while this entity lives (units).
    pub food_cost: u32,
    /// Food capacity granted while this entity lives (houses, depots).
    pub food_provided: u32,
    /// Movement speed in cells per second. `None` = immobile.
    pub speed: Option<f32>,
    pub attack: Option<AttackStats>,
    pub heal: Option<HealStats>,
    pub harvest: Option<HarvestStats>,
    /// Build/repair speed in hit points per second. `None` = cannot build.
    pub build_speed: Option<f32>,
    /// Training speed in hit points per second. `None` = cannot train.
    pub train_speed: Option<f32>,
    /// Number of units this entity can carry. `None` = not a transporter.
    pub transport_capacity: Option<u32>,
    /// Whether harvesters can deliver resources here.
    pub is_depot: bool,
}

impl Prototype {
    /// Base prototype with no capabilities; presets override what they need.
    fn base(name: &str, size: u32, max_health: f32) -> Self {
        Self {
            name: name.to_string(),
            size,
            layer: CollisionLayer::Ground,
            sight_range: 8.0,
            max_health,
            armor: 0.0,
            aladdium_cost: 0,
            alagene_cost: 0,
            food_cost: 0,
            food_provided: 0,
            speed: None,
            attack: None,
            heal: None,
            harvest: None,
            build_speed: None,
            train_speed: None,
            transport_capacity: None,
            is_depot: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Technology — research table
// ---------------------------------------------------------------------------

/// A researchable technology. Cost is withdrawn atomically at research
/// start; `duration_secs` of trainer time completes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    pub aladdium_cost: u32,
    pub alagene_cost: u32,
    pub duration_secs: f32,
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Complete set of simulation tunables plus the prototype and technology
/// tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// World grid dimensions in cells.
    pub world_size: (u32, u32),
    /// Simulated seconds per tick.
    pub tick_duration_secs: f32,
    /// Minimum seconds between two pathfinder attempts by one move task.
    /// Prevents thrashing the pathfinder against a moving obstacle.
    pub repath_min_interval_secs: f32,
    /// Seconds a move task may go without a usable path before giving up.
    pub path_failure_window_secs: f32,
    /// Upper bound on A* node expansions per query; past it the search
    /// returns its best partial route.
    pub max_path_expansions: u32,
    /// A follow task repaths only once its target has drifted by more than
    /// this fraction of the remaining distance.
    pub follow_repath_fraction: f32,
    /// Seconds a harvester waits at a depot before the ledger is credited.
    pub deposit_delay_secs: f32,
    /// Ticks between enemy scans for stand-guard and zone-attack tasks.
    pub scan_interval_ticks: u64,
    pub prototypes: BTreeMap<String, Prototype>,
    pub technologies: BTreeMap<String, Technology>,
}

impl GameConfig {
    /// The standard rule set: a playable default prototype roster and
    /// baseline tuning. Tests that need special stats build their own
    /// prototypes instead of bending these.
    pub fn standard() -> Self {
        let mut prototypes = BTreeMap::new();

        let keep = Prototype {
            sight_range: 10.0,
            aladdium_cost: 400,
            food_provided: 10,
            train_speed: Some(10.0),
            is_depot: true,
            ..Prototype::base("keep", 3, 500.0)
        };

        let house = Prototype {
            aladdium_cost: 80,
            food_provided: 5,
            ..Prototype::base("house", 2, 150.0)
        };

        let worker = Prototype {
            aladdium_cost: 50,
            food_cost: 1,
            speed: Some(3.0),
            attack: Some(AttackStats { power: 3.0, range: 1, delay_secs: 1.0 }),
            harvest: Some(HarvestStats { extract_speed: 1.0, capacity: 10 }),
            build_speed: Some(15.0),
            ..Prototype::base("worker", 1, 50.0)
        };

        let warrior = Prototype {
            aladdium_cost: 80,
            alagene_cost: 20,
            food_cost: 1,
            armor: 2.0,
            speed: Some(4.0),
            attack: Some(AttackStats { power: 10.0, range: 1, delay_secs: 0.8 }),
            ..Prototype::base("warrior", 1, 120.0)
        };

        let medic = Prototype {
            aladdium_cost: 60,
            alagene_cost: 40,
            food_cost: 1,
            speed: Some(3.5),
            heal: Some(HealStats { speed: 8.0, range: 2 }),
            ..Prototype::base("medic", 1, 60.0)
        };

        let barge = Prototype {
            aladdium_cost: 120,
            alagene_cost: 60,
            food_cost: 2,
            layer: CollisionLayer::Air,
            speed: Some(5.0),
            transport_capacity: Some(4),
            ..Prototype::base("barge", 2, 200.0)
        };

        for proto in [keep, house, worker, warrior, medic, barge] {
            prototypes.insert(proto.name.clone(), proto);
        }

        let mut technologies = BTreeMap::new();
        technologies.insert(
            "hardened_plating".to_string(),
            Technology { aladdium_cost: 150, alagene_cost: 50, duration_secs: 30.0 },
        );
        technologies.insert(
            "deep_extraction".to_string(),
            Technology { aladdium_cost: 100, alagene_cost: 100, duration_secs: 45.0 },
        );

        Self {
            world_size: (128, 128),
            tick_duration_secs: 0.05,
            repath_min_interval_secs: 0.4,
            path_failure_window_secs: 4.0,
            max_path_expansions: 4096,
            follow_repath_fraction: 0.1,
            deposit_delay_secs: 0.5,
            scan_interval_ticks: 10,
            prototypes,
            technologies,
        }
    }

    pub fn prototype(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }

    pub fn technology(&self, name: &str) -> Option<&Technology> {
        self.technologies.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_has_expected_roster() {
        let config = GameConfig::standard();
        for name in ["keep", "house", "worker", "warrior", "medic", "barge"] {
            assert!(config.prototype(name).is_some(), "missing prototype {name}");
        }
        let keep = config.prototype("keep").unwrap();
        assert!(keep.is_depot);
        assert!(keep.train_speed.is_some());
        assert!(keep.speed.is_none());

        let worker = config.prototype("worker").unwrap();
        assert!(worker.harvest.is_some());
        assert!(worker.build_speed.is_some());
    }

    #[test]
    fn config_serialization_roundtrip() {
        let config = GameConfig::standard();
        let json = serde_json::to_string(&config).unwrap();
        let restored: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.prototypes.len(), config.prototypes.len());
        assert_eq!(
            restored.prototype("warrior").unwrap().attack,
            config.prototype("warrior").unwrap().attack
        );
        assert_eq!(restored.tick_duration_secs, config.tick_duration_secs);
    }
}
