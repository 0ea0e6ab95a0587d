// Entities and their capability components.
//
// An `Entity` is identity plus an optional set of capabilities: a worker has
// `Spatial` + `Mobile` + `Harvester`-style stats, a keep has `Spatial` +
// training + depot flags but no `Mobile`, a resource node has only
// `Spatial` + `ResourceNode`. Tasks never downcast — they ask "does this
// entity still have capability X" by checking the `Option` each tick, which
// is also how capability loss mid-task is detected.
//
// Stats are copied from the `Prototype` at spawn so runtime queries never
// touch the config table. The `prototype` name is kept for descriptions and
// for training/production cost lookups.
//
// See also: `config.rs` for `Prototype`, `world.rs` for the arena that owns
// all entities, `task.rs` for the consumers.

use crate::config::{AttackStats, HarvestStats, HealStats, Prototype};
use crate::types::{CollisionLayer, EntityId, FactionId, Point, Region, ResourceKind, Vec2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Presence in the world: position, facing, footprint, layer, sight.
/// Removed while an entity rides inside a transporter ("alive but not in
/// world").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Spatial {
    /// Continuous position of the footprint's minimum corner, in cells.
    pub position: Vec2,
    /// Facing angle in radians.
    pub angle: f32,
    /// Footprint side length in cells.
    pub size: u32,
    pub layer: CollisionLayer,
    /// Sight radius in cells, from the footprint center.
    pub sight_range: f32,
}

impl Spatial {
    /// The grid cell this entity is currently aligned to (nearest cell).
    pub fn cell(&self) -> Point {
        Point::new(self.position.x.round() as i32, self.position.y.round() as i32)
    }

    /// The grid footprint currently occupied.
    pub fn region(&self) -> Region {
        Region::new(self.cell(), self.size)
    }

    pub fn center(&self) -> Vec2 {
        let half = self.size as f32 / 2.0;
        self.position + Vec2::new(half, half)
    }

    /// Turn to face a world position.
    pub fn face(&mut self, target: Vec2) {
        let d = target - self.center();
        if d.x != 0.0 || d.y != 0.0 {
            self.angle = d.y.atan2(d.x);
        }
    }
}

/// Ability to move. Stripping this component ends any move task silently.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Mobile {
    /// Cells per second.
    pub speed: f32,
}

/// Hit points and armor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub armor: f32,
}

impl Health {
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    pub fn missing(&self) -> f32 {
        (self.max - self.current).max(0.0)
    }
}

/// Ability to carry other units.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transporter {
    pub capacity: u32,
    pub carried: Vec<EntityId>,
}

impl Transporter {
    pub fn is_full(&self) -> bool {
        self.carried.len() as u32 >= self.capacity
    }
}

/// A deposit of raw resources that harvesters extract from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ResourceNode {
    pub kind: ResourceKind,
    pub amount: u32,
}

/// Purchase price copied from the prototype; drives the credit protocol's
/// per-hit-point cost rates for construction and repair.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ResourceCost {
    pub aladdium: u32,
    pub alagene: u32,
}

impl ResourceCost {
    pub fn amount(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Aladdium => self.aladdium,
            ResourceKind::Alagene => self.alagene,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One entity in the world arena. See the module header for the capability
/// model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Prototype name, `None` for ownerless things like resource nodes.
    pub prototype: Option<String>,
    /// Owning faction, `None` for ownerless entities.
    pub faction: Option<FactionId>,
    pub spatial: Option<Spatial>,
    /// Spatial component parked while the entity rides a transporter.
    pub stowed_spatial: Option<Spatial>,
    pub mobile: Option<Mobile>,
    pub health: Option<Health>,
    pub attack: Option<AttackStats>,
    pub heal: Option<HealStats>,
    pub harvest: Option<HarvestStats>,
    /// Build/repair speed in hit points per second.
    pub build_speed: Option<f32>,
    /// Training speed in hit points per second.
    pub train_speed: Option<f32>,
    pub transporter: Option<Transporter>,
    pub resource_node: Option<ResourceNode>,
    pub cost: ResourceCost,
    pub food_cost: u32,
    pub food_provided: u32,
    pub is_depot: bool,
    /// True from placement until construction drives health to max.
    pub under_construction: bool,
    /// Where units produced by this entity gather, if set.
    pub rally_point: Option<Point>,
}

impl Entity {
    /// Instantiate an entity of the given prototype at a cell.
    ///
    /// When `under_construction` is set, the entity starts at 1 hp and must
    /// be built up to full by construction progress (see `construction.rs`);
    /// otherwise it spawns at full health.
    pub fn from_prototype(
        id: EntityId,
        proto: &Prototype,
        faction: FactionId,
        cell: Point,
        under_construction: bool,
    ) -> Self {
        let current = if under_construction { 1.0 } else { proto.max_health };
        Self {
            id,
            prototype: Some(proto.name.clone()),
            faction: Some(faction),
            spatial: Some(Spatial {
                position: Vec2::new(cell.x as f32, cell.y as f32),
                angle: 0.0,
                size: proto.size,
                layer: proto.layer,
                sight_range: proto.sight_range,
            }),
            stowed_spatial: None,
            mobile: proto.speed.map(|speed| Mobile { speed }),
            health: Some(Health { current, max: proto.max_health, armor: proto.armor }),
            attack: proto.attack,
            heal: proto.heal,
            harvest: proto.harvest,
            build_speed: proto.build_speed,
            train_speed: proto.train_speed,
            transporter: proto
                .transport_capacity
                .map(|capacity| Transporter { capacity, carried: Vec::new() }),
            resource_node: None,
            cost: ResourceCost {
                aladdium: proto.aladdium_cost,
                alagene: proto.alagene_cost,
            },
            food_cost: proto.food_cost,
            food_provided: proto.food_provided,
            is_depot: proto.is_depot,
            under_construction,
            rally_point: None,
        }
    }

    /// Instantiate an ownerless resource node.
    pub fn resource_node(
        id: EntityId,
        kind: ResourceKind,
        amount: u32,
        cell: Point,
        size: u32,
    ) -> Self {
        Self {
            id,
            prototype: None,
            faction: None,
            spatial: Some(Spatial {
                position: Vec2::new(cell.x as f32, cell.y as f32),
                angle: 0.0,
                size,
                layer: CollisionLayer::Ground,
                sight_range: 0.0,
            }),
            stowed_spatial: None,
            mobile: None,
            health: None,
            attack: None,
            heal: None,
            harvest: None,
            build_speed: None,
            train_speed: None,
            transporter: None,
            resource_node: Some(ResourceNode { kind, amount }),
            cost: ResourceCost::default(),
            food_cost: 0,
            food_provided: 0,
            is_depot: false,
            under_construction: false,
            rally_point: None,
        }
    }

    /// The footprint region, if the entity is in the world.
    pub fn region(&self) -> Option<Region> {
        self.spatial.as_ref().map(Spatial::region)
    }

    /// Footprint center, if the entity is in the world.
    pub fn center(&self) -> Option<Vec2> {
        self.spatial.as_ref().map(Spatial::center)
    }

    /// True when this entity can still be harvested from.
    pub fn is_harvestable(&self) -> bool {
        self.resource_node.is_some_and(|node| node.amount > 0)
    }

    /// True when harvesters of `faction` may deliver here.
    pub fn accepts_resources_for(&self, faction: FactionId) -> bool {
        self.is_depot && !self.under_construction && self.faction == Some(faction)
    }

    /// Park the spatial component — the entity stays alive but leaves the
    /// world (embarking on a transporter).
    pub fn stow_spatial(&mut self) {
        self.stowed_spatial = self.spatial.take();
    }

    /// Restore the parked spatial component at a cell (unloading).
    pub fn place_at(&mut self, cell: Point) {
        if let Some(mut spatial) = self.stowed_spatial.take() {
            spatial.position = Vec2::new(cell.x as f32, cell.y as f32);
            self.spatial = Some(spatial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn worker_at(cell: Point) -> Entity {
        let config = GameConfig::standard();
        Entity::from_prototype(
            EntityId { index: 0, generation: 0 },
            config.prototype("worker").unwrap(),
            FactionId(1),
            cell,
            false,
        )
    }

    #[test]
    fn from_prototype_copies_capabilities() {
        let worker = worker_at(Point::new(4, 4));
        assert!(worker.mobile.is_some());
        assert!(worker.harvest.is_some());
        assert!(worker.attack.is_some());
        assert!(worker.heal.is_none());
        assert!(worker.train_speed.is_none());
        assert_eq!(worker.region().unwrap(), Region::new(Point::new(4, 4), 1));
        assert!(worker.health.unwrap().is_full());
    }

    #[test]
    fn under_construction_starts_at_one_hp() {
        let config = GameConfig::standard();
        let keep = Entity::from_prototype(
            EntityId { index: 1, generation: 0 },
            config.prototype("keep").unwrap(),
            FactionId(1),
            Point::new(10, 10),
            true,
        );
        assert!(keep.under_construction);
        assert_eq!(keep.health.unwrap().current, 1.0);
        assert!(!keep.accepts_resources_for(FactionId(1)));
    }

    #[test]
    fn spatial_cell_rounds_to_nearest() {
        let mut worker = worker_at(Point::new(3, 3));
        let spatial = worker.spatial.as_mut().unwrap();
        spatial.position = Vec2::new(3.4, 3.0);
        assert_eq!(spatial.cell(), Point::new(3, 3));
        spatial.position = Vec2::new(3.6, 3.0);
        assert_eq!(spatial.cell(), Point::new(4, 3));
    }

    #[test]
    fn face_points_at_target() {
        let mut worker = worker_at(Point::new(0, 0));
        let spatial = worker.spatial.as_mut().unwrap();
        spatial.face(Vec2::new(10.5, 0.5));
        assert!(spatial.angle.abs() < 1e-3);
        spatial.face(Vec2::new(0.5, 10.5));
        assert!((spatial.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn resource_node_is_harvestable_until_empty() {
        let mut node = Entity::resource_node(
            EntityId { index: 2, generation: 0 },
            ResourceKind::Aladdium,
            3,
            Point::new(8, 8),
            2,
        );
        assert!(node.is_harvestable());
        node.resource_node.as_mut().unwrap().amount = 0;
        assert!(!node.is_harvestable());
    }
}
