// The world: terrain grid, entity arena, factions, spatial queries.
//
// `World` owns every entity in a generational arena. All other code — tasks,
// plans, queues — holds `EntityId` handles and re-resolves them through
// `get`/`get_mut` at time of use, which is what makes entity death safe
// everywhere: a stale handle resolves to `None`, never to a recycled slot's
// new occupant.
//
// Terrain is a flat `Vec<bool>` walkability grid indexed `x + y * width`
// with out-of-bounds reads returning unwalkable, the same dense-grid scheme
// as a voxel world but in two dimensions. Occupancy queries scan the arena
// in slot order; at the entity counts this engine targets that is cheap and
// keeps every answer deterministic.
//
// See also: `entity.rs` for the capability components, `faction.rs` for
// ledgers, `pathfinding.rs` for the route search `find_path` wraps,
// `sim.rs` for the stepper that owns the `World`.
//
// **Critical constraint: determinism.** Arena iteration is slot-ordered;
// nearest-X queries break distance ties on `EntityId`. No hash maps.

use crate::config::Prototype;
use crate::entity::Entity;
use crate::faction::Faction;
use crate::pathfinding::{self, Path, PathDestination};
use crate::types::{CollisionLayer, EntityId, FactionId, Point, Region, ResourceKind, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One arena slot. The generation counts how many entities have occupied
/// this slot; handles embed it so stale handles cannot resolve.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// The game world: terrain, entities, factions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    width: u32,
    height: u32,
    /// Flat walkability grid: index = x + y * width.
    terrain: Vec<bool>,
    slots: Vec<Slot>,
    pub factions: BTreeMap<FactionId, Faction>,
}

impl World {
    /// Create a world of the given size with all terrain walkable.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            terrain: vec![true; (width as usize) * (height as usize)],
            slots: Vec::new(),
            factions: BTreeMap::new(),
        }
    }

    pub fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    // -- terrain -----------------------------------------------------------

    pub fn in_bounds(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }

    fn terrain_index(&self, p: Point) -> Option<usize> {
        if self.in_bounds(p) {
            Some(p.x as usize + p.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Whether terrain at a cell is walkable. Out of bounds is unwalkable.
    pub fn is_walkable(&self, p: Point) -> bool {
        self.terrain_index(p).map(|i| self.terrain[i]).unwrap_or(false)
    }

    /// Mark a cell walkable or not. No-op out of bounds.
    pub fn set_walkable(&mut self, p: Point, walkable: bool) {
        if let Some(i) = self.terrain_index(p) {
            self.terrain[i] = walkable;
        }
    }

    /// Clamp a footprint's min-corner position so the footprint stays in
    /// bounds.
    pub fn clamp_position(&self, position: Vec2, size: u32) -> Vec2 {
        let max_x = (self.width.saturating_sub(size)) as f32;
        let max_y = (self.height.saturating_sub(size)) as f32;
        Vec2::new(position.x.clamp(0.0, max_x), position.y.clamp(0.0, max_y))
    }

    // -- factions ----------------------------------------------------------

    pub fn register_faction(&mut self, faction: Faction) -> FactionId {
        let id = faction.id;
        self.factions.insert(id, faction);
        id
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn faction_mut(&mut self, id: FactionId) -> Option<&mut Faction> {
        self.factions.get_mut(&id)
    }

    // -- arena -------------------------------------------------------------

    fn alloc(&mut self) -> EntityId {
        // Reuse the lowest free slot; otherwise grow. Lowest-first keeps
        // allocation order deterministic across peers.
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.entity.is_none() {
                return EntityId { index: index as u32, generation: slot.generation };
            }
        }
        self.slots.push(Slot { generation: 0, entity: None });
        EntityId { index: (self.slots.len() - 1) as u32, generation: 0 }
    }

    fn install(&mut self, id: EntityId, entity: Entity) {
        self.slots[id.index as usize].entity = Some(entity);
    }

    /// Spawn an entity of a prototype at a cell. Food cost is charged to
    /// the faction immediately; food provided is granted only once the
    /// entity is a standing (not under-construction) building.
    pub fn spawn_unit(
        &mut self,
        proto: &Prototype,
        faction: FactionId,
        cell: Point,
        under_construction: bool,
    ) -> EntityId {
        let id = self.alloc();
        let entity = Entity::from_prototype(id, proto, faction, cell, under_construction);
        if let Some(f) = self.factions.get_mut(&faction) {
            f.used_food += entity.food_cost;
            if !under_construction {
                f.food_capacity += entity.food_provided;
            }
        }
        self.install(id, entity);
        id
    }

    /// Spawn an ownerless resource node.
    pub fn spawn_node(
        &mut self,
        kind: ResourceKind,
        amount: u32,
        cell: Point,
        size: u32,
    ) -> EntityId {
        let id = self.alloc();
        let entity = Entity::resource_node(id, kind, amount, cell, size);
        self.install(id, entity);
        id
    }

    /// Remove an entity from the world, unwinding its faction food
    /// bookkeeping. Units carried by a despawned transporter are removed
    /// with it.
    pub fn despawn(&mut self, id: EntityId) {
        let Some(entity) = self.take(id) else { return };
        if let Some(faction) = entity.faction {
            if let Some(f) = self.factions.get_mut(&faction) {
                f.used_food = f.used_food.saturating_sub(entity.food_cost);
                if !entity.under_construction {
                    f.food_capacity = f.food_capacity.saturating_sub(entity.food_provided);
                }
            }
        }
        if let Some(transporter) = &entity.transporter {
            for carried in transporter.carried.clone() {
                self.despawn(carried);
            }
        }
    }

    fn take(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entity = slot.entity.take()?;
        slot.generation += 1;
        Some(entity)
    }

    /// Resolve a handle. `None` once the entity has died.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// All live entity handles in deterministic slot order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.entity.as_ref().map(|_| EntityId {
                    index: index as u32,
                    generation: slot.generation,
                })
            })
            .collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    // -- occupancy ---------------------------------------------------------

    /// Whether a region is in bounds, on walkable terrain, and free of any
    /// entity on the given layer (other than `exclude`).
    pub fn is_free(&self, region: Region, layer: CollisionLayer, exclude: Option<EntityId>) -> bool {
        let cells = region.cells();
        if !cells.iter().all(|c| self.is_walkable(*c)) {
            return false;
        }
        !self.entities().any(|e| {
            Some(e.id) != exclude
                && e.spatial
                    .as_ref()
                    .is_some_and(|s| s.layer == layer && s.region().intersects(&region))
        })
    }

    /// Like `is_free`, but ignoring mobile entities — the static view the
    /// pathfinder plans against. Dynamic blockers are handled by the move
    /// task's per-tick obstacle re-check instead.
    fn is_free_of_static(
        &self,
        region: Region,
        layer: CollisionLayer,
        exclude: Option<EntityId>,
    ) -> bool {
        let cells = region.cells();
        if !cells.iter().all(|c| self.is_walkable(*c)) {
            return false;
        }
        !self.entities().any(|e| {
            Some(e.id) != exclude
                && e.mobile.is_none()
                && e.spatial
                    .as_ref()
                    .is_some_and(|s| s.layer == layer && s.region().intersects(&region))
        })
    }

    /// The first entity (slot order) whose footprint covers a point on the
    /// given layer.
    pub fn entity_at(&self, point: Point, layer: CollisionLayer) -> Option<EntityId> {
        self.entities()
            .find(|e| {
                e.spatial
                    .as_ref()
                    .is_some_and(|s| s.layer == layer && s.region().contains(point))
            })
            .map(|e| e.id)
    }

    /// The first harvestable resource node whose footprint covers a point.
    pub fn node_at(&self, point: Point) -> Option<EntityId> {
        self.entities()
            .find(|e| {
                e.is_harvestable()
                    && e.spatial.as_ref().is_some_and(|s| s.region().contains(point))
            })
            .map(|e| e.id)
    }

    // -- pathfinding seam --------------------------------------------------

    /// Route the mover toward a destination. Plans against terrain and
    /// static entities only; see `is_free_of_static`.
    pub fn find_path(
        &self,
        mover: EntityId,
        destination: &PathDestination,
        max_expansions: u32,
    ) -> Option<Path> {
        let entity = self.get(mover)?;
        let spatial = entity.spatial.as_ref()?;
        let (size, layer, from) = (spatial.size, spatial.layer, spatial.cell());
        let walkable =
            |cell: Point| self.is_free_of_static(Region::new(cell, size), layer, Some(mover));
        Some(pathfinding::find_path(
            from,
            destination,
            size,
            self.bounds(),
            &walkable,
            max_expansions,
        ))
    }

    /// Per-tick dynamic obstacle re-check: may the mover step so its
    /// footprint anchors at `cell` right now, counting mobile entities too?
    pub fn can_step_to(&self, mover: EntityId, cell: Point) -> bool {
        let Some(entity) = self.get(mover) else { return false };
        let Some(spatial) = entity.spatial.as_ref() else { return false };
        self.is_free(Region::new(cell, spatial.size), spatial.layer, Some(mover))
    }

    /// Promote an under-construction entity to a standing one, granting the
    /// food capacity it provides. Returns false if it was not under
    /// construction (or is gone).
    pub fn complete_construction(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.get_mut(id) else { return false };
        if !entity.under_construction {
            return false;
        }
        entity.under_construction = false;
        let faction = entity.faction;
        let provided = entity.food_provided;
        if let Some(f) = faction.and_then(|fid| self.factions.get_mut(&fid)) {
            f.food_capacity += provided;
        }
        true
    }

    // -- visibility and proximity queries ----------------------------------

    /// Whether any of a faction's entities has the target's center within
    /// its sight radius. A target that is not in the world (dead, or carried
    /// inside a transporter) is never visible.
    pub fn can_see(&self, faction: FactionId, target: EntityId) -> bool {
        let Some(center) = self.get(target).and_then(Entity::center) else {
            return false;
        };
        self.entities().any(|e| {
            e.faction == Some(faction)
                && e.spatial
                    .as_ref()
                    .is_some_and(|s| s.center().distance(center) <= s.sight_range)
        })
    }

    /// Nearest standing depot of a faction to a position.
    pub fn nearest_depot(&self, faction: FactionId, from: Vec2) -> Option<EntityId> {
        self.entities()
            .filter(|e| e.accepts_resources_for(faction))
            .filter_map(|e| e.center().map(|c| (c.distance(from), e.id)))
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    /// Nearest enemy of the viewer within the viewer's own sight radius.
    /// Only entities with health (things that can be fought) qualify.
    pub fn nearest_enemy_in_sight(&self, viewer: EntityId) -> Option<EntityId> {
        let entity = self.get(viewer)?;
        let faction = self.faction(entity.faction?)?;
        let spatial = entity.spatial.as_ref()?;
        let (center, sight) = (spatial.center(), spatial.sight_range);
        self.entities()
            .filter(|e| {
                e.health.is_some()
                    && e.faction
                        .is_some_and(|f| faction.stance(f) == crate::types::Diplomacy::Enemy)
            })
            .filter_map(|e| e.center().map(|c| (c.distance(center), e.id)))
            .filter(|(d, _)| *d <= sight)
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    // -- transport ---------------------------------------------------------

    /// Place every carried unit back on free cells ringing the transporter.
    /// Units that cannot be placed stay aboard. Returns the unloaded ids.
    pub fn unload(&mut self, transporter: EntityId) -> Vec<EntityId> {
        let Some(entity) = self.get(transporter) else { return Vec::new() };
        let Some(region) = entity.region() else { return Vec::new() };
        let carried: Vec<EntityId> = entity
            .transporter
            .as_ref()
            .map(|t| t.carried.clone())
            .unwrap_or_default();

        let mut unloaded = Vec::new();
        let mut ring = region.ring().into_iter();
        for unit in carried {
            let Some((size, layer)) = self
                .get(unit)
                .and_then(|u| u.stowed_spatial.as_ref())
                .map(|s| (s.size, s.layer))
            else {
                continue;
            };
            let spot = ring
                .find(|cell| self.is_free(Region::new(*cell, size), layer, None));
            let Some(cell) = spot else { break };
            if let Some(u) = self.get_mut(unit) {
                u.place_at(cell);
                unloaded.push(unit);
            }
        }
        if let Some(t) = self.get_mut(transporter).and_then(|e| e.transporter.as_mut()) {
            t.carried.retain(|id| !unloaded.contains(id));
        }
        unloaded
    }
}
