// Core types shared across the simulation.
//
// Defines continuous world positions (`Vec2`), grid cells (`Point`), square
// grid footprints (`Region`), entity/faction handles, resource kinds,
// collision layers and the per-tick `TimeStep`. All types derive `Serialize`
// and `Deserialize` for save/load and lockstep state comparison.
//
// **Critical constraint: determinism.** Entity handles are generational
// arena indices assigned by `World` in spawn order — no UUIDs, no OS
// entropy. Every type with an `Ord` impl has a total order so it can key a
// `BTreeMap` or break ties deterministically.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A continuous position in world space. One unit = one grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// The grid cell containing this position.
    pub fn cell(self) -> Point {
        Point::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// A cell in the world grid.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The continuous position at the center of this cell.
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }

    /// Manhattan distance between two cells.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Chebyshev (king-move) distance between two cells.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A square footprint of grid cells: `size` cells per side starting at `min`.
///
/// Units and buildings occupy regions, not points. "In range" and
/// "adjacent" are defined between regions (closest-cell distance), because a
/// large building's edge is what a melee unit strikes, not its center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub min: Point,
    pub size: u32,
}

impl Region {
    pub const fn new(min: Point, size: u32) -> Self {
        Self { min, size }
    }

    pub fn max(&self) -> Point {
        Point::new(
            self.min.x + self.size as i32 - 1,
            self.min.y + self.size as i32 - 1,
        )
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.min.x as f32 + self.size as f32 / 2.0,
            self.min.y as f32 + self.size as f32 / 2.0,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        let max = self.max();
        p.x >= self.min.x && p.x <= max.x && p.y >= self.min.y && p.y <= max.y
    }

    /// All cells covered by this region.
    pub fn cells(&self) -> SmallVec<[Point; 9]> {
        let mut out = SmallVec::new();
        let max = self.max();
        for y in self.min.y..=max.y {
            for x in self.min.x..=max.x {
                out.push(Point::new(x, y));
            }
        }
        out
    }

    /// Cells forming the one-cell-wide ring just outside this region, in
    /// deterministic row-major order.
    pub fn ring(&self) -> SmallVec<[Point; 16]> {
        let grown = Region::new(Point::new(self.min.x - 1, self.min.y - 1), self.size + 2);
        let mut out = SmallVec::new();
        let max = grown.max();
        for y in grown.min.y..=max.y {
            for x in grown.min.x..=max.x {
                let p = Point::new(x, y);
                if !self.contains(p) {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Closest-cell gap between two regions, in cells (Chebyshev metric).
    /// 0 when the regions intersect, 1 when they touch diagonally or share
    /// an edge-adjacent cell.
    pub fn gap(&self, other: &Region) -> u32 {
        let (amax, bmax) = (self.max(), other.max());
        let dx = (other.min.x - amax.x).max(self.min.x - bmax.x).max(0);
        let dy = (other.min.y - amax.y).max(self.min.y - bmax.y).max(0);
        dx.max(dy) as u32
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.gap(other) == 0
    }

    /// True when the regions intersect or occupy neighboring cells.
    pub fn adjacent_or_intersects(&self, other: &Region) -> bool {
        self.gap(other) <= 1
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Stable handle to an entity in the world arena.
///
/// The `generation` is bumped every time a slot is reused, so a handle held
/// across an entity's death never silently resolves to its replacement —
/// `World::get` returns `None` instead. This is the mechanism that makes
/// "poll liveness every tick" safe for every task in the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

// Custom serde: serialize as "index v generation" ("12v3") so EntityId can
// key the per-entity queue map (serde_json requires string map keys).
impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}v{}", self.index, self.generation))
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let parsed = s.split_once('v').and_then(|(index, generation)| {
            Some(EntityId {
                index: index.parse().ok()?,
                generation: generation.parse().ok()?,
            })
        });
        parsed.ok_or_else(|| serde::de::Error::custom("invalid entity id"))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity#{}v{}", self.index, self.generation)
    }
}

/// Handle to a faction.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FactionId(pub u32);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Faction#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Simulation enums
// ---------------------------------------------------------------------------

/// The two resource kinds of the faction ledger.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ResourceKind {
    Aladdium,
    Alagene,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Aladdium, ResourceKind::Alagene];

    /// Index into per-kind arrays (credit balances, cost tables).
    pub const fn index(self) -> usize {
        match self {
            ResourceKind::Aladdium => 0,
            ResourceKind::Alagene => 1,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Aladdium => write!(f, "aladdium"),
            ResourceKind::Alagene => write!(f, "alagene"),
        }
    }
}

/// Collision layer an entity occupies. Ground and air units pass through
/// each other but block entities on their own layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionLayer {
    Ground,
    Air,
}

/// Diplomatic stance between two factions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diplomacy {
    Ally,
    Enemy,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// One simulation step as seen by a task's `update`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimeStep {
    /// Current simulation tick (after advancing).
    pub tick: u64,
    /// Simulated seconds covered by this step.
    pub delta: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_center_roundtrip() {
        let p = Point::new(3, -2);
        assert_eq!(p.center().cell(), p);
        assert_eq!(Vec2::new(3.9, -1.01).cell(), Point::new(3, -2));
    }

    #[test]
    fn region_gap_and_adjacency() {
        let a = Region::new(Point::new(0, 0), 2); // cells (0,0)..(1,1)
        let b = Region::new(Point::new(2, 0), 1); // touches a's east edge
        let c = Region::new(Point::new(3, 3), 1);
        assert_eq!(a.gap(&b), 1);
        assert!(a.adjacent_or_intersects(&b));
        assert_eq!(a.gap(&c), 2);
        assert!(!a.adjacent_or_intersects(&c));
        // Overlap.
        let d = Region::new(Point::new(1, 1), 2);
        assert_eq!(a.gap(&d), 0);
        assert!(a.intersects(&d));
    }

    #[test]
    fn region_ring_excludes_interior() {
        let r = Region::new(Point::new(5, 5), 2);
        let ring = r.ring();
        assert_eq!(ring.len(), 12); // 4x4 outer minus 2x2 interior
        assert!(ring.iter().all(|p| !r.contains(*p)));
        assert!(ring.iter().all(|p| r.gap(&Region::new(*p, 1)) == 1));
    }

    #[test]
    fn region_cells_row_major() {
        let r = Region::new(Point::new(1, 1), 2);
        let cells: Vec<Point> = r.cells().into_iter().collect();
        assert_eq!(
            cells,
            vec![
                Point::new(1, 1),
                Point::new(2, 1),
                Point::new(1, 2),
                Point::new(2, 2)
            ]
        );
    }

    #[test]
    fn entity_id_ordering_is_total() {
        // Needed for BTreeMap keys and deterministic iteration.
        let a = EntityId { index: 1, generation: 0 };
        let b = EntityId { index: 1, generation: 1 };
        let c = EntityId { index: 2, generation: 0 };
        assert!(a < b && b < c);
    }

    #[test]
    fn serialization_roundtrip() {
        let r = Region::new(Point::new(-3, 7), 3);
        let json = serde_json::to_string(&r).unwrap();
        let restored: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(r, restored);
    }

    #[test]
    fn entity_id_serializes_as_map_key() {
        use std::collections::BTreeMap;

        let id = EntityId { index: 12, generation: 3 };
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"12v3\"");

        let mut map: BTreeMap<EntityId, u32> = BTreeMap::new();
        map.insert(id, 7);
        let json = serde_json::to_string(&map).unwrap();
        let restored: BTreeMap<EntityId, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored[&id], 7);
    }
}
