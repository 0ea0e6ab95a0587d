// Grid pathfinding — the engine's black-box route provider.
//
// Tasks never call this module directly; they go through `World::find_path`,
// which supplies the walkability predicate for the moving entity. Everything
// a task sees is the `Path` value: an ordered cell sequence plus a
// `complete` flag. A search that cannot reach its goal returns its best
// partial route (the expanded cell closest to the goal), so movement can
// still make progress toward an unreachable or temporarily blocked
// destination; deciding when to give up is the move task's job, not the
// pathfinder's.
//
// Implements A* with a `BinaryHeap` (min-heap via reversed ordering) and
// `Vec`-indexed node scores, no hash maps. The destination is data, not a
// callback: `PathDestination::Cell` targets one cell, `::Near` targets any
// cell adjacent to a region ("move next to that building/node").
//
// See also: `world.rs` for `find_path`, `movement.rs` for the consumer.
//
// **Critical constraint: determinism.** The search is a pure function of
// its inputs. Heap ties are broken by cell order, so equal-cost routes
// resolve identically on every peer.

use crate::types::{Point, Region};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An ordered sequence of cells from source toward a destination.
/// Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Cells from the start cell (inclusive) to the final cell.
    pub points: Vec<Point>,
    /// False when this is a best-effort route that does not reach the
    /// destination.
    pub complete: bool,
}

impl Path {
    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }
}

/// Where a move wants to end up. Serializable data standing in for a
/// distance-to-goal evaluator: each variant defines "remaining distance"
/// from any cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PathDestination {
    /// Arrive with the mover's footprint covering this cell.
    Cell(Point),
    /// Arrive on any free cell adjacent to (or touching) this region —
    /// "move up to the building/node", used by follow, harvest and build.
    Near(Region),
}

impl PathDestination {
    /// Remaining distance in cells from a mover anchored at `cell` with the
    /// given footprint size. 0 means arrived.
    pub fn distance_from(&self, cell: Point, mover_size: u32) -> u32 {
        let mover = Region::new(cell, mover_size);
        match self {
            PathDestination::Cell(p) => mover.gap(&Region::new(*p, 1)),
            PathDestination::Near(region) => mover.gap(region).saturating_sub(1),
        }
    }
}

// ---------------------------------------------------------------------------
// A* search
// ---------------------------------------------------------------------------

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    cell: Point,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.cell == other.cell
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest"; ties break
        // on cell order for determinism.
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

/// Find a route from `from` toward `destination` over a `bounds`-sized grid.
///
/// `walkable` answers whether a mover may stand anchored at a cell; the
/// caller bakes footprint and layer rules into it. `max_expansions` caps
/// the search; past it (or on exhaustion) the best partial route is
/// returned with `complete = false`. A zero-length incomplete path (start
/// cell only) means the search could make no progress at all.
pub fn find_path(
    from: Point,
    destination: &PathDestination,
    mover_size: u32,
    bounds: (u32, u32),
    walkable: &dyn Fn(Point) -> bool,
    max_expansions: u32,
) -> Path {
    let (width, height) = (bounds.0 as i32, bounds.1 as i32);
    let index = |p: Point| -> Option<usize> {
        if p.x >= 0 && p.y >= 0 && p.x < width && p.y < height {
            Some(p.x as usize + p.y as usize * width as usize)
        } else {
            None
        }
    };

    let n = (width as usize) * (height as usize);
    if n == 0 || index(from).is_none() {
        return Path { points: vec![from], complete: false };
    }
    if destination.distance_from(from, mover_size) == 0 {
        return Path { points: vec![from], complete: true };
    }

    let mut g_score = vec![f32::INFINITY; n];
    let mut came_from: Vec<Option<Point>> = vec![None; n];
    let mut closed = vec![false; n];

    let start_i = index(from).unwrap_or(0);
    g_score[start_i] = 0.0;

    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        cell: from,
        f_score: destination.distance_from(from, mover_size) as f32,
    });

    // Best cell seen so far for partial-route reconstruction: minimize
    // (distance-to-goal, g, cell) lexicographically.
    let mut best = (destination.distance_from(from, mover_size), 0.0f32, from);

    let mut expansions: u32 = 0;

    while let Some(current) = open.pop() {
        let ci = match index(current.cell) {
            Some(i) => i,
            None => continue,
        };
        if closed[ci] {
            continue;
        }
        closed[ci] = true;

        let h = destination.distance_from(current.cell, mover_size);
        let g = g_score[ci];
        if h < best.0 || (h == best.0 && (g < best.1 || (g == best.1 && current.cell < best.2))) {
            best = (h, g, current.cell);
        }

        if h == 0 {
            return Path {
                points: reconstruct(&came_from, &index, from, current.cell),
                complete: true,
            };
        }

        expansions += 1;
        if expansions >= max_expansions {
            break;
        }

        const STEPS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        for (dx, dy) in STEPS {
            let neighbor = Point::new(current.cell.x + dx, current.cell.y + dy);
            let ni = match index(neighbor) {
                Some(i) => i,
                None => continue,
            };
            if closed[ni] || !walkable(neighbor) {
                continue;
            }
            let tentative_g = g + 1.0;
            if tentative_g < g_score[ni] {
                g_score[ni] = tentative_g;
                came_from[ni] = Some(current.cell);
                open.push(OpenEntry {
                    cell: neighbor,
                    f_score: tentative_g + destination.distance_from(neighbor, mover_size) as f32,
                });
            }
        }
    }

    // Goal unreached: best-effort route to the closest expanded cell.
    Path {
        points: reconstruct(&came_from, &index, from, best.2),
        complete: false,
    }
}

fn reconstruct(
    came_from: &[Option<Point>],
    index: &dyn Fn(Point) -> Option<usize>,
    start: Point,
    goal: Point,
) -> Vec<Point> {
    let mut points = vec![goal];
    let mut current = goal;
    while current != start {
        match index(current).and_then(|i| came_from[i]) {
            Some(prev) => {
                points.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    points.reverse();
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(_: Point) -> bool {
        true
    }

    #[test]
    fn straight_line_path() {
        let path = find_path(
            Point::new(0, 0),
            &PathDestination::Cell(Point::new(4, 0)),
            1,
            (8, 8),
            &open_grid,
            4096,
        );
        assert!(path.complete);
        assert_eq!(path.points.first(), Some(&Point::new(0, 0)));
        assert_eq!(path.last(), Some(Point::new(4, 0)));
        assert_eq!(path.points.len(), 5);
    }

    #[test]
    fn already_at_destination() {
        let path = find_path(
            Point::new(3, 3),
            &PathDestination::Cell(Point::new(3, 3)),
            1,
            (8, 8),
            &open_grid,
            4096,
        );
        assert!(path.complete);
        assert_eq!(path.points, vec![Point::new(3, 3)]);
    }

    #[test]
    fn detours_around_wall() {
        // Vertical wall at x=2 with a gap at y=6.
        let walkable = |p: Point| p.x != 2 || p.y == 6;
        let path = find_path(
            Point::new(0, 0),
            &PathDestination::Cell(Point::new(4, 0)),
            1,
            (8, 8),
            &walkable,
            4096,
        );
        assert!(path.complete);
        assert!(path.points.contains(&Point::new(2, 6)));
        assert!(path.points.iter().all(|p| walkable(*p)));
    }

    #[test]
    fn unreachable_goal_gives_partial_route() {
        // Solid wall at x=2: the right half is unreachable.
        let walkable = |p: Point| p.x != 2;
        let path = find_path(
            Point::new(0, 3),
            &PathDestination::Cell(Point::new(6, 3)),
            1,
            (8, 8),
            &walkable,
            4096,
        );
        assert!(!path.complete);
        // Best effort ends on the wall's near side, as close as possible.
        assert_eq!(path.last(), Some(Point::new(1, 3)));
    }

    #[test]
    fn near_region_stops_adjacent() {
        let region = Region::new(Point::new(4, 4), 2);
        let path = find_path(
            Point::new(0, 0),
            &PathDestination::Near(region),
            1,
            (12, 12),
            &open_grid,
            4096,
        );
        assert!(path.complete);
        let end = path.last().unwrap();
        assert_eq!(Region::new(end, 1).gap(&region), 1);
    }

    #[test]
    fn expansion_cap_returns_partial() {
        let path = find_path(
            Point::new(0, 0),
            &PathDestination::Cell(Point::new(63, 63)),
            1,
            (64, 64),
            &open_grid,
            8,
        );
        assert!(!path.complete);
        assert!(!path.points.is_empty());
    }

    #[test]
    fn search_is_deterministic() {
        // A grid with many equal-cost routes must resolve identically.
        let a = find_path(
            Point::new(0, 0),
            &PathDestination::Cell(Point::new(5, 5)),
            1,
            (16, 16),
            &open_grid,
            4096,
        );
        let b = find_path(
            Point::new(0, 0),
            &PathDestination::Cell(Point::new(5, 5)),
            1,
            (16, 16),
            &open_grid,
            4096,
        );
        assert_eq!(a, b);
    }
}
