//! Evasive path planning.
//!
//! Breadth-first search over free, 4-connected cells. The evasive variant
//! refuses to step onto any cell a camera currently sees, so an empty result
//! means "no safe move right now" rather than "no route exists".
//!
//! Paths include the start cell as their first element and the reached exit
//! as their last.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use evasion_types::Position;

use crate::grid::Grid;
use crate::network::CameraNetwork;

/// Shortest path from `start` to any of `exits` through cells accepted by
/// `passable`.
///
/// The start cell is not tested against `passable`. Neighbours are expanded
/// in east, south, west, north order, which makes ties deterministic.
/// Returns an empty vector when no exit is reachable.
pub fn bfs<F>(grid: &Grid, start: Position, exits: &[Position], passable: F) -> Vec<Position>
where
    F: Fn(Position) -> bool,
{
    if !grid.contains(start) {
        return Vec::new();
    }
    if exits.contains(&start) {
        return vec![start];
    }

    let mut visited: BTreeSet<Position> = BTreeSet::new();
    let mut parent: BTreeMap<Position, Position> = BTreeMap::new();
    let mut queue: VecDeque<Position> = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for next in current.neighbors() {
            if visited.contains(&next) || !grid.is_free(next) || !passable(next) {
                continue;
            }
            visited.insert(next);
            parent.insert(next, current);
            if exits.contains(&next) {
                return reconstruct(&parent, start, next);
            }
            queue.push_back(next);
        }
    }

    Vec::new()
}

fn reconstruct(parent: &BTreeMap<Position, Position>, start: Position, end: Position) -> Vec<Position> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        match parent.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Shortest route from `start` to an exit avoiding every cell a camera
/// currently sees.
pub fn find_path(
    grid: &Grid,
    start: Position,
    exits: &[Position],
    cameras: &CameraNetwork,
) -> Vec<Position> {
    bfs(grid, start, exits, |cell| !cameras.any_sees(grid, cell))
}

/// Shortest route ignoring cameras entirely.
pub fn find_path_unobserved(grid: &Grid, start: Position, exits: &[Position]) -> Vec<Position> {
    bfs(grid, start, exits, |_| true)
}

/// A cached path together with the progress made along it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    cells: Vec<Position>,
    cursor: usize,
    camera_revision: u64,
}

impl Plan {
    /// Wrap a freshly planned path. The cursor points at the first cell
    /// after the start.
    pub const fn new(cells: Vec<Position>, camera_revision: u64) -> Self {
        Self {
            cells,
            cursor: 1,
            camera_revision,
        }
    }

    /// The full path including the start cell.
    pub fn cells(&self) -> &[Position] {
        &self.cells
    }

    /// The next cell to move onto.
    pub fn next(&self) -> Option<Position> {
        self.cells.get(self.cursor).copied()
    }

    /// Consume the next cell.
    pub const fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
    }

    /// Cells still to be visited.
    pub fn remaining(&self) -> &[Position] {
        self.cells.get(self.cursor..).unwrap_or_default()
    }

    /// Whether no move is left on this plan.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.cells.len()
    }

    /// Whether the camera layout changed since planning.
    pub const fn is_stale(&self, camera_revision: u64) -> bool {
        self.camera_revision != camera_revision
    }

    /// Whether the plan must be recomputed.
    pub fn needs_replan(&self, camera_revision: u64) -> bool {
        self.is_exhausted() || self.is_stale(camera_revision)
    }
}
