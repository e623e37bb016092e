//! Procedural maze generation with a connectivity guarantee.
//!
//! Two strategies are available:
//!
//! - [`MazeStrategy::Subdivision`] starts from an open room and recursively
//!   splits it with a horizontal and a vertical wall, punching one opening
//!   on each side of the intersection of both walls. Walls sit on even
//!   coordinates and openings on odd ones, so a child wall never seals a
//!   parent opening.
//! - [`MazeStrategy::RandomCarving`] starts fully blocked and carves a
//!   randomized depth-first spanning tree over odd-coordinate cells.
//!
//! Both finish by opening a small percentage of extra cells for redundant
//! routes and clearing the neighbourhood of start and exit. If the result
//! does not connect start to an exit, a seeded repair walk carves a winding
//! corridor between them plus two or three side corridors.
//!
//! Generation is pure: the same size, seed and strategy always yield the
//! same grid.

use std::collections::BTreeSet;

use evasion_types::{CellKind, Facing, Position};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::WorldError;
use crate::grid::{Grid, MIN_GRID_SIZE};

/// Probability that a repair step heads straight for its target.
const REPAIR_TARGET_BIAS: f64 = 0.7;

/// Repair walk step budget, as a multiple of the cell count.
const REPAIR_BUDGET_FACTOR: usize = 4;

/// How the maze layout is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MazeStrategy {
    /// Recursive wall subdivision of an open room.
    #[default]
    Subdivision,
    /// Depth-first carving of a fully blocked grid.
    RandomCarving,
}

/// Maze generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeConfig {
    /// Side length in cells.
    #[serde(default = "default_size")]
    pub size: usize,

    /// Layout strategy.
    #[serde(default)]
    pub strategy: MazeStrategy,

    /// Percentage of interior cells re-opened after layout.
    #[serde(default = "default_extra_openings_percent")]
    pub extra_openings_percent: u32,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            strategy: MazeStrategy::default(),
            extra_openings_percent: default_extra_openings_percent(),
        }
    }
}

const fn default_size() -> usize {
    30
}

const fn default_extra_openings_percent() -> u32 {
    5
}

/// Builds grids from a [`MazeConfig`].
#[derive(Debug, Clone, Default)]
pub struct MazeGenerator {
    config: MazeConfig,
}

impl MazeGenerator {
    /// Create a generator.
    pub const fn new(config: MazeConfig) -> Self {
        Self { config }
    }

    /// The generator's parameters.
    pub const fn config(&self) -> &MazeConfig {
        &self.config
    }

    /// Generate a connected maze for `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidSize`] if the configured size is below
    /// [`MIN_GRID_SIZE`].
    pub fn generate(&self, seed: u64) -> Result<Grid, WorldError> {
        let size = self.config.size;
        let strategy = self.config.strategy;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut grid = match strategy {
            MazeStrategy::Subdivision => {
                let mut grid = Grid::bordered(size, CellKind::Free)?;
                subdivide(&mut grid, &mut rng);
                grid
            }
            MazeStrategy::RandomCarving => {
                let mut grid = Grid::bordered(size, CellKind::Blocked)?;
                carve(&mut grid, &mut rng);
                grid
            }
        };

        punch_openings(&mut grid, &mut rng, self.config.extra_openings_percent);
        clear_endpoints(&mut grid);

        if !grid.is_connected() {
            info!(size, seed, ?strategy, "Maze disconnected, carving repair corridor");
            repair(&mut grid, &mut rng);
        }

        debug!(size, seed, ?strategy, "Maze generated");
        Ok(grid)
    }
}

/// Generate a maze of `size` cells per side.
///
/// # Errors
///
/// Returns [`WorldError::InvalidSize`] if `size` is below [`MIN_GRID_SIZE`].
pub fn generate(size: usize, seed: u64, strategy: MazeStrategy) -> Result<Grid, WorldError> {
    MazeGenerator::new(MazeConfig {
        size,
        strategy,
        ..MazeConfig::default()
    })
    .generate(seed)
}

/// Like [`generate`], but sizes below [`MIN_GRID_SIZE`] are raised to it.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] only for sizes whose cell
/// count does not fit in memory arithmetic.
pub fn generate_clamped(size: usize, seed: u64, strategy: MazeStrategy) -> Result<Grid, WorldError> {
    generate(size.max(MIN_GRID_SIZE), seed, strategy)
}

// ---------------------------------------------------------------------------
// Subdivision
// ---------------------------------------------------------------------------

/// Inclusive rectangle of interior cells.
#[derive(Debug, Clone, Copy)]
struct Region {
    top: usize,
    left: usize,
    bottom: usize,
    right: usize,
}

impl Region {
    /// The four rooms left after walls at `row` and `col`.
    fn split(self, row: usize, col: usize) -> Option<[Self; 4]> {
        let above = row.checked_sub(1)?;
        let below = row.checked_add(1)?;
        let west = col.checked_sub(1)?;
        let east = col.checked_add(1)?;
        Some([
            Self { top: self.top, left: self.left, bottom: above, right: west },
            Self { top: self.top, left: east, bottom: above, right: self.right },
            Self { top: below, left: self.left, bottom: self.bottom, right: west },
            Self { top: below, left: east, bottom: self.bottom, right: self.right },
        ])
    }
}

fn subdivide(grid: &mut Grid, rng: &mut StdRng) {
    let last = grid.size().saturating_sub(2);
    let mut stack = vec![Region {
        top: 1,
        left: 1,
        bottom: last,
        right: last,
    }];

    while let Some(region) = stack.pop() {
        let (Some(row), Some(col)) = (
            pick_even_inside(rng, region.top, region.bottom),
            pick_even_inside(rng, region.left, region.right),
        ) else {
            continue;
        };

        for c in region.left..=region.right {
            grid.set(Position::new(row, c), CellKind::Blocked);
        }
        for r in region.top..=region.bottom {
            grid.set(Position::new(r, col), CellKind::Blocked);
        }

        let openings = [
            col.checked_sub(1)
                .and_then(|hi| pick_odd_within(rng, region.left, hi))
                .map(|c| Position::new(row, c)),
            col.checked_add(1)
                .and_then(|lo| pick_odd_within(rng, lo, region.right))
                .map(|c| Position::new(row, c)),
            row.checked_sub(1)
                .and_then(|hi| pick_odd_within(rng, region.top, hi))
                .map(|r| Position::new(r, col)),
            row.checked_add(1)
                .and_then(|lo| pick_odd_within(rng, lo, region.bottom))
                .map(|r| Position::new(r, col)),
        ];
        for cell in openings.into_iter().flatten() {
            grid.set(cell, CellKind::Free);
        }

        if let Some(rooms) = region.split(row, col) {
            stack.extend(rooms);
        }
    }
}

/// A random even value strictly between `lo` and `hi`.
fn pick_even_inside(rng: &mut StdRng, lo: usize, hi: usize) -> Option<usize> {
    let first = if lo & 1 == 0 {
        lo.checked_add(2)?
    } else {
        lo.checked_add(1)?
    };
    if first >= hi {
        return None;
    }
    let count = hi.checked_sub(first)?.checked_sub(1)?.checked_div(2)?.checked_add(1)?;
    let k = rng.random_range(0..count);
    first.checked_add(k.checked_mul(2)?)
}

/// A random odd value in `lo..=hi`.
fn pick_odd_within(rng: &mut StdRng, lo: usize, hi: usize) -> Option<usize> {
    let first = if lo & 1 == 1 { lo } else { lo.checked_add(1)? };
    if first > hi {
        return None;
    }
    let count = hi.checked_sub(first)?.checked_div(2)?.checked_add(1)?;
    let k = rng.random_range(0..count);
    first.checked_add(k.checked_mul(2)?)
}

// ---------------------------------------------------------------------------
// Random carving
// ---------------------------------------------------------------------------

fn carve(grid: &mut Grid, rng: &mut StdRng) {
    let origin = grid.start();
    let mut visited: BTreeSet<Position> = BTreeSet::new();
    let mut stack = vec![origin];
    visited.insert(origin);
    grid.set(origin, CellKind::Free);

    while let Some(&current) = stack.last() {
        let options: Vec<(Position, Position)> = Facing::ALL
            .into_iter()
            .filter_map(|d| {
                let wall = current.step(d)?;
                let cell = wall.step(d)?;
                (grid.is_interior(cell) && !visited.contains(&cell)).then_some((wall, cell))
            })
            .collect();

        if options.is_empty() {
            stack.pop();
            continue;
        }
        let pick = rng.random_range(0..options.len());
        if let Some(&(wall, cell)) = options.get(pick) {
            grid.set(wall, CellKind::Free);
            grid.set(cell, CellKind::Free);
            visited.insert(cell);
            stack.push(cell);
        }
    }
}

// ---------------------------------------------------------------------------
// Finishing passes
// ---------------------------------------------------------------------------

fn punch_openings(grid: &mut Grid, rng: &mut StdRng, percent: u32) {
    let interior = grid.size().saturating_sub(2);
    let target = interior
        .saturating_mul(interior)
        .saturating_mul(usize::try_from(percent).unwrap_or(0))
        .checked_div(100)
        .unwrap_or(0);

    let mut walls: Vec<Position> = grid
        .positions()
        .filter(|p| grid.is_interior(*p) && grid.is_blocked(*p))
        .collect();
    walls.shuffle(rng);
    for cell in walls.into_iter().take(target) {
        grid.set(cell, CellKind::Free);
    }
}

fn clear_endpoints(grid: &mut Grid) {
    let start = grid.start();
    let exits = grid.exits().to_vec();
    for (dr, dc) in [(0_usize, 1_usize), (1, 0), (1, 1)] {
        if let (Some(row), Some(col)) = (start.row.checked_add(dr), start.col.checked_add(dc)) {
            grid.set(Position::new(row, col), CellKind::Free);
        }
        for exit in &exits {
            if let (Some(row), Some(col)) = (exit.row.checked_sub(dr), exit.col.checked_sub(dc)) {
                grid.set(Position::new(row, col), CellKind::Free);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

fn repair(grid: &mut Grid, rng: &mut StdRng) {
    let start = grid.start();
    let Some(&exit) = grid.exits().first() else {
        return;
    };
    carve_walk(grid, rng, start, exit);

    let side_corridors: u32 = rng.random_range(2..=3);
    for i in 0..side_corridors {
        let waypoint = random_interior(grid, rng);
        let anchor = if i & 1 == 0 { start } else { exit };
        carve_walk(grid, rng, waypoint, anchor);
    }
}

/// Carve a biased random walk from `from` to `to`, finishing with a
/// straight L-shaped corridor if the step budget runs out.
fn carve_walk(grid: &mut Grid, rng: &mut StdRng, from: Position, to: Position) {
    let budget = grid
        .size()
        .saturating_mul(grid.size())
        .saturating_mul(REPAIR_BUDGET_FACTOR);
    let mut current = from;
    grid.set(current, CellKind::Free);

    for _ in 0..budget {
        if current == to {
            return;
        }
        let direction = if rng.random_bool(REPAIR_TARGET_BIAS) {
            toward(current, to, rng)
        } else {
            let all = Facing::ALL;
            all.get(rng.random_range(0..all.len()))
                .copied()
                .unwrap_or(Facing::East)
        };
        if let Some(next) = current.step(direction).filter(|n| grid.is_interior(*n)) {
            current = next;
            grid.set(current, CellKind::Free);
        }
    }

    carve_straight(grid, current, to);
}

fn toward(from: Position, to: Position, rng: &mut StdRng) -> Facing {
    let vertical = match from.row.cmp(&to.row) {
        std::cmp::Ordering::Less => Some(Facing::South),
        std::cmp::Ordering::Greater => Some(Facing::North),
        std::cmp::Ordering::Equal => None,
    };
    let horizontal = match from.col.cmp(&to.col) {
        std::cmp::Ordering::Less => Some(Facing::East),
        std::cmp::Ordering::Greater => Some(Facing::West),
        std::cmp::Ordering::Equal => None,
    };
    match (vertical, horizontal) {
        (Some(v), Some(h)) => {
            if rng.random_bool(0.5) {
                v
            } else {
                h
            }
        }
        (Some(v), None) => v,
        (None, Some(h)) => h,
        (None, None) => Facing::East,
    }
}

fn carve_straight(grid: &mut Grid, from: Position, to: Position) {
    let mut current = from;
    while current.row != to.row {
        let direction = if current.row < to.row {
            Facing::South
        } else {
            Facing::North
        };
        let Some(next) = current.step(direction) else {
            return;
        };
        current = next;
        grid.set(current, CellKind::Free);
    }
    while current.col != to.col {
        let direction = if current.col < to.col {
            Facing::East
        } else {
            Facing::West
        };
        let Some(next) = current.step(direction) else {
            return;
        };
        current = next;
        grid.set(current, CellKind::Free);
    }
}

fn random_interior(grid: &Grid, rng: &mut StdRng) -> Position {
    let last = grid.size().saturating_sub(2).max(1);
    Position::new(rng.random_range(1..=last), rng.random_range(1..=last))
}
