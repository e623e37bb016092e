//! The square maze grid.
//!
//! A [`Grid`] is an N×N array of [`CellKind`] with a start cell and one or
//! more exit cells. Border cells are always blocked, the start and every
//! exit are always free. Generated grids additionally guarantee a free path
//! from start to an exit; hand-written grids from [`Grid::parse`] only check
//! the structural invariants so unreachable scenarios can be expressed.

use evasion_types::{CellKind, Position};

use crate::error::WorldError;
use crate::planner;

/// Smallest accepted side length.
pub const MIN_GRID_SIZE: usize = 5;

/// An N×N maze of free and blocked cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    /// Side length.
    size: usize,
    /// Row-major cell storage, `size * size` entries.
    cells: Vec<CellKind>,
    /// Where the agent enters.
    start: Position,
    /// Cells that end an episode as escaped.
    exits: Vec<Position>,
}

impl Grid {
    /// Create a grid whose border is blocked and whose interior is `interior`.
    ///
    /// Start is `(1, 1)` and the single exit is `(size-2, size-2)`; both are
    /// forced free.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidSize`] if `size` is below
    /// [`MIN_GRID_SIZE`].
    pub fn bordered(size: usize, interior: CellKind) -> Result<Self, WorldError> {
        if size < MIN_GRID_SIZE {
            return Err(WorldError::InvalidSize {
                size,
                min: MIN_GRID_SIZE,
            });
        }
        let count = size
            .checked_mul(size)
            .ok_or(WorldError::ArithmeticOverflow)?;
        let far = size.checked_sub(2).ok_or(WorldError::ArithmeticOverflow)?;

        let mut grid = Self {
            size,
            cells: vec![interior; count],
            start: Position::new(1, 1),
            exits: vec![Position::new(far, far)],
        };
        let border: Vec<Position> = grid.positions().filter(|p| grid.is_border(*p)).collect();
        for pos in border {
            grid.write(pos, CellKind::Blocked);
        }
        grid.set(grid.start, CellKind::Free);
        grid.set(Position::new(far, far), CellKind::Free);
        Ok(grid)
    }

    /// Parse a textual map.
    ///
    /// `#` is blocked, `.` is free, `S` marks the single start cell and `E`
    /// marks an exit. Blank lines and surrounding whitespace are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidSize`] for maps smaller than
    /// [`MIN_GRID_SIZE`] rows, and [`WorldError::Parse`] when the map is not
    /// square, contains unknown characters, lacks a start or exit, or has a
    /// free border cell.
    pub fn parse(text: &str) -> Result<Self, WorldError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let size = rows.len();
        if size < MIN_GRID_SIZE {
            return Err(WorldError::InvalidSize {
                size,
                min: MIN_GRID_SIZE,
            });
        }

        let mut cells = Vec::with_capacity(size.saturating_mul(size));
        let mut start = None;
        let mut exits = Vec::new();

        for (row, line) in rows.iter().enumerate() {
            let line_no = row.saturating_add(1);
            let width = line.chars().count();
            if width != size {
                return Err(WorldError::Parse {
                    line: line_no,
                    reason: format!("expected {size} cells, found {width}"),
                });
            }
            for (col, ch) in line.chars().enumerate() {
                let pos = Position::new(row, col);
                let kind = match ch {
                    '#' => CellKind::Blocked,
                    '.' => CellKind::Free,
                    'S' => {
                        if start.replace(pos).is_some() {
                            return Err(WorldError::Parse {
                                line: line_no,
                                reason: "more than one start cell".to_owned(),
                            });
                        }
                        CellKind::Free
                    }
                    'E' => {
                        exits.push(pos);
                        CellKind::Free
                    }
                    other => {
                        return Err(WorldError::Parse {
                            line: line_no,
                            reason: format!("unexpected character {other:?}"),
                        });
                    }
                };
                cells.push(kind);
            }
        }

        let start = start.ok_or_else(|| WorldError::Parse {
            line: 0,
            reason: "missing start cell 'S'".to_owned(),
        })?;
        if exits.is_empty() {
            return Err(WorldError::Parse {
                line: 0,
                reason: "missing exit cell 'E'".to_owned(),
            });
        }

        let grid = Self {
            size,
            cells,
            start,
            exits,
        };
        if let Some(pos) = grid
            .positions()
            .find(|p| grid.is_border(*p) && grid.is_free(*p))
        {
            return Err(WorldError::Parse {
                line: pos.row.saturating_add(1),
                reason: format!("border cell {pos} must be blocked"),
            });
        }
        Ok(grid)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Side length.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The start cell.
    pub const fn start(&self) -> Position {
        self.start
    }

    /// All exit cells.
    pub fn exits(&self) -> &[Position] {
        &self.exits
    }

    /// Whether `pos` is an exit.
    pub fn is_exit(&self, pos: Position) -> bool {
        self.exits.contains(&pos)
    }

    /// Whether `pos` lies on the grid.
    pub const fn contains(&self, pos: Position) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    /// The cell kind at `pos`, or `None` off the grid.
    pub fn get(&self, pos: Position) -> Option<CellKind> {
        self.index(pos).and_then(|i| self.cells.get(i).copied())
    }

    /// Whether `pos` is on the grid and free.
    pub fn is_free(&self, pos: Position) -> bool {
        self.get(pos) == Some(CellKind::Free)
    }

    /// Whether `pos` is on the grid and blocked.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.get(pos) == Some(CellKind::Blocked)
    }

    /// Whether `pos` is on the outermost ring.
    pub const fn is_border(&self, pos: Position) -> bool {
        let last = self.size.saturating_sub(1);
        pos.row == 0 || pos.col == 0 || pos.row == last || pos.col == last
    }

    /// Whether `pos` is on the grid but not on the border.
    pub const fn is_interior(&self, pos: Position) -> bool {
        self.contains(pos) && !self.is_border(pos)
    }

    /// Every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<> {
        let size = self.size;
        (0..size).flat_map(move |row| (0..size).map(move |col| Position::new(row, col)))
    }

    /// Free orthogonal neighbours of `pos` in east, south, west, north order.
    pub fn free_neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        pos.neighbors().filter(|n| self.is_free(*n))
    }

    /// All blocked cells in row-major order.
    pub fn blocked_cells(&self) -> Vec<Position> {
        self.positions().filter(|p| self.is_blocked(*p)).collect()
    }

    /// All free cells in row-major order.
    pub fn free_cells(&self) -> Vec<Position> {
        self.positions().filter(|p| self.is_free(*p)).collect()
    }

    /// Whether a free path links the start with at least one exit.
    pub fn is_connected(&self) -> bool {
        !planner::bfs(self, self.start, &self.exits, |p| self.is_free(p)).is_empty()
    }

    // -------------------------------------------------------------------
    // Mutation (generation only)
    // -------------------------------------------------------------------

    /// Set an interior cell. Border writes are ignored so the border stays
    /// blocked. Returns whether the cell changed.
    pub(crate) fn set(&mut self, pos: Position, kind: CellKind) -> bool {
        if !self.is_interior(pos) {
            return false;
        }
        self.write(pos, kind)
    }

    /// Write any on-grid cell.
    fn write(&mut self, pos: Position, kind: CellKind) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        match self.cells.get_mut(i) {
            Some(cell) if *cell != kind => {
                *cell = kind;
                true
            }
            _ => false,
        }
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        pos.row.checked_mul(self.size)?.checked_add(pos.col)
    }
}

impl core::fmt::Display for Grid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for row in 0..self.size {
            for col in 0..self.size {
                let pos = Position::new(row, col);
                let ch = if pos == self.start {
                    'S'
                } else if self.is_exit(pos) {
                    'E'
                } else if self.is_free(pos) {
                    '.'
                } else {
                    '#'
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ROUTES: &str = "
        #####
        #S..#
        #.#.#
        #..E#
        #####
    ";

    #[test]
    fn parse_reads_start_exit_and_walls() {
        let grid = Grid::parse(TWO_ROUTES);
        assert!(grid.is_ok());
        let Ok(grid) = grid else { return };
        assert_eq!(grid.size(), 5);
        assert_eq!(grid.start(), Position::new(1, 1));
        assert_eq!(grid.exits(), &[Position::new(3, 3)]);
        assert!(grid.is_blocked(Position::new(2, 2)));
        assert!(grid.is_free(Position::new(1, 3)));
        assert!(grid.is_connected());
    }

    #[test]
    fn parse_rejects_open_border() {
        let text = "
            #####
            #S..#
            #.#..
            #..E#
            #####
        ";
        assert!(matches!(Grid::parse(text), Err(WorldError::Parse { line: 3, .. })));
    }

    #[test]
    fn parse_rejects_missing_exit() {
        let text = "
            #####
            #S..#
            #.#.#
            #...#
            #####
        ";
        assert!(matches!(Grid::parse(text), Err(WorldError::Parse { line: 0, .. })));
    }

    #[test]
    fn parse_rejects_ragged_rows() {
        let text = "
            #####
            #S..#
            #.#.
            #..E#
            #####
        ";
        assert!(matches!(Grid::parse(text), Err(WorldError::Parse { line: 3, .. })));
    }

    #[test]
    fn parse_rejects_tiny_maps() {
        assert!(matches!(
            Grid::parse("###\n#S#\n###"),
            Err(WorldError::InvalidSize { size: 3, .. })
        ));
    }

    #[test]
    fn display_round_trips() {
        let Ok(grid) = Grid::parse(TWO_ROUTES) else {
            return;
        };
        let again = Grid::parse(&grid.to_string());
        assert_eq!(again.ok(), Some(grid));
    }

    #[test]
    fn bordered_keeps_border_blocked() {
        let Ok(mut grid) = Grid::bordered(6, CellKind::Free) else {
            return;
        };
        assert!(grid.is_blocked(Position::new(0, 3)));
        assert!(grid.is_blocked(Position::new(5, 5)));
        assert!(!grid.set(Position::new(0, 2), CellKind::Free));
        assert!(grid.is_blocked(Position::new(0, 2)));
        assert!(grid.is_free(Position::new(4, 4)));
        assert!(grid.is_connected());
    }

    #[test]
    fn out_of_bounds_is_neither_free_nor_blocked() {
        let Ok(grid) = Grid::bordered(5, CellKind::Free) else {
            return;
        };
        let outside = Position::new(7, 1);
        assert_eq!(grid.get(outside), None);
        assert!(!grid.is_free(outside));
        assert!(!grid.is_blocked(outside));
    }
}
