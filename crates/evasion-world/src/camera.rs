//! Surveillance cameras: range, occlusion, and the scan duty cycle.
//!
//! A camera is mounted on a blocked cell and sees a free cell when all of
//! the following hold:
//!
//! 1. the camera is [`ScanState::Active`],
//! 2. the Euclidean distance between the cell centres is within
//!    `vision_range`,
//! 3. no cell strictly between the two on the Bresenham line is blocked.
//!
//! Facing is tracked for presentation and the rotate command but does not
//! narrow the field of view.
//!
//! # Duty cycle
//!
//! The camera alternates between `scan_time` seconds active and `rest_time`
//! seconds resting. The phase timer is driven by simulated time and resets
//! to zero on every transition.

use evasion_types::{CameraId, Facing, Position, ScanState};
use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::sightline;

/// Tunable camera parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vision radius in cells.
    #[serde(default = "default_vision_range")]
    pub vision_range: f64,

    /// Seconds spent scanning before resting.
    #[serde(default = "default_scan_time")]
    pub scan_time: f64,

    /// Seconds spent resting before scanning again.
    #[serde(default = "default_rest_time")]
    pub rest_time: f64,
}

impl CameraConfig {
    /// A camera that never rests.
    pub const fn always_on(vision_range: f64) -> Self {
        Self {
            vision_range,
            scan_time: f64::INFINITY,
            rest_time: 0.0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            vision_range: default_vision_range(),
            scan_time: default_scan_time(),
            rest_time: default_rest_time(),
        }
    }
}

const fn default_vision_range() -> f64 {
    3.0
}

const fn default_scan_time() -> f64 {
    3.0
}

const fn default_rest_time() -> f64 {
    1.0
}

/// A camera mounted on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    id: CameraId,
    position: Position,
    facing: Facing,
    vision_range: f64,
    scan_time: f64,
    rest_time: f64,
    state: ScanState,
    timer: f64,
}

impl Camera {
    /// Create an active camera facing east with a fresh phase timer.
    pub const fn new(id: CameraId, position: Position, config: &CameraConfig) -> Self {
        Self {
            id,
            position,
            facing: Facing::East,
            vision_range: config.vision_range,
            scan_time: config.scan_time,
            rest_time: config.rest_time,
            state: ScanState::Active,
            timer: 0.0,
        }
    }

    /// Camera identifier.
    pub const fn id(&self) -> CameraId {
        self.id
    }

    /// Mount cell.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Current facing.
    pub const fn facing(&self) -> Facing {
        self.facing
    }

    /// Vision radius in cells.
    pub const fn vision_range(&self) -> f64 {
        self.vision_range
    }

    /// Current duty-cycle phase.
    pub const fn state(&self) -> ScanState {
        self.state
    }

    /// Whether the camera is currently scanning.
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Seconds spent in the current phase.
    pub const fn phase_elapsed(&self) -> f64 {
        self.timer
    }

    /// Advance the phase timer by `dt` seconds.
    ///
    /// At most one transition happens per call. Returns the new state when
    /// a transition occurred.
    pub fn update(&mut self, dt: f64) -> Option<ScanState> {
        self.timer += dt.max(0.0);
        let (limit, next) = match self.state {
            ScanState::Active => (self.scan_time, ScanState::Resting),
            ScanState::Resting => (self.rest_time, ScanState::Active),
        };
        if self.timer >= limit {
            self.state = next;
            self.timer = 0.0;
            Some(next)
        } else {
            None
        }
    }

    /// Turn the camera a quarter. Visibility is unaffected.
    pub const fn rotate(&mut self, clockwise: bool) -> Facing {
        self.facing = self.facing.rotated(clockwise);
        self.facing
    }

    /// Whether the camera currently sees `target`.
    pub fn can_see(&self, grid: &Grid, target: Position) -> bool {
        self.is_active() && self.covers(grid, target)
    }

    /// Whether `target` is inside the camera's range and line of sight,
    /// ignoring the duty cycle.
    pub fn covers(&self, grid: &Grid, target: Position) -> bool {
        self.in_range(target) && has_line_of_sight(grid, self.position, target)
    }

    /// Euclidean range test between cell centres.
    pub fn in_range(&self, target: Position) -> bool {
        let dr = axis_delta(self.position.row, target.row);
        let dc = axis_delta(self.position.col, target.col);
        dr.hypot(dc) <= self.vision_range
    }

    /// Free cells the camera would see while active.
    pub fn coverage(&self, grid: &Grid) -> Vec<Position> {
        grid.positions()
            .filter(|p| grid.is_free(*p) && self.covers(grid, *p))
            .collect()
    }

    /// Free cells the camera sees right now; empty while resting.
    pub fn visible_cells(&self, grid: &Grid) -> Vec<Position> {
        if self.is_active() {
            self.coverage(grid)
        } else {
            Vec::new()
        }
    }
}

/// Whether no blocked cell lies strictly between `from` and `to`.
pub fn has_line_of_sight(grid: &Grid, from: Position, to: Position) -> bool {
    sightline::between(from, to)
        .into_iter()
        .all(|cell| !grid.is_blocked(cell))
}

fn axis_delta(a: usize, b: usize) -> f64 {
    u32::try_from(a.abs_diff(b)).map_or(f64::INFINITY, f64::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn open_room() -> Grid {
        let text = "
            #######
            #S....#
            #.....#
            #.....#
            #.....#
            #....E#
            #######
        ";
        Grid::parse(text).unwrap()
    }

    fn camera_at(pos: Position, config: &CameraConfig) -> Camera {
        Camera::new(CameraId(0), pos, config)
    }

    #[test]
    fn sees_within_range_with_clear_line() {
        let grid = open_room();
        let cam = camera_at(Position::new(0, 3), &CameraConfig::default());
        assert!(cam.can_see(&grid, Position::new(1, 3)));
        assert!(cam.can_see(&grid, Position::new(3, 3)));
        assert!(!cam.can_see(&grid, Position::new(4, 3)));
    }

    #[test]
    fn range_is_euclidean() {
        let grid = open_room();
        let cam = camera_at(Position::new(0, 3), &CameraConfig::default());
        // (2,5): dr=2, dc=2, distance ~2.83
        assert!(cam.can_see(&grid, Position::new(2, 5)));
        // (3,5): dr=3, dc=2, distance ~3.61
        assert!(!cam.can_see(&grid, Position::new(3, 5)));
    }

    #[test]
    fn blocked_cell_occludes_regardless_of_range() {
        let text = "
            #######
            #S....#
            #.###.#
            #.....#
            #.....#
            #....E#
            #######
        ";
        let grid = Grid::parse(text).unwrap();
        let config = CameraConfig::always_on(100.0);
        let cam = camera_at(Position::new(0, 3), &config);
        assert!(cam.can_see(&grid, Position::new(1, 3)));
        assert!(!cam.can_see(&grid, Position::new(3, 3)));
        assert!(!cam.can_see(&grid, Position::new(5, 3)));
    }

    #[test]
    fn mount_cell_does_not_occlude_itself() {
        let grid = open_room();
        let cam = camera_at(Position::new(0, 1), &CameraConfig::default());
        assert!(cam.can_see(&grid, Position::new(1, 1)));
    }

    #[test]
    fn duty_cycle_follows_scan_and_rest_times() {
        let grid = open_room();
        let mut cam = camera_at(Position::new(0, 3), &CameraConfig::default());
        let target = Position::new(1, 3);
        let mut t = 0.0_f64;
        for step in 0..16_u32 {
            let phase = t % 4.0;
            if phase < 3.0 {
                assert!(cam.is_active(), "step {step} at t={t} should be active");
                assert!(cam.can_see(&grid, target));
            } else {
                assert!(!cam.is_active(), "step {step} at t={t} should be resting");
                assert!(!cam.can_see(&grid, target));
            }
            cam.update(0.5);
            t += 0.5;
        }
    }

    #[test]
    fn resting_camera_sees_nothing() {
        let grid = open_room();
        let mut cam = camera_at(Position::new(0, 3), &CameraConfig::default());
        assert_eq!(cam.update(3.0), Some(ScanState::Resting));
        assert!(cam.visible_cells(&grid).is_empty());
        assert!(!cam.coverage(&grid).is_empty());
        assert_eq!(cam.update(1.0), Some(ScanState::Active));
    }

    #[test]
    fn rotation_is_cosmetic() {
        let grid = open_room();
        let mut cam = camera_at(Position::new(0, 3), &CameraConfig::default());
        let before = cam.visible_cells(&grid);
        assert_eq!(cam.rotate(true), Facing::South);
        assert_eq!(cam.rotate(false), Facing::East);
        assert_eq!(cam.rotate(false), Facing::North);
        assert_eq!(cam.visible_cells(&grid), before);
    }

    #[test]
    fn always_on_never_rests() {
        let mut cam = camera_at(Position::new(0, 3), &CameraConfig::always_on(2.0));
        for _ in 0..100 {
            assert_eq!(cam.update(10.0), None);
        }
        assert!(cam.is_active());
    }
}
