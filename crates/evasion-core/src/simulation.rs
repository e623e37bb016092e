//! The per-tick maze simulation.
//!
//! [`Simulation`] owns one grid, its camera network and the evading agent.
//! Each call to [`Simulation::tick`] runs the phases in a fixed order:
//!
//! 1. **Cameras** -- advance every duty cycle by `dt`.
//! 2. **Plan** -- replan when the cached path is exhausted or the camera
//!    layout changed. An empty plan stalls the tick.
//! 3. **Move** -- accumulate `speed * dt` progress; at 1.0 step exactly one
//!    cell and reset progress.
//! 4. **Detect** -- after a move, any camera seeing the new cell captures
//!    the agent and a [`DetectionEvent`] is emitted.
//! 5. **Exit** -- an uncaptured agent on an exit cell has escaped.
//!
//! Captured and escaped are terminal: once either is set the agent stops
//! moving, though cameras keep cycling.

use evasion_types::{
    CameraId, DetectionEvent, EpisodeOutcome, Location, Position, ScanState, StateKey,
};
use evasion_world::{CameraConfig, CameraNetwork, Grid, Plan, find_path};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::clock::{ClockError, GameClock};

/// Errors that can occur during a tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// A single-cell move made during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Cell left.
    pub from: Position,
    /// Cell entered.
    pub to: Position,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulated seconds at the end of the tick.
    pub game_time: f64,
    /// Cameras that switched between scanning and resting.
    pub camera_changes: Vec<(CameraId, ScanState)>,
    /// The move made, if progress reached a full cell.
    pub step: Option<Step>,
    /// Set when a camera saw the agent after its move.
    pub detection: Option<DetectionEvent>,
    /// Set when the move reached an exit unseen.
    pub escaped: bool,
    /// Set when no camera-free route existed.
    pub stalled: bool,
}

/// Grid, cameras and agent for one maze.
#[derive(Debug, Clone)]
pub struct Simulation {
    grid: Grid,
    cameras: CameraNetwork,
    position: Position,
    plan: Plan,
    progress: f64,
    speed: f64,
    captured: bool,
    escaped: bool,
    route: Vec<Position>,
    clock: GameClock,
}

impl Simulation {
    /// Put the agent on the start cell of `grid` with no cameras.
    ///
    /// Negative or non-finite speeds are treated as zero.
    pub fn new(grid: Grid, cameras: CameraConfig, speed: f64) -> Self {
        let start = grid.start();
        let escaped = grid.is_exit(start);
        Self {
            grid,
            cameras: CameraNetwork::new(cameras),
            position: start,
            plan: Plan::default(),
            progress: 0.0,
            speed: sanitize_speed(speed),
            captured: false,
            escaped,
            route: vec![start],
            clock: GameClock::new(),
        }
    }

    /// Run one tick of `dt` simulated seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if `dt` is negative or non-finite, or
    /// the tick counter overflows.
    pub fn tick(&mut self, dt: f64) -> Result<TickSummary, TickError> {
        let tick = self.clock.advance(dt)?;

        // --- Phase 1: Cameras ---
        let camera_changes = self.cameras.update(dt);
        let mut summary = TickSummary {
            tick,
            game_time: self.clock.elapsed(),
            camera_changes,
            step: None,
            detection: None,
            escaped: false,
            stalled: false,
        };
        if self.is_finished() {
            return Ok(summary);
        }

        // --- Phase 2: Plan ---
        if self.plan.needs_replan(self.cameras.revision()) {
            self.replan();
        }
        let Some(next) = self.plan.next() else {
            summary.stalled = true;
            return Ok(summary);
        };

        // --- Phase 3: Move ---
        self.progress = self.speed.mul_add(dt, self.progress);
        if self.progress < 1.0 {
            return Ok(summary);
        }
        self.progress = 0.0;
        let from = self.position;
        self.position = next;
        self.plan.advance();
        self.route.push(next);
        summary.step = Some(Step { from, to: next });

        // --- Phase 4: Detect ---
        if let Some(camera) = self.cameras.spotter(&self.grid, next) {
            self.captured = true;
            info!(
                tick,
                camera = %camera.id(),
                position = %next,
                moves = self.moves(),
                "Agent captured"
            );
            summary.detection = Some(DetectionEvent {
                camera: camera.id(),
                camera_location: Location::Cell(camera.position()),
                location: Location::Cell(next),
                game_time: summary.game_time,
                agent_state: StateKey::detected(next),
            });
            return Ok(summary);
        }

        // --- Phase 5: Exit ---
        if self.grid.is_exit(next) {
            self.escaped = true;
            summary.escaped = true;
            info!(tick, position = %next, moves = self.moves(), "Agent escaped");
        }

        Ok(summary)
    }

    fn replan(&mut self) {
        let cells = find_path(&self.grid, self.position, self.grid.exits(), &self.cameras);
        if cells.is_empty() {
            debug!(position = %self.position, cameras = self.cameras.len(), "No unobserved route");
        } else {
            debug!(position = %self.position, length = cells.len(), "Replanned route");
        }
        self.plan = Plan::new(cells, self.cameras.revision());
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Mount a camera with the default parameters. Returns `false` and
    /// changes nothing for an invalid cell.
    pub fn place_camera(&mut self, position: Position) -> bool {
        match self.cameras.place(&self.grid, position) {
            Ok(_) => true,
            Err(e) => {
                debug!(%position, error = %e, "Camera placement rejected");
                false
            }
        }
    }

    /// Mount a camera with explicit parameters. Returns `false` and changes
    /// nothing for an invalid cell.
    pub fn place_camera_with(&mut self, position: Position, config: &CameraConfig) -> bool {
        match self.cameras.place_with(&self.grid, position, config) {
            Ok(_) => true,
            Err(e) => {
                debug!(%position, error = %e, "Camera placement rejected");
                false
            }
        }
    }

    /// Turn the camera at `index` a quarter. Returns `false` and changes
    /// nothing for an unknown index.
    pub fn rotate_camera(&mut self, index: usize, clockwise: bool) -> bool {
        match self.cameras.rotate(index, clockwise) {
            Ok(_) => true,
            Err(e) => {
                debug!(index, error = %e, "Camera rotation rejected");
                false
            }
        }
    }

    /// Replace every camera with up to `count` cameras on wall cells drawn
    /// with `seed`. Returns the number mounted.
    pub fn scatter_cameras(&mut self, count: usize, seed: u64) -> usize {
        self.cameras.clear();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut walls = self.grid.blocked_cells();
        walls.shuffle(&mut rng);
        walls
            .into_iter()
            .take(count)
            .filter(|pos| self.place_camera(*pos))
            .count()
    }

    /// Remove every camera.
    pub fn clear_cameras(&mut self) {
        self.cameras.clear();
    }

    /// Put the agent back on the start cell. Cameras stay mounted.
    pub fn reset(&mut self) {
        let start = self.grid.start();
        self.position = start;
        self.plan = Plan::default();
        self.progress = 0.0;
        self.captured = false;
        self.escaped = self.grid.is_exit(start);
        self.route.clear();
        self.route.push(start);
        self.clock.reset();
    }

    /// Swap in a new maze. Cameras are removed and the agent reset.
    pub fn replace_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.cameras.clear();
        self.reset();
    }

    // -------------------------------------------------------------------
    // Read-only surface
    // -------------------------------------------------------------------

    /// The maze.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mounted cameras.
    pub const fn cameras(&self) -> &CameraNetwork {
        &self.cameras
    }

    /// The agent's cell.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// The current plan, including the cell it was made from.
    pub fn path(&self) -> &[Position] {
        self.plan.cells()
    }

    /// Cells still to walk on the current plan.
    pub fn remaining_path(&self) -> &[Position] {
        self.plan.remaining()
    }

    /// Every cell visited this episode, start first.
    pub fn route(&self) -> &[Position] {
        &self.route
    }

    /// Moves made this episode.
    pub fn moves(&self) -> usize {
        self.route.len().saturating_sub(1)
    }

    /// Whether a camera caught the agent.
    pub const fn is_captured(&self) -> bool {
        self.captured
    }

    /// Whether the agent reached an exit.
    pub const fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Whether the agent has stopped for good.
    pub const fn is_finished(&self) -> bool {
        self.captured || self.escaped
    }

    /// Terminal outcome, if any.
    pub const fn outcome(&self) -> Option<EpisodeOutcome> {
        if self.captured {
            Some(EpisodeOutcome::Captured)
        } else if self.escaped {
            Some(EpisodeOutcome::Escaped)
        } else {
            None
        }
    }

    /// Tick counter and elapsed time.
    pub const fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Cells per simulated second.
    pub const fn speed(&self) -> f64 {
        self.speed
    }
}

fn sanitize_speed(speed: f64) -> f64 {
    if speed.is_finite() { speed.max(0.0) } else { 0.0 }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_world::Camera;

    use super::*;

    const CORRIDOR: &str = "\
#######
#S....#
#####.#
#####.#
#####.#
#####E#
#######";

    fn corridor() -> Simulation {
        let grid = Grid::parse(CORRIDOR).unwrap();
        Simulation::new(grid, CameraConfig::always_on(1.5), 5.0)
    }

    fn run(sim: &mut Simulation, ticks: usize) -> Vec<TickSummary> {
        (0..ticks).map(|_| sim.tick(0.2).unwrap()).collect()
    }

    #[test]
    fn one_cell_per_unit_of_progress() {
        let mut sim = corridor();
        let summary = sim.tick(0.1).unwrap();
        assert!(summary.step.is_none());
        let summary = sim.tick(0.1).unwrap();
        assert_eq!(
            summary.step,
            Some(Step {
                from: Position::new(1, 1),
                to: Position::new(1, 2),
            })
        );
        assert_eq!(sim.moves(), 1);
    }

    #[test]
    fn open_corridor_escapes() {
        let mut sim = corridor();
        let summaries = run(&mut sim, 10);
        assert!(sim.is_escaped());
        assert!(!sim.is_captured());
        assert_eq!(sim.position(), Position::new(5, 5));
        assert_eq!(sim.moves(), 8);
        assert_eq!(summaries.iter().filter(|s| s.escaped).count(), 1);
        assert_eq!(sim.outcome(), Some(EpisodeOutcome::Escaped));

        // Terminal: further ticks do not move.
        let after = sim.tick(0.2).unwrap();
        assert!(after.step.is_none());
    }

    #[test]
    fn watched_corridor_stalls() {
        let mut sim = corridor();
        assert!(sim.place_camera(Position::new(0, 3)));
        let summary = sim.tick(0.2).unwrap();
        assert!(summary.stalled);
        assert!(sim.path().is_empty());
        assert_eq!(sim.position(), Position::new(1, 1));
    }

    #[test]
    fn camera_placed_mid_route_forces_replan() {
        let mut sim = corridor();
        run(&mut sim, 1);
        assert_eq!(sim.position(), Position::new(1, 2));
        assert!(sim.place_camera(Position::new(2, 4)));
        let summary = sim.tick(0.2).unwrap();
        assert!(summary.stalled);
        assert_eq!(sim.position(), Position::new(1, 2));

        sim.clear_cameras();
        let summaries = run(&mut sim, 10);
        assert!(summaries.iter().all(|s| s.detection.is_none()));
        assert!(sim.is_escaped());
    }

    #[test]
    fn camera_waking_under_the_agent_captures() {
        let grid = Grid::parse(CORRIDOR).unwrap();
        let mut sim = Simulation::new(grid, CameraConfig::default(), 5.0);
        // Rests during planning, scans again as the agent reaches (1,4).
        let config = CameraConfig {
            vision_range: 1.0,
            scan_time: 0.1,
            rest_time: 0.3,
        };
        assert!(sim.place_camera_with(Position::new(0, 4), &config));
        let summaries = run(&mut sim, 3);

        let event = summaries.iter().find_map(|s| s.detection.clone()).unwrap();
        assert_eq!(event.camera, CameraId(0));
        assert_eq!(event.location, Location::Cell(Position::new(1, 4)));
        assert_eq!(event.camera_location, Location::Cell(Position::new(0, 4)));
        assert_eq!(event.agent_state, StateKey::detected(Position::new(1, 4)));
        assert!(sim.is_captured());
        assert!(!sim.is_escaped());

        let after = sim.tick(0.2).unwrap();
        assert!(after.step.is_none());
    }

    #[test]
    fn invalid_commands_are_no_ops() {
        let mut sim = corridor();
        assert!(!sim.place_camera(Position::new(1, 2)));
        assert!(!sim.place_camera(Position::new(40, 40)));
        assert!(!sim.rotate_camera(0, true));
        assert!(sim.cameras().is_empty());

        assert!(sim.place_camera(Position::new(0, 0)));
        assert!(!sim.place_camera(Position::new(0, 0)));
        assert!(sim.rotate_camera(0, false));
        assert_eq!(sim.cameras().len(), 1);
    }

    #[test]
    fn reset_returns_to_start() {
        let mut sim = corridor();
        run(&mut sim, 10);
        sim.reset();
        assert_eq!(sim.position(), Position::new(1, 1));
        assert_eq!(sim.route(), &[Position::new(1, 1)]);
        assert!(!sim.is_finished());
        assert_eq!(sim.clock().tick(), 0);
    }

    #[test]
    fn scattered_cameras_sit_on_walls() {
        let mut sim = corridor();
        assert_eq!(sim.scatter_cameras(4, 1), 4);
        assert_eq!(sim.cameras().len(), 4);
        assert!(sim.cameras().cameras().iter().all(|c| sim.grid().is_blocked(c.position())));

        let mut again = corridor();
        again.scatter_cameras(4, 1);
        let here: Vec<Position> = sim.cameras().cameras().iter().map(Camera::position).collect();
        let there: Vec<Position> = again.cameras().cameras().iter().map(Camera::position).collect();
        assert_eq!(here, there);

        assert_eq!(sim.scatter_cameras(0, 1), 0);
        assert!(sim.cameras().is_empty());
    }

    #[test]
    fn bad_delta_is_an_error() {
        let mut sim = corridor();
        assert!(sim.tick(-1.0).is_err());
    }
}
