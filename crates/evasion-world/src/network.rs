//! The set of cameras on a grid and the adversary's commands against it.
//!
//! Placement and rotation are the two external commands. Both validate
//! their target and leave the network untouched on failure, so callers can
//! treat an `Err` as a rejected no-op. Every accepted command bumps
//! [`CameraNetwork::revision`], which path plans compare against to detect
//! staleness.

use evasion_types::{CameraId, Facing, Position, ScanState};
use tracing::debug;

use crate::camera::{Camera, CameraConfig};
use crate::error::WorldError;
use crate::grid::Grid;

/// All cameras mounted on one grid.
#[derive(Debug, Clone, Default)]
pub struct CameraNetwork {
    cameras: Vec<Camera>,
    config: CameraConfig,
    revision: u64,
}

impl CameraNetwork {
    /// Create an empty network whose cameras use `config`.
    pub const fn new(config: CameraConfig) -> Self {
        Self {
            cameras: Vec::new(),
            config,
            revision: 0,
        }
    }

    /// Mount a camera with the network's default parameters.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] for cells off the grid,
    /// [`WorldError::NotBlocked`] for free cells, and
    /// [`WorldError::CameraAlreadyPresent`] when the cell is taken.
    pub fn place(&mut self, grid: &Grid, position: Position) -> Result<CameraId, WorldError> {
        let config = self.config.clone();
        self.place_with(grid, position, &config)
    }

    /// Mount a camera with explicit parameters.
    ///
    /// # Errors
    ///
    /// Same as [`CameraNetwork::place`].
    pub fn place_with(
        &mut self,
        grid: &Grid,
        position: Position,
        config: &CameraConfig,
    ) -> Result<CameraId, WorldError> {
        if !grid.contains(position) {
            return Err(WorldError::OutOfBounds {
                position,
                size: grid.size(),
            });
        }
        if !grid.is_blocked(position) {
            return Err(WorldError::NotBlocked(position));
        }
        if self.camera_at(position).is_some() {
            return Err(WorldError::CameraAlreadyPresent(position));
        }
        let seq = u32::try_from(self.cameras.len()).map_err(|_err| WorldError::ArithmeticOverflow)?;
        let id = CameraId(seq);
        self.cameras.push(Camera::new(id, position, config));
        self.bump();
        debug!(camera = %id, %position, "Camera placed");
        Ok(id)
    }

    /// Rotate the camera at `index` by a quarter turn.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CameraIndexOutOfRange`] for unknown indices.
    pub fn rotate(&mut self, index: usize, clockwise: bool) -> Result<Facing, WorldError> {
        let count = self.cameras.len();
        let camera = self
            .cameras
            .get_mut(index)
            .ok_or(WorldError::CameraIndexOutOfRange { index, count })?;
        let facing = camera.rotate(clockwise);
        self.bump();
        Ok(facing)
    }

    /// Advance every camera's duty cycle. Returns the cameras that changed
    /// phase.
    pub fn update(&mut self, dt: f64) -> Vec<(CameraId, ScanState)> {
        self.cameras
            .iter_mut()
            .filter_map(|cam| cam.update(dt).map(|state| (cam.id(), state)))
            .collect()
    }

    /// The first camera currently seeing `target`.
    pub fn spotter(&self, grid: &Grid, target: Position) -> Option<&Camera> {
        self.cameras.iter().find(|cam| cam.can_see(grid, target))
    }

    /// Whether any camera currently sees `target`.
    pub fn any_sees(&self, grid: &Grid, target: Position) -> bool {
        self.spotter(grid, target).is_some()
    }

    /// Number of cameras currently seeing `target`. Resting cameras are
    /// not counted.
    pub fn covering_count(&self, grid: &Grid, target: Position) -> usize {
        self.cameras
            .iter()
            .filter(|cam| cam.can_see(grid, target))
            .count()
    }

    /// The camera mounted at `position`, if any.
    pub fn camera_at(&self, position: Position) -> Option<&Camera> {
        self.cameras.iter().find(|cam| cam.position() == position)
    }

    /// Camera by placement index.
    pub fn get(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    /// All cameras in placement order.
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Number of cameras.
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    /// Whether no camera is mounted.
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Default parameters for new cameras.
    pub const fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Counter bumped by every accepted placement, rotation, or clear.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Remove every camera (map regeneration).
    pub fn clear(&mut self) {
        if !self.cameras.is_empty() {
            self.cameras.clear();
            self.bump();
        }
    }

    const fn bump(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}
