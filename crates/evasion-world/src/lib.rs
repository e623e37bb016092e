//! Maze, cameras, and evasive path planning for the Evasion simulation.
//!
//! This crate models the physical playing field: a square grid of free and
//! blocked cells generated with a start-to-exit connectivity guarantee,
//! surveillance cameras that see through open cells on a duty cycle, and the
//! breadth-first planner the agent uses to slip past them.
//!
//! # Modules
//!
//! - [`camera`] -- Camera range, line-of-sight occlusion, scan duty cycle.
//! - [`city`] -- Named-location city graph used by the turn-based game.
//! - [`error`] -- Error types for grid and camera operations.
//! - [`grid`] -- The N×N cell grid and its textual form.
//! - [`maze`] -- Subdivision and carving generators plus connectivity repair.
//! - [`network`] -- The set of cameras on a grid; place and rotate commands.
//! - [`planner`] -- BFS path finding around watched cells, cached plans.
//! - [`sightline`] -- Bresenham line rasterization.

pub mod camera;
pub mod city;
pub mod error;
pub mod grid;
pub mod maze;
pub mod network;
pub mod planner;
pub mod sightline;

// Re-export primary types at crate root.
pub use camera::{Camera, CameraConfig};
pub use city::CityGraph;
pub use error::WorldError;
pub use grid::{Grid, MIN_GRID_SIZE};
pub use maze::{MazeConfig, MazeGenerator, MazeStrategy};
pub use network::CameraNetwork;
pub use planner::{Plan, find_path};
