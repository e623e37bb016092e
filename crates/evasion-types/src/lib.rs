//! Shared type definitions for the Evasion simulation.
//!
//! Every crate in the workspace speaks in these types: grid positions,
//! cell kinds, camera scan states, the agent's learning keys and the
//! detection records that flow from the simulation into the agent.
//!
//! # Modules
//!
//! - [`ids`] -- Run, episode and camera identifiers
//! - [`enums`] -- Cell kinds, directions, scan states, outcomes
//! - [`structs`] -- Positions, locations, Q-table keys, detection records
//! - [`serde_pairs`] -- JSON-safe encoding for maps with structured keys

pub mod enums;
pub mod ids;
pub mod serde_pairs;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AdversaryActionKind, CellKind, DetectionStatus, EpisodeOutcome, Facing, ScanState};
pub use ids::{CameraId, EpisodeId, RunId};
pub use structs::{Action, AdversaryAction, DetectionEvent, Location, Position, StateKey};
