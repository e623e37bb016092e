//! Enumeration types for the Evasion simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Grid cells
// ---------------------------------------------------------------------------

/// The kind of a single maze cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Walkable floor.
    Free,
    /// Wall. Cameras are mounted on blocked cells.
    Blocked,
}

impl CellKind {
    /// Whether an agent may stand on this cell.
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// One of the four cardinal directions.
///
/// Used both as a movement direction on the grid and as a camera's facing.
/// Rows grow southwards and columns grow eastwards, so a clockwise turn
/// goes East -> South -> West -> North.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Towards increasing column.
    East,
    /// Towards increasing row.
    South,
    /// Towards decreasing column.
    West,
    /// Towards decreasing row.
    North,
}

impl Facing {
    /// All directions in neighbour expansion order.
    pub const ALL: [Self; 4] = [Self::East, Self::South, Self::West, Self::North];

    /// Return the direction after a quarter turn.
    pub const fn rotated(self, clockwise: bool) -> Self {
        match (self, clockwise) {
            (Self::East, true) | (Self::West, false) => Self::South,
            (Self::South, true) | (Self::North, false) => Self::West,
            (Self::West, true) | (Self::East, false) => Self::North,
            (Self::North, true) | (Self::South, false) => Self::East,
        }
    }

    /// Heading in degrees, measured clockwise from east.
    pub const fn degrees(self) -> u16 {
        match self {
            Self::East => 0,
            Self::South => 90,
            Self::West => 180,
            Self::North => 270,
        }
    }
}

// ---------------------------------------------------------------------------
// Cameras
// ---------------------------------------------------------------------------

/// Duty-cycle phase of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Scanning; the camera can detect.
    Active,
    /// Cooling down; the camera sees nothing.
    Resting,
}

impl ScanState {
    /// Whether the camera is currently able to detect.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

// ---------------------------------------------------------------------------
// Learning state
// ---------------------------------------------------------------------------

/// Whether the agent is currently known to the adversary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    /// A camera has seen the agent.
    Detected,
    /// The agent is unobserved.
    Undetected,
}

impl core::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Detected => f.write_str("detected"),
            Self::Undetected => f.write_str("undetected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Episodes
// ---------------------------------------------------------------------------

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    /// A camera saw the agent after a move.
    Captured,
    /// The agent reached an exit cell.
    Escaped,
    /// No camera-free route existed when a plan was needed.
    Stalemate,
    /// The step budget ran out before either terminal state.
    TimedOut,
}

// ---------------------------------------------------------------------------
// Adversary
// ---------------------------------------------------------------------------

/// Kind of action taken by the camera-placing adversary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdversaryActionKind {
    /// A camera was placed.
    PlaceCamera,
    /// The adversary polled its cameras.
    CheckCamera,
    /// A camera was turned by a quarter.
    RotateCamera,
    /// A fixed sensor was installed.
    PlaceSensor,
}
