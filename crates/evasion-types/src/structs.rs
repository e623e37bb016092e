//! Core value types shared by the world, the agent and the simulation.

use serde::{Deserialize, Serialize};

use crate::enums::{AdversaryActionKind, DetectionStatus, Facing};
use crate::ids::CameraId;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate on the maze grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Row index, growing southwards.
    pub row: usize,
    /// Column index, growing eastwards.
    pub col: usize,
}

impl Position {
    /// Create a position from a row and column.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Manhattan distance to another position.
    pub const fn manhattan(self, other: Self) -> usize {
        self.row
            .abs_diff(other.row)
            .saturating_add(self.col.abs_diff(other.col))
    }

    /// The adjacent position in `direction`, or `None` when it would leave
    /// the non-negative quadrant.
    pub fn step(self, direction: Facing) -> Option<Self> {
        match direction {
            Facing::East => self.col.checked_add(1).map(|col| Self::new(self.row, col)),
            Facing::South => self.row.checked_add(1).map(|row| Self::new(row, self.col)),
            Facing::West => self.col.checked_sub(1).map(|col| Self::new(self.row, col)),
            Facing::North => self.row.checked_sub(1).map(|row| Self::new(row, self.col)),
        }
    }

    /// The up-to-four orthogonal neighbours in east, south, west, north order.
    pub fn neighbors(self) -> impl Iterator<Item = Self> {
        Facing::ALL.into_iter().filter_map(move |d| self.step(d))
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A symbolic location the learning agent reasons about.
///
/// The grid simulation uses cells; the city game uses named places such as
/// `city_center`. Both share one Q-table key space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// A maze cell.
    Cell(Position),
    /// A named place in the city graph.
    Named(String),
}

impl Location {
    /// Build a named location.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Return the cell if this is a grid location.
    pub const fn as_cell(&self) -> Option<Position> {
        match self {
            Self::Cell(pos) => Some(*pos),
            Self::Named(_) => None,
        }
    }

    /// Return the name if this is a named location.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Cell(_) => None,
        }
    }

    /// Distance usable for proximity rules.
    ///
    /// Cells use Manhattan distance. Named locations are only comparable for
    /// equality, yielding `Some(0)` when equal. Mixed kinds are unrelated.
    pub fn proximity(&self, other: &Self) -> Option<usize> {
        match (self, other) {
            (Self::Cell(a), Self::Cell(b)) => Some(a.manhattan(*b)),
            (Self::Named(a), Self::Named(b)) if a == b => Some(0),
            _ => None,
        }
    }
}

impl From<Position> for Location {
    fn from(pos: Position) -> Self {
        Self::Cell(pos)
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Cell(pos) => write!(f, "{pos}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Q-table keys
// ---------------------------------------------------------------------------

/// Discretized learning state: where the agent is and whether it is seen.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateKey {
    /// Agent location.
    pub location: Location,
    /// Detection status at that location.
    pub status: DetectionStatus,
}

impl StateKey {
    /// Create a state key.
    pub const fn new(location: Location, status: DetectionStatus) -> Self {
        Self { location, status }
    }

    /// Shorthand for an undetected state.
    pub fn undetected(location: impl Into<Location>) -> Self {
        Self::new(location.into(), DetectionStatus::Undetected)
    }

    /// Shorthand for a detected state.
    pub fn detected(location: impl Into<Location>) -> Self {
        Self::new(location.into(), DetectionStatus::Detected)
    }
}

impl core::fmt::Display for StateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.location, self.status)
    }
}

/// An action available to the learning agent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Move to an adjacent location.
    MoveTo(Location),
    /// Fabricate a false alert to draw the adversary away.
    CreateDecoy,
}

impl Action {
    /// Build a move to a named location.
    pub fn move_to(location: impl Into<Location>) -> Self {
        Self::MoveTo(location.into())
    }

    /// The destination of a move, if this is one.
    pub const fn target(&self) -> Option<&Location> {
        match self {
            Self::MoveTo(location) => Some(location),
            Self::CreateDecoy => None,
        }
    }

    /// Whether this is the decoy action.
    pub const fn is_decoy(&self) -> bool {
        matches!(self, Self::CreateDecoy)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MoveTo(location) => write!(f, "{location}"),
            Self::CreateDecoy => f.write_str("create_decoy"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single detection of the agent by a camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// The camera that saw the agent.
    pub camera: CameraId,
    /// Where that camera is mounted.
    pub camera_location: Location,
    /// Where the agent was seen.
    pub location: Location,
    /// Simulated seconds since the start of the episode or game.
    pub game_time: f64,
    /// The agent's learning state at the moment of detection.
    pub agent_state: StateKey,
}

/// One action taken by the adversary, as observed by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversaryAction {
    /// What the adversary did.
    pub kind: AdversaryActionKind,
    /// Target of the action (camera location).
    pub location: Location,
    /// Simulated seconds at which the action happened.
    pub time: f64,
    /// Where the agent was at that moment.
    pub agent_location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_is_symmetric() {
        let a = Position::new(1, 4);
        let b = Position::new(3, 1);
        assert_eq!(a.manhattan(b), 5);
        assert_eq!(b.manhattan(a), 5);
    }

    #[test]
    fn neighbors_skip_negative_coordinates() {
        let origin = Position::new(0, 0);
        let around: Vec<Position> = origin.neighbors().collect();
        assert_eq!(around, vec![Position::new(0, 1), Position::new(1, 0)]);
    }

    #[test]
    fn neighbors_follow_east_south_west_north() {
        let around: Vec<Position> = Position::new(2, 2).neighbors().collect();
        assert_eq!(
            around,
            vec![
                Position::new(2, 3),
                Position::new(3, 2),
                Position::new(2, 1),
                Position::new(1, 2),
            ]
        );
    }

    #[test]
    fn proximity_rules() {
        let a = Location::Cell(Position::new(1, 1));
        let b = Location::Cell(Position::new(2, 2));
        let park = Location::named("park");
        assert_eq!(a.proximity(&b), Some(2));
        assert_eq!(park.proximity(&Location::named("park")), Some(0));
        assert_eq!(park.proximity(&Location::named("port")), None);
        assert_eq!(park.proximity(&a), None);
    }

    #[test]
    fn action_display_uses_location_name() {
        assert_eq!(Action::move_to(Location::named("park")).to_string(), "park");
        assert_eq!(Action::CreateDecoy.to_string(), "create_decoy");
    }

    #[test]
    fn state_key_round_trips_through_json() {
        let key = StateKey::undetected(Position::new(3, 4));
        let json = serde_json::to_string(&key).unwrap_or_default();
        let back: Option<StateKey> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(key));
    }
}
