//! Error types for the `evasion-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use evasion_types::Position;

/// Errors that can occur during grid, maze, and camera operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The requested grid size is below the supported minimum.
    #[error("grid size {size} is below the minimum of {min}")]
    InvalidSize {
        /// The requested size.
        size: usize,
        /// The minimum accepted size.
        min: usize,
    },

    /// A position lies outside the grid.
    #[error("position {position} is outside a {size}x{size} grid")]
    OutOfBounds {
        /// The offending position.
        position: Position,
        /// Grid side length.
        size: usize,
    },

    /// Cameras may only be mounted on blocked cells.
    #[error("cell {0} is not a blocked cell")]
    NotBlocked(Position),

    /// A camera already occupies the cell.
    #[error("a camera is already mounted at {0}")]
    CameraAlreadyPresent(Position),

    /// No camera exists at the given index.
    #[error("camera index {index} out of range ({count} cameras)")]
    CameraIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of cameras in the network.
        count: usize,
    },

    /// A textual map could not be parsed.
    #[error("invalid map at line {line}: {reason}")]
    Parse {
        /// One-based line number, or 0 for whole-map problems.
        line: usize,
        /// Explanation of what is wrong.
        reason: String,
    },

    /// A city location name is not part of the graph.
    #[error("unknown city location: {0}")]
    UnknownLocation(String),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in grid calculation")]
    ArithmeticOverflow,
}
