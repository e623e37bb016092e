//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and a run.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: evasion_core::config::ConfigError,
    },

    /// The game clock rejected a time step or interval.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: evasion_core::clock::ClockError,
    },

    /// Maze construction failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: evasion_world::WorldError,
    },

    /// The learning agent could not be built.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: evasion_agents::AgentError,
    },

    /// An episode failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: evasion_core::RunnerError,
    },

    /// Offline training failed.
    #[error("trainer error: {source}")]
    Trainer {
        /// The underlying trainer error.
        #[from]
        source: evasion_core::TrainerError,
    },

    /// Learned data or a profile could not be saved.
    #[error("persistence error: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: evasion_core::PersistError,
    },

    /// The command line named an unknown mode.
    #[error("unknown mode {mode:?}; expected train, simulate or city")]
    UnknownMode {
        /// The mode as given.
        mode: String,
    },
}
