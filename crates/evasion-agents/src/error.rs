//! Error types for the `evasion-agents` crate.
//!
//! Learning itself never fails: unseen states initialize lazily and oracle
//! failures fall back to heuristics. The errors here cover the two things a
//! caller can get wrong: asking for a decision where no action exists, and
//! handing the agent an unusable configuration.

use evasion_types::StateKey;

/// Errors that can occur during agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The action space offered no legal action for the state.
    #[error("no actions available in state {state}")]
    NoActions {
        /// The state the agent was asked to act in.
        state: StateKey,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid learning parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the offending field.
        name: String,
        /// Description of what is wrong.
        reason: String,
    },
}
