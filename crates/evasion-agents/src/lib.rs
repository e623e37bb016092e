//! The learning agent and its decision core for the Evasion simulation.
//!
//! This crate holds everything the evading agent knows and decides, without
//! touching I/O. It sits between `evasion-world` (the physical field) and
//! `evasion-core` (the simulation loop, trainer and persistence).
//!
//! # Modules
//!
//! - [`adaptation`] -- Rate tuning, avoidance bonus, placement prediction.
//! - [`agent`] -- The Q-learning agent ([`LearningAgent`]) and its
//!   persisted [`LearningData`].
//! - [`config`] -- Learning rates, thresholds and capacities
//!   ([`LearningConfig`]).
//! - [`deception`] -- Decoy signals, decoy location and timing.
//! - [`error`] -- Error types for agent operations ([`AgentError`]).
//! - [`memory`] -- Bounded detection and adversary-action histories.
//! - [`oracle`] -- Rule sources ([`RuleSource`]): heuristic city and the
//!   in-process [`KnowledgeBase`], wrapped with fallback in [`RuleOracle`].
//! - [`policy`] -- The layered decision pipeline.
//! - [`profile`] -- Per-adversary statistics ([`AdversaryProfile`]).
//! - [`q_table`] -- The typed Q-table ([`QTable`]).
//! - [`space`] -- Action spaces over grids, cities and oracles.

pub mod adaptation;
pub mod agent;
pub mod config;
pub mod deception;
pub mod error;
pub mod memory;
pub mod oracle;
pub mod policy;
pub mod profile;
pub mod q_table;
pub mod space;

// Re-export primary types at crate root for convenience.
pub use agent::{LearningAgent, LearningData};
pub use config::LearningConfig;
pub use deception::{DecoyBoard, DecoyConfig, DecoyPlan, DecoySignal, DecoyTiming};
pub use error::AgentError;
pub use memory::{DetectionHistory, PatternMemory};
pub use oracle::{
    Fact, Goal, HeuristicRuleSource, KnowledgeBase, OracleError, RiskLevel, RuleOracle, RuleSource,
    Suggestion, Term,
};
pub use policy::{DecisionContext, DecisionPipeline, LayerOutcome, PolicyLayer};
pub use profile::{AdversaryProfile, Mistake, SessionRecord};
pub use q_table::{ActionValues, QTable};
pub use space::{ActionSpace, CitySpace, GridSpace, OracleSpace};
