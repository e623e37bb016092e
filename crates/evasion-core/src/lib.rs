//! Simulation loop, training, persistence, and the city game for Evasion.
//!
//! This crate ties the field from `evasion-world` to the agent from
//! `evasion-agents`. It owns the per-tick cycle (cameras, replanning,
//! movement, detection, escape), the synchronous and paced episode runners,
//! offline training across generated mazes, the JSON learning store, and
//! the turn-based game on the symbolic city.
//!
//! # Modules
//!
//! - [`city_game`] -- Turn-based game on the city graph ([`CityGame`]).
//! - [`clock`] -- Tick counter and turn timer.
//! - [`config`] -- Configuration loading from `evasion-config.yaml` with
//!   environment overrides.
//! - [`persistence`] -- JSON learning data, checkpoints and adversary
//!   profiles ([`LearningStore`]).
//! - [`rewards`] -- Step rewards and escape bonuses.
//! - [`runner`] -- Bounded and paced episode runners.
//! - [`simulation`] -- The maze simulation and its tick cycle.
//! - [`trainer`] -- Offline training over generated mazes ([`Trainer`]).

pub mod city_game;
pub mod clock;
pub mod config;
pub mod persistence;
pub mod rewards;
pub mod runner;
pub mod simulation;
pub mod trainer;

pub use city_game::{CheckReport, CityGame, GameEvent, GameResult};
pub use config::SimulationConfig;
pub use persistence::{LearningStore, PersistError};
pub use runner::{EpisodeReport, RunnerError, TickCallback, run_episode, run_paced};
pub use simulation::{Simulation, TickSummary};
pub use trainer::{Trainer, TrainerError, TrainingReport};
