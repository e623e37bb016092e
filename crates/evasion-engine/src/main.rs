//! Engine binary for the Evasion simulation.
//!
//! This is the main entry point that wires configuration, logging, the
//! learning store and one of three modes together:
//!
//! - `train` -- offline training across generated mazes, saving checkpoints
//!   and a pretrained model.
//! - `simulate` (default) -- one paced run through a generated maze with
//!   randomly scattered cameras.
//! - `city [adversary-id]` -- a city game against the scripted adversary,
//!   filed into that adversary's profile.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `evasion-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Open the learning store under `storage.data_dir`
//! 4. Run the selected mode
//! 5. Log the result

mod adversary;
mod error;
mod log_callback;

use std::path::{Path, PathBuf};

use evasion_agents::{AdversaryProfile, LearningAgent};
use evasion_core::city_game::GameEvent;
use evasion_core::config::LoggingConfig;
use evasion_core::runner::{self, run_paced};
use evasion_core::{CityGame, LearningStore, PersistError, Simulation, SimulationConfig, Trainer};
use evasion_world::MazeGenerator;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adversary::{AdversaryMove, Autopilot};
use crate::error::EngineError;
use crate::log_callback::LogCallback;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "evasion-config.yaml";

/// Seconds between scripted adversary actions.
const AUTOPILOT_INTERVAL: f64 = 3.0;

/// Camera budget of the scripted adversary.
const AUTOPILOT_CAMERAS: usize = 4;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the selected mode, or saving its
/// results fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = Path::new(CONFIG_FILE);
    let config = load_config(config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("evasion-engine starting");
    if !config_path.exists() {
        info!("Config file not found, using defaults");
    }
    info!(
        seed = config.world.seed,
        maze_size = config.world.maze.size,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );

    // 3. Open the learning store.
    let store = LearningStore::new(&config.storage.data_dir);

    // 4. Run the selected mode.
    let mode = std::env::args().nth(1).unwrap_or_else(|| String::from("simulate"));
    match mode.as_str() {
        "train" => train(&config, &store)?,
        "simulate" => simulate(&config, &store).await?,
        "city" => {
            let adversary = std::env::args().nth(2).unwrap_or_else(|| String::from("autopilot"));
            city(&config, &store, &adversary)?;
        }
        other => {
            return Err(EngineError::UnknownMode {
                mode: other.to_owned(),
            }
            .into());
        }
    }

    info!(mode, "evasion-engine shutdown complete");
    Ok(())
}

/// Load the configuration from `path`, or defaults with environment
/// overrides when the file is absent.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the agent from the best saved data.
fn load_agent(config: &SimulationConfig, store: &LearningStore) -> Result<LearningAgent, EngineError> {
    Ok(LearningAgent::from_snapshot(
        config.learning.clone(),
        store.load_best(),
        config.world.seed,
    )?)
}

fn train(config: &SimulationConfig, store: &LearningStore) -> Result<(), EngineError> {
    let mut agent = load_agent(config, store)?;
    let report = Trainer::new(config, store).run(&mut agent)?;
    info!(
        run_id = %report.run_id,
        escape_rate = report.escape_rate(),
        pruned = report.pruned,
        final_exploration = report.final_exploration,
        "Training finished"
    );
    Ok(())
}

async fn simulate(config: &SimulationConfig, store: &LearningStore) -> Result<(), EngineError> {
    let grid = MazeGenerator::new(config.world.maze.clone()).generate(config.world.seed)?;
    let count = config.training.camera_count(grid.size());
    let mut sim = Simulation::new(grid, config.cameras.clone(), config.agent.speed);
    let placed = sim.scatter_cameras(count, config.world.seed);
    info!(
        size = sim.grid().size(),
        cameras = placed,
        speed = sim.speed(),
        "Maze ready"
    );

    let mut agent = load_agent(config, store)?;
    let mut callback = LogCallback::new();
    let report = run_paced(&mut sim, &mut agent, &config.rewards, &config.runtime, &mut callback).await?;
    runner::log_episode_end(&report);
    info!(stalls = callback.stalls(), detections = report.detections, "Run summary");

    let target = store.q_table_path();
    log_save(store.save_learning(&mut agent), &target, "learning data")
}

fn city(config: &SimulationConfig, store: &LearningStore, adversary_id: &str) -> Result<(), EngineError> {
    let mut profile = store.load_profile(adversary_id);
    let mut agent = load_agent(config, store)?;
    let mut game = CityGame::new(config.game.clone())?;
    game.begin(&mut agent, &profile);

    let mut autopilot = Autopilot::new(config.world.seed, AUTOPILOT_INTERVAL, AUTOPILOT_CAMERAS)?;
    let dt = config.runtime.tick_seconds();
    info!(
        adversary = adversary_id,
        games_played = profile.games_played,
        detection_rate = profile.detection_rate(),
        "City game starting"
    );

    while !game.is_over() && game.game_time() < config.game.max_duration {
        match autopilot.advance(dt, &mut game)? {
            Some(AdversaryMove::Placed { id, location }) => {
                info!(camera = id, location = %location, "Adversary placed a camera");
            }
            Some(AdversaryMove::Sensor { id, location }) => {
                info!(sensor = id, location = %location, "Adversary installed a sensor");
            }
            Some(AdversaryMove::Checked(report)) => info!(
                camera = report.camera,
                agent_detected = report.agent_detected,
                decoys = report.decoys.len(),
                "Adversary checked a camera"
            ),
            None => {}
        }
        for event in game.advance(dt, &mut agent)? {
            log_game_event(&event);
        }
    }
    if !game.is_over() {
        warn!(game_time = game.game_time(), "City game abandoned without a winner");
    }

    game.finish(&mut profile);
    let (agent_score, adversary_score) = game.scores();
    info!(
        result = ?game.result(),
        agent_score,
        adversary_score,
        location = game.agent_location(),
        route_len = game.route().len(),
        route_risk = game.route_risk(),
        "City game finished"
    );
    save_city_results(store, &profile, &mut agent)
}

/// Save the adversary's profile and the agent's learning data. Both saves
/// are attempted; each failure is logged and the first one is returned.
fn save_city_results(
    store: &LearningStore,
    profile: &AdversaryProfile,
    agent: &mut LearningAgent,
) -> Result<(), EngineError> {
    let profile_target = store.profile_path(&profile.adversary_id);
    let profile_saved = log_save(store.save_profile(profile), &profile_target, "adversary profile");
    let learning_target = store.q_table_path();
    let learning_saved = log_save(store.save_learning(agent), &learning_target, "learning data");
    profile_saved.and(learning_saved)
}

fn log_save(result: Result<PathBuf, PersistError>, target: &Path, what: &str) -> Result<(), EngineError> {
    match result {
        Ok(path) => {
            info!(path = %path.display(), what, "Saved");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, path = %target.display(), what, "Failed to save");
            Err(e.into())
        }
    }
}

fn log_game_event(event: &GameEvent) {
    match event {
        GameEvent::Moved { from, to, detected } => {
            info!(from = %from, to = %to, detected, "Agent moved");
        }
        GameEvent::Detected(detection) => {
            info!(camera = %detection.camera, location = %detection.location, "Agent spotted");
        }
        GameEvent::Predicted(locations) => debug!(count = locations.len(), "Predicted camera placements"),
        GameEvent::DecoyCreated(signal) => {
            info!(location = %signal.location, strength = signal.strength, "Decoy alert raised");
        }
        GameEvent::DecoyScheduled { location, delay } => {
            debug!(location = %location, delay, "Decoy waiting for a camera check");
        }
        GameEvent::DecoyExpired(signal) => debug!(id = signal.id, "Decoy faded"),
        GameEvent::Finished(result) => info!(result = ?result, "Game over"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_agents::LearningConfig;

    use super::*;

    #[test]
    fn learning_is_saved_when_the_profile_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("player_profiles"), b"not a directory").unwrap();
        let store = LearningStore::new(dir.path());
        let profile = AdversaryProfile::new("autopilot");
        let mut agent = LearningAgent::new(LearningConfig::default(), 1).unwrap();

        let result = save_city_results(&store, &profile, &mut agent);

        assert!(matches!(result, Err(EngineError::Persist { .. })));
        assert!(store.q_table_path().exists());
        assert!(!store.profile_path("autopilot").exists());
    }

    #[test]
    fn both_saves_land_on_a_writable_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let profile = AdversaryProfile::new("autopilot");
        let mut agent = LearningAgent::new(LearningConfig::default(), 1).unwrap();

        save_city_results(&store, &profile, &mut agent).unwrap();

        assert!(store.q_table_path().exists());
        assert!(store.profile_path("autopilot").exists());
    }
}
