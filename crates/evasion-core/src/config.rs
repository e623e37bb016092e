//! Configuration loading and typed config structures for the Evasion simulation.
//!
//! The canonical configuration lives in `evasion-config.yaml` in the working
//! directory. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file and applies
//! environment overrides.

use std::path::{Path, PathBuf};

use evasion_agents::{DecoyConfig, LearningConfig};
use evasion_world::{CameraConfig, MazeConfig};
use serde::Deserialize;
use tracing::warn;

/// Environment variable overriding [`StorageConfig::data_dir`].
pub const ENV_DATA_DIR: &str = "EVASION_DATA_DIR";

/// Environment variable overriding [`WorldConfig::seed`].
pub const ENV_SEED: &str = "EVASION_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `evasion-config.yaml`. Every section and every
/// field falls back to its default when omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Seed and maze layout.
    #[serde(default)]
    pub world: WorldConfig,

    /// Default camera range and duty cycle.
    #[serde(default)]
    pub cameras: CameraConfig,

    /// Agent movement.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Q-learning, pipeline and adaptation parameters.
    #[serde(default)]
    pub learning: LearningConfig,

    /// Offline training schedule.
    #[serde(default)]
    pub training: TrainingConfig,

    /// Maze reward shaping.
    #[serde(default)]
    pub rewards: RewardConfig,

    /// Interactive tick pacing.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Where learned data is stored.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Symbolic city game.
    #[serde(default)]
    pub game: GameConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `EVASION_DATA_DIR` overrides `storage.data_dir`
    /// - `EVASION_SEED` overrides `world.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_with_overrides(&contents, |key| std::env::var(key).ok())
    }

    /// Parse configuration from a YAML string. The environment is not
    /// consulted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Parse a YAML string, then apply overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_with_overrides<F>(yaml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::parse(yaml)?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override values from an arbitrary key lookup.
    ///
    /// An unparsable seed is ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_SEED) {
            match raw.trim().parse::<u64>() {
                Ok(seed) => self.world.seed = seed,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {ENV_SEED}"),
            }
        }
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Maze size, strategy and extra openings.
    #[serde(default)]
    pub maze: MazeConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            maze: MazeConfig::default(),
        }
    }
}

/// Agent movement configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Cells per simulated second.
    #[serde(default = "default_agent_speed")]
    pub speed: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            speed: default_agent_speed(),
        }
    }
}

/// Offline training schedule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingConfig {
    /// Number of episodes in a run.
    #[serde(default = "default_episodes")]
    pub episodes: u32,

    /// Tick budget per episode.
    #[serde(default = "default_training_max_ticks")]
    pub max_ticks: u64,

    /// Simulated seconds per training tick.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f64,

    /// Save a checkpoint every N episodes.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Generate a new maze every N episodes.
    #[serde(default = "default_map_interval")]
    pub map_interval: u32,

    /// Re-place cameras every N episodes.
    #[serde(default = "default_camera_interval")]
    pub camera_interval: u32,

    /// Cameras placed per layout; 0 means one per five cells of maze side.
    #[serde(default)]
    pub cameras_per_map: usize,
}

impl TrainingConfig {
    /// Number of cameras for a maze of side `size`.
    pub const fn camera_count(&self, size: usize) -> usize {
        if self.cameras_per_map == 0 {
            size / 5
        } else {
            self.cameras_per_map
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            max_ticks: default_training_max_ticks(),
            tick_seconds: default_tick_seconds(),
            checkpoint_interval: default_checkpoint_interval(),
            map_interval: default_map_interval(),
            camera_interval: default_camera_interval(),
            cameras_per_map: 0,
        }
    }
}

/// Reward shaping for maze episodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RewardConfig {
    /// Reward for the move that got the agent seen.
    #[serde(default = "default_capture_reward")]
    pub capture: f64,

    /// Reward for a move nobody saw.
    #[serde(default = "default_safe_step_reward")]
    pub safe_step: f64,

    /// Bonus for the first transition of the escape window.
    #[serde(default = "default_escape_base")]
    pub escape_base: f64,

    /// Extra bonus per later transition of the escape window.
    #[serde(default = "default_escape_increment")]
    pub escape_increment: f64,

    /// Number of trailing route cells rewarded after an escape.
    #[serde(default = "default_escape_window")]
    pub escape_window: usize,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            capture: default_capture_reward(),
            safe_step: default_safe_step_reward(),
            escape_base: default_escape_base(),
            escape_increment: default_escape_increment(),
            escape_window: default_escape_window(),
        }
    }
}

/// Interactive runtime pacing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    /// Target ticks per real second.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default = "default_runtime_max_ticks")]
    pub max_ticks: u64,
}

impl RuntimeConfig {
    /// Simulated seconds per tick.
    pub fn tick_seconds(&self) -> f64 {
        1.0 / f64::from(self.tick_rate_hz.max(1))
    }

    /// Real milliseconds between ticks.
    pub fn tick_interval_ms(&self) -> u64 {
        1000_u64
            .checked_div(u64::from(self.tick_rate_hz))
            .unwrap_or(0)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            max_ticks: default_runtime_max_ticks(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Root directory for learned data and adversary profiles.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Symbolic city game configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Seconds of game time between agent turns.
    #[serde(default = "default_turn_interval")]
    pub turn_interval: f64,

    /// Range given to cameras placed without an explicit one.
    #[serde(default = "default_game_camera_range")]
    pub camera_range: u32,

    /// Seconds of game time after which an unfinished game is abandoned.
    #[serde(default = "default_game_max_duration")]
    pub max_duration: f64,

    /// Q-learning rewards for city turns.
    #[serde(default)]
    pub rewards: GameRewards,

    /// Score awarded to each side.
    #[serde(default)]
    pub scoring: GameScoring,

    /// Decoy lifetime and strength.
    #[serde(default)]
    pub decoys: DecoyConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_interval: default_turn_interval(),
            camera_range: default_game_camera_range(),
            max_duration: default_game_max_duration(),
            rewards: GameRewards::default(),
            scoring: GameScoring::default(),
            decoys: DecoyConfig::default(),
        }
    }
}

/// Q-learning rewards for city turns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameRewards {
    /// Undetected move.
    #[serde(default = "default_safe_step_reward")]
    pub safe_move: f64,

    /// Move that ended under a camera.
    #[serde(default = "default_capture_reward")]
    pub detection: f64,

    /// Move onto an exit.
    #[serde(default = "default_game_escape_reward")]
    pub escape: f64,

    /// Decoy created.
    #[serde(default = "default_decoy_reward")]
    pub decoy: f64,
}

impl Default for GameRewards {
    fn default() -> Self {
        Self {
            safe_move: default_safe_step_reward(),
            detection: default_capture_reward(),
            escape: default_game_escape_reward(),
            decoy: default_decoy_reward(),
        }
    }
}

/// Score awarded to each side of the city game.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameScoring {
    /// Agent score per decoy.
    #[serde(default = "default_decoy_score")]
    pub decoy: u32,

    /// Adversary score per detection.
    #[serde(default = "default_detection_score")]
    pub detection: u32,

    /// Agent score for escaping.
    #[serde(default = "default_agent_win_score")]
    pub agent_win: u32,

    /// Adversary score for catching the agent at an exit.
    #[serde(default = "default_adversary_win_score")]
    pub adversary_win: u32,
}

impl Default for GameScoring {
    fn default() -> Self {
        Self {
            decoy: default_decoy_score(),
            detection: default_detection_score(),
            agent_win: default_agent_win_score(),
            adversary_win: default_adversary_win_score(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_agent_speed() -> f64 {
    5.0
}

const fn default_episodes() -> u32 {
    1000
}

const fn default_training_max_ticks() -> u64 {
    1000
}

const fn default_tick_seconds() -> f64 {
    0.1
}

const fn default_checkpoint_interval() -> u32 {
    50
}

const fn default_map_interval() -> u32 {
    100
}

const fn default_camera_interval() -> u32 {
    10
}

const fn default_capture_reward() -> f64 {
    -10.0
}

const fn default_safe_step_reward() -> f64 {
    0.1
}

const fn default_escape_base() -> f64 {
    5.0
}

const fn default_escape_increment() -> f64 {
    2.0
}

const fn default_escape_window() -> usize {
    5
}

const fn default_tick_rate_hz() -> u32 {
    30
}

const fn default_runtime_max_ticks() -> u64 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_turn_interval() -> f64 {
    5.0
}

const fn default_game_camera_range() -> u32 {
    1
}

const fn default_game_max_duration() -> f64 {
    300.0
}

const fn default_game_escape_reward() -> f64 {
    10.0
}

const fn default_decoy_reward() -> f64 {
    0.5
}

const fn default_decoy_score() -> u32 {
    2
}

const fn default_detection_score() -> u32 {
    1
}

const fn default_agent_win_score() -> u32 {
    10
}

const fn default_adversary_win_score() -> u32 {
    5
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_world::MazeStrategy;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.maze.size, 30);
        assert!((config.agent.speed - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.training.checkpoint_interval, 50);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert!(config.learning.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  seed: 123
  maze:
    size: 12
    strategy: random_carving
    extra_openings_percent: 0

cameras:
  vision_range: 4.0
  scan_time: 2.0
  rest_time: 2.0

agent:
  speed: 2.5

learning:
  learning_rate: 0.2
  exploration_rate: 0.3

training:
  episodes: 20
  max_ticks: 300
  checkpoint_interval: 5
  cameras_per_map: 4

rewards:
  capture: -20.0

runtime:
  tick_rate_hz: 10
  max_ticks: 0

storage:
  data_dir: "/tmp/evasion"

logging:
  level: "debug"
  json: true

game:
  turn_interval: 2.0
  camera_range: 2
  scoring:
    agent_win: 20
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(SimulationConfig::default);

        assert_eq!(config.world.seed, 123);
        assert_eq!(config.world.maze.size, 12);
        assert_eq!(config.world.maze.strategy, MazeStrategy::RandomCarving);
        assert!((config.cameras.vision_range - 4.0).abs() < f64::EPSILON);
        assert!((config.learning.learning_rate - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.training.episodes, 20);
        assert_eq!(config.training.camera_count(30), 4);
        assert!((config.rewards.capture + 20.0).abs() < f64::EPSILON);
        assert!((config.rewards.safe_step - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.runtime.tick_interval_ms(), 100);
        assert!(config.logging.json);
        assert_eq!(config.game.camera_range, 2);
        assert!((config.game.max_duration - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.game.scoring.agent_win, 20);
        assert_eq!(config.game.scoring.decoy, 2);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "world:\n  seed: 7\n";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(SimulationConfig::default);

        // Seed is overridden
        assert_eq!(config.world.seed, 7);
        // Everything else uses defaults
        assert_eq!(config.world.maze.size, 30);
        assert_eq!(config.training.camera_count(30), 6);
        assert_eq!(config.runtime.tick_rate_hz, 30);
    }

    #[test]
    fn parse_empty_yaml() {
        let yaml = "";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
    }

    #[test]
    fn overrides_replace_seed_and_data_dir() {
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| match key {
            ENV_DATA_DIR => Some(String::from("/var/lib/evasion")),
            ENV_SEED => Some(String::from(" 99 ")),
            _ => None,
        });
        assert_eq!(config.world.seed, 99);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/evasion"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let yaml = "world:\n  seed: 7\nstorage:\n  data_dir: \"from-file\"\n";
        let config = SimulationConfig::parse_with_overrides(yaml, |key| {
            (key == ENV_SEED).then(|| String::from("11"))
        })
        .unwrap();
        assert_eq!(config.world.seed, 11);
        assert_eq!(config.storage.data_dir, PathBuf::from("from-file"));

        let untouched = SimulationConfig::parse_with_overrides(yaml, |_| None).unwrap();
        assert_eq!(untouched, SimulationConfig::parse(yaml).unwrap());
        assert_eq!(untouched.world.seed, 7);
    }

    #[test]
    fn invalid_seed_override_is_ignored() {
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| (key == ENV_SEED).then(|| String::from("not-a-number")));
        assert_eq!(config.world.seed, 42);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("evasion-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
