//! Offline training over generated mazes.
//!
//! Each episode resets the agent to the start cell and runs it to an end
//! with [`run_episode`]. The maze is regenerated every
//! `training.map_interval` episodes (seeded with `world.seed + episode`)
//! and the cameras are reshuffled every `training.camera_interval`
//! episodes and whenever the maze changes. Exploration decays with progress through the run.
//!
//! Checkpoints are written every `training.checkpoint_interval` episodes
//! and after the last one; a failed checkpoint is logged and training
//! continues. The final table is pruned and saved as the pretrained model.

use evasion_agents::LearningAgent;
use evasion_types::{EpisodeOutcome, RunId};
use evasion_world::{Grid, MazeGenerator, WorldError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::persistence::{LearningStore, PersistError};
use crate::runner::{RunnerError, run_episode};
use crate::simulation::Simulation;

/// Errors that can end a training run.
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    /// Maze generation failed.
    #[error("world error: {0}")]
    World(#[from] WorldError),

    /// An episode failed.
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    /// The pretrained model could not be saved.
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    /// Identifier of this run.
    pub run_id: RunId,
    /// Episodes played.
    pub episodes: u32,
    /// Episodes that ended on an exit.
    pub escapes: u32,
    /// Episodes that ended under a camera.
    pub captures: u32,
    /// Episodes with no unobserved route.
    pub stalemates: u32,
    /// Episodes that ran out of ticks.
    pub timeouts: u32,
    /// Actions removed by the final prune.
    pub pruned: usize,
    /// Exploration rate after the last episode.
    pub final_exploration: f64,
}

impl TrainingReport {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            episodes: 0,
            escapes: 0,
            captures: 0,
            stalemates: 0,
            timeouts: 0,
            pruned: 0,
            final_exploration: 0.0,
        }
    }

    fn count(&mut self, outcome: EpisodeOutcome) {
        let slot = match outcome {
            EpisodeOutcome::Escaped => &mut self.escapes,
            EpisodeOutcome::Captured => &mut self.captures,
            EpisodeOutcome::Stalemate => &mut self.stalemates,
            EpisodeOutcome::TimedOut => &mut self.timeouts,
        };
        *slot = slot.saturating_add(1);
        self.episodes = self.episodes.saturating_add(1);
    }

    /// Share of episodes that ended in an escape.
    pub fn escape_rate(&self) -> f64 {
        if self.episodes == 0 {
            return 0.0;
        }
        f64::from(self.escapes) / f64::from(self.episodes)
    }
}

/// Runs offline training for one agent.
#[derive(Debug)]
pub struct Trainer<'a> {
    config: &'a SimulationConfig,
    store: &'a LearningStore,
}

impl<'a> Trainer<'a> {
    /// A trainer driven by `config`, saving into `store`.
    pub const fn new(config: &'a SimulationConfig, store: &'a LearningStore) -> Self {
        Self { config, store }
    }

    /// Train `agent` for `training.episodes` episodes.
    ///
    /// # Errors
    ///
    /// Returns [`TrainerError`] if a maze cannot be generated, an episode
    /// fails, or the pretrained model cannot be saved.
    pub fn run(&self, agent: &mut LearningAgent) -> Result<TrainingReport, TrainerError> {
        let training = &self.config.training;
        let total = training.episodes;
        let mut report = TrainingReport::new(RunId::new());

        info!(
            run_id = %report.run_id,
            episodes = total,
            maze_size = self.config.world.maze.size,
            strategy = ?self.config.world.maze.strategy,
            "Training starting"
        );

        let mut simulation = Simulation::new(
            self.maze(0)?,
            self.config.cameras.clone(),
            self.config.agent.speed,
        );

        for episode in 0..total {
            self.prepare(&mut simulation, episode)?;

            let result = run_episode(
                &mut simulation,
                agent,
                &self.config.rewards,
                training.max_ticks,
                training.tick_seconds,
            )?;
            report.count(result.outcome);
            agent.decay_exploration_offline(episode, total);

            let last = episode.saturating_add(1) == total;
            if is_due(episode, training.checkpoint_interval) || last {
                match self.store.save_checkpoint(agent, episode) {
                    Ok(path) => info!(
                        episode,
                        escapes = report.escapes,
                        captures = report.captures,
                        exploration = agent.exploration_rate(),
                        path = %path.display(),
                        "Training checkpoint"
                    ),
                    Err(e) => warn!(episode, error = %e, "Failed to save checkpoint"),
                }
            }
        }

        report.pruned = agent.prune();
        report.final_exploration = agent.exploration_rate();
        let path = self.store.save_pretrained(agent)?;

        info!(
            run_id = %report.run_id,
            episodes = report.episodes,
            escapes = report.escapes,
            captures = report.captures,
            stalemates = report.stalemates,
            timeouts = report.timeouts,
            escape_rate = report.escape_rate(),
            states = agent.q_table().len(),
            path = %path.display(),
            "Training complete"
        );
        Ok(report)
    }

    /// Set the field up for `episode`: a new maze when one is due, and
    /// fresh cameras whenever the maze changed or a shuffle is due.
    fn prepare(&self, simulation: &mut Simulation, episode: u32) -> Result<(), WorldError> {
        let training = &self.config.training;
        let new_maze = episode > 0 && is_due(episode, training.map_interval);
        if new_maze {
            simulation.replace_grid(self.maze(episode)?);
            debug!(episode, "New maze");
        }
        if new_maze || is_due(episode, training.camera_interval) {
            self.shuffle_cameras(simulation, episode);
        }
        simulation.reset();
        Ok(())
    }

    fn maze(&self, episode: u32) -> Result<Grid, WorldError> {
        let seed = self.config.world.seed.wrapping_add(u64::from(episode));
        MazeGenerator::new(self.config.world.maze.clone()).generate(seed)
    }

    /// Replace every camera with a fresh random set on wall cells.
    fn shuffle_cameras(&self, simulation: &mut Simulation, episode: u32) {
        let count = self.config.training.camera_count(simulation.grid().size());
        let seed = self.config.world.seed.wrapping_add(u64::from(episode)).rotate_left(17);
        let placed = simulation.scatter_cameras(count, seed);
        debug!(episode, placed, "Cameras shuffled");
    }
}

/// Whether `episode` falls on a multiple of `interval`. A zero interval
/// never fires.
fn is_due(episode: u32, interval: u32) -> bool {
    episode.checked_rem(interval) == Some(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_agents::LearningConfig;
    use evasion_world::MazeConfig;

    use super::*;
    use crate::config::TrainingConfig;

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.maze = MazeConfig {
            size: 10,
            ..MazeConfig::default()
        };
        config.training = TrainingConfig {
            episodes: 6,
            max_ticks: 400,
            checkpoint_interval: 2,
            map_interval: 3,
            camera_interval: 2,
            ..TrainingConfig::default()
        };
        config
    }

    fn agent() -> LearningAgent {
        LearningAgent::new(LearningConfig::default(), 3).unwrap()
    }

    #[test]
    fn every_episode_is_counted_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let config = config();
        let mut agent = agent();

        let report = Trainer::new(&config, &store).run(&mut agent).unwrap();

        assert_eq!(report.episodes, 6);
        assert_eq!(
            report.escapes + report.captures + report.stalemates + report.timeouts,
            6
        );
        assert!((0.0..=1.0).contains(&report.final_exploration));
        assert!((0.0..=1.0).contains(&report.escape_rate()));
    }

    #[test]
    fn checkpoints_and_pretrained_model_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let config = config();
        let mut agent = agent();

        Trainer::new(&config, &store).run(&mut agent).unwrap();

        for episode in [0, 2, 4, 5] {
            assert!(store.checkpoint_path(episode).exists(), "checkpoint {episode}");
        }
        assert!(!store.checkpoint_path(1).exists());
        assert!(store.pretrained_path().exists());
        assert!(!store.q_table_path().exists());
    }

    #[test]
    fn runs_are_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let config = config();

        let first = Trainer::new(&config, &store).run(&mut agent()).unwrap();
        let second = Trainer::new(&config, &store).run(&mut agent()).unwrap();

        assert_eq!(first.escapes, second.escapes);
        assert_eq!(first.captures, second.captures);
        assert_eq!(first.stalemates, second.stalemates);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn new_maze_gets_cameras_between_shuffles() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let config = config();
        let trainer = Trainer::new(&config, &store);
        let mut simulation = Simulation::new(trainer.maze(0).unwrap(), config.cameras.clone(), 5.0);

        trainer.prepare(&mut simulation, 0).unwrap();
        assert!(!simulation.cameras().is_empty());

        // Episode 3 brings a new maze but is not a shuffle episode.
        trainer.prepare(&mut simulation, 3).unwrap();
        assert!(!simulation.cameras().is_empty());
        assert_eq!(simulation.cameras().len(), config.training.camera_count(10));
    }

    #[test]
    fn zero_intervals_never_fire() {
        assert!(!is_due(0, 0));
        assert!(is_due(0, 5));
        assert!(is_due(10, 5));
        assert!(!is_due(7, 5));
    }

    #[test]
    fn zero_episodes_still_saves_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        let mut config = config();
        config.training.episodes = 0;

        let report = Trainer::new(&config, &store).run(&mut agent()).unwrap();
        assert_eq!(report.episodes, 0);
        assert!(report.escape_rate().abs() < f64::EPSILON);
        assert!(store.pretrained_path().exists());
    }
}
