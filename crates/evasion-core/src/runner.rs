//! Episode runners.
//!
//! This module drives a [`Simulation`] to completion while feeding every
//! move back into a [`LearningAgent`]:
//!
//! - [`run_episode`] -- bounded, synchronous; used by the trainer. A stalled
//!   tick ends the episode as a stalemate.
//! - [`run_paced`] -- interactive, async; sleeps between ticks to match the
//!   configured tick rate. Stalls do not end the run, since a resting camera
//!   may reopen the route.
//!
//! Both runners share the same learning rule: a safe move earns the
//! safe-step reward, the move that got the agent seen earns the capture
//! penalty plus detection learning, and an escape pays the tail bonuses
//! from [`rewards::escape_bonuses`] and records the route.

use evasion_agents::LearningAgent;
use evasion_types::{Action, EpisodeId, EpisodeOutcome, Location, Position, StateKey};
use tracing::{debug, info, warn};

use crate::config::{RewardConfig, RuntimeConfig};
use crate::rewards;
use crate::simulation::{Simulation, TickError, TickSummary};

/// Errors that can occur during an episode.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    /// Episode identifier.
    pub episode: EpisodeId,
    /// How the episode ended.
    pub outcome: EpisodeOutcome,
    /// Ticks executed.
    pub ticks: u64,
    /// Cells walked.
    pub moves: usize,
    /// Every cell visited, start first.
    pub route: Vec<Position>,
    /// Sum of rewards handed to the agent.
    pub total_reward: f64,
    /// Detections learned from.
    pub detections: usize,
}

/// Callback invoked after each paced tick.
///
/// Implementations can use this to redraw a view or collect statistics.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, simulation: &Simulation);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _simulation: &Simulation) {}
}

/// Run one bounded episode from the simulation's current state.
///
/// Ends on capture, escape, a stalled tick, or after `max_ticks` ticks.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub fn run_episode(
    simulation: &mut Simulation,
    agent: &mut LearningAgent,
    rewards: &RewardConfig,
    max_ticks: u64,
    dt: f64,
) -> Result<EpisodeReport, RunnerError> {
    let mut learner = MoveLearner::new(agent, rewards);
    let mut ticks: u64 = 0;

    let outcome = loop {
        if let Some(outcome) = simulation.outcome() {
            break outcome;
        }
        if ticks >= max_ticks {
            break EpisodeOutcome::TimedOut;
        }
        let summary = simulation.tick(dt)?;
        ticks = ticks.saturating_add(1);
        learner.observe(&summary);
        if summary.stalled {
            debug!(tick = summary.tick, position = %simulation.position(), "Episode stalled");
            break EpisodeOutcome::Stalemate;
        }
    };

    Ok(learner.finish(simulation, outcome, ticks))
}

/// Run an interactive episode paced to `runtime.tick_rate_hz`.
///
/// Ends on capture, escape, or after `runtime.max_ticks` ticks (0 runs
/// until a terminal state). Stalled ticks keep the loop going. Dropping the
/// future cancels the run.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub async fn run_paced(
    simulation: &mut Simulation,
    agent: &mut LearningAgent,
    rewards: &RewardConfig,
    runtime: &RuntimeConfig,
    callback: &mut dyn TickCallback,
) -> Result<EpisodeReport, RunnerError> {
    let dt = runtime.tick_seconds();
    let interval_ms = runtime.tick_interval_ms();
    let mut learner = MoveLearner::new(agent, rewards);
    let mut ticks: u64 = 0;

    info!(
        tick_rate_hz = runtime.tick_rate_hz,
        max_ticks = runtime.max_ticks,
        cameras = simulation.cameras().len(),
        "Paced run starting"
    );

    let outcome = loop {
        if let Some(outcome) = simulation.outcome() {
            break outcome;
        }
        if runtime.max_ticks > 0 && ticks >= runtime.max_ticks {
            info!(ticks, "Tick limit reached");
            break EpisodeOutcome::TimedOut;
        }

        let summary = simulation.tick(dt)?;
        ticks = ticks.saturating_add(1);
        learner.observe(&summary);
        callback.on_tick(&summary, simulation);

        // --- Sleep for tick interval ---
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    };

    Ok(learner.finish(simulation, outcome, ticks))
}

/// Log the end of an episode.
pub fn log_episode_end(report: &EpisodeReport) {
    match report.outcome {
        EpisodeOutcome::Escaped | EpisodeOutcome::Captured => info!(
            episode = %report.episode,
            outcome = ?report.outcome,
            ticks = report.ticks,
            moves = report.moves,
            total_reward = report.total_reward,
            "Episode ended"
        ),
        EpisodeOutcome::Stalemate | EpisodeOutcome::TimedOut => warn!(
            episode = %report.episode,
            outcome = ?report.outcome,
            ticks = report.ticks,
            moves = report.moves,
            "Episode ended without a winner"
        ),
    }
}

/// Turns tick summaries into Q-learning updates.
struct MoveLearner<'a> {
    agent: &'a mut LearningAgent,
    rewards: &'a RewardConfig,
    total_reward: f64,
    detections: usize,
}

impl<'a> MoveLearner<'a> {
    const fn new(agent: &'a mut LearningAgent, rewards: &'a RewardConfig) -> Self {
        Self {
            agent,
            rewards,
            total_reward: 0.0,
            detections: 0,
        }
    }

    fn observe(&mut self, summary: &TickSummary) {
        let Some(step) = summary.step else {
            return;
        };
        let captured = summary.detection.is_some();
        let reward = rewards::step_reward(captured, self.rewards);
        let state = StateKey::undetected(step.from);
        let next = if captured {
            StateKey::detected(step.to)
        } else {
            StateKey::undetected(step.to)
        };
        self.agent
            .learn(&state, &Action::move_to(step.to), reward, &next);
        self.total_reward += reward;

        if let Some(event) = &summary.detection {
            self.agent.learn_from_detection(event.clone());
            self.detections = self.detections.saturating_add(1);
        }
    }

    fn reward_escape(&mut self, route: &[Position]) {
        for (i, bonus) in rewards::escape_bonuses(route.len(), self.rewards) {
            let (Some(&from), Some(&to)) = (route.get(i), route.get(i.saturating_add(1))) else {
                continue;
            };
            self.agent.learn(
                &StateKey::undetected(from),
                &Action::move_to(to),
                bonus,
                &StateKey::undetected(to),
            );
            self.total_reward += bonus;
        }
        self.agent
            .record_route(route.iter().copied().map(Location::Cell).collect());
    }

    fn finish(mut self, simulation: &Simulation, outcome: EpisodeOutcome, ticks: u64) -> EpisodeReport {
        let route = simulation.route().to_vec();
        if outcome == EpisodeOutcome::Escaped {
            self.reward_escape(&route);
        }
        EpisodeReport {
            episode: EpisodeId::new(),
            outcome,
            ticks,
            moves: simulation.moves(),
            route,
            total_reward: self.total_reward,
            detections: self.detections,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_agents::LearningConfig;
    use evasion_world::{CameraConfig, Grid};

    use super::*;

    const CORRIDOR: &str = "\
#######
#S....#
#####.#
#####.#
#####.#
#####E#
#######";

    fn corridor() -> Simulation {
        Simulation::new(Grid::parse(CORRIDOR).unwrap(), CameraConfig::always_on(1.5), 5.0)
    }

    fn agent() -> LearningAgent {
        LearningAgent::new(LearningConfig::default(), 9).unwrap()
    }

    #[test]
    fn escape_rewards_the_route_tail() {
        let mut sim = corridor();
        let mut agent = agent();
        let report = run_episode(&mut sim, &mut agent, &RewardConfig::default(), 100, 0.2).unwrap();

        assert_eq!(report.outcome, EpisodeOutcome::Escaped);
        assert_eq!(report.moves, 8);
        assert_eq!(report.route.len(), 9);
        assert_eq!(agent.successful_routes().len(), 1);

        // Last transition: safe step then the largest bonus.
        let last = StateKey::undetected(Position::new(4, 5));
        let exit = Action::move_to(Position::new(5, 5));
        assert!(agent.q_table().value(&last, &exit) > 1.0);
        // First transition lies outside the bonus window.
        let first = StateKey::undetected(Position::new(1, 1));
        let value = agent.q_table().value(&first, &Action::move_to(Position::new(1, 2)));
        assert!(value > 0.0 && value < 0.1);
    }

    #[test]
    fn stall_is_a_stalemate() {
        let mut sim = corridor();
        assert!(sim.place_camera(Position::new(0, 3)));
        let mut agent = agent();
        let report = run_episode(&mut sim, &mut agent, &RewardConfig::default(), 100, 0.2).unwrap();
        assert_eq!(report.outcome, EpisodeOutcome::Stalemate);
        assert_eq!(report.ticks, 1);
        assert_eq!(report.moves, 0);
        assert!(agent.q_table().is_empty());
    }

    #[test]
    fn tick_budget_times_out() {
        let mut sim = corridor();
        let mut agent = agent();
        let report = run_episode(&mut sim, &mut agent, &RewardConfig::default(), 3, 0.2).unwrap();
        assert_eq!(report.outcome, EpisodeOutcome::TimedOut);
        assert_eq!(report.moves, 3);
    }

    #[test]
    fn capture_is_penalized_and_remembered() {
        let mut sim = Simulation::new(Grid::parse(CORRIDOR).unwrap(), CameraConfig::default(), 5.0);
        let config = CameraConfig {
            vision_range: 1.0,
            scan_time: 0.1,
            rest_time: 0.3,
        };
        assert!(sim.place_camera_with(Position::new(0, 4), &config));
        let mut agent = agent();
        let report = run_episode(&mut sim, &mut agent, &RewardConfig::default(), 100, 0.2).unwrap();

        assert_eq!(report.outcome, EpisodeOutcome::Captured);
        assert_eq!(report.detections, 1);
        assert_eq!(agent.detections().len(), 1);
        let state = StateKey::undetected(Position::new(1, 3));
        let fatal = Action::move_to(Position::new(1, 4));
        assert!(agent.q_table().value(&state, &fatal) < -1.0);
        assert!(agent.recent_failures().contains(&fatal));
        assert!(agent.successful_routes().is_empty());
    }

    #[tokio::test]
    async fn paced_run_invokes_callback_each_tick() {
        struct CountCallback {
            count: u64,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _summary: &TickSummary, _simulation: &Simulation) {
                self.count = self.count.saturating_add(1);
            }
        }

        let mut sim = corridor();
        let mut agent = agent();
        let runtime = RuntimeConfig {
            tick_rate_hz: 1000,
            max_ticks: 3,
        };
        let mut cb = CountCallback { count: 0 };
        let report = run_paced(&mut sim, &mut agent, &RewardConfig::default(), &runtime, &mut cb)
            .await
            .unwrap();

        assert_eq!(report.outcome, EpisodeOutcome::TimedOut);
        assert_eq!(report.ticks, 3);
        assert_eq!(cb.count, 3);
    }

    #[tokio::test]
    async fn paced_run_waits_out_a_resting_camera() {
        let mut sim = Simulation::new(Grid::parse(CORRIDOR).unwrap(), CameraConfig::default(), 200.0);
        // Blocks the corridor for 50 ticks, then rests for the rest of the run.
        let config = CameraConfig {
            vision_range: 1.5,
            scan_time: 0.05,
            rest_time: 10.0,
        };
        assert!(sim.place_camera_with(Position::new(0, 3), &config));
        let mut agent = agent();
        let runtime = RuntimeConfig {
            tick_rate_hz: 1000,
            max_ticks: 1000,
        };
        let report = run_paced(
            &mut sim,
            &mut agent,
            &RewardConfig::default(),
            &runtime,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(report.outcome, EpisodeOutcome::Escaped);
    }
}
