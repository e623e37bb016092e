//! The tabular Q-learning agent.
//!
//! [`LearningAgent`] owns the Q-table and everything learned alongside it:
//! recent failures, detection history, adversary patterns and successful
//! routes. It picks actions through a [`DecisionPipeline`], updates values
//! with the Q-learning rule, and reshapes its table in response to
//! detections and adversary behaviour.
//!
//! The agent never sees a world directly. Candidate actions and distances
//! come from an [`ActionSpace`], so the same agent drives the maze
//! simulation and the city game.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use evasion_types::{Action, AdversaryAction, DetectionEvent, Location, StateKey};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adaptation;
use crate::config::LearningConfig;
use crate::deception::{self, DecoyPlan};
use crate::error::AgentError;
use crate::memory::{DetectionHistory, PatternMemory};
use crate::oracle::{RuleOracle, Suggestion};
use crate::policy::{DecisionContext, DecisionPipeline, roll};
use crate::profile::AdversaryProfile;
use crate::q_table::QTable;
use crate::space::ActionSpace;

/// Everything the agent persists between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningData {
    /// Action values.
    pub q_table: QTable,
    /// Recent detections.
    pub detections: DetectionHistory,
    /// Recent adversary actions.
    pub patterns: PatternMemory,
    /// Routes that ended in an escape, oldest first.
    pub successful_routes: VecDeque<Vec<Location>>,
    /// Exploration rate at save time.
    pub exploration_rate: f64,
    /// Deception rate at save time.
    pub deception_rate: f64,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
}

impl Default for LearningData {
    fn default() -> Self {
        let config = LearningConfig::default();
        Self {
            q_table: QTable::new(),
            detections: DetectionHistory::default(),
            patterns: PatternMemory::default(),
            successful_routes: VecDeque::new(),
            exploration_rate: config.exploration_rate,
            deception_rate: config.deception_rate,
            saved_at: Utc::now(),
        }
    }
}

/// A Q-learning agent over [`StateKey`] states and [`Action`] actions.
#[derive(Debug)]
pub struct LearningAgent {
    config: LearningConfig,
    q_table: QTable,
    exploration_rate: f64,
    deception_rate: f64,
    recent_failures: BTreeSet<Action>,
    detections: DetectionHistory,
    patterns: PatternMemory,
    successful_routes: VecDeque<Vec<Location>>,
    pipeline: DecisionPipeline,
    rng: StdRng,
}

impl LearningAgent {
    /// Create an agent with an empty table and the standard pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidParameter`] if `config` fails
    /// validation.
    pub fn new(config: LearningConfig, seed: u64) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            q_table: QTable::new(),
            exploration_rate: config.exploration_rate,
            deception_rate: config.deception_rate,
            recent_failures: BTreeSet::new(),
            detections: DetectionHistory::new(config.history_capacity),
            patterns: PatternMemory::new(config.pattern_capacity),
            successful_routes: VecDeque::new(),
            pipeline: DecisionPipeline::standard(&config),
            rng: StdRng::seed_from_u64(seed),
            config,
        })
    }

    /// Create an agent that resumes from persisted learning data.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidParameter`] if `config` fails
    /// validation.
    pub fn from_snapshot(
        config: LearningConfig,
        data: LearningData,
        seed: u64,
    ) -> Result<Self, AgentError> {
        let mut agent = Self::new(config, seed)?;
        agent.restore(data);
        Ok(agent)
    }

    /// Replace the decision pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: DecisionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The agent's configuration.
    pub const fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Current action values.
    pub const fn q_table(&self) -> &QTable {
        &self.q_table
    }

    /// Mutable access to the action values, for seeding and tests.
    pub const fn q_table_mut(&mut self) -> &mut QTable {
        &mut self.q_table
    }

    /// Current exploration rate.
    pub const fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Override the exploration rate, clamped to `[0, 1]`.
    pub const fn set_exploration_rate(&mut self, rate: f64) {
        self.exploration_rate = rate.clamp(0.0, 1.0);
    }

    /// Current deception rate.
    pub const fn deception_rate(&self) -> f64 {
        self.deception_rate
    }

    /// Override the deception rate, clamped to `[0, 1]`.
    pub const fn set_deception_rate(&mut self, rate: f64) {
        self.deception_rate = rate.clamp(0.0, 1.0);
    }

    /// Actions whose last outcome was a strong penalty.
    pub const fn recent_failures(&self) -> &BTreeSet<Action> {
        &self.recent_failures
    }

    /// Recent detections.
    pub const fn detections(&self) -> &DetectionHistory {
        &self.detections
    }

    /// Recent adversary actions.
    pub const fn patterns(&self) -> &PatternMemory {
        &self.patterns
    }

    /// Routes that ended in an escape, oldest first.
    pub const fn successful_routes(&self) -> &VecDeque<Vec<Location>> {
        &self.successful_routes
    }

    /// The decision pipeline.
    pub const fn pipeline(&self) -> &DecisionPipeline {
        &self.pipeline
    }

    /// The agent's random source, shared with decoy creation.
    pub const fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    // -------------------------------------------------------------------
    // Acting and learning
    // -------------------------------------------------------------------

    /// Choose an action in `state`.
    ///
    /// Candidates come from `space`; if it offers none, the actions already
    /// stored for the state are used. An unseen state is initialized with
    /// every candidate at `0.0` before the pipeline runs.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoActions`] when neither source has an action.
    pub fn choose_action<S>(
        &mut self,
        state: &StateKey,
        space: &S,
        suggestion: Option<&Suggestion>,
    ) -> Result<Action, AgentError>
    where
        S: ActionSpace + ?Sized,
    {
        let mut candidates = space.actions(&state.location);
        if candidates.is_empty() {
            candidates = self
                .q_table
                .actions(state)
                .map(|values| values.keys().cloned().collect())
                .unwrap_or_default();
        }
        if candidates.is_empty() {
            return Err(AgentError::NoActions {
                state: state.clone(),
            });
        }
        if !self.q_table.contains(state) {
            self.q_table.ensure_state(state, candidates.iter().cloned());
        }
        let ctx = DecisionContext {
            state,
            q_table: &self.q_table,
            suggestion,
            recent_failures: &self.recent_failures,
            exploration_rate: self.exploration_rate,
        };
        self.pipeline
            .decide(&ctx, candidates, &mut self.rng)
            .ok_or_else(|| AgentError::NoActions {
                state: state.clone(),
            })
    }

    /// Apply one Q-learning update and maintain the failure set. Returns
    /// the new value.
    ///
    /// A reward at or below the failure threshold marks the action as a
    /// recent failure; a positive reward clears it.
    pub fn learn(
        &mut self,
        state: &StateKey,
        action: &Action,
        reward: f64,
        next_state: &StateKey,
    ) -> f64 {
        let value = self.q_table.update(
            state,
            action,
            reward,
            next_state,
            self.config.learning_rate,
            self.config.discount_factor,
        );
        if reward <= self.config.failure_threshold {
            self.recent_failures.insert(action.clone());
        } else if reward > 0.0 {
            self.recent_failures.remove(action);
        }
        value
    }

    /// Record a detection and penalize every stored move that lands near
    /// the camera that made it. Returns the number of values penalized.
    pub fn learn_from_detection(&mut self, event: DetectionEvent) -> usize {
        let radius = self.config.detection_radius;
        let camera = event.camera_location.clone();
        let penalized = self.q_table.adjust_where(
            |_, action| {
                action
                    .target()
                    .and_then(|target| target.proximity(&camera))
                    .is_some_and(|distance| distance <= radius)
            },
            self.config.detection_penalty,
        );
        debug!(
            camera = %event.camera,
            location = %event.location,
            penalized,
            "Learned from detection"
        );
        self.detections.record(event);
        penalized
    }

    /// Remember a route that ended in an escape. The oldest route is
    /// dropped once the configured capacity is reached.
    pub fn record_route(&mut self, route: Vec<Location>) {
        if route.is_empty() {
            return;
        }
        let capacity = self.config.route_capacity.max(1);
        while self.successful_routes.len() >= capacity {
            self.successful_routes.pop_front();
        }
        self.successful_routes.push_back(route);
    }

    // -------------------------------------------------------------------
    // Adversary modelling
    // -------------------------------------------------------------------

    /// Log adversary actions and, when the placements form a chain,
    /// penalize moving onto the predicted next camera from `state`.
    /// Returns the predicted locations.
    pub fn analyze_adversary<S>(
        &mut self,
        actions: &[AdversaryAction],
        state: &StateKey,
        space: &S,
    ) -> Vec<Location>
    where
        S: ActionSpace + ?Sized,
    {
        for action in actions {
            self.patterns.record(action.clone());
        }
        let predicted = adaptation::predict_next_placements(&self.patterns, space);
        if !predicted.is_empty() {
            let penalized = adaptation::apply_prediction_penalty(
                &mut self.q_table,
                state,
                &predicted,
                self.config.prediction_penalty,
            );
            debug!(predicted = predicted.len(), penalized, "Predicted next camera placement");
        }
        predicted
    }

    /// Tune deception, exploration and action values to one adversary.
    pub fn adapt_to_profile<S>(&mut self, profile: &AdversaryProfile, state: &StateKey, space: &S)
    where
        S: ActionSpace + ?Sized,
    {
        let detection_rate = profile.detection_rate();
        self.deception_rate =
            adaptation::adapted_deception_rate(self.deception_rate, detection_rate, &self.config);
        self.exploration_rate = adaptation::adapted_exploration_rate(
            self.config.exploration_rate,
            profile.games_played,
            &self.config,
        );
        let boosted = adaptation::apply_avoidance_bonus(
            &mut self.q_table,
            state,
            profile,
            space,
            &self.config,
        );
        info!(
            adversary = %profile.adversary_id,
            detection_rate,
            deception_rate = self.deception_rate,
            exploration_rate = self.exploration_rate,
            boosted,
            "Adapted to adversary profile"
        );
    }

    // -------------------------------------------------------------------
    // Deception
    // -------------------------------------------------------------------

    /// Roll the deception rate.
    pub fn should_deceive(&mut self) -> bool {
        roll(&mut self.rng, self.deception_rate)
    }

    /// Plan a decoy away from `current`.
    pub fn plan_deception(
        &mut self,
        current: &Location,
        known: &[Location],
        oracle: Option<&RuleOracle>,
    ) -> Option<DecoyPlan> {
        deception::plan(current, known, oracle, &self.patterns, &mut self.rng)
    }

    // -------------------------------------------------------------------
    // Training support
    // -------------------------------------------------------------------

    /// Set the exploration rate for offline episode `episode` of `total`.
    pub fn decay_exploration_offline(&mut self, episode: u32, total: u32) {
        self.exploration_rate = adaptation::offline_exploration_rate(episode, total, &self.config);
    }

    /// Drop weak actions from the table. Returns the number removed.
    pub fn prune(&mut self) -> usize {
        let removed = self
            .q_table
            .prune(self.config.prune_ratio, self.config.prune_floor);
        if removed > 0 {
            info!(removed, states = self.q_table.len(), "Pruned Q-table");
        }
        removed
    }

    /// Prune with the configured on-save probability.
    pub fn maybe_prune_on_save(&mut self) -> usize {
        if roll(&mut self.rng, self.config.prune_on_save_chance) {
            self.prune()
        } else {
            0
        }
    }

    /// Copy out everything worth persisting.
    pub fn snapshot(&self) -> LearningData {
        LearningData {
            q_table: self.q_table.clone(),
            detections: self.detections.clone(),
            patterns: self.patterns.clone(),
            successful_routes: self.successful_routes.clone(),
            exploration_rate: self.exploration_rate,
            deception_rate: self.deception_rate,
            saved_at: Utc::now(),
        }
    }

    /// Replace learned state with `data`. Rates are clamped to `[0, 1]`.
    pub fn restore(&mut self, data: LearningData) {
        self.q_table = data.q_table;
        self.detections = data.detections;
        self.patterns = data.patterns;
        self.successful_routes = data.successful_routes;
        self.set_exploration_rate(data.exploration_rate);
        self.set_deception_rate(data.deception_rate);
        self.recent_failures.clear();
    }
}
