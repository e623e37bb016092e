//! Tunable parameters for the learning agent.
//!
//! [`LearningConfig`] bundles every rate, threshold and capacity the agent
//! uses so that the trainer, the city game and tests can override defaults.
//! It deserializes from the `learning` section of `evasion-config.yaml`;
//! every field falls back to its default when omitted.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Configuration for Q-learning, the decision pipeline and adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Step size `alpha` of the Q-learning rule (default: 0.1).
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Discount factor `gamma` applied to the next state's best value
    /// (default: 0.9).
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f64,

    /// Exploration rate used outside offline training (default: 0.2).
    ///
    /// Also the starting point of the per-adversary decay.
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,

    /// Exploration rate at the first offline training episode (default: 0.5).
    #[serde(default = "default_offline_exploration_start")]
    pub offline_exploration_start: f64,

    /// Exploration rate reached at the last offline training episode
    /// (default: 0.1).
    #[serde(default = "default_offline_exploration_floor")]
    pub offline_exploration_floor: f64,

    /// Lowest exploration rate reached through per-adversary decay
    /// (default: 0.05).
    #[serde(default = "default_adaptive_exploration_floor")]
    pub adaptive_exploration_floor: f64,

    /// Exploration removed per game played against one adversary
    /// (default: 0.01).
    #[serde(default = "default_adaptive_exploration_decay")]
    pub adaptive_exploration_decay: f64,

    /// Probability of fabricating a decoy on a turn where one is possible
    /// (default: 0.2).
    #[serde(default = "default_deception_rate")]
    pub deception_rate: f64,

    /// Lower clamp for the adapted deception rate (default: 0.05).
    #[serde(default = "default_deception_rate_min")]
    pub deception_rate_min: f64,

    /// Upper clamp for the adapted deception rate (default: 0.6).
    #[serde(default = "default_deception_rate_max")]
    pub deception_rate_max: f64,

    /// Change applied to the deception rate per adaptation (default: 0.1).
    #[serde(default = "default_deception_rate_step")]
    pub deception_rate_step: f64,

    /// Adversary detection rate above which deception is raised
    /// (default: 0.7).
    #[serde(default = "default_detection_rate_threshold")]
    pub detection_rate_threshold: f64,

    /// Rewards at or below this value mark the action as a recent failure
    /// (default: -2.0).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,

    /// Q-value adjustment for actions leading near a detecting camera
    /// (default: -2.0).
    #[serde(default = "default_detection_penalty")]
    pub detection_penalty: f64,

    /// Manhattan radius around a camera inside which actions are penalized
    /// after a detection (default: 2).
    #[serde(default = "default_detection_radius")]
    pub detection_radius: usize,

    /// Suggestions must be strictly more confident than this to be
    /// considered (default: 0.8).
    #[serde(default = "default_suggestion_confidence")]
    pub suggestion_confidence: f64,

    /// Probability of adopting a sufficiently confident suggestion
    /// (default: 0.7).
    #[serde(default = "default_suggestion_adopt_probability")]
    pub suggestion_adopt_probability: f64,

    /// Fraction of a state's best value an action must reach to survive
    /// pruning (default: 0.5).
    #[serde(default = "default_prune_ratio")]
    pub prune_ratio: f64,

    /// Actions valued above this always survive pruning (default: 1.0).
    #[serde(default = "default_prune_floor")]
    pub prune_floor: f64,

    /// Chance of pruning the Q-table whenever learning data is saved
    /// (default: 0.2).
    #[serde(default = "default_prune_on_save_chance")]
    pub prune_on_save_chance: f64,

    /// Q-value bonus for actions steering away from the adversary's
    /// favourite camera spots (default: 0.5).
    #[serde(default = "default_avoidance_bonus")]
    pub avoidance_bonus: f64,

    /// How many of the adversary's most frequent placements to avoid
    /// (default: 5).
    #[serde(default = "default_avoidance_top_placements")]
    pub avoidance_top_placements: usize,

    /// Q-value adjustment for moving onto a predicted camera location
    /// (default: -5.0).
    #[serde(default = "default_prediction_penalty")]
    pub prediction_penalty: f64,

    /// Maximum retained detection events (default: 256).
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Maximum retained adversary actions per kind (default: 256).
    #[serde(default = "default_pattern_capacity")]
    pub pattern_capacity: usize,

    /// Maximum retained successful routes (default: 50).
    #[serde(default = "default_route_capacity")]
    pub route_capacity: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            discount_factor: default_discount_factor(),
            exploration_rate: default_exploration_rate(),
            offline_exploration_start: default_offline_exploration_start(),
            offline_exploration_floor: default_offline_exploration_floor(),
            adaptive_exploration_floor: default_adaptive_exploration_floor(),
            adaptive_exploration_decay: default_adaptive_exploration_decay(),
            deception_rate: default_deception_rate(),
            deception_rate_min: default_deception_rate_min(),
            deception_rate_max: default_deception_rate_max(),
            deception_rate_step: default_deception_rate_step(),
            detection_rate_threshold: default_detection_rate_threshold(),
            failure_threshold: default_failure_threshold(),
            detection_penalty: default_detection_penalty(),
            detection_radius: default_detection_radius(),
            suggestion_confidence: default_suggestion_confidence(),
            suggestion_adopt_probability: default_suggestion_adopt_probability(),
            prune_ratio: default_prune_ratio(),
            prune_floor: default_prune_floor(),
            prune_on_save_chance: default_prune_on_save_chance(),
            avoidance_bonus: default_avoidance_bonus(),
            avoidance_top_placements: default_avoidance_top_placements(),
            prediction_penalty: default_prediction_penalty(),
            history_capacity: default_history_capacity(),
            pattern_capacity: default_pattern_capacity(),
            route_capacity: default_route_capacity(),
        }
    }
}

impl LearningConfig {
    /// Check that every probability lies in `[0, 1]` and the deception
    /// clamp is ordered.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<(), AgentError> {
        let probabilities = [
            ("learning_rate", self.learning_rate),
            ("discount_factor", self.discount_factor),
            ("exploration_rate", self.exploration_rate),
            ("offline_exploration_start", self.offline_exploration_start),
            ("offline_exploration_floor", self.offline_exploration_floor),
            ("adaptive_exploration_floor", self.adaptive_exploration_floor),
            ("deception_rate", self.deception_rate),
            ("deception_rate_min", self.deception_rate_min),
            ("deception_rate_max", self.deception_rate_max),
            ("suggestion_adopt_probability", self.suggestion_adopt_probability),
            ("prune_on_save_chance", self.prune_on_save_chance),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(AgentError::InvalidParameter {
                    name: name.to_owned(),
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
        }
        if self.deception_rate_min > self.deception_rate_max {
            return Err(AgentError::InvalidParameter {
                name: "deception_rate_min".to_owned(),
                reason: format!(
                    "{} exceeds deception_rate_max {}",
                    self.deception_rate_min, self.deception_rate_max
                ),
            });
        }
        Ok(())
    }
}

const fn default_learning_rate() -> f64 {
    0.1
}

const fn default_discount_factor() -> f64 {
    0.9
}

const fn default_exploration_rate() -> f64 {
    0.2
}

const fn default_offline_exploration_start() -> f64 {
    0.5
}

const fn default_offline_exploration_floor() -> f64 {
    0.1
}

const fn default_adaptive_exploration_floor() -> f64 {
    0.05
}

const fn default_adaptive_exploration_decay() -> f64 {
    0.01
}

const fn default_deception_rate() -> f64 {
    0.2
}

const fn default_deception_rate_min() -> f64 {
    0.05
}

const fn default_deception_rate_max() -> f64 {
    0.6
}

const fn default_deception_rate_step() -> f64 {
    0.1
}

const fn default_detection_rate_threshold() -> f64 {
    0.7
}

const fn default_failure_threshold() -> f64 {
    -2.0
}

const fn default_detection_penalty() -> f64 {
    -2.0
}

const fn default_detection_radius() -> usize {
    2
}

const fn default_suggestion_confidence() -> f64 {
    0.8
}

const fn default_suggestion_adopt_probability() -> f64 {
    0.7
}

const fn default_prune_ratio() -> f64 {
    0.5
}

const fn default_prune_floor() -> f64 {
    1.0
}

const fn default_prune_on_save_chance() -> f64 {
    0.2
}

const fn default_avoidance_bonus() -> f64 {
    0.5
}

const fn default_avoidance_top_placements() -> usize {
    5
}

const fn default_prediction_penalty() -> f64 {
    -5.0
}

const fn default_history_capacity() -> usize {
    256
}

const fn default_pattern_capacity() -> usize {
    256
}

const fn default_route_capacity() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(LearningConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let cfg = LearningConfig {
            exploration_rate: 1.5,
            ..LearningConfig::default()
        };
        let err = cfg.validate().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("exploration_rate"));
    }

    #[test]
    fn inverted_deception_clamp_is_rejected() {
        let cfg = LearningConfig {
            deception_rate_min: 0.7,
            deception_rate_max: 0.6,
            ..LearningConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: LearningConfig =
            serde_json::from_str(r#"{"learning_rate": 0.25}"#).unwrap_or_default();
        assert!((cfg.learning_rate - 0.25).abs() < f64::EPSILON);
        assert!((cfg.discount_factor - 0.9).abs() < f64::EPSILON);
        assert_eq!(cfg.route_capacity, 50);
    }
}
