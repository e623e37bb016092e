//! The decision pipeline.
//!
//! Action selection is an ordered list of [`PolicyLayer`]s. Each layer sees
//! the candidates left by the layers before it and either decides on an
//! action or passes a (possibly filtered) candidate list on. The standard
//! pipeline is:
//!
//! 1. [`SuggestionOverride`] adopts a confident rule-source suggestion with
//!    a fixed probability.
//! 2. [`FailureAvoidance`] drops recently failed actions unless that would
//!    leave nothing.
//! 3. [`EpsilonGreedy`] explores uniformly at the exploration rate and
//!    otherwise takes the first action with the highest Q-value.

use std::collections::BTreeSet;

use evasion_types::{Action, StateKey};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::config::LearningConfig;
use crate::oracle::Suggestion;
use crate::q_table::QTable;

/// Everything a layer may read while deciding.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The state being acted in.
    pub state: &'a StateKey,
    /// Current action values.
    pub q_table: &'a QTable,
    /// Suggestion offered by a rule source for this state, if any.
    pub suggestion: Option<&'a Suggestion>,
    /// Actions whose last outcome was a strong penalty.
    pub recent_failures: &'a BTreeSet<Action>,
    /// Probability of exploring instead of exploiting.
    pub exploration_rate: f64,
}

/// What a layer did with the candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    /// The layer chose this action; later layers are skipped.
    Decided(Action),
    /// The layer passes these candidates on.
    Continue(Vec<Action>),
}

/// One stage of the decision pipeline.
pub trait PolicyLayer: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Decide or filter. `candidates` is never empty when called by
    /// [`DecisionPipeline::decide`].
    fn apply(
        &self,
        ctx: &DecisionContext<'_>,
        candidates: Vec<Action>,
        rng: &mut StdRng,
    ) -> LayerOutcome;
}

/// Returns `true` with probability `p`. Values outside `[0, 1]`, including
/// NaN, are treated as the nearest bound.
pub fn roll(rng: &mut StdRng, p: f64) -> bool {
    if p.is_nan() || p <= 0.0 {
        false
    } else if p >= 1.0 {
        true
    } else {
        rng.random_bool(p)
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Adopt a sufficiently confident suggestion with a fixed probability.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionOverride {
    /// Suggestions must be strictly more confident than this.
    pub min_confidence: f64,
    /// Probability of adopting a qualifying suggestion.
    pub adopt_probability: f64,
}

impl PolicyLayer for SuggestionOverride {
    fn name(&self) -> &'static str {
        "suggestion_override"
    }

    fn apply(
        &self,
        ctx: &DecisionContext<'_>,
        candidates: Vec<Action>,
        rng: &mut StdRng,
    ) -> LayerOutcome {
        match ctx.suggestion {
            Some(suggestion)
                if suggestion.confidence > self.min_confidence
                    && candidates.contains(&suggestion.action)
                    && roll(rng, self.adopt_probability) =>
            {
                LayerOutcome::Decided(suggestion.action.clone())
            }
            _ => LayerOutcome::Continue(candidates),
        }
    }
}

/// Skip actions that recently earned a strong penalty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureAvoidance;

impl PolicyLayer for FailureAvoidance {
    fn name(&self) -> &'static str {
        "failure_avoidance"
    }

    fn apply(
        &self,
        ctx: &DecisionContext<'_>,
        candidates: Vec<Action>,
        _rng: &mut StdRng,
    ) -> LayerOutcome {
        let kept: Vec<Action> = candidates
            .iter()
            .filter(|action| !ctx.recent_failures.contains(*action))
            .cloned()
            .collect();
        if kept.is_empty() {
            LayerOutcome::Continue(candidates)
        } else {
            LayerOutcome::Continue(kept)
        }
    }
}

/// Explore uniformly with the exploration rate, otherwise exploit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpsilonGreedy;

impl PolicyLayer for EpsilonGreedy {
    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }

    fn apply(
        &self,
        ctx: &DecisionContext<'_>,
        candidates: Vec<Action>,
        rng: &mut StdRng,
    ) -> LayerOutcome {
        let picked = if roll(rng, ctx.exploration_rate) {
            candidates.choose(rng)
        } else {
            ctx.q_table.best_among(ctx.state, &candidates)
        };
        match picked {
            Some(action) => LayerOutcome::Decided(action.clone()),
            None => LayerOutcome::Continue(candidates),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Ordered list of policy layers.
pub struct DecisionPipeline {
    layers: Vec<Box<dyn PolicyLayer>>,
}

impl core::fmt::Debug for DecisionPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.name()))
            .finish()
    }
}

impl DecisionPipeline {
    /// A pipeline with the given layers, evaluated in order.
    pub fn new(layers: Vec<Box<dyn PolicyLayer>>) -> Self {
        Self { layers }
    }

    /// Suggestion override, failure avoidance, epsilon-greedy.
    pub fn standard(config: &LearningConfig) -> Self {
        Self::new(vec![
            Box::new(SuggestionOverride {
                min_confidence: config.suggestion_confidence,
                adopt_probability: config.suggestion_adopt_probability,
            }),
            Box::new(FailureAvoidance),
            Box::new(EpsilonGreedy),
        ])
    }

    /// Names of the layers in evaluation order.
    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// Run the layers over `candidates`.
    ///
    /// Returns `None` only when `candidates` is empty. If every layer passes,
    /// the first remaining candidate is taken.
    pub fn decide(
        &self,
        ctx: &DecisionContext<'_>,
        candidates: Vec<Action>,
        rng: &mut StdRng,
    ) -> Option<Action> {
        let mut remaining = candidates;
        for layer in &self.layers {
            if remaining.is_empty() {
                return None;
            }
            match layer.apply(ctx, remaining, rng) {
                LayerOutcome::Decided(action) => {
                    debug!(layer = layer.name(), state = %ctx.state, %action, "Action decided");
                    return Some(action);
                }
                LayerOutcome::Continue(next) => remaining = next,
            }
        }
        remaining.into_iter().next()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_types::Location;
    use rand::SeedableRng;

    use super::*;

    fn named(name: &str) -> Action {
        Action::move_to(Location::named(name))
    }

    fn state() -> StateKey {
        StateKey::undetected(Location::named("city_center"))
    }

    fn ctx<'a>(
        state: &'a StateKey,
        q_table: &'a QTable,
        suggestion: Option<&'a Suggestion>,
        failures: &'a BTreeSet<Action>,
        exploration_rate: f64,
    ) -> DecisionContext<'a> {
        DecisionContext {
            state,
            q_table,
            suggestion,
            recent_failures: failures,
            exploration_rate,
        }
    }

    #[test]
    fn roll_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!roll(&mut rng, 0.0));
        assert!(!roll(&mut rng, f64::NAN));
        assert!(roll(&mut rng, 1.0));
        assert!(roll(&mut rng, 3.0));
    }

    #[test]
    fn suggestion_needs_confidence_above_threshold() {
        let layer = SuggestionOverride {
            min_confidence: 0.8,
            adopt_probability: 1.0,
        };
        let s = state();
        let q = QTable::new();
        let failures = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(2);

        let weak = Suggestion {
            action: named("park"),
            confidence: 0.8,
        };
        let out = layer.apply(&ctx(&s, &q, Some(&weak), &failures, 0.0), vec![named("park")], &mut rng);
        assert_eq!(out, LayerOutcome::Continue(vec![named("park")]));

        let strong = Suggestion {
            action: named("park"),
            confidence: 0.81,
        };
        let out = layer.apply(&ctx(&s, &q, Some(&strong), &failures, 0.0), vec![named("park")], &mut rng);
        assert_eq!(out, LayerOutcome::Decided(named("park")));
    }

    #[test]
    fn suggestion_must_be_a_candidate() {
        let layer = SuggestionOverride {
            min_confidence: 0.8,
            adopt_probability: 1.0,
        };
        let s = state();
        let q = QTable::new();
        let failures = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(3);
        let strong = Suggestion {
            action: named("atlantis"),
            confidence: 0.99,
        };
        let out = layer.apply(&ctx(&s, &q, Some(&strong), &failures, 0.0), vec![named("park")], &mut rng);
        assert!(matches!(out, LayerOutcome::Continue(_)));
    }

    #[test]
    fn suggestion_adopted_about_seventy_percent() {
        let layer = SuggestionOverride {
            min_confidence: 0.8,
            adopt_probability: 0.7,
        };
        let s = state();
        let q = QTable::new();
        let failures = BTreeSet::new();
        let strong = Suggestion {
            action: named("park"),
            confidence: 0.9,
        };
        let mut rng = StdRng::seed_from_u64(4);
        let adopted = (0..2000)
            .filter(|_| {
                matches!(
                    layer.apply(&ctx(&s, &q, Some(&strong), &failures, 0.0), vec![named("park")], &mut rng),
                    LayerOutcome::Decided(_)
                )
            })
            .count();
        assert!((1250..=1550).contains(&adopted), "adopted {adopted} of 2000");
    }

    #[test]
    fn failure_avoidance_filters_unless_empty() {
        let s = state();
        let q = QTable::new();
        let mut rng = StdRng::seed_from_u64(5);
        let mut failures = BTreeSet::new();
        failures.insert(named("park"));

        let out = FailureAvoidance.apply(
            &ctx(&s, &q, None, &failures, 0.0),
            vec![named("park"), named("port")],
            &mut rng,
        );
        assert_eq!(out, LayerOutcome::Continue(vec![named("port")]));

        let out = FailureAvoidance.apply(&ctx(&s, &q, None, &failures, 0.0), vec![named("park")], &mut rng);
        assert_eq!(out, LayerOutcome::Continue(vec![named("park")]));
    }

    #[test]
    fn greedy_takes_argmax_without_exploration() {
        let s = state();
        let mut q = QTable::new();
        q.set(&s, named("industrial_zone"), 10.0);
        q.set(&s, named("residential_area"), 5.0);
        q.set(&s, Action::CreateDecoy, 2.0);
        let failures = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(6);
        let candidates = vec![named("industrial_zone"), named("residential_area"), Action::CreateDecoy];
        for _ in 0..20 {
            let out = EpsilonGreedy.apply(&ctx(&s, &q, None, &failures, 0.0), candidates.clone(), &mut rng);
            assert_eq!(out, LayerOutcome::Decided(named("industrial_zone")));
        }
    }

    #[test]
    fn full_exploration_visits_every_candidate() {
        let s = state();
        let q = QTable::new();
        let failures = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = vec![named("a"), named("b"), named("c")];
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            if let LayerOutcome::Decided(action) =
                EpsilonGreedy.apply(&ctx(&s, &q, None, &failures, 1.0), candidates.clone(), &mut rng)
            {
                seen.insert(action);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn pipeline_order_and_filtering() {
        let config = LearningConfig::default();
        let pipeline = DecisionPipeline::standard(&config);
        assert_eq!(
            pipeline.layer_names(),
            vec!["suggestion_override", "failure_avoidance", "epsilon_greedy"]
        );

        let s = state();
        let mut q = QTable::new();
        q.set(&s, named("industrial_zone"), 10.0);
        q.set(&s, named("residential_area"), 5.0);
        let mut failures = BTreeSet::new();
        failures.insert(named("industrial_zone"));
        let mut rng = StdRng::seed_from_u64(8);
        let chosen = pipeline.decide(
            &ctx(&s, &q, None, &failures, 0.0),
            vec![named("industrial_zone"), named("residential_area")],
            &mut rng,
        );
        assert_eq!(chosen, Some(named("residential_area")));
    }

    #[test]
    fn empty_candidates_yield_none() {
        let pipeline = DecisionPipeline::standard(&LearningConfig::default());
        let s = state();
        let q = QTable::new();
        let failures = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(9);
        assert!(pipeline.decide(&ctx(&s, &q, None, &failures, 0.0), Vec::new(), &mut rng).is_none());
    }

    #[test]
    fn pipeline_without_layers_takes_first() {
        let pipeline = DecisionPipeline::new(Vec::new());
        let s = state();
        let q = QTable::new();
        let failures = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(10);
        let chosen = pipeline.decide(&ctx(&s, &q, None, &failures, 0.0), vec![named("x"), named("y")], &mut rng);
        assert_eq!(chosen, Some(named("x")));
    }
}
