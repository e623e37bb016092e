//! Decoy signals and the deception sub-strategy.
//!
//! A decoy is a fabricated alert at some location. It carries a random
//! strength and fades after a fixed lifetime measured in game time.
//!
//! Planning a decoy answers two questions:
//!
//! - **Where.** With a rule oracle, the location with the highest
//!   effectiveness (strength times covering cameras) other than the agent's
//!   own. Without a ranking, a uniformly random other known location.
//! - **When.** Immediately, unless the adversary's camera checks have a
//!   rhythm. With more than five checks on record, the decoy waits for
//!   `0.3 x` the mean interval of the last five checks.

use evasion_types::{AdversaryActionKind, Location};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::PatternMemory;
use crate::oracle::RuleOracle;

/// Checks needed before timing is derived from the adversary's rhythm.
pub const TIMING_MIN_CHECKS: usize = 5;

/// Number of recent checks averaged for timing.
pub const TIMING_WINDOW: usize = 5;

/// Fraction of the mean check interval to wait after a check.
pub const TIMING_DELAY_FACTOR: f64 = 0.3;

/// Decoy signal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoyConfig {
    /// Seconds of game time a decoy stays live (default: 30).
    #[serde(default = "default_duration")]
    pub duration: f64,

    /// Lowest random strength (default: 70).
    #[serde(default = "default_min_strength")]
    pub min_strength: f64,

    /// Highest random strength, exclusive (default: 100).
    #[serde(default = "default_max_strength")]
    pub max_strength: f64,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            min_strength: default_min_strength(),
            max_strength: default_max_strength(),
        }
    }
}

const fn default_duration() -> f64 {
    30.0
}

const fn default_min_strength() -> f64 {
    70.0
}

const fn default_max_strength() -> f64 {
    100.0
}

/// When a planned decoy should fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoyTiming {
    /// Fire now.
    Immediate,
    /// Fire `delay` seconds after the adversary's next camera check.
    AfterCheck {
        /// Seconds to wait after the check.
        delay: f64,
    },
}

/// A planned decoy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoyPlan {
    /// Where to fabricate the signal.
    pub location: Location,
    /// When to fire it.
    pub timing: DecoyTiming,
}

/// A live fabricated alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoySignal {
    /// Sequence number within the board.
    pub id: u32,
    /// Where the alert appears.
    pub location: Location,
    /// Signal strength in `[min_strength, max_strength)`.
    pub strength: f64,
    /// Game time at creation.
    pub created_at: f64,
    /// Lifetime in seconds.
    pub duration: f64,
}

impl DecoySignal {
    /// Whether the signal has faded by game time `now`.
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.created_at >= self.duration
    }
}

/// The set of live decoy signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoyBoard {
    config: DecoyConfig,
    signals: Vec<DecoySignal>,
    next_id: u32,
}

impl DecoyBoard {
    /// Create an empty board.
    pub const fn new(config: DecoyConfig) -> Self {
        Self {
            config,
            signals: Vec::new(),
            next_id: 1,
        }
    }

    /// Fabricate a signal at `location` with a random strength.
    pub fn create(&mut self, location: Location, now: f64, rng: &mut StdRng) -> DecoySignal {
        let low = self.config.min_strength;
        let high = self.config.max_strength;
        let strength = if high > low {
            rng.random_range(low..high)
        } else {
            low
        };
        let signal = DecoySignal {
            id: self.next_id,
            location,
            strength,
            created_at: now,
            duration: self.config.duration,
        };
        self.next_id = self.next_id.saturating_add(1);
        debug!(id = signal.id, location = %signal.location, strength, "Decoy signal created");
        self.signals.push(signal.clone());
        signal
    }

    /// Remove and return every signal that has faded by `now`.
    pub fn expire(&mut self, now: f64) -> Vec<DecoySignal> {
        let (expired, live): (Vec<_>, Vec<_>) =
            self.signals.drain(..).partition(|signal| signal.is_expired(now));
        self.signals = live;
        expired
    }

    /// Live signals in creation order.
    pub fn active(&self) -> &[DecoySignal] {
        &self.signals
    }

    /// Live signals at `location`.
    pub fn at<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a DecoySignal> {
        self.signals.iter().filter(move |signal| &signal.location == location)
    }

    /// Number of live signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Whether no signal is live.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Decide when a decoy should fire given the adversary's check history.
pub fn plan_timing(patterns: &PatternMemory) -> DecoyTiming {
    if patterns.count(AdversaryActionKind::CheckCamera) <= TIMING_MIN_CHECKS {
        return DecoyTiming::Immediate;
    }
    patterns
        .average_interval(AdversaryActionKind::CheckCamera, TIMING_WINDOW)
        .map_or(DecoyTiming::Immediate, |mean| DecoyTiming::AfterCheck {
            delay: mean * TIMING_DELAY_FACTOR,
        })
}

/// Pick where to place a decoy.
///
/// Oracle rankings win when they name a location other than `current`.
/// Otherwise a random location from `known` other than `current` is drawn.
pub fn choose_location(
    current: &Location,
    known: &[Location],
    oracle: Option<&RuleOracle>,
    rng: &mut StdRng,
) -> Option<Location> {
    let ranked = oracle.and_then(|oracle| {
        oracle
            .decoy_rankings()
            .into_iter()
            .map(|(name, _)| Location::named(name))
            .find(|location| location != current)
    });
    if ranked.is_some() {
        return ranked;
    }
    let others: Vec<&Location> = known.iter().filter(|location| *location != current).collect();
    others.choose(rng).map(|location| (*location).clone())
}

/// Plan a decoy: location and timing together.
pub fn plan(
    current: &Location,
    known: &[Location],
    oracle: Option<&RuleOracle>,
    patterns: &PatternMemory,
    rng: &mut StdRng,
) -> Option<DecoyPlan> {
    let location = choose_location(current, known, oracle, rng)?;
    Some(DecoyPlan {
        location,
        timing: plan_timing(patterns),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_types::AdversaryAction;
    use rand::SeedableRng;

    use super::*;
    use crate::oracle::KnowledgeBase;

    fn checks(times: &[f64]) -> PatternMemory {
        let mut memory = PatternMemory::new(32);
        for t in times {
            memory.record(AdversaryAction {
                kind: AdversaryActionKind::CheckCamera,
                location: Location::named("park"),
                time: *t,
                agent_location: None,
            });
        }
        memory
    }

    #[test]
    fn strength_stays_in_range() {
        let mut board = DecoyBoard::new(DecoyConfig::default());
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let signal = board.create(Location::named("park"), 0.0, &mut rng);
            assert!((70.0..100.0).contains(&signal.strength));
        }
        assert_eq!(board.len(), 100);
    }

    #[test]
    fn signals_expire_after_thirty_seconds() {
        let mut board = DecoyBoard::new(DecoyConfig::default());
        let mut rng = StdRng::seed_from_u64(12);
        board.create(Location::named("park"), 0.0, &mut rng);
        board.create(Location::named("port"), 10.0, &mut rng);
        assert!(board.expire(29.9).is_empty());
        let gone = board.expire(30.0);
        assert_eq!(gone.len(), 1);
        assert_eq!(gone.first().unwrap().location, Location::named("park"));
        assert_eq!(board.at(&Location::named("port")).count(), 1);
        assert_eq!(board.expire(40.0).len(), 1);
        assert!(board.is_empty());
    }

    #[test]
    fn timing_is_immediate_with_few_checks() {
        assert_eq!(plan_timing(&checks(&[0.0, 1.0, 2.0, 3.0, 4.0])), DecoyTiming::Immediate);
    }

    #[test]
    fn timing_follows_check_rhythm() {
        let timing = plan_timing(&checks(&[0.0, 5.0, 15.0, 25.0, 35.0, 45.0]));
        assert!(matches!(
            timing,
            DecoyTiming::AfterCheck { delay } if (delay - 3.0).abs() < 1e-9
        ));
    }

    #[test]
    fn random_location_excludes_current() {
        let mut rng = StdRng::seed_from_u64(13);
        let here = Location::named("park");
        let known = vec![here.clone(), Location::named("port")];
        for _ in 0..20 {
            let chosen = choose_location(&here, &known, None, &mut rng).unwrap();
            assert_eq!(chosen, Location::named("port"));
        }
        assert!(choose_location(&here, &[here.clone()], None, &mut rng).is_none());
    }

    #[test]
    fn oracle_ranking_takes_top_other_location() {
        let mut kb = KnowledgeBase::standard();
        kb.add_camera(1, "park", 1);
        kb.add_decoy("park", 90.0);
        kb.add_decoy("shopping_mall", 80.0);
        let oracle = RuleOracle::new(Box::new(kb));
        let mut rng = StdRng::seed_from_u64(14);
        let here = Location::named("park");
        let chosen = choose_location(&here, &[], Some(&oracle), &mut rng);
        assert_eq!(chosen, Some(Location::named("shopping_mall")));
    }

    #[test]
    fn plan_combines_location_and_timing() {
        let mut rng = StdRng::seed_from_u64(15);
        let known = vec![Location::named("a"), Location::named("b")];
        let plan = plan(&Location::named("a"), &known, None, &checks(&[]), &mut rng).unwrap();
        assert_eq!(plan.location, Location::named("b"));
        assert_eq!(plan.timing, DecoyTiming::Immediate);
    }
}
