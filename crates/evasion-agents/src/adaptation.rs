//! Tuning the agent to a particular adversary.
//!
//! Everything here is a pure function over the agent's tables and the
//! adversary's [`AdversaryProfile`] or [`PatternMemory`]; the agent applies
//! the results in [`crate::agent::LearningAgent::adapt_to_profile`] and
//! [`crate::agent::LearningAgent::analyze_adversary`].

use evasion_types::{Action, AdversaryActionKind, Location, StateKey};

use crate::config::LearningConfig;
use crate::memory::PatternMemory;
use crate::profile::AdversaryProfile;
use crate::q_table::QTable;
use crate::space::ActionSpace;

/// Placements required before a next placement is predicted.
pub const PREDICTION_MIN_PLACEMENTS: usize = 3;

/// Deception rate after seeing the adversary's detection rate.
///
/// A sharp adversary (detection rate above the threshold) earns more
/// deception, a weak one less. The result is clamped to the configured
/// bounds.
pub fn adapted_deception_rate(current: f64, detection_rate: f64, config: &LearningConfig) -> f64 {
    let step = if detection_rate > config.detection_rate_threshold {
        config.deception_rate_step
    } else {
        -config.deception_rate_step
    };
    (current + step).clamp(config.deception_rate_min, config.deception_rate_max)
}

/// Exploration rate after `games_played` games against one adversary.
pub fn adapted_exploration_rate(initial: f64, games_played: u32, config: &LearningConfig) -> f64 {
    let decayed = config
        .adaptive_exploration_decay
        .mul_add(-f64::from(games_played), initial);
    decayed.max(config.adaptive_exploration_floor)
}

/// Exploration rate for offline episode `episode` of `total`.
///
/// Decays linearly from the configured start to the floor and never goes
/// below the floor.
pub fn offline_exploration_rate(episode: u32, total: u32, config: &LearningConfig) -> f64 {
    let start = config.offline_exploration_start;
    let floor = config.offline_exploration_floor;
    if total == 0 {
        return start.max(floor);
    }
    let progress = f64::from(episode) / f64::from(total);
    progress.mul_add(-(start - floor), start).max(floor)
}

/// Reward moves in `state` that take the agent farther from the adversary's
/// favourite camera spots. Returns the number of actions boosted.
///
/// Each qualifying action is boosted once, however many spots it moves
/// away from.
pub fn apply_avoidance_bonus<S>(
    q_table: &mut QTable,
    state: &StateKey,
    profile: &AdversaryProfile,
    space: &S,
    config: &LearningConfig,
) -> usize
where
    S: ActionSpace + ?Sized,
{
    let hotspots: Vec<&Location> = profile
        .top_placements(config.avoidance_top_placements)
        .into_iter()
        .map(|(location, _)| location)
        .collect();
    if hotspots.is_empty() {
        return 0;
    }
    let here = &state.location;
    let moves_away = |target: &Location| {
        hotspots.iter().any(|spot| {
            match (space.distance(here, spot), space.distance(target, spot)) {
                (Some(now), Some(then)) => then > now,
                _ => false,
            }
        })
    };
    let boosted: Vec<Action> = q_table
        .actions(state)
        .map(|values| {
            values
                .keys()
                .filter(|action| action.target().is_some_and(&moves_away))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    for action in &boosted {
        q_table.adjust(state, action, config.avoidance_bonus);
    }
    boosted.len()
}

/// Guess where the next camera goes.
///
/// With more than three placements on record, the last three are examined.
/// If each is adjacent to the next, the adversary is walking a chain and the
/// continuation is every neighbour of the last placement except the one it
/// came from.
pub fn predict_next_placements<S>(patterns: &PatternMemory, space: &S) -> Vec<Location>
where
    S: ActionSpace + ?Sized,
{
    if patterns.count(AdversaryActionKind::PlaceCamera) <= PREDICTION_MIN_PLACEMENTS {
        return Vec::new();
    }
    let recent = patterns.recent(AdversaryActionKind::PlaceCamera, PREDICTION_MIN_PLACEMENTS);
    let [first, middle, last] = recent.as_slice() else {
        return Vec::new();
    };
    if !space.adjacent(&first.location, &middle.location)
        || !space.adjacent(&middle.location, &last.location)
    {
        return Vec::new();
    }
    space
        .neighbors(&last.location)
        .into_iter()
        .filter(|next| next != &middle.location)
        .collect()
}

/// Penalize moves in `state` towards predicted camera locations. Only
/// existing entries are touched. Returns the number penalized.
pub fn apply_prediction_penalty(
    q_table: &mut QTable,
    state: &StateKey,
    predicted: &[Location],
    penalty: f64,
) -> usize {
    predicted
        .iter()
        .filter(|location| q_table.adjust(state, &Action::MoveTo((*location).clone()), penalty))
        .count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_types::AdversaryAction;
    use evasion_world::CityGraph;

    use super::*;
    use crate::space::CitySpace;

    fn placement(name: &str, time: f64) -> AdversaryAction {
        AdversaryAction {
            kind: AdversaryActionKind::PlaceCamera,
            location: Location::named(name),
            time,
            agent_location: None,
        }
    }

    #[test]
    fn deception_rises_against_sharp_adversaries() {
        let config = LearningConfig::default();
        assert!((adapted_deception_rate(0.2, 0.8, &config) - 0.3).abs() < 1e-9);
        assert!((adapted_deception_rate(0.2, 0.5, &config) - 0.1).abs() < 1e-9);
        assert!((adapted_deception_rate(0.6, 0.9, &config) - 0.6).abs() < 1e-9);
        assert!((adapted_deception_rate(0.1, 0.0, &config) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn exploration_decays_to_floor() {
        let config = LearningConfig::default();
        assert!((adapted_exploration_rate(0.2, 5, &config) - 0.15).abs() < 1e-9);
        assert!((adapted_exploration_rate(0.2, 100, &config) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn offline_exploration_is_linear_then_floored() {
        let config = LearningConfig::default();
        assert!((offline_exploration_rate(0, 100, &config) - 0.5).abs() < 1e-9);
        assert!((offline_exploration_rate(50, 100, &config) - 0.3).abs() < 1e-9);
        assert!((offline_exploration_rate(100, 100, &config) - 0.1).abs() < 1e-9);
        assert!((offline_exploration_rate(0, 0, &config) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn avoidance_bonus_rewards_moving_away() {
        let city = CityGraph::standard();
        let space = CitySpace::new(&city);
        let config = LearningConfig::default();
        let mut profile = AdversaryProfile::new("p");
        profile.record_camera_placement(Location::named("port"));

        let state = StateKey::undetected(Location::named("city_center"));
        let mut q_table = QTable::new();
        q_table.ensure_state(&state, space.actions(&state.location));

        let boosted = apply_avoidance_bonus(&mut q_table, &state, &profile, &space, &config);
        // city_center is two hops from port; residential_area is three.
        assert_eq!(boosted, 1);
        let away = Action::move_to(Location::named("residential_area"));
        assert!((q_table.value(&state, &away) - 0.5).abs() < 1e-9);
        let toward = Action::move_to(Location::named("train_station"));
        assert!(q_table.value(&state, &toward).abs() < f64::EPSILON);
    }

    #[test]
    fn chain_of_placements_predicts_continuation() {
        let city = CityGraph::standard();
        let space = CitySpace::new(&city);
        let mut patterns = PatternMemory::new(16);
        for (i, name) in ["port", "residential_area", "shopping_mall", "park"]
            .into_iter()
            .enumerate()
        {
            patterns.record(placement(name, f64::from(u32::try_from(i).unwrap())));
        }
        let predicted = predict_next_placements(&patterns, &space);
        assert_eq!(predicted, vec![Location::named("highway_entrance")]);
    }

    #[test]
    fn broken_chain_predicts_nothing() {
        let city = CityGraph::standard();
        let space = CitySpace::new(&city);
        let mut patterns = PatternMemory::new(16);
        for name in ["park", "city_center", "port", "park"] {
            patterns.record(placement(name, 0.0));
        }
        assert!(predict_next_placements(&patterns, &space).is_empty());
    }

    #[test]
    fn three_placements_are_not_enough() {
        let city = CityGraph::standard();
        let space = CitySpace::new(&city);
        let mut patterns = PatternMemory::new(16);
        for name in ["residential_area", "shopping_mall", "park"] {
            patterns.record(placement(name, 0.0));
        }
        assert!(predict_next_placements(&patterns, &space).is_empty());
    }

    #[test]
    fn prediction_penalty_touches_existing_entries_only() {
        let state = StateKey::undetected(Location::named("park"));
        let mut q_table = QTable::new();
        q_table.set(&state, Action::move_to(Location::named("highway_entrance")), 1.0);
        let penalized = apply_prediction_penalty(
            &mut q_table,
            &state,
            &[Location::named("highway_entrance"), Location::named("port")],
            -5.0,
        );
        assert_eq!(penalized, 1);
        let value = q_table.value(&state, &Action::move_to(Location::named("highway_entrance")));
        assert!((value + 4.0).abs() < 1e-9);
        assert_eq!(q_table.actions(&state).unwrap().len(), 1);
    }
}
