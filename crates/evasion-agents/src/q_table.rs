//! The tabular value function.
//!
//! [`QTable`] maps a [`StateKey`] to the values of the actions tried in that
//! state. Entries are created lazily: an unseen state or action reads as
//! `0.0` and is materialized on the first update.
//!
//! # Update rule
//!
//! ```text
//! Q(s, a) <- Q(s, a) + alpha * (r + gamma * max_a' Q(s', a') - Q(s, a))
//! ```
//!
//! # Pruning
//!
//! [`QTable::prune`] keeps, per state, the actions worth at least a given
//! fraction of the state's best value or above an absolute floor. The best
//! action of a state always survives, so no visited state is ever emptied.

use std::collections::BTreeMap;

use evasion_types::{Action, StateKey};
use serde::{Deserialize, Serialize};

/// Action values for a single state, in action key order.
pub type ActionValues = BTreeMap<Action, f64>;

/// State-action value table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    #[serde(with = "entries")]
    states: BTreeMap<StateKey, ActionValues>,
}

impl QTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            states: BTreeMap::new(),
        }
    }

    /// Number of states with an entry.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state has been visited.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Total number of stored state-action values.
    pub fn action_count(&self) -> usize {
        self.states.values().map(BTreeMap::len).sum()
    }

    /// Whether `state` has an entry.
    pub fn contains(&self, state: &StateKey) -> bool {
        self.states.contains_key(state)
    }

    /// The stored action values of `state`.
    pub fn actions(&self, state: &StateKey) -> Option<&ActionValues> {
        self.states.get(state)
    }

    /// Iterate over every state entry in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &ActionValues)> {
        self.states.iter()
    }

    /// Create the entry for `state` if missing, adding each of `actions`
    /// that is not yet present with value `0.0`.
    pub fn ensure_state<I>(&mut self, state: &StateKey, actions: I)
    where
        I: IntoIterator<Item = Action>,
    {
        let entry = self.states.entry(state.clone()).or_default();
        for action in actions {
            entry.entry(action).or_insert(0.0);
        }
    }

    /// The value of `action` in `state`, `0.0` when unseen.
    pub fn value(&self, state: &StateKey, action: &Action) -> f64 {
        self.states
            .get(state)
            .and_then(|values| values.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Overwrite a single value, creating the entry if needed.
    pub fn set(&mut self, state: &StateKey, action: Action, value: f64) {
        self.states
            .entry(state.clone())
            .or_default()
            .insert(action, value);
    }

    /// The best value available in `state`, `0.0` when the state is unseen
    /// or has no actions.
    pub fn max_value(&self, state: &StateKey) -> f64 {
        self.states
            .get(state)
            .and_then(|values| values.values().copied().reduce(f64::max))
            .unwrap_or(0.0)
    }

    /// The highest-valued stored action of `state`. Ties go to the first
    /// action in key order.
    pub fn best_action(&self, state: &StateKey) -> Option<&Action> {
        self.states
            .get(state)
            .and_then(|values| first_max(values.iter().map(|(action, value)| (action, *value))))
            .map(|(action, _)| action)
    }

    /// The highest-valued action among `candidates`, reading unseen actions
    /// as `0.0`. Ties go to the earliest candidate.
    pub fn best_among<'a>(&self, state: &StateKey, candidates: &'a [Action]) -> Option<&'a Action> {
        first_max(
            candidates
                .iter()
                .map(|action| (action, self.value(state, action))),
        )
        .map(|(action, _)| action)
    }

    /// Apply one Q-learning update and return the new value.
    pub fn update(
        &mut self,
        state: &StateKey,
        action: &Action,
        reward: f64,
        next_state: &StateKey,
        learning_rate: f64,
        discount_factor: f64,
    ) -> f64 {
        let max_next = self.max_value(next_state);
        let entry = self
            .states
            .entry(state.clone())
            .or_default()
            .entry(action.clone())
            .or_insert(0.0);
        let current = *entry;
        let updated = learning_rate.mul_add(
            discount_factor.mul_add(max_next, reward) - current,
            current,
        );
        *entry = updated;
        updated
    }

    /// Add `delta` to an existing value. Returns `false` and leaves the
    /// table untouched when the state or action has no entry.
    pub fn adjust(&mut self, state: &StateKey, action: &Action, delta: f64) -> bool {
        match self
            .states
            .get_mut(state)
            .and_then(|values| values.get_mut(action))
        {
            Some(value) => {
                *value += delta;
                true
            }
            None => false,
        }
    }

    /// Add `delta` to every stored action accepted by `select`, across all
    /// states. Returns how many values changed.
    pub fn adjust_where<F>(&mut self, mut select: F, delta: f64) -> usize
    where
        F: FnMut(&StateKey, &Action) -> bool,
    {
        let mut changed: usize = 0;
        for (state, values) in &mut self.states {
            for (action, value) in values.iter_mut() {
                if select(state, action) {
                    *value += delta;
                    changed = changed.saturating_add(1);
                }
            }
        }
        changed
    }

    /// Drop weak actions from every state. Returns the number removed.
    ///
    /// An action survives when its value is at least `ratio` times the
    /// state's best value or strictly above `floor`. If nothing in a state
    /// qualifies, its best action is kept.
    pub fn prune(&mut self, ratio: f64, floor: f64) -> usize {
        let mut removed: usize = 0;
        for values in self.states.values_mut() {
            let Some((best_action, best)) =
                first_max(values.iter().map(|(action, value)| (action, *value)))
                    .map(|(action, value)| (action.clone(), value))
            else {
                continue;
            };
            let threshold = ratio * best;
            let before = values.len();
            values.retain(|_, value| *value >= threshold || *value > floor);
            if values.is_empty() {
                values.insert(best_action, best);
            }
            removed = removed.saturating_add(before.saturating_sub(values.len()));
        }
        removed
    }
}

/// The first entry holding the greatest value.
fn first_max<'a, I>(items: I) -> Option<(&'a Action, f64)>
where
    I: Iterator<Item = (&'a Action, f64)>,
{
    let mut best: Option<(&Action, f64)> = None;
    for (action, value) in items {
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((action, value)),
        }
    }
    best
}

/// JSON-safe encoding of the nested map as
/// `[[state, [[action, value], ...]], ...]`.
mod entries {
    use std::collections::BTreeMap;

    use evasion_types::{Action, StateKey};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ActionValues;

    pub fn serialize<S>(
        states: &BTreeMap<StateKey, ActionValues>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(
            states
                .iter()
                .map(|(state, values)| (state, values.iter().collect::<Vec<_>>())),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<StateKey, ActionValues>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows = Vec::<(StateKey, Vec<(Action, f64)>)>::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|(state, values)| (state, values.into_iter().collect()))
            .collect())
    }
}
