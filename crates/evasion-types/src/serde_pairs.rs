//! Serialize ordered maps with structured keys as `[key, value]` pairs.
//!
//! JSON objects only accept string keys. Maps keyed by [`StateKey`] or
//! [`Action`] are written as a sequence of pairs instead, which keeps the
//! typed key intact on the way back in. Use with
//! `#[serde(with = "evasion_types::serde_pairs")]`.
//!
//! [`StateKey`]: crate::StateKey
//! [`Action`]: crate::Action

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Write the map as a sequence of `(key, value)` tuples in key order.
///
/// # Errors
///
/// Propagates any error from the underlying serializer.
pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    serializer.collect_seq(map.iter())
}

/// Read a sequence of `(key, value)` tuples back into a map.
///
/// Later duplicates overwrite earlier ones.
///
/// # Errors
///
/// Propagates any error from the underlying deserializer.
pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    K: Deserialize<'de> + Ord,
    V: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::{Action, Location, Position};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "crate::serde_pairs")]
        values: BTreeMap<Action, f64>,
    }

    #[test]
    fn structured_keys_survive_json() {
        let mut values = BTreeMap::new();
        values.insert(Action::MoveTo(Location::Cell(Position::new(1, 2))), 0.5);
        values.insert(Action::CreateDecoy, -1.0);
        let wrapper = Wrapper { values };

        let json = serde_json::to_string(&wrapper).unwrap_or_default();
        assert!(json.starts_with("{\"values\":[["));
        let back: Option<Wrapper> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(wrapper));
    }
}
