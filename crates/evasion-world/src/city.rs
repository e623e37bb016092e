//! Symbolic city map for the turn-based game.
//!
//! Locations are named nodes joined by undirected roads. Some locations are
//! exits out of the city, some carry a power source from which the agent can
//! broadcast a decoy signal.
//!
//! [`CityGraph::standard`] builds the default eight-district city:
//!
//! ```text
//! city_center ── industrial_zone ── highway_entrance ── port
//!     │  └──────── train_station ─────────────────────────┘
//! residential_area ── shopping_mall ── park ── highway_entrance
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// An undirected graph of named city locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityGraph {
    /// Adjacency sets keyed by location name.
    roads: BTreeMap<String, BTreeSet<String>>,
    /// Locations that end the game when reached.
    exits: BTreeSet<String>,
    /// Locations where a decoy can be created.
    power_sources: BTreeSet<String>,
}

impl CityGraph {
    /// Create an empty city.
    pub const fn new() -> Self {
        Self {
            roads: BTreeMap::new(),
            exits: BTreeSet::new(),
            power_sources: BTreeSet::new(),
        }
    }

    /// The default city: 8 districts, 9 roads, 3 exits, 3 power sources.
    pub fn standard() -> Self {
        let mut city = Self::new();
        for name in [
            "city_center",
            "industrial_zone",
            "residential_area",
            "shopping_mall",
            "park",
            "highway_entrance",
            "port",
            "train_station",
        ] {
            city.add_location(name);
        }
        for (a, b) in [
            ("city_center", "industrial_zone"),
            ("city_center", "residential_area"),
            ("industrial_zone", "highway_entrance"),
            ("residential_area", "shopping_mall"),
            ("shopping_mall", "park"),
            ("park", "highway_entrance"),
            ("highway_entrance", "port"),
            ("city_center", "train_station"),
            ("train_station", "port"),
        ] {
            // Both endpoints were just added.
            let _ = city.add_road(a, b);
        }
        for exit in ["highway_entrance", "port", "train_station"] {
            city.exits.insert(exit.to_owned());
        }
        for source in ["industrial_zone", "shopping_mall", "train_station"] {
            city.power_sources.insert(source.to_owned());
        }
        city
    }

    /// Add a location with no roads. Existing locations are kept.
    pub fn add_location(&mut self, name: &str) {
        self.roads.entry(name.to_owned()).or_default();
    }

    /// Join two existing locations with a road.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownLocation`] naming the missing location.
    pub fn add_road(&mut self, a: &str, b: &str) -> Result<(), WorldError> {
        for name in [a, b] {
            if !self.roads.contains_key(name) {
                return Err(WorldError::UnknownLocation(name.to_owned()));
            }
        }
        self.roads.entry(a.to_owned()).or_default().insert(b.to_owned());
        self.roads.entry(b.to_owned()).or_default().insert(a.to_owned());
        Ok(())
    }

    /// Mark a location as an exit.
    pub fn add_exit(&mut self, name: &str) {
        self.add_location(name);
        self.exits.insert(name.to_owned());
    }

    /// Mark a location as having a power source.
    pub fn add_power_source(&mut self, name: &str) {
        self.add_location(name);
        self.power_sources.insert(name.to_owned());
    }

    /// All location names in sorted order.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.roads.keys().map(String::as_str)
    }

    /// Whether `name` is a known location.
    pub fn contains(&self, name: &str) -> bool {
        self.roads.contains_key(name)
    }

    /// Locations directly connected to `name`.
    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        self.roads
            .get(name)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether a road joins `a` and `b`.
    pub fn connected(&self, a: &str, b: &str) -> bool {
        self.roads.get(a).is_some_and(|set| set.contains(b))
    }

    /// Exit locations in sorted order.
    pub fn exits(&self) -> impl Iterator<Item = &str> {
        self.exits.iter().map(String::as_str)
    }

    /// Whether `name` is an exit.
    pub fn is_exit(&self, name: &str) -> bool {
        self.exits.contains(name)
    }

    /// Whether a decoy can be broadcast from `name`.
    pub fn has_power_source(&self, name: &str) -> bool {
        self.power_sources.contains(name)
    }

    /// Locations reachable from `origin` in at most `hops` road steps,
    /// including `origin` itself.
    pub fn within_hops(&self, origin: &str, hops: u32) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        if !self.contains(origin) {
            return reached;
        }
        let mut queue = VecDeque::new();
        reached.insert(origin.to_owned());
        queue.push_back((origin.to_owned(), 0_u32));
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= hops {
                continue;
            }
            for next in self.neighbors(&current) {
                if reached.insert(next.to_owned()) {
                    queue.push_back((next.to_owned(), depth.saturating_add(1)));
                }
            }
        }
        reached
    }

    /// Fewest road steps between two locations.
    pub fn hop_distance(&self, from: &str, to: &str) -> Option<u32> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(from.to_owned());
        queue.push_back((from.to_owned(), 0_u32));
        while let Some((current, depth)) = queue.pop_front() {
            if current == to {
                return Some(depth);
            }
            for next in self.neighbors(&current) {
                if seen.insert(next.to_owned()) {
                    queue.push_back((next.to_owned(), depth.saturating_add(1)));
                }
            }
        }
        None
    }
}
