//! Where the agent can go from a given location.
//!
//! The learning agent is topology-agnostic. An [`ActionSpace`] tells it
//! which locations neighbour the current one, whether a decoy can be
//! broadcast there, and how far apart two locations are. Three spaces ship
//! with the crate:
//!
//! - [`GridSpace`] -- free 4-neighbours on a maze grid; no decoys.
//! - [`CitySpace`] -- roads of a [`CityGraph`]; decoys at power sources.
//! - [`OracleSpace`] -- whatever a [`RuleOracle`] answers, with the
//!   oracle's own city fallback.

use std::collections::{BTreeSet, VecDeque};

use evasion_types::{Action, Location};
use evasion_world::{CityGraph, Grid};

use crate::oracle::RuleOracle;

/// Neighbourhood and distance queries the agent needs from its world.
pub trait ActionSpace {
    /// Locations reachable in one step from `location`.
    fn neighbors(&self, location: &Location) -> Vec<Location>;

    /// Whether a decoy can be broadcast from `location`.
    fn can_create_decoy(&self, _location: &Location) -> bool {
        false
    }

    /// Every location of the space.
    fn locations(&self) -> Vec<Location>;

    /// Fewest steps between two locations, `None` when unreachable.
    fn distance(&self, from: &Location, to: &Location) -> Option<usize> {
        if from == to {
            return Some(0);
        }
        let mut seen = BTreeSet::from([from.clone()]);
        let mut queue = VecDeque::from([(from.clone(), 0_usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            let depth = depth.saturating_add(1);
            for next in self.neighbors(&current) {
                if &next == to {
                    return Some(depth);
                }
                if seen.insert(next.clone()) {
                    queue.push_back((next, depth));
                }
            }
        }
        None
    }

    /// Candidate actions at `location`: a move per neighbour, then a decoy
    /// where one is possible.
    fn actions(&self, location: &Location) -> Vec<Action> {
        let mut actions: Vec<Action> = self
            .neighbors(location)
            .into_iter()
            .map(Action::MoveTo)
            .collect();
        if self.can_create_decoy(location) {
            actions.push(Action::CreateDecoy);
        }
        actions
    }

    /// Whether `a` and `b` are one step apart.
    fn adjacent(&self, a: &Location, b: &Location) -> bool {
        self.neighbors(a).contains(b)
    }
}

/// Moves between free grid cells.
#[derive(Debug, Clone, Copy)]
pub struct GridSpace<'a> {
    grid: &'a Grid,
}

impl<'a> GridSpace<'a> {
    /// Wrap a grid.
    pub const fn new(grid: &'a Grid) -> Self {
        Self { grid }
    }
}

impl ActionSpace for GridSpace<'_> {
    fn neighbors(&self, location: &Location) -> Vec<Location> {
        location
            .as_cell()
            .map(|pos| self.grid.free_neighbors(pos).map(Location::Cell).collect())
            .unwrap_or_default()
    }

    fn locations(&self) -> Vec<Location> {
        self.grid.free_cells().into_iter().map(Location::Cell).collect()
    }

    // Manhattan distance; walls are ignored.
    fn distance(&self, from: &Location, to: &Location) -> Option<usize> {
        from.proximity(to)
    }
}

/// Moves along city roads.
#[derive(Debug, Clone, Copy)]
pub struct CitySpace<'a> {
    city: &'a CityGraph,
}

impl<'a> CitySpace<'a> {
    /// Wrap a city graph.
    pub const fn new(city: &'a CityGraph) -> Self {
        Self { city }
    }
}

impl ActionSpace for CitySpace<'_> {
    fn neighbors(&self, location: &Location) -> Vec<Location> {
        location
            .as_name()
            .map(|name| self.city.neighbors(name).into_iter().map(Location::named).collect())
            .unwrap_or_default()
    }

    fn can_create_decoy(&self, location: &Location) -> bool {
        location.as_name().is_some_and(|name| self.city.has_power_source(name))
    }

    fn locations(&self) -> Vec<Location> {
        self.city.locations().map(Location::named).collect()
    }

    fn distance(&self, from: &Location, to: &Location) -> Option<usize> {
        let hops = self.city.hop_distance(from.as_name()?, to.as_name()?)?;
        usize::try_from(hops).ok()
    }
}

/// Moves as answered by a rule oracle.
#[derive(Debug, Clone, Copy)]
pub struct OracleSpace<'a> {
    oracle: &'a RuleOracle,
}

impl<'a> OracleSpace<'a> {
    /// Wrap an oracle.
    pub const fn new(oracle: &'a RuleOracle) -> Self {
        Self { oracle }
    }
}

impl ActionSpace for OracleSpace<'_> {
    fn neighbors(&self, location: &Location) -> Vec<Location> {
        location
            .as_name()
            .map(|name| self.oracle.connected(name).into_iter().map(Location::Named).collect())
            .unwrap_or_default()
    }

    fn can_create_decoy(&self, location: &Location) -> bool {
        location.as_name().is_some_and(|name| self.oracle.can_create_decoy(name))
    }

    fn locations(&self) -> Vec<Location> {
        self.oracle.locations().into_iter().map(Location::Named).collect()
    }
}
