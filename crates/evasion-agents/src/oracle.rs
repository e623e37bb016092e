//! Declarative rule sources and the typed oracle the agent queries.
//!
//! A [`RuleSource`] answers a [`Goal`] with zero or more [`Bindings`], each
//! mapping a variable name to a [`Term`]. An empty answer means "no answer".
//! Two backends ship with the crate:
//!
//! - [`HeuristicRuleSource`] knows only the fixed city layout. It is always
//!   available and never fails.
//! - [`KnowledgeBase`] is an in-process fact store. It tracks cameras,
//!   sensors, decoy signals and the agent's position, and evaluates the
//!   coverage, risk, decoy and suggestion rules over them.
//!
//! [`RuleOracle`] wraps any source behind typed accessors. Every accessor
//! has a heuristic fallback, so no caller depends on the source answering.
//!
//! # Variables
//!
//! | Goal                 | Variables bound                 |
//! |----------------------|---------------------------------|
//! | `Location`           | `X`                             |
//! | `Connected(loc)`     | `X`                             |
//! | `ExitPoint`          | `X`                             |
//! | `CanCreateDecoy(loc)`| none (one empty binding = yes)  |
//! | `CameraCoverage(loc)`| `Camera`                        |
//! | `RiskLevel(loc)`     | `Risk`                          |
//! | `DecoyEffectiveness` | `Location`, `Effectiveness`     |
//! | `SuggestAction(s)`   | `Action`, `Confidence`          |

use std::collections::BTreeMap;

use evasion_types::{Action, DetectionStatus, Location, StateKey};
use evasion_world::CityGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Query vocabulary
// ---------------------------------------------------------------------------

/// A value bound to a query variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// A symbolic constant such as a location name.
    Atom(String),
    /// A numeric constant.
    Number(f64),
}

impl Term {
    /// Build an atom.
    pub fn atom(value: impl Into<String>) -> Self {
        Self::Atom(value.into())
    }

    /// The atom's text, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(value) => Some(value),
            Self::Number(_) => None,
        }
    }

    /// The number, if this is a number.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Atom(_) => None,
        }
    }
}

/// One solution to a goal: variable name to bound term.
pub type Bindings = BTreeMap<String, Term>;

/// A declarative question about the city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
    /// Every known location.
    Location,
    /// Locations joined to the given one by a road.
    Connected(String),
    /// Locations that leave the city.
    ExitPoint,
    /// Whether the agent can broadcast a decoy from the location.
    CanCreateDecoy(String),
    /// Cameras whose coverage includes the location.
    CameraCoverage(String),
    /// Risk classification of the location.
    RiskLevel(String),
    /// Effectiveness of every known decoy signal.
    DecoyEffectiveness,
    /// A recommended action for the state, with a confidence score.
    SuggestAction(StateKey),
}

impl core::fmt::Display for Goal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Location => f.write_str("location(X)"),
            Self::Connected(loc) => write!(f, "connected({loc}, X)"),
            Self::ExitPoint => f.write_str("exit_point(X)"),
            Self::CanCreateDecoy(loc) => write!(f, "can_create_decoy({loc})"),
            Self::CameraCoverage(loc) => write!(f, "camera_coverage(Camera, {loc})"),
            Self::RiskLevel(loc) => write!(f, "risk_level({loc}, Risk)"),
            Self::DecoyEffectiveness => {
                f.write_str("evaluate_decoy_effectiveness(Location, Effectiveness)")
            }
            Self::SuggestAction(state) => write!(f, "suggest_action({state}, Action, Confidence)"),
        }
    }
}

/// A fact asserted into, or retracted from, a rule source.
#[derive(Debug, Clone, PartialEq)]
pub enum Fact {
    /// A camera watches `location` out to `range` road hops.
    Camera {
        /// Camera id; re-using an id replaces the earlier camera.
        id: u32,
        /// Where the camera is mounted.
        location: String,
        /// Coverage radius in road hops.
        range: u32,
    },
    /// Retract the camera with this id.
    RemoveCamera(u32),
    /// A fixed sensor of some `kind` sits at `location`.
    Sensor {
        /// Sensor id; re-using an id replaces the earlier sensor.
        id: u32,
        /// Where the sensor sits.
        location: String,
        /// Free-form sensor type, e.g. `motion`.
        kind: String,
    },
    /// A decoy signal of `strength` is live at `location`.
    Decoy {
        /// Where the signal appears.
        location: String,
        /// Signal strength.
        strength: f64,
    },
    /// Retract the decoy signal at this location.
    RemoveDecoy(String),
    /// The agent now stands at this location.
    AgentAt(String),
    /// The agent's detection status changed.
    AgentStatus(DetectionStatus),
}

impl core::fmt::Display for Fact {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Camera {
                id,
                location,
                range,
            } => write!(f, "camera({id}, {location}, {range})"),
            Self::RemoveCamera(id) => write!(f, "retract(camera({id}, _, _))"),
            Self::Sensor { id, location, kind } => write!(f, "sensor({id}, {location}, {kind})"),
            Self::Decoy { location, strength } => write!(f, "decoy_signal({location}, {strength})"),
            Self::RemoveDecoy(location) => write!(f, "retract(decoy_signal({location}, _))"),
            Self::AgentAt(location) => write!(f, "ai_position({location})"),
            Self::AgentStatus(status) => write!(f, "ai_status({status})"),
        }
    }
}

/// Errors reported by a rule source.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The backing engine could not be reached.
    #[error("rule source unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The source does not know how to answer this goal.
    #[error("rule source cannot answer {goal}")]
    Unsupported {
        /// The goal, rendered as a query.
        goal: String,
    },

    /// An answer arrived but lacked the expected variables.
    #[error("malformed answer to {goal}: {reason}")]
    Malformed {
        /// The goal, rendered as a query.
        goal: String,
        /// What was wrong with the bindings.
        reason: String,
    },
}

/// A source of answers to declarative questions.
pub trait RuleSource: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Answer `goal` with every solution found.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] when the source cannot produce an answer at
    /// all. An empty vector is a valid "no solutions" answer.
    fn query(&self, goal: &Goal) -> Result<Vec<Bindings>, OracleError>;

    /// Assert or retract `fact`. Sources without mutable state reject every
    /// fact.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Unsupported`] by default.
    fn tell(&mut self, fact: &Fact) -> Result<(), OracleError> {
        Err(OracleError::Unsupported {
            goal: fact.to_string(),
        })
    }
}

/// Coarse risk classification of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Neither camera nor sensor covers the location.
    Low,
    /// Either a camera or a sensor covers the location.
    Medium,
    /// Both a camera and a sensor cover the location.
    High,
}

impl RiskLevel {
    /// Parse the atom a rule source binds to `Risk`.
    pub fn from_atom(atom: &str) -> Option<Self> {
        match atom {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// The atom used in bindings.
    pub const fn as_atom(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Numeric weight for summing risk along a route.
    pub const fn weight(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// An action recommended by a rule source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The recommended action.
    pub action: Action,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Heuristic backend
// ---------------------------------------------------------------------------

/// Rule source that knows only the city layout.
///
/// Cameras, sensors and decoys are unknown to it, so every location is a
/// low-risk blind spot, nothing is covered, and no suggestion is offered.
#[derive(Debug, Clone)]
pub struct HeuristicRuleSource {
    city: CityGraph,
}

impl HeuristicRuleSource {
    /// Create a heuristic source over `city`.
    pub const fn new(city: CityGraph) -> Self {
        Self { city }
    }

    /// The city this source answers about.
    pub const fn city(&self) -> &CityGraph {
        &self.city
    }
}

impl Default for HeuristicRuleSource {
    fn default() -> Self {
        Self::new(CityGraph::standard())
    }
}

impl RuleSource for HeuristicRuleSource {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn query(&self, goal: &Goal) -> Result<Vec<Bindings>, OracleError> {
        Ok(match goal {
            Goal::Location => atoms("X", self.city.locations()),
            Goal::Connected(loc) => atoms("X", self.city.neighbors(loc)),
            Goal::ExitPoint => atoms("X", self.city.exits()),
            Goal::CanCreateDecoy(loc) => yes_if(self.city.has_power_source(loc)),
            Goal::RiskLevel(loc) if self.city.contains(loc) => {
                vec![single("Risk", Term::atom(RiskLevel::Low.as_atom()))]
            }
            Goal::CameraCoverage(_)
            | Goal::RiskLevel(_)
            | Goal::DecoyEffectiveness
            | Goal::SuggestAction(_) => Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Knowledge base backend
// ---------------------------------------------------------------------------

/// A camera as the knowledge base sees it: a location and a road-hop range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownCamera {
    /// Location the camera watches from.
    pub location: String,
    /// Number of road hops the camera covers.
    pub range: u32,
}

/// A fixed sensor at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownSensor {
    /// Location of the sensor.
    pub location: String,
    /// Free-form sensor type, e.g. `motion`.
    pub kind: String,
}

/// In-process fact store evaluating the city surveillance rules.
///
/// Facts: the city graph, cameras (id, location, range), sensors, decoy
/// signals (location, strength) and the agent's position and status.
///
/// Rules:
///
/// - a camera covers every location within `range` road hops of it;
/// - a location with no coverage is a blind spot;
/// - risk is `high` with camera and sensor, `medium` with either, `low`
///   otherwise;
/// - the agent can create a decoy only at its own position, and only where
///   a power source exists;
/// - a decoy's effectiveness is its strength times the number of cameras
///   covering its location.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    city: CityGraph,
    cameras: BTreeMap<u32, KnownCamera>,
    sensors: BTreeMap<u32, KnownSensor>,
    decoys: BTreeMap<String, f64>,
    agent_position: String,
    agent_status: DetectionStatus,
}

impl KnowledgeBase {
    /// Create a knowledge base over `city` with the agent at `start`.
    pub fn new(city: CityGraph, start: impl Into<String>) -> Self {
        Self {
            city,
            cameras: BTreeMap::new(),
            sensors: BTreeMap::new(),
            decoys: BTreeMap::new(),
            agent_position: start.into(),
            agent_status: DetectionStatus::Undetected,
        }
    }

    /// The standard city with the agent at `city_center`.
    pub fn standard() -> Self {
        Self::new(CityGraph::standard(), "city_center")
    }

    /// The city graph.
    pub const fn city(&self) -> &CityGraph {
        &self.city
    }

    /// Record a camera. Re-using an id replaces the earlier camera.
    pub fn add_camera(&mut self, id: u32, location: impl Into<String>, range: u32) {
        let location = location.into();
        debug!(camera = id, %location, range, "Knowledge base camera asserted");
        self.cameras.insert(id, KnownCamera { location, range });
    }

    /// Forget a camera.
    pub fn remove_camera(&mut self, id: u32) -> Option<KnownCamera> {
        self.cameras.remove(&id)
    }

    /// All known cameras by id.
    pub const fn cameras(&self) -> &BTreeMap<u32, KnownCamera> {
        &self.cameras
    }

    /// Record a sensor. Re-using an id replaces the earlier sensor.
    pub fn add_sensor(&mut self, id: u32, location: impl Into<String>, kind: impl Into<String>) {
        let sensor = KnownSensor {
            location: location.into(),
            kind: kind.into(),
        };
        debug!(sensor = id, location = %sensor.location, kind = %sensor.kind, "Knowledge base sensor asserted");
        self.sensors.insert(id, sensor);
    }

    /// Record a decoy signal. A newer signal at the same location replaces
    /// the older one.
    pub fn add_decoy(&mut self, location: impl Into<String>, strength: f64) {
        self.decoys.insert(location.into(), strength);
    }

    /// Forget the decoy signal at `location`.
    pub fn remove_decoy(&mut self, location: &str) -> bool {
        self.decoys.remove(location).is_some()
    }

    /// Move the agent.
    pub fn set_agent_position(&mut self, location: impl Into<String>) {
        self.agent_position = location.into();
    }

    /// The agent's position.
    pub fn agent_position(&self) -> &str {
        &self.agent_position
    }

    /// Record whether the agent is currently detected.
    pub const fn set_agent_status(&mut self, status: DetectionStatus) {
        self.agent_status = status;
    }

    /// The agent's current learning state.
    pub fn agent_state(&self) -> StateKey {
        StateKey::new(Location::named(&self.agent_position), self.agent_status)
    }

    /// Ids of the cameras covering `location`.
    pub fn camera_coverage(&self, location: &str) -> Vec<u32> {
        self.cameras
            .iter()
            .filter(|(_, cam)| self.city.within_hops(&cam.location, cam.range).contains(location))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether no camera covers `location`.
    pub fn is_blind_spot(&self, location: &str) -> bool {
        self.city.contains(location) && self.camera_coverage(location).is_empty()
    }

    /// Risk classification of `location`.
    pub fn risk_level(&self, location: &str) -> RiskLevel {
        let covered = !self.camera_coverage(location).is_empty();
        let sensed = self.sensors.values().any(|s| s.location == location);
        match (covered, sensed) {
            (true, true) => RiskLevel::High,
            (true, false) | (false, true) => RiskLevel::Medium,
            (false, false) => RiskLevel::Low,
        }
    }

    /// Whether the agent can broadcast a decoy from `location`.
    pub fn can_create_decoy(&self, location: &str) -> bool {
        self.agent_position == location && self.city.has_power_source(location)
    }

    /// Every decoy signal with its effectiveness, strongest first.
    pub fn decoy_effectiveness(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .decoys
            .iter()
            .map(|(location, strength)| {
                let covering = u32::try_from(self.camera_coverage(location).len()).unwrap_or(u32::MAX);
                (location.clone(), strength * f64::from(covering))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Recommend an action for `state`.
    ///
    /// A detected agent standing on a power source is told to create a
    /// decoy. Otherwise the safest neighbour is recommended, preferring
    /// blind spots among equally risky neighbours, then exits and locations
    /// closer to an exit; confidence falls with the neighbour's risk.
    pub fn suggest_action(&self, state: &StateKey) -> Option<Suggestion> {
        let here = state.location.as_name()?;
        if state.status == DetectionStatus::Detected && self.city.has_power_source(here) {
            return Some(Suggestion {
                action: Action::CreateDecoy,
                confidence: 0.9,
            });
        }
        let exits: Vec<&str> = self.city.exits().collect();
        let best = self
            .city
            .neighbors(here)
            .into_iter()
            .map(|next| {
                let to_exit = exits
                    .iter()
                    .filter_map(|exit| self.city.hop_distance(next, exit))
                    .min()
                    .unwrap_or(u32::MAX);
                (self.risk_level(next), !self.is_blind_spot(next), to_exit, next)
            })
            .min()?;
        let (risk, _, to_exit, next) = best;
        let confidence = match (risk, to_exit) {
            (RiskLevel::Low, 0) => 0.95,
            (RiskLevel::Low, _) => 0.85,
            (RiskLevel::Medium, _) => 0.6,
            (RiskLevel::High, _) => 0.3,
        };
        Some(Suggestion {
            action: Action::move_to(Location::named(next)),
            confidence,
        })
    }
}

impl RuleSource for KnowledgeBase {
    fn name(&self) -> &'static str {
        "knowledge_base"
    }

    fn tell(&mut self, fact: &Fact) -> Result<(), OracleError> {
        match fact {
            Fact::Camera {
                id,
                location,
                range,
            } => self.add_camera(*id, location.clone(), *range),
            Fact::RemoveCamera(id) => {
                self.remove_camera(*id);
            }
            Fact::Sensor { id, location, kind } => self.add_sensor(*id, location.clone(), kind.clone()),
            Fact::Decoy { location, strength } => self.add_decoy(location.clone(), *strength),
            Fact::RemoveDecoy(location) => {
                self.remove_decoy(location);
            }
            Fact::AgentAt(location) => self.set_agent_position(location.clone()),
            Fact::AgentStatus(status) => self.set_agent_status(*status),
        }
        Ok(())
    }

    fn query(&self, goal: &Goal) -> Result<Vec<Bindings>, OracleError> {
        Ok(match goal {
            Goal::Location => atoms("X", self.city.locations()),
            Goal::Connected(loc) => atoms("X", self.city.neighbors(loc)),
            Goal::ExitPoint => atoms("X", self.city.exits()),
            Goal::CanCreateDecoy(loc) => yes_if(self.can_create_decoy(loc)),
            Goal::CameraCoverage(loc) => self
                .camera_coverage(loc)
                .into_iter()
                .map(|id| single("Camera", Term::Number(f64::from(id))))
                .collect(),
            Goal::RiskLevel(loc) => {
                if self.city.contains(loc) {
                    vec![single("Risk", Term::atom(self.risk_level(loc).as_atom()))]
                } else {
                    Vec::new()
                }
            }
            Goal::DecoyEffectiveness => self
                .decoy_effectiveness()
                .into_iter()
                .map(|(location, effectiveness)| {
                    let mut bindings = single("Location", Term::Atom(location));
                    bindings.insert("Effectiveness".to_owned(), Term::Number(effectiveness));
                    bindings
                })
                .collect(),
            Goal::SuggestAction(state) => self
                .suggest_action(state)
                .map(|suggestion| {
                    let mut bindings = single("Action", Term::Atom(suggestion.action.to_string()));
                    bindings.insert("Confidence".to_owned(), Term::Number(suggestion.confidence));
                    vec![bindings]
                })
                .unwrap_or_default(),
        })
    }
}

fn single(variable: &str, term: Term) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert(variable.to_owned(), term);
    bindings
}

fn atoms<'a, I>(variable: &str, values: I) -> Vec<Bindings>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(|value| single(variable, Term::atom(value)))
        .collect()
}

fn yes_if(holds: bool) -> Vec<Bindings> {
    if holds { vec![Bindings::new()] } else { Vec::new() }
}

// ---------------------------------------------------------------------------
// Typed oracle
// ---------------------------------------------------------------------------

/// Typed access to a rule source with a heuristic fallback for every query.
pub struct RuleOracle {
    source: Box<dyn RuleSource>,
    fallback: HeuristicRuleSource,
}

impl core::fmt::Debug for RuleOracle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RuleOracle")
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

impl Default for RuleOracle {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl RuleOracle {
    /// Wrap `source`, falling back to the standard city heuristics.
    pub fn new(source: Box<dyn RuleSource>) -> Self {
        Self {
            source,
            fallback: HeuristicRuleSource::default(),
        }
    }

    /// Wrap `source` with an explicit fallback.
    pub fn with_fallback(source: Box<dyn RuleSource>, fallback: HeuristicRuleSource) -> Self {
        Self { source, fallback }
    }

    /// An oracle backed only by the heuristic source.
    pub fn heuristic() -> Self {
        Self::new(Box::new(HeuristicRuleSource::default()))
    }

    /// Name of the primary source.
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// The city the fallback reasons about.
    pub const fn fallback_city(&self) -> &CityGraph {
        self.fallback.city()
    }

    /// Query the primary source, logging and swallowing failures.
    fn ask(&self, goal: &Goal) -> Option<Vec<Bindings>> {
        match self.source.query(goal) {
            Ok(answers) => Some(answers),
            Err(err) => {
                warn!(source = self.source.name(), %goal, error = %err, "Rule source failed, using fallback");
                None
            }
        }
    }

    /// Assert or retract a fact in the primary source. Returns whether the
    /// source accepted it; rejections are logged and otherwise ignored.
    pub fn tell(&mut self, fact: &Fact) -> bool {
        match self.source.tell(fact) {
            Ok(()) => true,
            Err(err) => {
                warn!(source = self.source.name(), %fact, error = %err, "Rule source rejected fact");
                false
            }
        }
    }

    /// Atoms bound to `variable`, from the source or else the fallback.
    /// An empty or malformed answer counts as no answer.
    fn atoms_or_fallback(&self, goal: &Goal, variable: &str) -> Vec<String> {
        let primary = self
            .ask(goal)
            .map(|answers| collect_atoms(&answers, variable))
            .filter(|values| !values.is_empty());
        primary.unwrap_or_else(|| {
            self.fallback
                .query(goal)
                .map(|answers| collect_atoms(&answers, variable))
                .unwrap_or_default()
        })
    }

    /// Every known location.
    pub fn locations(&self) -> Vec<String> {
        self.atoms_or_fallback(&Goal::Location, "X")
    }

    /// Locations connected to `location`.
    pub fn connected(&self, location: &str) -> Vec<String> {
        self.atoms_or_fallback(&Goal::Connected(location.to_owned()), "X")
    }

    /// Exit locations.
    pub fn exits(&self) -> Vec<String> {
        self.atoms_or_fallback(&Goal::ExitPoint, "X")
    }

    /// Whether a decoy can be created at `location`.
    ///
    /// An empty answer is a definite "no"; only a failing source defers to
    /// the fallback.
    pub fn can_create_decoy(&self, location: &str) -> bool {
        let goal = Goal::CanCreateDecoy(location.to_owned());
        self.ask(&goal).map_or_else(
            || self.fallback.query(&goal).is_ok_and(|answers| !answers.is_empty()),
            |answers| !answers.is_empty(),
        )
    }

    /// Ids of cameras covering `location`.
    pub fn covering_cameras(&self, location: &str) -> Vec<u32> {
        let goal = Goal::CameraCoverage(location.to_owned());
        self.ask(&goal)
            .map(|answers| {
                answers
                    .iter()
                    .filter_map(|b| b.get("Camera").and_then(Term::as_number))
                    .filter_map(whole_u32)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any camera covers `location`.
    pub fn is_covered(&self, location: &str) -> bool {
        !self.covering_cameras(location).is_empty()
    }

    /// Risk classification of `location`; `low` when unanswered.
    pub fn risk_level(&self, location: &str) -> RiskLevel {
        let goal = Goal::RiskLevel(location.to_owned());
        self.ask(&goal)
            .and_then(|answers| {
                answers
                    .iter()
                    .filter_map(|b| b.get("Risk").and_then(Term::as_atom))
                    .filter_map(RiskLevel::from_atom)
                    .max()
            })
            .unwrap_or(RiskLevel::Low)
    }

    /// Sum of risk weights along `route`.
    pub fn route_risk<S: AsRef<str>>(&self, route: &[S]) -> u32 {
        route
            .iter()
            .map(|loc| self.risk_level(loc.as_ref()).weight())
            .fold(0_u32, u32::saturating_add)
    }

    /// Decoy locations ranked by effectiveness, strongest first.
    pub fn decoy_rankings(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .ask(&Goal::DecoyEffectiveness)
            .map(|answers| {
                answers
                    .iter()
                    .filter_map(|b| {
                        let location = b.get("Location").and_then(Term::as_atom)?;
                        let score = b.get("Effectiveness").and_then(Term::as_number)?;
                        Some((location.to_owned(), score))
                    })
                    .collect()
            })
            .unwrap_or_default();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// A suggested action for `state`, if the source offers a well-formed
    /// one.
    pub fn suggestion(&self, state: &StateKey) -> Option<Suggestion> {
        let answers = self.ask(&Goal::SuggestAction(state.clone()))?;
        let first = answers.first()?;
        let action = first.get("Action").and_then(Term::as_atom)?;
        let confidence = first.get("Confidence").and_then(Term::as_number)?;
        if !(0.0..=1.0).contains(&confidence) {
            debug!(confidence, "Discarding suggestion with out-of-range confidence");
            return None;
        }
        let action = if action == "create_decoy" {
            Action::CreateDecoy
        } else {
            Action::move_to(Location::named(action))
        };
        Some(Suggestion { action, confidence })
    }
}

/// A bound number as a camera id, when it is a whole number in range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_u32(value: f64) -> Option<u32> {
    let in_range = (0.0..=f64::from(u32::MAX)).contains(&value);
    (in_range && value.fract().abs() < f64::EPSILON).then(|| value as u32)
}

fn collect_atoms(answers: &[Bindings], variable: &str) -> Vec<String> {
    answers
        .iter()
        .filter_map(|b| b.get(variable).and_then(Term::as_atom))
        .map(str::to_owned)
        .collect()
}
