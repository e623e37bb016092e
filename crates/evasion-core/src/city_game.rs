//! Turn-based game on the symbolic city graph.
//!
//! The adversary places and checks cameras at any time. The agent takes a
//! turn every [`GameConfig::turn_interval`] seconds of game time: it reads
//! the adversary's actions since its last turn, consults the rule oracle,
//! and either moves to a connected location or fabricates a decoy signal.
//!
//! Every change the game makes to the world is asserted into the rule
//! oracle as a [`Fact`], so coverage and decoy answers always reflect the
//! live board.
//!
//! # Scoring
//!
//! | Event                          | Agent          | Adversary          |
//! |--------------------------------|----------------|--------------------|
//! | decoy created                  | `decoy`        |                    |
//! | agent moves under a camera     |                | `detection`        |
//! | agent reaches an exit unseen   | `agent_win`    |                    |
//! | agent reaches an exit seen     |                | `adversary_win`    |

use evasion_agents::{
    ActionSpace, AdversaryProfile, DecoyBoard, DecoyPlan, DecoySignal, DecoyTiming, Fact,
    HeuristicRuleSource, KnowledgeBase, LearningAgent, OracleSpace, RuleOracle,
};
use evasion_types::{
    Action, AdversaryAction, AdversaryActionKind, CameraId, DetectionEvent, DetectionStatus,
    Location, StateKey,
};
use evasion_world::CityGraph;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{ClockError, TurnTimer};
use crate::config::GameConfig;

const START_LOCATION: &str = "city_center";

/// How a city game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    /// The agent reached an exit unseen.
    AgentWin,
    /// The agent reached an exit while a camera covered it.
    AdversaryWin,
}

/// Answer to a camera check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    /// The checked camera.
    pub camera: u32,
    /// Whether the camera currently covers the agent.
    pub agent_detected: bool,
    /// Live decoy signals inside the camera's coverage.
    pub decoys: Vec<DecoySignal>,
}

/// Something that happened while the game advanced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// The agent moved.
    Moved {
        /// Where it came from.
        from: String,
        /// Where it is now.
        to: String,
        /// Whether a camera covers the new location.
        detected: bool,
    },
    /// A camera covered the agent after a move.
    Detected(DetectionEvent),
    /// The agent predicted the adversary's next camera locations.
    Predicted(Vec<Location>),
    /// A decoy signal went live.
    DecoyCreated(DecoySignal),
    /// A decoy will fire after the adversary's next camera check.
    DecoyScheduled {
        /// Where it will appear.
        location: Location,
        /// Seconds after that check.
        delay: f64,
    },
    /// A decoy signal faded.
    DecoyExpired(DecoySignal),
    /// The game ended.
    Finished(GameResult),
}

/// A camera the adversary has placed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlacedCamera {
    id: u32,
    location: String,
    range: u32,
}

/// A fixed sensor the adversary has installed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlacedSensor {
    id: u32,
    location: String,
    kind: String,
}

/// A decoy waiting for the adversary to check a camera. Unarmed entries
/// are dropped once they are older than a decoy's lifetime.
#[derive(Debug, Clone, PartialEq)]
struct ScheduledDecoy {
    location: Location,
    delay: f64,
    scheduled_at: f64,
    fires_at: Option<f64>,
}

/// One city game between an adversary and a learning agent.
#[derive(Debug)]
pub struct CityGame {
    config: GameConfig,
    oracle: RuleOracle,
    decoys: DecoyBoard,
    scheduled: Vec<ScheduledDecoy>,
    cameras: Vec<PlacedCamera>,
    sensors: Vec<PlacedSensor>,
    timer: TurnTimer,
    game_time: f64,
    agent_location: String,
    route: Vec<String>,
    status: DetectionStatus,
    pending: Vec<AdversaryAction>,
    session: Vec<AdversaryAction>,
    agent_score: u32,
    adversary_score: u32,
    result: Option<GameResult>,
}

impl CityGame {
    /// A game on the standard city with the agent at `city_center`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] if the configured turn interval
    /// is not a positive number of seconds.
    pub fn new(config: GameConfig) -> Result<Self, ClockError> {
        Self::with_city(config, CityGraph::standard(), START_LOCATION)
    }

    /// A game on `city` with the agent at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] if the configured turn interval
    /// is not a positive number of seconds.
    pub fn with_city(
        config: GameConfig,
        city: CityGraph,
        start: impl Into<String>,
    ) -> Result<Self, ClockError> {
        let start = start.into();
        let timer = TurnTimer::new(config.turn_interval)?;
        let knowledge = KnowledgeBase::new(city.clone(), start.clone());
        let oracle = RuleOracle::with_fallback(Box::new(knowledge), HeuristicRuleSource::new(city));
        Ok(Self {
            decoys: DecoyBoard::new(config.decoys.clone()),
            config,
            oracle,
            scheduled: Vec::new(),
            cameras: Vec::new(),
            sensors: Vec::new(),
            timer,
            game_time: 0.0,
            route: vec![start.clone()],
            agent_location: start,
            status: DetectionStatus::Undetected,
            pending: Vec::new(),
            session: Vec::new(),
            agent_score: 0,
            adversary_score: 0,
            result: None,
        })
    }

    // -------------------------------------------------------------------
    // Adversary commands
    // -------------------------------------------------------------------

    /// Place a camera at `location`. `range` defaults to the configured
    /// camera range. Returns the new camera's id, or `None` for an unknown
    /// location or a finished game.
    pub fn place_camera(&mut self, location: &str, range: Option<u32>) -> Option<u32> {
        if self.result.is_some() || !self.oracle.locations().iter().any(|l| l == location) {
            debug!(location, "Rejected camera placement");
            return None;
        }
        let id = u32::try_from(self.cameras.len()).ok()?.checked_add(1)?;
        let range = range.unwrap_or(self.config.camera_range);
        self.oracle.tell(&Fact::Camera {
            id,
            location: location.to_owned(),
            range,
        });
        self.cameras.push(PlacedCamera {
            id,
            location: location.to_owned(),
            range,
        });
        self.log_action(AdversaryActionKind::PlaceCamera, location);
        info!(camera = id, location, range, "Camera placed");
        Some(id)
    }

    /// Install a sensor of `kind` at `location`. Sensors raise the risk the
    /// agent sees there but never detect it. Returns the new sensor's id,
    /// or `None` for an unknown location or a finished game.
    pub fn place_sensor(&mut self, location: &str, kind: &str) -> Option<u32> {
        if self.result.is_some() || !self.oracle.locations().iter().any(|l| l == location) {
            debug!(location, "Rejected sensor placement");
            return None;
        }
        let id = u32::try_from(self.sensors.len()).ok()?.checked_add(1)?;
        self.oracle.tell(&Fact::Sensor {
            id,
            location: location.to_owned(),
            kind: kind.to_owned(),
        });
        self.sensors.push(PlacedSensor {
            id,
            location: location.to_owned(),
            kind: kind.to_owned(),
        });
        self.log_action(AdversaryActionKind::PlaceSensor, location);
        info!(sensor = id, location, kind, "Sensor placed");
        Some(id)
    }

    /// Check camera `id`: does it see the agent, and which decoys fall
    /// inside its coverage? Arms every decoy waiting on a check.
    pub fn check_camera(&mut self, id: u32) -> Option<CheckReport> {
        let location = self.camera(id)?.location.clone();
        self.log_action(AdversaryActionKind::CheckCamera, &location);
        for decoy in self.scheduled.iter_mut().filter(|d| d.fires_at.is_none()) {
            decoy.fires_at = Some(self.game_time + decoy.delay);
        }
        let agent_detected = self.oracle.covering_cameras(&self.agent_location).contains(&id);
        let decoys = self
            .decoys
            .active()
            .iter()
            .filter(|signal| {
                signal
                    .location
                    .as_name()
                    .is_some_and(|name| self.oracle.covering_cameras(name).contains(&id))
            })
            .cloned()
            .collect();
        debug!(camera = id, agent_detected, "Camera checked");
        Some(CheckReport {
            camera: id,
            agent_detected,
            decoys,
        })
    }

    // -------------------------------------------------------------------
    // Game loop
    // -------------------------------------------------------------------

    /// Tune `agent` to the adversary before the first turn.
    pub fn begin(&self, agent: &mut LearningAgent, profile: &AdversaryProfile) {
        let state = self.state();
        agent.adapt_to_profile(profile, &state, &OracleSpace::new(&self.oracle));
    }

    /// Advance game time by `dt` seconds, expiring and firing decoys and
    /// letting `agent` take a turn when one is due.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] for a negative or non-finite
    /// `dt`; the game is left unchanged.
    pub fn advance(&mut self, dt: f64, agent: &mut LearningAgent) -> Result<Vec<GameEvent>, ClockError> {
        let turn_due = self.timer.tick(dt)?;
        self.game_time += dt;
        let mut events = Vec::new();

        for signal in self.decoys.expire(self.game_time) {
            if let Some(name) = signal.location.as_name() {
                self.oracle.tell(&Fact::RemoveDecoy(name.to_owned()));
            }
            debug!(id = signal.id, "Decoy expired");
            events.push(GameEvent::DecoyExpired(signal));
        }

        let now = self.game_time;
        let lifetime = self.config.decoys.duration;
        let before = self.scheduled.len();
        self.scheduled
            .retain(|d| d.fires_at.is_some() || now - d.scheduled_at < lifetime);
        let dropped = before.saturating_sub(self.scheduled.len());
        if dropped > 0 {
            debug!(dropped, "Scheduled decoys lapsed without a camera check");
        }

        let (due, waiting): (Vec<_>, Vec<_>) = self
            .scheduled
            .drain(..)
            .partition(|d| d.fires_at.is_some_and(|at| at <= now));
        self.scheduled = waiting;
        for decoy in due {
            self.fire_decoy(decoy.location, agent, &mut events);
        }

        if turn_due && self.result.is_none() {
            self.agent_turn(agent, &mut events);
        }
        Ok(events)
    }

    /// File the game into `profile`.
    pub fn finish(&self, profile: &mut AdversaryProfile) {
        match self.result {
            Some(GameResult::AgentWin) => profile.record_detection_failure(),
            Some(GameResult::AdversaryWin) => profile.record_detection_success(),
            None => {}
        }
        let escaped = self.result == Some(GameResult::AgentWin);
        profile.add_session(self.session.clone(), escaped);
        info!(
            adversary = %profile.adversary_id,
            result = ?self.result,
            agent_score = self.agent_score,
            adversary_score = self.adversary_score,
            "City game filed"
        );
    }

    fn agent_turn(&mut self, agent: &mut LearningAgent, events: &mut Vec<GameEvent>) {
        let state = self.state();
        let pending = std::mem::take(&mut self.pending);
        let predicted = agent.analyze_adversary(&pending, &state, &OracleSpace::new(&self.oracle));
        if !predicted.is_empty() {
            events.push(GameEvent::Predicted(predicted));
        }

        let space = OracleSpace::new(&self.oracle);
        if space.can_create_decoy(&state.location) && agent.should_deceive() {
            self.deceive(agent, &state, events);
            return;
        }
        let suggestion = self.oracle.suggestion(&state);
        let action = match agent.choose_action(&state, &space, suggestion.as_ref()) {
            Ok(action) => action,
            Err(err) => {
                warn!(state = %state, error = %err, "Agent has no move, skipping turn");
                return;
            }
        };
        match action {
            Action::CreateDecoy => self.deceive(agent, &state, events),
            Action::MoveTo(target) => self.move_agent(agent, &state, target, events),
        }
    }

    fn deceive(&mut self, agent: &mut LearningAgent, state: &StateKey, events: &mut Vec<GameEvent>) {
        let known = OracleSpace::new(&self.oracle).locations();
        let Some(DecoyPlan { location, timing }) =
            agent.plan_deception(&state.location, &known, Some(&self.oracle))
        else {
            debug!("No decoy location available");
            return;
        };
        match timing {
            DecoyTiming::Immediate => self.fire_decoy(location, agent, events),
            DecoyTiming::AfterCheck { delay } => {
                debug!(location = %location, delay, "Decoy scheduled");
                events.push(GameEvent::DecoyScheduled {
                    location: location.clone(),
                    delay,
                });
                self.scheduled.push(ScheduledDecoy {
                    location,
                    delay,
                    scheduled_at: self.game_time,
                    fires_at: None,
                });
            }
        }
        self.agent_score = self.agent_score.saturating_add(self.config.scoring.decoy);
        agent.learn(state, &Action::CreateDecoy, self.config.rewards.decoy, state);
    }

    fn fire_decoy(&mut self, location: Location, agent: &mut LearningAgent, events: &mut Vec<GameEvent>) {
        let signal = self.decoys.create(location, self.game_time, agent.rng_mut());
        if let Some(name) = signal.location.as_name() {
            self.oracle.tell(&Fact::Decoy {
                location: name.to_owned(),
                strength: signal.strength,
            });
        }
        info!(location = %signal.location, strength = signal.strength, "Decoy signal live");
        events.push(GameEvent::DecoyCreated(signal));
    }

    fn move_agent(
        &mut self,
        agent: &mut LearningAgent,
        state: &StateKey,
        target: Location,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(to) = target.as_name().map(str::to_owned) else {
            warn!(target = %target, "Ignoring move to a grid cell");
            return;
        };
        let from = std::mem::replace(&mut self.agent_location, to.clone());
        self.route.push(to.clone());
        self.oracle.tell(&Fact::AgentAt(to.clone()));

        let covering = self.oracle.covering_cameras(&to);
        let detected = !covering.is_empty();
        self.status = if detected {
            DetectionStatus::Detected
        } else {
            DetectionStatus::Undetected
        };
        self.oracle.tell(&Fact::AgentStatus(self.status));

        let next = self.state();
        let at_exit = self.oracle.exits().iter().any(|exit| *exit == to);
        let rewards = &self.config.rewards;
        let reward = if detected {
            rewards.detection
        } else if at_exit {
            rewards.escape
        } else {
            rewards.safe_move
        };
        agent.learn(state, &Action::MoveTo(target.clone()), reward, &next);
        debug!(from = %from, to = %to, detected, reward, "Agent moved");
        events.push(GameEvent::Moved {
            from,
            to: to.clone(),
            detected,
        });

        if detected {
            self.adversary_score = self.adversary_score.saturating_add(self.config.scoring.detection);
            let camera = covering.first().and_then(|id| self.camera(*id));
            if let Some(camera) = camera {
                let event = DetectionEvent {
                    camera: CameraId(camera.id),
                    camera_location: Location::named(&camera.location),
                    location: target,
                    game_time: self.game_time,
                    agent_state: next,
                };
                info!(camera = camera.id, location = %to, "Agent detected");
                agent.learn_from_detection(event.clone());
                events.push(GameEvent::Detected(event));
            }
        }

        if at_exit {
            let result = if detected {
                self.adversary_score = self.adversary_score.saturating_add(self.config.scoring.adversary_win);
                GameResult::AdversaryWin
            } else {
                self.agent_score = self.agent_score.saturating_add(self.config.scoring.agent_win);
                agent.record_route(self.route.iter().map(Location::named).collect());
                GameResult::AgentWin
            };
            info!(
                result = ?result,
                exit = %to,
                route_risk = self.route_risk(),
                agent_score = self.agent_score,
                adversary_score = self.adversary_score,
                "City game over"
            );
            self.result = Some(result);
            events.push(GameEvent::Finished(result));
        }
    }

    fn log_action(&mut self, kind: AdversaryActionKind, location: &str) {
        let action = AdversaryAction {
            kind,
            location: Location::named(location),
            time: self.game_time,
            agent_location: Some(Location::named(&self.agent_location)),
        };
        self.pending.push(action.clone());
        self.session.push(action);
    }

    fn camera(&self, id: u32) -> Option<&PlacedCamera> {
        self.cameras.iter().find(|camera| camera.id == id)
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The agent's current learning state.
    pub fn state(&self) -> StateKey {
        StateKey::new(Location::named(&self.agent_location), self.status)
    }

    /// Where the agent is.
    pub fn agent_location(&self) -> &str {
        &self.agent_location
    }

    /// Every location the agent has stood on, starting location first.
    pub fn route(&self) -> &[String] {
        &self.route
    }

    /// Summed risk of the agent's route under the current board.
    pub fn route_risk(&self) -> u32 {
        self.oracle.route_risk(&self.route)
    }

    /// Whether a camera covered the agent after its last move.
    pub const fn status(&self) -> DetectionStatus {
        self.status
    }

    /// Seconds of game time elapsed.
    pub const fn game_time(&self) -> f64 {
        self.game_time
    }

    /// Seconds until the agent's next turn.
    pub fn next_turn_in(&self) -> f64 {
        self.timer.remaining()
    }

    /// `(agent, adversary)` scores.
    pub const fn scores(&self) -> (u32, u32) {
        (self.agent_score, self.adversary_score)
    }

    /// How the game ended, if it has.
    pub const fn result(&self) -> Option<GameResult> {
        self.result
    }

    /// Whether the game has ended.
    pub const fn is_over(&self) -> bool {
        self.result.is_some()
    }

    /// Number of cameras placed.
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// `(id, location, range)` for every placed camera.
    pub fn cameras(&self) -> impl Iterator<Item = (u32, &str, u32)> {
        self.cameras
            .iter()
            .map(|camera| (camera.id, camera.location.as_str(), camera.range))
    }

    /// `(id, location, kind)` for every installed sensor.
    pub fn sensors(&self) -> impl Iterator<Item = (u32, &str, &str)> {
        self.sensors
            .iter()
            .map(|sensor| (sensor.id, sensor.location.as_str(), sensor.kind.as_str()))
    }

    /// Live decoy signals.
    pub fn decoys(&self) -> &[DecoySignal] {
        self.decoys.active()
    }

    /// Every adversary action this game, oldest first.
    pub fn session(&self) -> &[AdversaryAction] {
        &self.session
    }

    /// The rule oracle the game keeps in sync.
    pub const fn oracle(&self) -> &RuleOracle {
        &self.oracle
    }
}
