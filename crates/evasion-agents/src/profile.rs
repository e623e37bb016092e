//! Per-adversary statistics.
//!
//! A profile accumulates how often one adversary caught the agent, where it
//! tends to put cameras, and which mistakes it keeps making. The agent reads
//! it back through [`crate::adaptation`] at the start of a game.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use evasion_types::{AdversaryAction, AdversaryActionKind, Location};
use serde::{Deserialize, Serialize};

/// Sessions kept in a profile.
pub const MAX_SESSIONS: usize = 10;

/// Fewer placements than this before an escape counts as a mistake.
pub const FEW_CAMERAS: usize = 3;

/// Two placements closer than this count as clustered.
pub const CLUSTER_DISTANCE: usize = 3;

/// A recurring adversary error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mistake {
    /// The agent escaped while fewer than three cameras were placed.
    TooFewCameras,
    /// The agent escaped while two cameras sat next to each other.
    ClusteredCameras,
}

/// One finished game as seen from the adversary's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// When the session was filed.
    pub recorded_at: DateTime<Utc>,
    /// Every adversary action in order.
    pub actions: Vec<AdversaryAction>,
    /// Whether the agent got away.
    pub agent_escaped: bool,
}

/// Accumulated statistics for one adversary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversaryProfile {
    /// Identifier the profile is stored under.
    pub adversary_id: String,
    /// Games in which the adversary caught the agent.
    #[serde(default)]
    pub detection_success: u32,
    /// Games in which the agent escaped.
    #[serde(default)]
    pub detection_failure: u32,
    /// Total games recorded.
    #[serde(default)]
    pub games_played: u32,
    /// How often each location received a camera.
    #[serde(default, with = "evasion_types::serde_pairs")]
    pub placement_counts: BTreeMap<Location, u32>,
    /// How often each mistake was observed.
    #[serde(default)]
    pub mistakes: BTreeMap<Mistake, u32>,
    /// The most recent sessions, oldest first.
    #[serde(default)]
    pub sessions: VecDeque<SessionRecord>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl AdversaryProfile {
    /// An empty profile for `adversary_id`.
    pub fn new(adversary_id: impl Into<String>) -> Self {
        Self {
            adversary_id: adversary_id.into(),
            detection_success: 0,
            detection_failure: 0,
            games_played: 0,
            placement_counts: BTreeMap::new(),
            mistakes: BTreeMap::new(),
            sessions: VecDeque::new(),
            updated_at: Utc::now(),
        }
    }

    /// The adversary caught the agent.
    pub fn record_detection_success(&mut self) {
        self.detection_success = self.detection_success.saturating_add(1);
        self.games_played = self.games_played.saturating_add(1);
        self.updated_at = Utc::now();
    }

    /// The agent escaped.
    pub fn record_detection_failure(&mut self) {
        self.detection_failure = self.detection_failure.saturating_add(1);
        self.games_played = self.games_played.saturating_add(1);
        self.updated_at = Utc::now();
    }

    /// Count one camera placed at `location`.
    pub fn record_camera_placement(&mut self, location: Location) {
        let count = self.placement_counts.entry(location).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Count one occurrence of `mistake`.
    pub fn record_mistake(&mut self, mistake: Mistake) {
        let count = self.mistakes.entry(mistake).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// File a finished session and mine it for placements and mistakes.
    ///
    /// Empty sessions are ignored.
    pub fn add_session(&mut self, actions: Vec<AdversaryAction>, agent_escaped: bool) {
        if actions.is_empty() {
            return;
        }
        let placed: Vec<Location> = actions
            .iter()
            .filter(|action| action.kind == AdversaryActionKind::PlaceCamera)
            .map(|action| action.location.clone())
            .collect();
        for location in &placed {
            self.record_camera_placement(location.clone());
        }
        if agent_escaped {
            if placed.len() < FEW_CAMERAS {
                self.record_mistake(Mistake::TooFewCameras);
            }
            if is_clustered(&placed) {
                self.record_mistake(Mistake::ClusteredCameras);
            }
        }
        self.sessions.push_back(SessionRecord {
            recorded_at: Utc::now(),
            actions,
            agent_escaped,
        });
        while self.sessions.len() > MAX_SESSIONS {
            self.sessions.pop_front();
        }
        self.updated_at = Utc::now();
    }

    /// Share of games the adversary won; zero before any game.
    pub fn detection_rate(&self) -> f64 {
        let total = self.detection_success.saturating_add(self.detection_failure);
        if total == 0 {
            return 0.0;
        }
        f64::from(self.detection_success) / f64::from(total)
    }

    /// The `n` most used camera locations, most frequent first.
    pub fn top_placements(&self, n: usize) -> Vec<(&Location, u32)> {
        let mut ranked: Vec<(&Location, u32)> =
            self.placement_counts.iter().map(|(loc, count)| (loc, *count)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }

    /// The `n` most frequent mistakes, most frequent first.
    pub fn common_mistakes(&self, n: usize) -> Vec<(Mistake, u32)> {
        let mut ranked: Vec<(Mistake, u32)> =
            self.mistakes.iter().map(|(mistake, count)| (*mistake, *count)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

fn is_clustered(placed: &[Location]) -> bool {
    placed.iter().enumerate().any(|(i, a)| {
        placed
            .iter()
            .skip(i.saturating_add(1))
            .any(|b| a.proximity(b).is_some_and(|d| d < CLUSTER_DISTANCE))
    })
}
