//! Bounded histories the agent learns from.
//!
//! - [`DetectionHistory`] keeps the most recent detection events.
//! - [`PatternMemory`] keeps the most recent adversary actions per kind and
//!   derives timing statistics from them.
//!
//! Both are ring buffers: once full, recording a new entry evicts the
//! oldest one.

use std::collections::{BTreeMap, VecDeque};

use evasion_types::{AdversaryAction, AdversaryActionKind, CameraId, DetectionEvent};
use serde::{Deserialize, Serialize};

/// Default number of retained detection events.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Ring buffer of detection events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionHistory {
    capacity: usize,
    events: VecDeque<DetectionEvent>,
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl DetectionHistory {
    /// Create an empty history holding at most `capacity` events (at least
    /// one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn record(&mut self, event: DetectionEvent) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Maximum number of retained events.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event is retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &DetectionEvent> {
        self.events.iter()
    }

    /// The most recent event.
    pub fn latest(&self) -> Option<&DetectionEvent> {
        self.events.back()
    }

    /// Events raised by one camera, oldest first.
    pub fn by_camera(&self, camera: CameraId) -> impl Iterator<Item = &DetectionEvent> {
        self.events.iter().filter(move |event| event.camera == camera)
    }
}

/// Per-kind ring buffers of adversary actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMemory {
    capacity: usize,
    actions: BTreeMap<AdversaryActionKind, VecDeque<AdversaryAction>>,
}

impl Default for PatternMemory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PatternMemory {
    /// Create an empty memory holding at most `capacity` actions per kind
    /// (at least two, so intervals stay computable).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            actions: BTreeMap::new(),
        }
    }

    /// Record one adversary action.
    pub fn record(&mut self, action: AdversaryAction) {
        let queue = self.actions.entry(action.kind).or_default();
        while queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(action);
    }

    /// Number of retained actions of `kind`.
    pub fn count(&self, kind: AdversaryActionKind) -> usize {
        self.actions.get(&kind).map_or(0, VecDeque::len)
    }

    /// Total retained actions.
    pub fn len(&self) -> usize {
        self.actions.values().map(VecDeque::len).sum()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.actions.values().all(VecDeque::is_empty)
    }

    /// Actions of `kind`, oldest first.
    pub fn of_kind(&self, kind: AdversaryActionKind) -> impl Iterator<Item = &AdversaryAction> {
        self.actions.get(&kind).into_iter().flatten()
    }

    /// The last `n` actions of `kind`, oldest first.
    pub fn recent(&self, kind: AdversaryActionKind, n: usize) -> Vec<&AdversaryAction> {
        let total = self.count(kind);
        self.of_kind(kind).skip(total.saturating_sub(n)).collect()
    }

    /// Mean time between consecutive actions among the last `window`
    /// actions of `kind`. `None` with fewer than two such actions.
    pub fn average_interval(&self, kind: AdversaryActionKind, window: usize) -> Option<f64> {
        let recent = self.recent(kind, window);
        let gaps: Vec<f64> = recent
            .windows(2)
            .filter_map(|pair| match pair {
                [earlier, later] => Some(later.time - earlier.time),
                _ => None,
            })
            .collect();
        let count = u32::try_from(gaps.len()).ok().filter(|n| *n > 0)?;
        Some(gaps.iter().sum::<f64>() / f64::from(count))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evasion_types::{Location, Position, StateKey};

    use super::*;

    fn detection(camera: u32, time: f64) -> DetectionEvent {
        DetectionEvent {
            camera: CameraId(camera),
            camera_location: Location::Cell(Position::new(0, 3)),
            location: Location::Cell(Position::new(1, 3)),
            game_time: time,
            agent_state: StateKey::undetected(Position::new(1, 2)),
        }
    }

    fn check(time: f64) -> AdversaryAction {
        AdversaryAction {
            kind: AdversaryActionKind::CheckCamera,
            location: Location::named("park"),
            time,
            agent_location: None,
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut history = DetectionHistory::new(3);
        for t in 0..10_u32 {
            history.record(detection(t & 1, f64::from(t)));
        }
        assert_eq!(history.len(), 3);
        assert!((history.iter().next().unwrap().game_time - 7.0).abs() < f64::EPSILON);
        assert!((history.latest().unwrap().game_time - 9.0).abs() < f64::EPSILON);
        assert_eq!(history.by_camera(CameraId(1)).count(), 2);
    }

    #[test]
    fn zero_capacity_still_keeps_latest() {
        let mut history = DetectionHistory::new(0);
        history.record(detection(0, 1.0));
        history.record(detection(0, 2.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn patterns_bucket_by_kind() {
        let mut memory = PatternMemory::new(10);
        memory.record(check(1.0));
        memory.record(AdversaryAction {
            kind: AdversaryActionKind::PlaceCamera,
            location: Location::named("port"),
            time: 2.0,
            agent_location: Some(Location::named("city_center")),
        });
        assert_eq!(memory.count(AdversaryActionKind::CheckCamera), 1);
        assert_eq!(memory.count(AdversaryActionKind::PlaceCamera), 1);
        assert_eq!(memory.count(AdversaryActionKind::RotateCamera), 0);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn average_interval_uses_window() {
        let mut memory = PatternMemory::new(10);
        for t in [0.0, 100.0, 110.0, 120.0, 130.0, 140.0] {
            memory.record(check(t));
        }
        let avg = memory.average_interval(AdversaryActionKind::CheckCamera, 5).unwrap();
        assert!((avg - 10.0).abs() < 1e-9);
        assert!(memory.average_interval(AdversaryActionKind::PlaceCamera, 5).is_none());
    }

    #[test]
    fn pattern_memory_serializes_kind_keys() {
        let mut memory = PatternMemory::new(4);
        memory.record(check(3.0));
        let json = serde_json::to_string(&memory).unwrap();
        assert!(json.contains("\"check_camera\""));
        let back: PatternMemory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, memory);
    }
}
