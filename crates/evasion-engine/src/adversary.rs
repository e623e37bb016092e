//! Scripted adversary for unattended city games.
//!
//! Acts on its own timer: places cameras on locations it does not yet watch
//! until it reaches its budget, then now and again installs a motion sensor,
//! and otherwise checks a random camera.

use evasion_core::clock::{ClockError, TurnTimer};
use evasion_core::{CheckReport, CityGame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Chance of placing rather than checking while under budget.
const PLACE_CHANCE: f64 = 0.5;

/// Chance of installing a sensor once the camera budget is spent.
const SENSOR_CHANCE: f64 = 0.25;

/// Sensors the autopilot installs at most.
const MAX_SENSORS: usize = 2;

/// What the autopilot did on its turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AdversaryMove {
    /// A camera went up.
    Placed {
        /// The new camera's id.
        id: u32,
        /// Where it was mounted.
        location: String,
    },
    /// A motion sensor went up.
    Sensor {
        /// The new sensor's id.
        id: u32,
        /// Where it was installed.
        location: String,
    },
    /// A camera was checked.
    Checked(CheckReport),
}

/// A seeded scripted adversary.
#[derive(Debug)]
pub struct Autopilot {
    rng: StdRng,
    timer: TurnTimer,
    max_cameras: usize,
}

impl Autopilot {
    /// An adversary acting every `interval` seconds with at most
    /// `max_cameras` cameras.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] unless `interval` is positive.
    pub fn new(seed: u64, interval: f64, max_cameras: usize) -> Result<Self, ClockError> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            timer: TurnTimer::new(interval)?,
            max_cameras,
        })
    }

    /// Let `dt` seconds pass and act if a turn is due.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] for a bad `dt`.
    pub fn advance(&mut self, dt: f64, game: &mut CityGame) -> Result<Option<AdversaryMove>, ClockError> {
        if !self.timer.tick(dt)? || game.is_over() {
            return Ok(None);
        }
        let count = game.camera_count();
        let place = count < self.max_cameras && (count == 0 || self.rng.random_bool(PLACE_CHANCE));
        if place {
            return Ok(self.place(game));
        }
        let wants_sensor = game.sensors().count() < MAX_SENSORS && self.rng.random_bool(SENSOR_CHANCE);
        if wants_sensor && let Some(sensor) = self.install_sensor(game) {
            return Ok(Some(sensor));
        }
        let Ok(count) = u32::try_from(count) else {
            return Ok(None);
        };
        if count == 0 {
            return Ok(None);
        }
        let id = self.rng.random_range(1..=count);
        Ok(game.check_camera(id).map(AdversaryMove::Checked))
    }

    fn place(&mut self, game: &mut CityGame) -> Option<AdversaryMove> {
        let watched: Vec<String> = game.cameras().map(|(_, location, _)| location.to_owned()).collect();
        let location = self.pick_unused(game, &watched)?;
        let id = game.place_camera(&location, None)?;
        debug!(id, location = %location, "Autopilot placed a camera");
        Some(AdversaryMove::Placed { id, location })
    }

    fn install_sensor(&mut self, game: &mut CityGame) -> Option<AdversaryMove> {
        let sensed: Vec<String> = game.sensors().map(|(_, location, _)| location.to_owned()).collect();
        let location = self.pick_unused(game, &sensed)?;
        let id = game.place_sensor(&location, "motion")?;
        debug!(id, location = %location, "Autopilot installed a sensor");
        Some(AdversaryMove::Sensor { id, location })
    }

    /// A random city location not in `taken`.
    fn pick_unused(&mut self, game: &CityGame, taken: &[String]) -> Option<String> {
        let open: Vec<String> = game
            .oracle()
            .locations()
            .into_iter()
            .filter(|location| !taken.contains(location))
            .collect();
        if open.is_empty() {
            return None;
        }
        let pick = self.rng.random_range(0..open.len());
        open.get(pick).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use evasion_core::config::GameConfig;

    use super::*;

    #[test]
    fn first_turn_places_a_camera() {
        let mut game = CityGame::new(GameConfig::default()).unwrap();
        let mut autopilot = Autopilot::new(1, 1.0, 3).unwrap();

        assert!(autopilot.advance(0.5, &mut game).unwrap().is_none());
        let first = autopilot.advance(0.5, &mut game).unwrap();
        assert!(matches!(first, Some(AdversaryMove::Placed { id: 1, .. })));
    }

    #[test]
    fn stays_within_its_camera_budget() {
        let mut game = CityGame::new(GameConfig::default()).unwrap();
        let mut autopilot = Autopilot::new(9, 1.0, 3).unwrap();
        let mut checks = 0;
        for _ in 0..40 {
            if let Some(AdversaryMove::Checked(_)) = autopilot.advance(1.0, &mut game).unwrap() {
                checks += 1;
            }
        }
        assert_eq!(game.camera_count(), 3);
        assert!(checks > 0);
        let mut locations: Vec<&str> = game.cameras().map(|(_, l, _)| l).collect();
        locations.sort_unstable();
        locations.dedup();
        assert_eq!(locations.len(), 3, "one camera per location");
        assert!(game.sensors().count() <= MAX_SENSORS);
    }

    #[test]
    fn installs_sensors_once_cameras_are_spent() {
        let mut game = CityGame::new(GameConfig::default()).unwrap();
        let mut autopilot = Autopilot::new(4, 1.0, 1).unwrap();
        let mut sensors = 0;
        for _ in 0..60 {
            if let Some(AdversaryMove::Sensor { .. }) = autopilot.advance(1.0, &mut game).unwrap() {
                sensors += 1;
            }
        }
        assert_eq!(game.camera_count(), 1);
        assert_eq!(sensors, MAX_SENSORS);
        assert_eq!(game.sensors().count(), MAX_SENSORS);
    }
}
