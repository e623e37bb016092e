//! Simulation clock and turn timing.
//!
//! The clock is the single source of truth for temporal state in a run. It
//! counts ticks and accumulates simulated seconds; everything else (camera
//! duty cycles, agent progress, game turns) is driven by the delta handed
//! to [`GameClock::advance`].
//!
//! # Design Principles
//!
//! - The tick counter uses checked arithmetic (no silent overflow).
//! - Deltas must be finite and non-negative; the clock never runs backwards.

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// A negative or non-finite time step was supplied.
    #[error("invalid time step: {dt}")]
    InvalidDelta {
        /// The rejected step in seconds.
        dt: f64,
    },
}

/// Tick counter and elapsed simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameClock {
    tick: u64,
    elapsed: f64,
}

impl GameClock {
    /// A clock at tick 0, time 0.
    pub const fn new() -> Self {
        Self {
            tick: 0,
            elapsed: 0.0,
        }
    }

    /// Advance by one tick of `dt` seconds. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] for a negative or non-finite
    /// `dt`, and [`ClockError::TickOverflow`] if the tick counter would
    /// exceed `u64::MAX`.
    pub fn advance(&mut self, dt: f64) -> Result<u64, ClockError> {
        validate_delta(dt)?;
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        self.elapsed += dt;
        Ok(self.tick)
    }

    /// Ticks executed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Back to tick 0.
    pub const fn reset(&mut self) {
        self.tick = 0;
        self.elapsed = 0.0;
    }
}

/// Fires once every `interval` seconds of accumulated time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnTimer {
    interval: f64,
    accumulated: f64,
}

impl TurnTimer {
    /// A timer that fires every `interval` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] unless `interval` is finite and
    /// positive.
    pub fn new(interval: f64) -> Result<Self, ClockError> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ClockError::InvalidDelta { dt: interval });
        }
        Ok(Self {
            interval,
            accumulated: 0.0,
        })
    }

    /// Accumulate `dt`; returns `true` when an interval has elapsed.
    ///
    /// At most one turn fires per call. The remainder carries over.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidDelta`] for a negative or non-finite
    /// `dt`.
    pub fn tick(&mut self, dt: f64) -> Result<bool, ClockError> {
        validate_delta(dt)?;
        self.accumulated += dt;
        if self.accumulated >= self.interval {
            self.accumulated -= self.interval;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Seconds between turns.
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Seconds until the next turn.
    pub fn remaining(&self) -> f64 {
        (self.interval - self.accumulated).max(0.0)
    }
}

fn validate_delta(dt: f64) -> Result<(), ClockError> {
    if dt.is_finite() && dt >= 0.0 {
        Ok(())
    } else {
        Err(ClockError::InvalidDelta { dt })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_counts_ticks_and_seconds() {
        let mut clock = GameClock::new();
        assert_eq!(clock.advance(0.5).unwrap(), 1);
        assert_eq!(clock.advance(0.25).unwrap(), 2);
        assert_eq!(clock.tick(), 2);
        assert!((clock.elapsed() - 0.75).abs() < 1e-12);

        clock.reset();
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn clock_rejects_bad_deltas() {
        let mut clock = GameClock::new();
        assert!(matches!(clock.advance(-0.1), Err(ClockError::InvalidDelta { .. })));
        assert!(clock.advance(f64::NAN).is_err());
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn turn_timer_fires_each_interval() {
        let mut timer = TurnTimer::new(5.0).unwrap();
        let fired: Vec<bool> = (0..12).map(|_| timer.tick(1.0).unwrap()).collect();
        assert_eq!(
            fired.iter().filter(|f| **f).count(),
            2,
            "fires at 5 s and 10 s"
        );
        assert_eq!(fired.get(4), Some(&true));
        assert!((timer.remaining() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn turn_timer_needs_positive_interval() {
        assert!(TurnTimer::new(0.0).is_err());
        assert!(TurnTimer::new(f64::INFINITY).is_err());
    }
}
