//! Tick callback that reports a paced maze run through tracing.
//!
//! Camera phase changes and steps are logged at debug level; detections,
//! the first stall of a blocked stretch, and the escape at info level.

use evasion_core::runner::TickCallback;
use evasion_core::{Simulation, TickSummary};
use tracing::{debug, info};

/// Callback that logs notable ticks.
#[derive(Debug, Default)]
pub struct LogCallback {
    stalled: bool,
    stalls: u64,
}

impl LogCallback {
    /// Create a new log callback.
    pub const fn new() -> Self {
        Self {
            stalled: false,
            stalls: 0,
        }
    }

    /// Ticks spent waiting for an unobserved route.
    pub const fn stalls(&self) -> u64 {
        self.stalls
    }
}

impl TickCallback for LogCallback {
    fn on_tick(&mut self, summary: &TickSummary, sim: &Simulation) {
        for (camera, state) in &summary.camera_changes {
            debug!(tick = summary.tick, %camera, ?state, "Camera phase changed");
        }
        if let Some(step) = &summary.step {
            debug!(tick = summary.tick, from = %step.from, to = %step.to, "Agent stepped");
        }

        if summary.stalled {
            self.stalls = self.stalls.saturating_add(1);
            if !self.stalled {
                info!(
                    tick = summary.tick,
                    position = %sim.position(),
                    "Every route is watched, waiting"
                );
            }
        }
        self.stalled = summary.stalled;

        if let Some(event) = &summary.detection {
            info!(
                tick = summary.tick,
                camera = %event.camera,
                location = %event.location,
                watchers = sim.cameras().covering_count(sim.grid(), sim.position()),
                game_time = event.game_time,
                "Agent detected"
            );
        }
        if summary.escaped {
            info!(
                tick = summary.tick,
                moves = sim.moves(),
                game_time = summary.game_time,
                "Agent escaped"
            );
        }
    }
}
