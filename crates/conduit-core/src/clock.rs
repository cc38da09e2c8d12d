//! Simulated time.

use serde::{Deserialize, Serialize};

/// Ticks are the atomic unit of simulated time. Route rates and durations,
/// mover start stamps, and scheduler deadlines are all expressed in ticks.
pub type Ticks = u64;

/// The registry's view of "now". Advanced explicitly by the host each tick;
/// never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    now: Ticks,
}

impl SimClock {
    pub fn new(now: Ticks) -> Self {
        Self { now }
    }

    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Move the clock to `now`. Earlier values are ignored.
    pub fn advance_to(&mut self, now: Ticks) {
        self.now = self.now.max(now);
    }

    /// Time elapsed since `start`, clamped at zero.
    pub fn elapsed_since(&self, start: Ticks) -> Ticks {
        self.now.saturating_sub(start)
    }
}
