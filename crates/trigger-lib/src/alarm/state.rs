//! Alarm state machine
//!
//! The hysteresis rules operate on an explicit [`AlarmState`] and an
//! explicit "now" instant, so every transition can be driven from tests
//! without touching a real clock.
//!
//! ```text
//!              value > threshold
//!   Below ───────────────────────────► Above
//!     ▲   restart above_dwell             │
//!     │   stop below_dwell, arm           │ fire once when
//!     │                                   │ above_dwell >= 5m and
//!     │   restart below_dwell             │ (below_dwell >= 5m or never fired)
//!     │   stop above_dwell, arm           │
//!     └───────────────────────────────────┘
//!              value <= threshold (or NaN)
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Dwell time required both above threshold (to fire) and below threshold
/// (to re-arm after the first alert).
pub const DWELL_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Classification of a reading against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Below,
    Above,
}

impl Level {
    /// Strictly greater is above; NaN compares false and lands below.
    pub fn classify(value: f64, threshold: f64) -> Self {
        if value > threshold {
            Level::Above
        } else {
            Level::Below
        }
    }
}

/// Elapsed-time counter with restart/stop semantics.
///
/// A stopped stopwatch keeps reporting the elapsed time it had when it was
/// stopped. One that was never started reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    started_at: Option<Instant>,
    frozen: Duration,
}

impl Stopwatch {
    /// Reset to zero and start counting from `now`
    pub fn restart(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.frozen = Duration::ZERO;
    }

    /// Freeze the elapsed time at `now`. No-op when already stopped.
    pub fn stop(&mut self, now: Instant) {
        if let Some(start) = self.started_at.take() {
            self.frozen = now.saturating_duration_since(start);
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) => now.saturating_duration_since(start),
            None => self.frozen,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }
}

/// Mutable state of the hysteresis engine
#[derive(Debug, Clone, Default)]
pub struct AlarmState {
    currently_above: bool,
    /// False once the current excursion has fired
    armed: bool,
    ever_fired: bool,
    above_dwell: Stopwatch,
    below_dwell: Stopwatch,
}

impl AlarmState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one classified reading observed at `now`.
    ///
    /// Returns `true` when this reading qualifies the current excursion
    /// for an alert. The caller builds the alert; the state only records
    /// that it fired.
    pub fn advance(&mut self, level: Level, now: Instant) -> bool {
        match (self.currently_above, level) {
            (false, Level::Above) => {
                self.above_dwell.restart(now);
                self.below_dwell.stop(now);
                self.armed = true;
                self.currently_above = true;
            }
            (true, Level::Below) => {
                self.below_dwell.restart(now);
                self.above_dwell.stop(now);
                self.armed = true;
                self.currently_above = false;
            }
            _ => {}
        }

        if level == Level::Below || !self.is_fireable(now) {
            return false;
        }

        self.armed = false;
        self.ever_fired = true;
        true
    }

    fn is_fireable(&self, now: Instant) -> bool {
        let dwelled_above = self.above_dwell.elapsed(now) >= DWELL_WINDOW;
        let recovered = self.below_dwell.elapsed(now) >= DWELL_WINDOW || !self.ever_fired;

        self.armed && dwelled_above && recovered
    }

    pub fn is_above(&self) -> bool {
        self.currently_above
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn ever_fired(&self) -> bool {
        self.ever_fired
    }

    pub fn above_dwell(&self, now: Instant) -> Duration {
        self.above_dwell.elapsed(now)
    }

    pub fn below_dwell(&self, now: Instant) -> Duration {
        self.below_dwell.elapsed(now)
    }
}
