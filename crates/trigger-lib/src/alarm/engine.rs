//! Threshold hysteresis engine
//!
//! Wraps [`AlarmState`] with the current threshold and the latest reading.
//! Not internally synchronized: callers must feed readings from a single
//! writer in non-decreasing time order.

use tokio::time::Instant;

use super::state::{AlarmState, Level};
use crate::models::{Alert, Reading};

/// Decides, reading by reading, whether a threshold excursion is worth an alert
#[derive(Debug, Clone)]
pub struct ThresholdEngine {
    threshold: f64,
    state: AlarmState,
    latest: Option<Reading>,
}

impl ThresholdEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            state: AlarmState::new(),
            latest: None,
        }
    }

    /// Process a reading using the current monotonic time as "now"
    pub fn process(&mut self, reading: Reading) -> Option<Alert> {
        self.process_at(reading, Instant::now())
    }

    /// Process a reading observed at `now`.
    ///
    /// Dwell times are measured between the `now` values of successive
    /// calls, not from the reading's own timestamp.
    pub fn process_at(&mut self, reading: Reading, now: Instant) -> Option<Alert> {
        self.latest = Some(reading);

        let level = Level::classify(reading.value, self.threshold);
        self.state
            .advance(level, now)
            .then(|| Alert::threshold_exceeded(reading))
    }

    /// Change the threshold used by subsequent readings.
    ///
    /// The current excursion is not reclassified and no dwell clock or
    /// arming flag is touched.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn latest_reading(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    /// Whether the most recent reading was above threshold
    pub fn is_above(&self) -> bool {
        self.state.is_above()
    }

    /// Whether any alert has been emitted since creation
    pub fn has_fired(&self) -> bool {
        self.state.ever_fired()
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }
}
