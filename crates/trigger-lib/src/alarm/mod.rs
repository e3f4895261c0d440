//! Threshold alarm with hysteresis
//!
//! This module provides:
//! - Classification of readings against a mutable threshold
//! - Dwell tracking above and below the threshold
//! - One alert per excursion, with a recovery dwell before re-firing

mod engine;
mod state;


pub use engine::ThresholdEngine;
pub use state::{AlarmState, Level, Stopwatch, DWELL_WINDOW};
