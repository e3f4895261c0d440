//! Core data models for the threshold trigger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used on the alert wire format (UTC, microsecond precision, no zone suffix)
pub const PAYLOAD_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A single sensor reading as delivered by the feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Why an alert was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    ThresholdExceeded,
}

impl AlertReason {
    /// Human-readable message sent to the notification sink
    pub fn message(&self) -> &'static str {
        match self {
            AlertReason::ThresholdExceeded => "Threshold value exceeded",
        }
    }
}

impl std::fmt::Display for AlertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertReason::ThresholdExceeded => write!(f, "ThresholdExceeded"),
        }
    }
}

/// An alert emitted by the hysteresis engine for one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub reading: Reading,
    pub reason: AlertReason,
}

impl Alert {
    pub fn threshold_exceeded(reading: Reading) -> Self {
        Self {
            reading,
            reason: AlertReason::ThresholdExceeded,
        }
    }
}

/// JSON body POSTed to the notification sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub message: String,
    pub last_sensor_time_stamp: String,
    pub last_sensor_value: f64,
}

impl From<&Alert> for AlertPayload {
    fn from(alert: &Alert) -> Self {
        Self {
            message: alert.reason.message().to_string(),
            last_sensor_time_stamp: alert
                .reading
                .timestamp
                .format(PAYLOAD_TIMESTAMP_FORMAT)
                .to_string(),
            last_sensor_value: alert.reading.value,
        }
    }
}
