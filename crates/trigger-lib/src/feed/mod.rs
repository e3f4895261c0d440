//! Sensor feed ingestion
//!
//! This module provides:
//! - Decoding of published JSON messages into readings
//! - A reconnect state machine with exponential backoff
//! - The MQTT subscription loop that feeds the trigger pipeline

mod decode;
mod mqtt;
mod reconnect;

pub use decode::{decode_reading, DecodeError};
pub use mqtt::{FeedConfig, MqttFeed};
pub use reconnect::{BackoffConfig, FailureKind, LinkStatus, ReconnectState, RetryPlan};
