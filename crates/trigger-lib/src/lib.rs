//! Threshold trigger library
//!
//! This crate provides the core functionality for:
//! - Debounced threshold alarms with hysteresis
//! - Sensor feed ingestion over MQTT
//! - Alert delivery to an HTTP notification sink
//! - Health checks and observability

pub mod alarm;
pub mod feed;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod sink;

pub use alarm::ThresholdEngine;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StructuredLogger, TriggerMetrics};
pub use pipeline::{PipelineError, PipelineHandle, StatusSnapshot, TriggerPipeline};
