//! Alert delivery
//!
//! Handles:
//! - The [`AlertSink`] seam between the pipeline and a notification transport
//! - HTTP POST delivery of the JSON alert payload
//! - Logging and counting of failed deliveries, which are never retried

mod http;

pub use http::{HttpAlertSink, DEFAULT_POST_TIMEOUT};

use async_trait::async_trait;
use thiserror::Error;

use crate::health::{components, HealthRegistry};
use crate::models::Alert;
use crate::observability::{StructuredLogger, TriggerMetrics};

/// Reasons an alert could not be delivered
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid sink URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to notification sink failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification sink responded with {status}: {body}")]
    Status { status: u16, body: String },
}

/// Destination for emitted alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<(), DeliveryError>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Shared handles used when reporting delivery outcomes
#[derive(Clone)]
pub struct DeliveryReporter {
    pub metrics: TriggerMetrics,
    pub health: HealthRegistry,
    pub logger: StructuredLogger,
}

/// Deliver one alert and record the outcome.
///
/// Failures end here: they are logged, counted and reflected in the sink's
/// health, but never returned to the caller.
pub async fn dispatch(sink: &dyn AlertSink, alert: &Alert, reporter: &DeliveryReporter) {
    match sink.deliver(alert).await {
        Ok(()) => {
            tracing::info!(
                sink = %sink.describe(),
                value = alert.reading.value,
                "Alert delivered"
            );
            reporter.metrics.inc_delivery(true);
            reporter.health.set_healthy(components::SINK).await;
        }
        Err(e) => {
            let error = e.to_string();
            reporter.logger.log_delivery_failure(alert, &error);
            reporter.metrics.inc_delivery(false);
            reporter
                .health
                .set_degraded(components::SINK, format!("Last delivery failed: {}", error))
                .await;
        }
    }
}
