//! Observability infrastructure for the threshold agent
//!
//! Provides:
//! - Prometheus metrics (readings, alerts, deliveries, feed reconnects, processing latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Gauge,
    Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::Alert;

/// Histogram buckets for per-reading processing latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<TriggerMetricsInner> = OnceLock::new();

struct TriggerMetricsInner {
    readings_processed: IntCounter,
    readings_dropped: IntCounter,
    alerts_emitted: IntCounter,
    deliveries: IntCounterVec,
    feed_reconnects: IntCounter,
    threshold: Gauge,
    latest_value: Gauge,
    processing_latency_seconds: Histogram,
}

impl TriggerMetricsInner {
    fn new() -> Self {
        Self {
            readings_processed: register_int_counter!(
                "threshold_trigger_readings_processed_total",
                "Readings evaluated by the hysteresis engine"
            )
            .expect("Failed to register readings_processed"),

            readings_dropped: register_int_counter!(
                "threshold_trigger_readings_dropped_total",
                "Feed messages dropped because they could not be decoded"
            )
            .expect("Failed to register readings_dropped"),

            alerts_emitted: register_int_counter!(
                "threshold_trigger_alerts_emitted_total",
                "Threshold exceeded alerts raised by the engine"
            )
            .expect("Failed to register alerts_emitted"),

            deliveries: register_int_counter_vec!(
                "threshold_trigger_alert_deliveries_total",
                "Alert deliveries to the notification sink by outcome",
                &["outcome"]
            )
            .expect("Failed to register deliveries"),

            feed_reconnects: register_int_counter!(
                "threshold_trigger_feed_reconnects_total",
                "Feed connection failures followed by a reconnect attempt"
            )
            .expect("Failed to register feed_reconnects"),

            threshold: register_gauge!(
                "threshold_trigger_threshold",
                "Threshold currently applied to readings"
            )
            .expect("Failed to register threshold"),

            latest_value: register_gauge!(
                "threshold_trigger_latest_value",
                "Value of the most recently processed reading"
            )
            .expect("Failed to register latest_value"),

            processing_latency_seconds: register_histogram!(
                "threshold_trigger_processing_latency_seconds",
                "Time spent evaluating one reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register processing_latency_seconds"),
        }
    }
}

/// Handle to the process-wide trigger metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct TriggerMetrics {
    _private: (),
}

impl Default for TriggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(TriggerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &TriggerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record one evaluated reading
    pub fn observe_reading(&self, value: f64, duration_secs: f64) {
        let inner = self.inner();
        inner.readings_processed.inc();
        inner.latest_value.set(value);
        inner.processing_latency_seconds.observe(duration_secs);
    }

    pub fn inc_readings_dropped(&self) {
        self.inner().readings_dropped.inc();
    }

    pub fn inc_alerts_emitted(&self) {
        self.inner().alerts_emitted.inc();
    }

    pub fn inc_delivery(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner().deliveries.with_label_values(&[outcome]).inc();
    }

    pub fn inc_feed_reconnects(&self) {
        self.inner().feed_reconnects.inc();
    }

    pub fn set_threshold(&self, threshold: f64) {
        self.inner().threshold.set(threshold);
    }
}

/// Structured logger for agent events
///
/// Emits one JSON log line per significant event, tagged with `event` and
/// the sensor topic so that several agents can share a log pipeline.
#[derive(Clone)]
pub struct StructuredLogger {
    topic: String,
}

impl StructuredLogger {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn log_startup(&self, version: &str, threshold: f64) {
        info!(
            event = "agent_started",
            topic = %self.topic,
            agent_version = %version,
            threshold = threshold,
            "Threshold agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            topic = %self.topic,
            reason = %reason,
            "Threshold agent shutting down"
        );
    }

    pub fn log_alert(&self, alert: &Alert, threshold: f64) {
        warn!(
            event = "threshold_exceeded",
            topic = %self.topic,
            reason = %alert.reason,
            value = alert.reading.value,
            sensor_timestamp = %alert.reading.timestamp.to_rfc3339(),
            threshold = threshold,
            "Sensor value exceeded threshold"
        );
    }

    pub fn log_threshold_change(&self, old: f64, new: f64) {
        info!(
            event = "threshold_changed",
            topic = %self.topic,
            old_threshold = old,
            new_threshold = new,
            "Threshold updated"
        );
    }

    pub fn log_feed_status(&self, broker: &str, connected: bool, attempts: u32) {
        if connected {
            info!(
                event = "feed_connected",
                topic = %self.topic,
                broker = %broker,
                "Connected to broker, subscribing"
            );
        } else {
            warn!(
                event = "feed_disconnected",
                topic = %self.topic,
                broker = %broker,
                attempts = attempts,
                "Broker connection unavailable"
            );
        }
    }

    pub fn log_delivery_failure(&self, alert: &Alert, error: &str) {
        warn!(
            event = "alert_delivery_failed",
            topic = %self.topic,
            value = alert.reading.value,
            error = %error,
            "Failed to deliver alert to notification sink"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_metrics_can_be_observed() {
        let metrics = TriggerMetrics::new();
        let before = metrics.inner().readings_processed.get();

        metrics.observe_reading(12.5, 0.000_01);
        metrics.set_threshold(10.0);
        metrics.inc_delivery(true);
        metrics.inc_delivery(false);

        assert!(metrics.inner().readings_processed.get() > before);
        assert!(metrics.inner().deliveries.with_label_values(&["failure"]).get() >= 1);
    }

    #[test]
    fn test_metrics_handles_share_state() {
        let a = TriggerMetrics::new();
        let b = a.clone();
        let before = b.inner().feed_reconnects.get();
        a.inc_feed_reconnects();
        assert!(b.inner().feed_reconnects.get() > before);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("sensors/test");
        assert_eq!(logger.topic, "sensors/test");
    }
}
