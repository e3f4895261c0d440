//! MQTT subscription loop
//!
//! Connects to the broker, subscribes to the sensor topic on every
//! (re)connect, decodes each published message and forwards it to the
//! trigger pipeline in arrival order.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::decode::decode_reading;
use super::reconnect::{BackoffConfig, FailureKind, ReconnectState};
use crate::health::{components, HealthRegistry};
use crate::models::Reading;
use crate::observability::{StructuredLogger, TriggerMetrics};
use crate::pipeline::PipelineHandle;

/// Capacity of the rumqttc request channel
const CLIENT_CHANNEL_CAPACITY: usize = 16;

/// Connection settings for the sensor feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub client_id: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub topic: String,
    pub keep_alive: Duration,
    pub backoff: BackoffConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            client_id: format!("threshold-agent-{}", std::process::id()),
            broker_host: "test.mosquitto.org".to_string(),
            broker_port: 1883,
            topic: "sensors/lyse-test-01".to_string(),
            keep_alive: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn broker(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.client_id.clone(),
            self.broker_host.clone(),
            self.broker_port,
        );
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options
    }
}

/// Feed adapter driving readings from MQTT into the pipeline
pub struct MqttFeed {
    config: FeedConfig,
    pipeline: PipelineHandle,
    metrics: TriggerMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl MqttFeed {
    pub fn new(
        config: FeedConfig,
        pipeline: PipelineHandle,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            config,
            pipeline,
            metrics: TriggerMetrics::new(),
            health,
            logger,
        }
    }

    /// Run the subscription loop until shutdown or until the pipeline stops
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let broker = self.config.broker();
        info!(
            broker = %broker,
            topic = %self.config.topic,
            client_id = %self.config.client_id,
            "Starting MQTT feed"
        );
        self.health
            .register_pending(components::FEED, format!("Connecting to {}", broker))
            .await;

        let (client, mut eventloop) =
            AsyncClient::new(self.config.mqtt_options(), CLIENT_CHANNEL_CAPACITY);
        let mut link = ReconnectState::new(self.config.backoff.clone());

        loop {
            tokio::select! {
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            link.on_connected();
                            debug!(status = ?link.status(), "MQTT link established");
                            self.logger.log_feed_status(&broker, true, link.attempts());
                            self.health.set_healthy(components::FEED).await;

                            if let Err(e) = client.try_subscribe(self.config.topic.clone(), QoS::AtMostOnce) {
                                warn!(error = %e, topic = %self.config.topic, "Failed to queue subscription");
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            if !self.forward(&publish.topic, &publish.payload).await {
                                info!("Trigger pipeline closed, stopping MQTT feed");
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            let plan = link.on_failure(e.to_string());
                            self.metrics.inc_feed_reconnects();
                            match plan.kind {
                                FailureKind::Dropped => warn!(
                                    error = %e,
                                    retry_in_ms = plan.delay.as_millis() as u64,
                                    "MQTT connection lost, reconnecting"
                                ),
                                FailureKind::Unreachable => warn!(
                                    error = %e,
                                    broker = %broker,
                                    attempt = plan.attempt,
                                    retry_in_ms = plan.delay.as_millis() as u64,
                                    "Could not connect to MQTT broker"
                                ),
                            }
                            self.logger.log_feed_status(&broker, false, plan.attempt);
                            self.health
                                .set_degraded(components::FEED, link.summary())
                                .await;

                            tokio::select! {
                                _ = tokio::time::sleep(plan.delay) => {}
                                _ = shutdown.recv() => {
                                    info!("Shutting down MQTT feed");
                                    break;
                                }
                            }
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down MQTT feed");
                    break;
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not sent");
        }
    }

    /// Decode a published message and queue it for evaluation.
    ///
    /// Malformed messages are dropped. Returns `false` once the pipeline
    /// no longer accepts readings.
    async fn forward(&self, topic: &str, payload: &[u8]) -> bool {
        match self.decode(topic, payload) {
            Some(reading) => self.pipeline.submit(reading).await.is_ok(),
            None => true,
        }
    }

    /// Decode a published message, dropping it when malformed
    fn decode(&self, topic: &str, payload: &[u8]) -> Option<Reading> {
        match decode_reading(payload) {
            Ok(reading) => {
                debug!(
                    topic = %topic,
                    value = reading.value,
                    timestamp = %reading.timestamp,
                    "Received reading"
                );
                Some(reading)
            }
            Err(e) => {
                self.metrics.inc_readings_dropped();
                warn!(
                    topic = %topic,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping undecodable feed message"
                );
                None
            }
        }
    }
}
