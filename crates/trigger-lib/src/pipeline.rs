//! Trigger pipeline
//!
//! Owns the [`ThresholdEngine`] inside a single task. Readings and threshold
//! updates arrive as commands on one bounded queue, so they are applied
//! strictly in arrival order and the engine is never touched concurrently.
//! Alerts are handed to the sink on a separate task; the pipeline never
//! waits for delivery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::alarm::ThresholdEngine;
use crate::health::{components, HealthRegistry};
use crate::models::{Alert, Reading};
use crate::observability::{StructuredLogger, TriggerMetrics};
use crate::sink::{self, AlertSink, DeliveryReporter};

/// Default capacity of the command queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("trigger pipeline is not running")]
    Closed,
}

/// Point-in-time view of the engine for status reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub threshold: f64,
    pub latest: Option<Reading>,
    pub above: bool,
    pub ever_fired: bool,
    pub readings_processed: u64,
    pub alerts_emitted: u64,
}

impl StatusSnapshot {
    fn of(engine: &ThresholdEngine, readings_processed: u64, alerts_emitted: u64) -> Self {
        Self {
            threshold: engine.threshold(),
            latest: engine.latest_reading().copied(),
            above: engine.is_above(),
            ever_fired: engine.has_fired(),
            readings_processed,
            alerts_emitted,
        }
    }
}

enum Command {
    Reading(Reading),
    SetThreshold {
        threshold: f64,
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

/// Cloneable handle for feeding and inspecting a running pipeline
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Command>,
    status: Arc<RwLock<StatusSnapshot>>,
}

impl PipelineHandle {
    /// Queue a reading for evaluation
    pub async fn submit(&self, reading: Reading) -> Result<(), PipelineError> {
        self.tx
            .send(Command::Reading(reading))
            .await
            .map_err(|_| PipelineError::Closed)
    }

    /// Change the threshold; applied after every reading already queued.
    /// Returns the status as of the change.
    pub async fn set_threshold(&self, threshold: f64) -> Result<StatusSnapshot, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SetThreshold { threshold, reply })
            .await
            .map_err(|_| PipelineError::Closed)?;
        rx.await.map_err(|_| PipelineError::Closed)
    }

    /// Latest published status
    pub async fn status(&self) -> StatusSnapshot {
        self.status.read().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The single writer of the hysteresis engine
pub struct TriggerPipeline {
    engine: ThresholdEngine,
    sink: Arc<dyn AlertSink>,
    rx: mpsc::Receiver<Command>,
    status: Arc<RwLock<StatusSnapshot>>,
    reporter: DeliveryReporter,
    readings_processed: u64,
    alerts_emitted: u64,
}

impl TriggerPipeline {
    pub fn new(
        engine: ThresholdEngine,
        sink: Arc<dyn AlertSink>,
        capacity: usize,
    ) -> (Self, PipelineHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let status = Arc::new(RwLock::new(StatusSnapshot::of(&engine, 0, 0)));
        let metrics = TriggerMetrics::new();
        metrics.set_threshold(engine.threshold());

        let pipeline = Self {
            engine,
            sink,
            rx,
            status: status.clone(),
            reporter: DeliveryReporter {
                metrics,
                health: HealthRegistry::new(),
                logger: StructuredLogger::new("unknown"),
            },
            readings_processed: 0,
            alerts_emitted: 0,
        };

        (pipeline, PipelineHandle { tx, status })
    }

    /// Report component health into a shared registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.reporter.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.reporter.logger = logger;
        self
    }

    /// Run until every handle is dropped or shutdown is signalled
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            threshold = self.engine.threshold(),
            sink = %self.sink.describe(),
            "Starting trigger pipeline"
        );
        self.reporter.health.set_healthy(components::PIPELINE).await;

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(command) => self.handle(command).await,
                        None => {
                            info!("All pipeline handles dropped, stopping");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down trigger pipeline");
                    break;
                }
            }
        }

        self.reporter
            .health
            .set_unhealthy(components::PIPELINE, "Pipeline stopped")
            .await;
    }

    async fn handle(&mut self, command: Command) {
        let reply = match command {
            Command::Reading(reading) => {
                if let Some(alert) = self.evaluate(reading) {
                    self.dispatch(alert);
                }
                None
            }
            Command::SetThreshold { threshold, reply } => {
                let old = self.engine.threshold();
                self.engine.set_threshold(threshold);
                self.reporter.metrics.set_threshold(threshold);
                self.reporter.logger.log_threshold_change(old, threshold);
                Some(reply)
            }
        };

        // Publish before replying so a caller never observes a stale status
        let snapshot = self.snapshot();
        *self.status.write().await = snapshot.clone();
        if let Some(reply) = reply {
            let _ = reply.send(snapshot);
        }
    }

    fn evaluate(&mut self, reading: Reading) -> Option<Alert> {
        let start = Instant::now();
        let alert = self.engine.process(reading);
        self.readings_processed += 1;
        self.reporter
            .metrics
            .observe_reading(reading.value, start.elapsed().as_secs_f64());

        debug!(
            value = reading.value,
            above = self.engine.is_above(),
            "Reading evaluated"
        );

        if let Some(alert) = &alert {
            self.alerts_emitted += 1;
            self.reporter.metrics.inc_alerts_emitted();
            self.reporter
                .logger
                .log_alert(alert, self.engine.threshold());
        }
        alert
    }

    fn dispatch(&self, alert: Alert) {
        let sink = self.sink.clone();
        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            sink::dispatch(sink.as_ref(), &alert, &reporter).await;
        });
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::of(&self.engine, self.readings_processed, self.alerts_emitted)
    }
}
