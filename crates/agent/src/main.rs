//! Threshold agent - debounced sensor threshold alarm
//!
//! Subscribes to a sensor topic over MQTT, runs every reading through the
//! hysteresis engine and POSTs an alert to the notification sink when the
//! value has stayed above the threshold long enough.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use threshold_agent::{
    api,
    config::{AgentConfig, Overrides},
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trigger_lib::{
    feed::MqttFeed,
    health::{components, HealthRegistry},
    sink::HttpAlertSink,
    StructuredLogger, ThresholdEngine, TriggerPipeline,
};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long background tasks get to finish after shutdown is signalled
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "threshold-agent")]
#[command(author, version, about = "Debounced sensor threshold alarm", long_about = None)]
struct Args {
    /// Alarm threshold; readings strictly above it count as an excursion
    threshold: Option<f64>,

    /// URL receiving alert POSTs
    post_url: Option<String>,

    /// Optional configuration file
    #[arg(short, long, env = "TRIGGER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();
    info!("Starting threshold-agent");

    // Load configuration
    let config = AgentConfig::load(&Overrides {
        config_file: args.config,
        threshold: args.threshold,
        post_url: args.post_url,
    })?;
    info!(
        broker = %config.feed_config().broker(),
        topic = %config.topic,
        post_url = %config.post_url(),
        "Agent configured"
    );

    let logger = StructuredLogger::new(&config.topic);
    logger.log_startup(AGENT_VERSION, config.threshold);

    // Initialize health registry; the feed registers itself once it starts
    let health_registry = HealthRegistry::new();
    health_registry.register(components::PIPELINE).await;
    health_registry.register(components::SINK).await;

    let sink = HttpAlertSink::new(config.post_url(), config.post_timeout())
        .context("Failed to create alert sink")?;

    let (pipeline, handle) = TriggerPipeline::new(
        ThresholdEngine::new(config.threshold),
        Arc::new(sink),
        config.queue_capacity,
    );
    let pipeline = pipeline
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    let (shutdown_tx, _) = broadcast::channel(1);
    let pipeline_task = tokio::spawn(pipeline.run(shutdown_tx.subscribe()));

    let feed = MqttFeed::new(
        config.feed_config(),
        handle.clone(),
        health_registry.clone(),
        logger.clone(),
    );
    let feed_task = tokio::spawn(feed.run(shutdown_tx.subscribe()));

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), handle));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    // Start health, metrics and status server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    // Receivers may already be gone if a task exited on its own
    let _ = shutdown_tx.send(());

    let drain = async {
        let _ = feed_task.await;
        let _ = pipeline_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Background tasks did not stop in time");
    }

    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
