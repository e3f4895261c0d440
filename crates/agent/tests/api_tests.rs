//! Integration tests for the agent API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use threshold_agent::api::{create_router, AppState};
use tokio::sync::broadcast;
use tower::ServiceExt;
use trigger_lib::{
    health::{components, HealthRegistry},
    sink::{AlertSink, DeliveryError},
    Alert, PipelineHandle, Reading, ThresholdEngine, TriggerMetrics, TriggerPipeline,
};

struct NullSink;

#[async_trait]
impl AlertSink for NullSink {
    async fn deliver(&self, _alert: &Alert) -> Result<(), DeliveryError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "null".to_string()
    }
}

struct TestApp {
    router: Router,
    health: HealthRegistry,
    pipeline: PipelineHandle,
    shutdown: broadcast::Sender<()>,
}

async fn setup_test_app(threshold: f64) -> TestApp {
    let health = HealthRegistry::new();
    health.register(components::SINK).await;

    let (pipeline, handle) =
        TriggerPipeline::new(ThresholdEngine::new(threshold), Arc::new(NullSink), 16);
    let pipeline = pipeline.with_health(health.clone());
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(pipeline.run(shutdown_rx));

    // Wait for the pipeline to report itself
    handle.set_threshold(threshold).await.unwrap();

    let state = Arc::new(AppState::new(health.clone(), handle.clone()));
    TestApp {
        router: create_router(state),
        health,
        pipeline: handle,
        shutdown,
    }
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn put_threshold(app: &TestApp, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/threshold")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app(10.0).await;

    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["pipeline"].is_object());
    assert!(health["components"]["sink"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_while_feed_reconnects() {
    let app = setup_test_app(10.0).await;
    app.health
        .set_degraded(components::FEED, "Reconnecting: connection refused")
        .await;

    let (status, body) = get(&app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["feed"]["message"],
        "Reconnecting: connection refused"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_pipeline_stopped() {
    let app = setup_test_app(10.0).await;
    app.shutdown.send(()).unwrap();
    wait_until_closed(&app.pipeline).await;

    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let app = setup_test_app(10.0).await;

    // By default, agent is not ready
    let (status, body) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let app = setup_test_app(10.0).await;
    app.health.set_ready(true).await;

    let (status, body) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app(10.0).await;

    let metrics = TriggerMetrics::new();
    metrics.observe_reading(12.5, 0.000_01);
    metrics.inc_delivery(true);

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("threshold_trigger_readings_processed_total"));
    assert!(metrics_text.contains("threshold_trigger_threshold"));
    assert!(metrics_text.contains("threshold_trigger_alert_deliveries_total"));
    assert!(metrics_text.contains("threshold_trigger_processing_latency_seconds_bucket"));
}

#[tokio::test]
async fn test_status_reports_latest_reading() {
    let app = setup_test_app(50.0).await;

    app.pipeline
        .submit(Reading::new(61.5, Utc::now()))
        .await
        .unwrap();
    app.pipeline.set_threshold(50.0).await.unwrap();

    let (status, body) = get(&app, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["threshold"], 50.0);
    assert_eq!(snapshot["latest"]["value"], 61.5);
    assert_eq!(snapshot["above"], true);
    assert_eq!(snapshot["ever_fired"], false);
    assert_eq!(snapshot["readings_processed"], 1);
    assert_eq!(snapshot["alerts_emitted"], 0);
}

#[tokio::test]
async fn test_set_threshold_applies_to_pipeline() {
    let app = setup_test_app(50.0).await;

    let (status, body) = put_threshold(&app, r#"{"threshold": 72.5}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["threshold"], 72.5);

    assert_eq!(app.pipeline.status().await.threshold, 72.5);
}

#[tokio::test]
async fn test_set_threshold_rejects_negative_value() {
    let app = setup_test_app(50.0).await;

    let (status, body) = put_threshold(&app, r#"{"threshold": -1.0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("negative"));

    assert_eq!(app.pipeline.status().await.threshold, 50.0);
}

#[tokio::test]
async fn test_set_threshold_rejects_malformed_body() {
    let app = setup_test_app(50.0).await;

    let (status, _) = put_threshold(&app, r#"{"limit": 3}"#).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_set_threshold_returns_503_after_shutdown() {
    let app = setup_test_app(50.0).await;
    app.shutdown.send(()).unwrap();
    wait_until_closed(&app.pipeline).await;

    let (status, body) = put_threshold(&app, r#"{"threshold": 10.0}"#).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

async fn wait_until_closed(handle: &PipelineHandle) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("pipeline did not stop");
}
