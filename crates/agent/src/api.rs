//! HTTP API for health checks, Prometheus metrics, status and threshold updates

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use trigger_lib::{
    health::{ComponentStatus, HealthRegistry},
    pipeline::{PipelineHandle, StatusSnapshot},
};

use crate::config::check_threshold;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub pipeline: PipelineHandle,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, pipeline: PipelineHandle) -> Self {
        Self {
            health_registry,
            pipeline,
        }
    }
}

/// Body of `PUT /api/v1/threshold`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRequest {
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors surfaced by the API handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still deciding, e.g. while reconnecting
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Current threshold, latest reading and alarm state
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.pipeline.status().await)
}

/// Replace the threshold used for subsequent readings
async fn set_threshold(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ThresholdRequest>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    check_threshold(request.threshold).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let snapshot = state
        .pipeline
        .set_threshold(request.threshold)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    info!(threshold = request.threshold, "Threshold updated via API");
    Ok(Json(snapshot))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/threshold", put(set_threshold))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
