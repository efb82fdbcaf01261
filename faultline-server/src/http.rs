//! Faultline HTTP REST API
//!
//! Axum-based HTTP server exposing capture, lookup and maintenance over HTTP.
//! Runs alongside the Unix socket IPC server on port 8767 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, Value)`, so the logic is testable without axum.
//!
//! Endpoints:
//! - GET  /health: health check with DB status
//! - GET  /version: server version info
//! - POST /capture: capture a failure, returns its public id
//! - GET  /errors: latest records (`?limit=N`)
//! - GET  /errors/:id: one record with rendered summary and detail
//! - POST /errors/test: capture a synthetic failure
//! - POST /prune: delete records older than N days

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use faultline_core::{ErrorMeta, Failure};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router::{self, STORE_DISABLED};
use crate::state::AppState;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/capture", post(capture_handler))
        .route("/errors", get(latest_handler))
        .route("/errors/test", post(test_handler))
        .route("/errors/:id", get(lookup_handler))
        .route("/prune", post(prune_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Faultline HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub failure: Failure,
    pub context: String,
    #[serde(default)]
    pub meta: Option<ErrorMeta>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TestRequest {
    #[serde(default)]
    pub meta: Option<ErrorMeta>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LatestQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    pub days: Option<u32>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::to_value(ErrorResponse::new(msg)).unwrap_or_default()
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    let postgresql = match &state.pool {
        Some(pool) => match faultline_core::db::health_check(pool).await {
            Ok(v) => v,
            Err(e) => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    serde_json::json!({
                        "status": "unhealthy",
                        "error": e.to_string(),
                    }),
                );
            }
        },
        None => "disabled".to_string(),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": postgresql,
            "socket": state.config.service.socket_path,
            "throttle_tracked": state.reporter.throttle().tracked(),
        }),
    )
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "faultline/1",
    })
}

pub async fn capture_inner(state: &AppState, req: CaptureRequest) -> (StatusCode, serde_json::Value) {
    if req.context.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("context field is required"));
    }

    let outcome = state.reporter.capture(&req.failure, &req.context, req.meta).await;
    match serde_json::to_value(&outcome) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn test_inner(state: &AppState, req: TestRequest) -> (StatusCode, serde_json::Value) {
    let outcome = state.reporter.capture_synthetic(req.meta).await;
    match serde_json::to_value(&outcome) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn lookup_inner(state: &AppState, id: &str) -> (StatusCode, serde_json::Value) {
    if state.store().is_none() {
        return (StatusCode::SERVICE_UNAVAILABLE, error_body(STORE_DISABLED));
    }

    match router::lookup(state, id).await {
        Ok(serde_json::Value::Null) => (
            StatusCode::NOT_FOUND,
            error_body("No error found with that ID."),
        ),
        Ok(data) => (StatusCode::OK, data),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn latest_inner(state: &AppState, query: LatestQuery) -> (StatusCode, serde_json::Value) {
    if state.store().is_none() {
        return (StatusCode::SERVICE_UNAVAILABLE, error_body(STORE_DISABLED));
    }

    match router::latest(state, query.limit).await {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn prune_inner(state: &AppState, req: PruneRequest) -> (StatusCode, serde_json::Value) {
    let days = match req.days {
        Some(d) if d >= 1 => d,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                error_body("days field is required and must be at least 1"),
            );
        }
    };

    if state.store().is_none() {
        return (StatusCode::SERVICE_UNAVAILABLE, error_body(STORE_DISABLED));
    }

    match router::prune(state, days).await {
        Ok(removed) => (
            StatusCode::OK,
            serde_json::json!({ "removed": removed, "days": days }),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

// ============================================================================
// Axum handlers (thin wrappers)
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

async fn version_handler() -> impl IntoResponse {
    Json(version_inner())
}

async fn capture_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CaptureRequest>,
) -> impl IntoResponse {
    let (status, body) = capture_inner(&state, req).await;
    (status, Json(body))
}

async fn test_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TestRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let (status, body) = test_inner(&state, req).await;
    (status, Json(body))
}

async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = lookup_inner(&state, &id).await;
    (status, Json(body))
}

async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> impl IntoResponse {
    let (status, body) = latest_inner(&state, query).await;
    (status, Json(body))
}

async fn prune_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PruneRequest>,
) -> impl IntoResponse {
    let (status, body) = prune_inner(&state, req).await;
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inner_fields() {
        let v = version_inner();
        assert_eq!(v["protocol"], "faultline/1");
        assert!(v["version"].is_string());
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_body("nope");
        assert_eq!(body["error"], "nope");
        assert_eq!(body["status"], "error");
    }
}
