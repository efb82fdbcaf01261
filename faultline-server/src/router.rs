use crate::state::AppState;
use crate::subsystems::retention;
use faultline_core::detail::{render_detail, render_summary};
use faultline_core::ipc::{FaultlineRequest, FaultlineResponse};

pub const DEFAULT_LATEST_LIMIT: u32 = 10;
pub const MAX_LATEST_LIMIT: u32 = 100;
pub const STORE_DISABLED: &str = "Database is disabled; error tooling unavailable.";

pub async fn handle_request(request: FaultlineRequest, state: &AppState) -> FaultlineResponse {
    match request {
        FaultlineRequest::Ping => FaultlineResponse::pong(),
        FaultlineRequest::Health => match &state.pool {
            Some(pool) => match faultline_core::db::health_check(pool).await {
                Ok(v) => FaultlineResponse::ok(serde_json::json!({
                    "postgresql": v,
                    "status": "healthy"
                })),
                Err(e) => FaultlineResponse::err(format!("DB Health Check failed: {}", e)),
            },
            None => FaultlineResponse::ok(serde_json::json!({
                "postgresql": "disabled",
                "status": "healthy"
            })),
        },
        FaultlineRequest::Capture {
            failure,
            context,
            meta,
        } => {
            if context.trim().is_empty() {
                return FaultlineResponse::err("context is required");
            }
            let outcome = state.reporter.capture(&failure, &context, meta).await;
            to_response(serde_json::to_value(&outcome))
        }
        FaultlineRequest::Test { meta } => {
            let outcome = state.reporter.capture_synthetic(meta).await;
            to_response(serde_json::to_value(&outcome))
        }
        FaultlineRequest::Lookup { id } => match lookup(state, &id).await {
            Ok(data) => FaultlineResponse::ok(data),
            Err(e) => FaultlineResponse::err(e.to_string()),
        },
        FaultlineRequest::Latest { limit } => match latest(state, limit).await {
            Ok(data) => FaultlineResponse::ok(data),
            Err(e) => FaultlineResponse::err(e.to_string()),
        },
        FaultlineRequest::Prune { days } => match prune(state, days).await {
            Ok(removed) => FaultlineResponse::ok(serde_json::json!({ "removed": removed })),
            Err(e) => FaultlineResponse::err(e.to_string()),
        },
    }
}

fn to_response(value: Result<serde_json::Value, serde_json::Error>) -> FaultlineResponse {
    match value {
        Ok(data) => FaultlineResponse::ok(data),
        Err(e) => FaultlineResponse::err(format!("Serialization error: {}", e)),
    }
}

/// Lookup a record. `Ok(Value::Null)` means no record with that id.
pub async fn lookup(state: &AppState, id: &str) -> anyhow::Result<serde_json::Value> {
    let store = state
        .store()
        .ok_or_else(|| anyhow::anyhow!(STORE_DISABLED))?;

    let id = id.trim();
    match store.get_by_id(id).await? {
        Some(record) => Ok(serde_json::json!({
            "summary": render_summary(&record),
            "detail": render_detail(&record),
            "record": record,
        })),
        None => Ok(serde_json::Value::Null),
    }
}

pub async fn latest(state: &AppState, limit: Option<u32>) -> anyhow::Result<serde_json::Value> {
    let store = state
        .store()
        .ok_or_else(|| anyhow::anyhow!(STORE_DISABLED))?;

    let limit = limit.unwrap_or(DEFAULT_LATEST_LIMIT).clamp(1, MAX_LATEST_LIMIT);
    let records = store.list_latest(limit).await?;
    Ok(serde_json::json!({
        "count": records.len(),
        "errors": records,
    }))
}

pub async fn prune(state: &AppState, days: u32) -> anyhow::Result<u64> {
    if days == 0 {
        return Err(anyhow::anyhow!("days must be at least 1"));
    }
    let store = state
        .store()
        .ok_or_else(|| anyhow::anyhow!(STORE_DISABLED))?;
    retention::run_prune(store.as_ref(), days).await
}
