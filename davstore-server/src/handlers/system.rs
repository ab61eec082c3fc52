use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

// ── GET /api/health ──

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_s = state.started_at.elapsed().as_secs();
    let root = state.storage.root_prefix().to_string();
    match state.storage.exists("", Some(&root)).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "webdav": "ok", "uptime_s": uptime_s })),
        ),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "degraded",
                "webdav": "unreachable",
                "uptime_s": uptime_s,
            })),
        ),
    }
}
