use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe with hub counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.hub.stats().await {
        Ok(stats) => Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "git_sha": env!("PIPESOCK_GIT_SHA"),
            "subscribers": stats.subscribers,
            "history": stats.history,
            "pending": stats.pending,
            "flushes": stats.flushes,
        })),
        Err(e) => Json(json!({
            "status": "degraded",
            "version": env!("CARGO_PKG_VERSION"),
            "git_sha": env!("PIPESOCK_GIT_SHA"),
            "error": e.code(),
        })),
    }
}
