//! Health check handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health - liveness and a few cheap gauges.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "conversations": state.store.conversation_count().await,
        "live_channels": state.registry.channel_count().await,
    }))
}
