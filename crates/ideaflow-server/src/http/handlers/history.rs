//! Conversation history handler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use ideaflow_core::{ConversationId, CoreError};

use crate::http::ApiError;
use crate::state::AppState;

/// GET /v1/conversations/{id}/history - ordered stage-record history.
pub async fn conversation_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Response {
    let conversation_id = ConversationId::new(conversation_id);
    let history = state.store.history(&conversation_id).await;
    if history.is_empty() {
        let err = CoreError::ConversationNotFound(conversation_id.into_inner());
        return ApiError::from(err).into_response();
    }
    Json(history).into_response()
}
