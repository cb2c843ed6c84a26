//! HTTP surface of the orchestrator.
//!
//! Provides:
//! - Workflow submission, synchronous or streamed over SSE (`/v1/workflows`)
//! - Candidate matching (`/v1/matches`)
//! - Conversation history retrieval (`/v1/conversations/{id}/history`)
//! - The per-team WebSocket channel (`/v1/teams/{team_id}/ws`)
//! - Health check (`/health`)

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/workflows", post(handlers::submit_workflow))
        .route("/v1/workflows/stream", get(handlers::stream_workflow))
        .route("/v1/matches", get(handlers::find_matches))
        .route(
            "/v1/conversations/:conversation_id/history",
            get(handlers::conversation_history),
        )
        .route("/v1/teams/:team_id/ws", get(handlers::team_channel))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API errors with typed codes and a JSON envelope.
#[derive(Debug)]
pub enum ApiError {
    /// Input rejected before any work started.
    Validation { message: String },
    /// The requested resource does not exist.
    NotFound { message: String },
    /// The run was aborted before producing a result.
    Internal { message: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    code: &'static str,
}

impl From<ideaflow_core::CoreError> for ApiError {
    fn from(e: ideaflow_core::CoreError) -> Self {
        use ideaflow_core::CoreError;
        match e {
            CoreError::InvalidInput(message) => ApiError::Validation { message },
            CoreError::ConversationNotFound(message) => ApiError::NotFound {
                message: format!("no history for conversation {}", message),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Validation { message } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
            }
            ApiError::NotFound { message } => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Internal { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        let body = ErrorBody {
            error: ErrorDetail { message, code },
        };
        (status, Json(body)).into_response()
    }
}
