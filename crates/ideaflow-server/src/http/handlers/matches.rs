//! Candidate matching handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use ideaflow_core::{CandidateId, CoreError};

use crate::http::ApiError;
use crate::orchestrator::MIN_IDEA_LEN;
use crate::state::AppState;

fn default_top_k() -> usize {
    10
}

/// Query parameters for GET /v1/matches.
#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    /// Idea text to match collaborators against.
    pub idea: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidate id to leave out (typically the requester).
    #[serde(default)]
    pub exclude_id: Option<String>,
}

/// GET /v1/matches - ranked collaborator matches for an idea.
pub async fn find_matches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchQuery>,
) -> Response {
    let idea = query.idea.trim();
    if idea.len() < MIN_IDEA_LEN {
        let err = CoreError::InvalidInput(format!(
            "idea must be at least {} characters",
            MIN_IDEA_LEN
        ));
        return ApiError::from(err).into_response();
    }

    let exclude = query.exclude_id.map(CandidateId::new);
    let matches = state
        .engine
        .find_matches(idea, query.top_k, exclude.as_ref())
        .await;

    info!(
        top_k = query.top_k,
        returned = matches.len(),
        "Match request served"
    );
    Json(matches).into_response()
}
