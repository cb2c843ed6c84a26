//! Workflow submission handlers: synchronous and SSE-streamed.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use ideaflow_core::{ConversationId, ProgressEvent, ProgressEventType, TeamId};

use crate::broadcast::ChannelKey;
use crate::http::ApiError;
use crate::orchestrator::OrchestratorError;
use crate::state::AppState;

fn default_conversation() -> String {
    "default".to_string()
}

fn default_team() -> String {
    "default".to_string()
}

/// Request body for POST /v1/workflows.
#[derive(Debug, Deserialize)]
pub struct SubmitWorkflowRequest {
    /// Raw natural-language description of the startup idea.
    pub raw_idea: String,
    /// Conversation session id (enables memory across invocations).
    #[serde(default = "default_conversation")]
    pub conversation_id: String,
    /// Team identifier for collaboration notifications.
    #[serde(default = "default_team")]
    pub team_id: String,
    /// Stream progress over SSE instead of waiting for the final result.
    #[serde(default)]
    pub stream: bool,
}

/// Query parameters for GET /v1/workflows/stream (EventSource cannot POST).
#[derive(Debug, Deserialize)]
pub struct StreamWorkflowQuery {
    pub raw_idea: String,
    #[serde(default = "default_conversation")]
    pub conversation_id: String,
    #[serde(default = "default_team")]
    pub team_id: String,
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Validation(message) => ApiError::Validation { message },
            OrchestratorError::Aborted(message) => ApiError::Internal { message },
        }
    }
}

/// POST /v1/workflows - submit an idea for orchestration.
pub async fn submit_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitWorkflowRequest>,
) -> Response {
    info!(
        conversation_id = %req.conversation_id,
        team_id = %req.team_id,
        stream = req.stream,
        "Workflow submission received"
    );

    let conversation_id = ConversationId::new(req.conversation_id);
    let team_id = TeamId::new(req.team_id);

    if req.stream {
        return start_streaming(state, &req.raw_idea, conversation_id, team_id)
            .await
            .into_response();
    }

    match Arc::clone(&state.orchestrator).start(&req.raw_idea, conversation_id, team_id) {
        Ok(handle) => match handle.wait().await {
            Ok(result) => Json(result).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        },
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET /v1/workflows/stream - browser-friendly SSE submission.
pub async fn stream_workflow(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamWorkflowQuery>,
) -> Response {
    let conversation_id = ConversationId::new(query.conversation_id);
    let team_id = TeamId::new(query.team_id);
    start_streaming(state, &query.raw_idea, conversation_id, team_id)
        .await
        .into_response()
}

type SseEventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

async fn start_streaming(
    state: Arc<AppState>,
    raw_idea: &str,
    conversation_id: ConversationId,
    team_id: TeamId,
) -> Result<Sse<SseEventStream>, ApiError> {
    // Subscribe before starting so no early event is missed.
    let receiver = state
        .registry
        .subscribe(&ChannelKey::Conversation(conversation_id.clone()))
        .await;

    let handle = Arc::clone(&state.orchestrator)
        .start(raw_idea, conversation_id, team_id)
        .map_err(ApiError::from)?;

    let accepted = Event::default()
        .event("workflow.accepted")
        .json_data(serde_json::json!({ "run_id": handle.run_id }))
        .unwrap_or_default();
    let initial = stream::once(async move { Ok::<_, Infallible>(accepted) });

    let events = stream::unfold(
        (receiver, false),
        |(mut receiver, terminated)| async move {
            if terminated {
                return None;
            }
            match receiver.recv().await {
                Ok(event) => {
                    let is_terminal = matches!(
                        event.event_type,
                        ProgressEventType::RunCompleted | ProgressEventType::RunFailed
                    );
                    Some((progress_to_sse(&event), (receiver, is_terminal)))
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE subscriber lagged, events dropped");
                    Some((
                        Ok(Event::default().comment(format!("skipped {} events", skipped))),
                        (receiver, false),
                    ))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            }
        },
    );

    let stream: SseEventStream = Box::pin(initial.chain(events));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn progress_to_sse(event: &ProgressEvent) -> Result<Event, Infallible> {
    let name = match event.event_type {
        ProgressEventType::RunStarted => "run.started",
        ProgressEventType::StageStarted => "stage.started",
        ProgressEventType::StageCompleted => "stage.completed",
        ProgressEventType::StageError => "stage.error",
        ProgressEventType::RunCompleted => "run.completed",
        ProgressEventType::RunFailed => "run.failed",
    };
    Ok(Event::default()
        .event(name)
        .json_data(event)
        .unwrap_or_default())
}
