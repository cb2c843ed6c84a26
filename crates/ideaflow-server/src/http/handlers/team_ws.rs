//! The per-team WebSocket channel.
//!
//! Bidirectional: clients send chat messages; the server relays them to
//! every team member and injects orchestrator progress notifications,
//! distinguished by the `type` tag on [`TeamMessage`].
//!
//! The bearer credential is verified at connect time. Rejections close
//! with policy-violation code 1008 and a reason that distinguishes invalid
//! from expired credentials; normal disconnects use the standard code.

use std::borrow::Cow;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use ideaflow_core::{TeamId, TeamMessage};

use crate::auth::AuthError;
use crate::broadcast::ChannelKey;
use crate::state::AppState;

/// Policy violation close code (RFC 6455).
const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct TeamChannelQuery {
    #[serde(default)]
    token: Option<String>,
}

/// GET /v1/teams/{team_id}/ws - upgrade to the team channel.
pub async fn team_channel(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
    Query(query): Query<TeamChannelQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, TeamId::new(team_id), query.token, socket))
}

async fn handle_socket(
    state: Arc<AppState>,
    team_id: TeamId,
    token: Option<String>,
    mut socket: WebSocket,
) {
    // Verify the bearer credential before joining the channel.
    let verdict = match token {
        Some(token) => state.verifier.verify(team_id.as_str(), &token),
        None => Err(AuthError::Invalid),
    };
    if let Err(e) = verdict {
        let reason = match e {
            AuthError::Invalid => "invalid credentials",
            AuthError::Expired => "expired credentials",
        };
        warn!(team_id = %team_id, reason, "Team channel connection rejected");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_POLICY_VIOLATION,
                reason: Cow::Borrowed(reason),
            })))
            .await;
        return;
    }

    let chat_tx = state.chat.sender(&team_id).await;
    let mut chat_rx = chat_tx.subscribe();
    let mut progress_rx = state
        .registry
        .subscribe(&ChannelKey::Team(team_id.clone()))
        .await;

    info!(team_id = %team_id, members = chat_tx.receiver_count(), "Team member connected");
    let _ = chat_tx.send(TeamMessage::UserJoined {
        active: chat_tx.receiver_count(),
    });

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        // Relay chat to the whole team, sender included.
                        let _ = chat_tx.send(TeamMessage::chat(text));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ping/pong handled by axum; binary ignored.
                    Some(Err(e)) => {
                        debug!(team_id = %team_id, error = %e, "Team socket error");
                        break;
                    }
                }
            }
            chat = chat_rx.recv() => {
                match chat {
                    Ok(message) => {
                        if forward(&mut ws_tx, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(team_id = %team_id, skipped, "Chat subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            progress = progress_rx.recv() => {
                match progress {
                    Ok(event) => {
                        if forward(&mut ws_tx, &TeamMessage::system(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(team_id = %team_id, skipped, "Progress subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Receiver count still includes this connection until chat_rx drops.
    let remaining = chat_tx.receiver_count().saturating_sub(1);
    drop(chat_rx);
    let _ = chat_tx.send(TeamMessage::UserLeft { active: remaining });
    info!(team_id = %team_id, remaining, "Team member disconnected");
}

async fn forward(
    ws_tx: &mut (impl SinkExt<Message> + Unpin),
    message: &TeamMessage,
) -> Result<(), ()> {
    let payload = serde_json::to_string(message).map_err(|_| ())?;
    ws_tx.send(Message::Text(payload)).await.map_err(|_| ())
}
