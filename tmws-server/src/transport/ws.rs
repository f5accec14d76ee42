//! WebSocket transport at `/ws/mcp`: many concurrent sessions, one task
//! per connection, frames processed in arrival order.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use tmws_core::constants::SESSION_IDLE_TIMEOUT_SECS;
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::Agent;

use crate::protocol;
use crate::state::AppState;
use crate::transport::handle_frame;

#[derive(Debug, Deserialize)]
pub struct WsAuth {
    pub agent_id: Option<String>,
    pub token: Option<String>,
}

/// GET /ws/mcp — authenticate, then upgrade.
///
/// Production requires `agent_id` + a valid signed `token`; development
/// accepts an asserted `agent_id` or falls back to the default principal.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
) -> impl IntoResponse {
    let agent = match authenticate(&state, &auth) {
        Ok(agent) => agent,
        Err(err) => {
            tracing::warn!(error = %err, "websocket authentication refused");
            return (StatusCode::UNAUTHORIZED, err.wire_message()).into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent))
        .into_response()
}

/// Resolve the session principal from the query parameters.
pub(crate) fn authenticate(state: &AppState, auth: &WsAuth) -> TmwsResult<Agent> {
    match (&auth.agent_id, &auth.token) {
        (Some(agent_id), Some(token)) => {
            let agent = state.registry.resolve(agent_id)?;
            if !state.verify_token(agent_id, token) {
                return Err(TmwsError::Permission { reason: "invalid session token".into() });
            }
            Ok(agent)
        }
        (Some(agent_id), None) if !state.config.environment.is_production() => {
            state.registry.resolve(agent_id)
        }
        (None, _) if !state.config.environment.is_production() => {
            state.default_session_agent()
        }
        _ => Err(TmwsError::Permission {
            reason: "authentication required".into(),
        }),
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, agent: Agent) {
    let session_id = Uuid::new_v4().to_string();
    if let Err(err) = state.sessions.create(&session_id, agent) {
        tracing::warn!(error = %err, "refusing websocket session");
        let frame = protocol::error_response(&serde_json::Value::Null, &err);
        let _ = socket.send(Message::Text(frame.to_string())).await;
        return;
    }
    tracing::info!(session_id = %session_id, sessions = state.sessions.count(),
        "websocket session opened");

    let idle = std::time::Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS);
    loop {
        let received = match tokio::time::timeout(idle, socket.recv()).await {
            Err(_) => {
                let note = protocol::notification("session_expired", serde_json::json!({
                    "idle_secs": SESSION_IDLE_TIMEOUT_SECS,
                }));
                let _ = socket.send(Message::Text(note.to_string())).await;
                break;
            }
            Ok(received) => received,
        };

        match received {
            None => break,
            Some(Err(err)) => {
                tracing::debug!(session_id = %session_id, error = %err, "websocket read error");
                break;
            }
            Some(Ok(Message::Text(text))) => {
                // One frame at a time: responses leave in request order.
                let response =
                    handle_frame(state.clone(), session_id.clone(), text).await;
                if socket.send(Message::Text(response.to_string())).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Ping(payload))) => {
                if socket.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => {
                // Binary and pong frames are not part of the protocol.
                let err = TmwsError::validation("only text frames are accepted");
                let frame = protocol::error_response(&serde_json::Value::Null, &err);
                if socket.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.sessions.remove(&session_id);
    tracing::info!(session_id = %session_id, "websocket session closed");
}
