//! Transports: stdio, WebSocket, and HTTP REST, all funnelling into the
//! same dispatch path.

pub mod http;
pub mod stdio;
pub mod ws;

use std::time::Duration;

use serde_json::Value;

use tmws_core::constants::REQUEST_DEADLINE_SECS;
use tmws_core::errors::TmwsError;

use crate::protocol;
use crate::state::AppState;
use crate::tools;

/// Process one raw frame: parse, dispatch under the request deadline, and
/// produce the response frame. Handler work runs on a blocking thread so
/// the session task stays responsive to cancellation.
pub async fn handle_frame(state: AppState, session_id: String, frame: String) -> Value {
    let request = match protocol::parse_request(&frame) {
        Ok(request) => request,
        Err(err) => return protocol::error_response(&Value::Null, &err),
    };
    let id = request.id.clone();

    let outcome = tokio::time::timeout(
        Duration::from_secs(REQUEST_DEADLINE_SECS),
        tokio::task::spawn_blocking(move || {
            tools::dispatch(&state, &session_id, &request.tool, request.params)
        }),
    )
    .await;

    match outcome {
        Err(_) => protocol::error_response(
            &id,
            &TmwsError::Timeout { seconds: REQUEST_DEADLINE_SECS },
        ),
        Ok(Err(join_err)) => {
            tracing::error!(error = %join_err, "tool handler panicked");
            protocol::error_response(&id, &TmwsError::internal("handler failure"))
        }
        Ok(Ok(Ok(result))) => protocol::ok_response(&id, result),
        Ok(Ok(Err(err))) => {
            match &err {
                TmwsError::Storage { message } => {
                    tracing::error!(error = %message, "storage failure surfaced to client")
                }
                TmwsError::Internal { context } => {
                    tracing::error!(error = %context, "internal failure surfaced to client")
                }
                _ => {}
            }
            protocol::error_response(&id, &err)
        }
    }
}
