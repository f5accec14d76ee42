//! HTTP REST subset: one request/response per tool call, no notifications.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use tmws_core::errors::{TmwsError, TmwsResult};

use crate::state::AppState;
use crate::transport::ws::{self, WsAuth};

/// Full HTTP router: the REST tool surface, the WebSocket upgrade path,
/// and a health probe.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/mcp", get(ws::ws_handler))
        .route("/api/tools/:tool", post(call_tool))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /api/tools/{tool} — run one tool call in an ephemeral session.
async fn call_tool(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    headers: HeaderMap,
    Json(params): Json<Value>,
) -> Response {
    let agent = match authenticate(&state, &headers) {
        Ok(agent) => agent,
        Err(err) => return error_reply(&err),
    };

    let session_id = format!("http-{}", Uuid::new_v4());
    if let Err(err) = state.sessions.create(&session_id, agent) {
        return error_reply(&err);
    }

    let frame = json!({ "id": 0, "tool": tool, "params": params }).to_string();
    let response = crate::transport::handle_frame(state.clone(), session_id.clone(), frame).await;
    state.sessions.remove(&session_id);

    if let Some(error) = response.get("error") {
        let status = status_for(error["code"].as_str().unwrap_or("ErrInternal"));
        return (status, Json(json!({ "error": error }))).into_response();
    }
    Json(json!({ "result": response["result"] })).into_response()
}

/// Liveness + storage accounting.
async fn health(State(state): State<AppState>) -> Response {
    match state.service.storage().storage_health() {
        Ok(health) => Json(json!({
            "status": "ok",
            "sessions": state.sessions.count(),
            "storage": health,
        }))
        .into_response(),
        Err(err) => error_reply(&err),
    }
}

/// Header-based authentication mirroring the WebSocket query scheme.
fn authenticate(state: &AppState, headers: &HeaderMap) -> TmwsResult<tmws_core::models::Agent> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    ws::authenticate(
        state,
        &WsAuth {
            agent_id: header("x-tmws-agent"),
            token: header("x-tmws-token"),
        },
    )
}

fn error_reply(err: &TmwsError) -> Response {
    let body = json!({ "error": { "code": err.code(), "message": err.wire_message() } });
    (status_for(err.code()), Json(body)).into_response()
}

/// Map stable error codes onto HTTP statuses.
fn status_for(code: &str) -> StatusCode {
    match code {
        "ErrValidation" => StatusCode::BAD_REQUEST,
        "ErrPermission" => StatusCode::FORBIDDEN,
        "ErrRateLimited" => StatusCode::TOO_MANY_REQUESTS,
        "ErrNotFound" | "ErrUnknownAgent" | "ErrUnknownTool" => StatusCode::NOT_FOUND,
        "ErrNameConflict" | "ErrDuplicateId" => StatusCode::CONFLICT,
        "ErrEmbedder" | "ErrStorage" => StatusCode::SERVICE_UNAVAILABLE,
        "ErrTimeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
