//! Memory tools, all delegating to the service façade.

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{MemoryPatch, SharePermission};
use tmws_service::{CreateMemoryRequest, RecallRequest, SearchRequest};

use crate::state::AppState;

use super::{parse_params, to_value};

pub fn create_memory(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let request: CreateMemoryRequest = parse_params(params)?;
    let agent = state.sessions.current_agent(session_id)?;
    let memory = state.service.create_memory(&agent, request)?;
    to_value(&memory)
}

pub fn search_memories(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let request: SearchRequest = parse_params(params)?;
    let agent = state.sessions.current_agent(session_id)?;
    let hits = state.service.search_memories(&agent, request)?;
    to_value(&hits)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShareMemoryParams {
    memory_id: Uuid,
    #[serde(alias = "share_with", default)]
    grantees: Vec<String>,
    #[serde(default)]
    permission: Option<String>,
}

pub fn share_memory(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: ShareMemoryParams = parse_params(params)?;
    let permission = match params.permission.as_deref() {
        None => SharePermission::Read,
        Some(raw) => SharePermission::parse(raw)
            .ok_or_else(|| TmwsError::validation(format!("unknown permission {raw:?}")))?,
    };
    let agent = state.sessions.current_agent(session_id)?;
    let memory = state
        .service
        .share_memory(&agent, params.memory_id, &params.grantees, permission)?;
    to_value(&memory)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateMemoryParams {
    memory_id: Uuid,
    patch: MemoryPatch,
}

pub fn update_memory(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: UpdateMemoryParams = parse_params(params)?;
    let agent = state.sessions.current_agent(session_id)?;
    let memory = state
        .service
        .update_memory(&agent, params.memory_id, params.patch)?;
    to_value(&memory)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteMemoryParams {
    memory_id: Uuid,
    #[serde(default)]
    hard: bool,
}

pub fn delete_memory(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: DeleteMemoryParams = parse_params(params)?;
    let agent = state.sessions.current_agent(session_id)?;
    state
        .service
        .delete_memory(&agent, params.memory_id, params.hard)?;
    Ok(json!({ "deleted": params.memory_id, "hard": params.hard }))
}

pub fn recall_memories(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let request: RecallRequest = parse_params(params)?;
    let agent = state.sessions.current_agent(session_id)?;
    let memories = state.service.recall(&agent, request)?;
    to_value(&memories)
}
