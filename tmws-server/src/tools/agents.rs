//! Agent-facing tools: identity, switching, registration, listings.

use serde::Deserialize;
use serde_json::{json, Value};

use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{AccessLevel, AgentType};
use tmws_registry::AgentSpec;

use crate::state::AppState;

use super::{parse_params, to_value};

/// Current agent record.
pub fn get_agent_info(state: &AppState, session_id: &str, _params: Value) -> TmwsResult<Value> {
    let agent = state.sessions.current_agent(session_id)?;
    to_value(&agent)
}

/// Current agent plus the last five prior agents on this session.
pub fn get_current_agent(state: &AppState, session_id: &str, _params: Value) -> TmwsResult<Value> {
    state.sessions.with_context(session_id, |ctx| {
        Ok(json!({
            "agent": serde_json::to_value(ctx.current())
                .map_err(|e| TmwsError::internal(e.to_string()))?,
            "history": ctx.recent_history(5),
            "switch_count": ctx.switch_count,
        }))
    })?
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SwitchAgentParams {
    name: String,
}

/// Replace the session's current agent. Unknown names error; switching
/// never auto-registers.
pub fn switch_agent(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: SwitchAgentParams = parse_params(params)?;
    let agent = state.registry.resolve(&params.name)?;
    let _ = state.registry.touch(&agent.agent_id);
    state.sessions.with_context(session_id, |ctx| {
        ctx.switch(agent.clone());
        Ok(json!({
            "agent": serde_json::to_value(&agent)
                .map_err(|e| TmwsError::internal(e.to_string()))?,
            "switch_count": ctx.switch_count,
        }))
    })?
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteAsParams {
    name: String,
    action: String,
    #[serde(default)]
    params: Value,
}

/// Run one tool call as another agent, restoring the session's agent on
/// every exit path. Context-mutating tools cannot be nested.
pub fn execute_as_agent(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: ExecuteAsParams = parse_params(params)?;
    if matches!(params.action.as_str(), "execute_as_agent" | "switch_agent") {
        return Err(TmwsError::validation(format!(
            "action {:?} cannot run under execute_as_agent",
            params.action
        )));
    }
    if !super::is_known_tool(&params.action) {
        return Err(TmwsError::UnknownTool { name: params.action });
    }

    let target = state.registry.resolve(&params.name)?;
    let prior = state
        .sessions
        .with_context(session_id, |ctx| ctx.swap(target))?;

    // The swap above released the session entry, so the nested dispatch
    // can take it again. Restore before surfacing the result.
    let result = super::dispatch(state, session_id, &params.action, params.params);
    state
        .sessions
        .with_context(session_id, |ctx| ctx.restore(prior))?;
    result
}

/// Built-ins plus registered agents.
pub fn list_trinitas_agents(state: &AppState, _session_id: &str, _params: Value) -> TmwsResult<Value> {
    let builtins = state.registry.builtins();
    let registered: Vec<_> = state
        .registry
        .list(None, None)
        .into_iter()
        .filter(|a| !tmws_registry::is_builtin(&a.agent_id))
        .collect();
    Ok(json!({
        "builtins": serde_json::to_value(&builtins)
            .map_err(|e| TmwsError::internal(e.to_string()))?,
        "registered": serde_json::to_value(&registered)
            .map_err(|e| TmwsError::internal(e.to_string()))?,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterAgentParams {
    #[serde(alias = "agent_id")]
    agent_name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    agent_type: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    capabilities: serde_json::Map<String, Value>,
    #[serde(default)]
    access_level: Option<String>,
    #[serde(default)]
    persist: bool,
}

/// Register a new agent. Callers cannot mint agents above their own
/// access level.
pub fn register_agent(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: RegisterAgentParams = parse_params(params)?;
    let caller = state.sessions.current_agent(session_id)?;

    let access_level = match params.access_level.as_deref() {
        None => AccessLevel::Standard,
        Some(raw) => AccessLevel::parse(raw)
            .ok_or_else(|| TmwsError::validation(format!("unknown access level {raw:?}")))?,
    };
    if access_level > caller.access_level {
        return Err(TmwsError::Permission {
            reason: "cannot register an agent above your own access level".into(),
        });
    }

    let spec = AgentSpec {
        display_name: params
            .display_name
            .unwrap_or_else(|| params.agent_name.clone()),
        agent_id: params.agent_name,
        agent_type: params
            .agent_type
            .as_deref()
            .map(AgentType::parse)
            .unwrap_or_default(),
        namespace: params
            .namespace
            .unwrap_or_else(|| tmws_core::constants::DEFAULT_NAMESPACE.to_string()),
        capabilities: params.capabilities,
        access_level,
    };
    let agent = state.registry.register(spec, params.persist)?;
    to_value(&agent)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnregisterAgentParams {
    name: String,
}

pub fn unregister_agent(state: &AppState, _session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: UnregisterAgentParams = parse_params(params)?;
    state.registry.unregister(&params.name)?;
    Ok(json!({ "unregistered": params.name }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListAgentsParams {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    agent_type: Option<String>,
}

pub fn list_agents(state: &AppState, _session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: ListAgentsParams = parse_params(params)?;
    let agent_type = params.agent_type.as_deref().map(AgentType::parse);
    let agents = state.registry.list(params.namespace.as_deref(), agent_type);
    to_value(&agents)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatisticsParams {
    #[serde(default)]
    agent_id: Option<String>,
}

pub fn get_agent_statistics(state: &AppState, session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: StatisticsParams = parse_params(params)?;
    let caller = state.sessions.current_agent(session_id)?;
    let stats = state
        .service
        .agent_statistics(&caller, params.agent_id.as_deref())?;
    to_value(&stats)
}
