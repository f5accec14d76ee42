//! The tool surface: a static `{name → handler}` table populated at
//! startup. Handlers take the shared state, the calling session, and raw
//! JSON params; they parse into typed structs and delegate to the service
//! and registry.

pub mod agents;
pub mod memory;
pub mod profiles;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde_json::Value;

use tmws_core::errors::{TmwsError, TmwsResult};

use crate::state::AppState;

/// A tool handler. Synchronous: all underlying work (SQLite, hashing)
/// completes without suspension, and the transports run handlers on
/// blocking threads under the request deadline.
pub type Handler = fn(&AppState, &str, Value) -> TmwsResult<Value>;

fn table() -> &'static HashMap<&'static str, Handler> {
    static TABLE: OnceLock<HashMap<&'static str, Handler>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t: HashMap<&'static str, Handler> = HashMap::new();
        t.insert("get_agent_info", agents::get_agent_info);
        t.insert("get_current_agent", agents::get_current_agent);
        t.insert("switch_agent", agents::switch_agent);
        t.insert("execute_as_agent", agents::execute_as_agent);
        t.insert("list_trinitas_agents", agents::list_trinitas_agents);
        t.insert("register_agent", agents::register_agent);
        t.insert("unregister_agent", agents::unregister_agent);
        t.insert("list_agents", agents::list_agents);
        t.insert("get_agent_statistics", agents::get_agent_statistics);
        t.insert("create_memory", memory::create_memory);
        t.insert("search_memories", memory::search_memories);
        t.insert("share_memory", memory::share_memory);
        t.insert("update_memory", memory::update_memory);
        t.insert("delete_memory", memory::delete_memory);
        t.insert("recall_memories", memory::recall_memories);
        t.insert("save_agent_profiles", profiles::save_agent_profiles);
        t.insert("load_agent_profiles", profiles::load_agent_profiles);
        t
    })
}

/// Route one tool call. Unknown names are `ErrUnknownTool`; everything
/// else is the handler's result.
pub fn dispatch(state: &AppState, session_id: &str, tool: &str, params: Value) -> TmwsResult<Value> {
    let handler = table()
        .get(tool)
        .ok_or_else(|| TmwsError::UnknownTool { name: tool.to_string() })?;

    state.sessions.with_context(session_id, |ctx| ctx.touch())?;
    let started = std::time::Instant::now();
    let result = handler(state, session_id, params);
    tracing::debug!(
        tool,
        session_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "tool dispatched"
    );
    result
}

/// Whether `tool` exists at all (used by `execute_as_agent`).
pub fn is_known_tool(tool: &str) -> bool {
    table().contains_key(tool)
}

/// Parse tool params into a typed struct. `null` means "no params".
pub(crate) fn parse_params<P: DeserializeOwned>(params: Value) -> TmwsResult<P> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| TmwsError::validation(format!("invalid tool params: {e}")))
}

/// Serialize a handler result onto the wire.
pub(crate) fn to_value<T: serde::Serialize>(value: &T) -> TmwsResult<Value> {
    serde_json::to_value(value).map_err(|e| TmwsError::internal(format!("serialize result: {e}")))
}
