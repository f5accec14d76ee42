//! Tool routing: dispatch table, session context, ordering, and the
//! security scenarios that cross the wire boundary.

use serde_json::{json, Value};

use tmws_core::config::{Environment, TmwsConfig};
use tmws_server::{bootstrap, tools, transport, AppState};

const SESSION: &str = "test-session";

fn state() -> AppState {
    let config = TmwsConfig {
        database_url: "sqlite://:memory:".into(),
        secret_key: "kR8mX2vQ9pL4nW7jT3bY6hF1dS5gZ0cA".into(),
        environment: Environment::Development,
        agent_id: None,
        agent_namespace: None,
        agent_capabilities: serde_json::Map::new(),
        allow_default_agent: true,
        rate_limit_requests: 1_000,
        rate_limit_period_secs: 60,
        embedding_model: "hashed-term-v1".into(),
        vector_dimension: 64,
        log_level: None,
    };
    let state = bootstrap::build_state(config).expect("build state");
    let athena = state.registry.resolve("athena").expect("athena exists");
    state.sessions.create(SESSION, athena).expect("open session");
    state
}

fn call(state: &AppState, tool: &str, params: Value) -> Result<Value, tmws_core::TmwsError> {
    tools::dispatch(state, SESSION, tool, params)
}

#[test]
fn unknown_tools_are_rejected() {
    let state = state();
    let err = call(&state, "summon_demons", json!({})).unwrap_err();
    assert_eq!(err.code(), "ErrUnknownTool");
}

#[test]
fn get_agent_info_returns_current_record() {
    let state = state();
    let info = call(&state, "get_agent_info", Value::Null).unwrap();
    assert_eq!(info["agent_id"], json!("athena-conductor"));
}

#[test]
fn switch_agent_takes_effect_for_the_next_call() {
    let state = state();
    call(&state, "switch_agent", json!({"name": "artemis"})).unwrap();

    let current = call(&state, "get_current_agent", Value::Null).unwrap();
    assert_eq!(current["agent"]["agent_id"], json!("artemis-optimizer"));
    assert_eq!(current["history"], json!(["athena-conductor"]));
    assert_eq!(current["switch_count"], json!(1));
}

#[test]
fn switch_to_unknown_agent_errors_without_side_effects() {
    let state = state();
    let err = call(&state, "switch_agent", json!({"name": "poseidon"})).unwrap_err();
    assert_eq!(err.code(), "ErrUnknownAgent");

    let current = call(&state, "get_current_agent", Value::Null).unwrap();
    assert_eq!(current["agent"]["agent_id"], json!("athena-conductor"));
    assert_eq!(current["switch_count"], json!(0));
}

#[test]
fn execute_as_agent_scopes_ownership_and_restores() {
    let state = state();
    let created = call(
        &state,
        "execute_as_agent",
        json!({
            "name": "hestia",
            "action": "create_memory",
            "params": { "content": "scoped audit note" }
        }),
    )
    .unwrap();
    assert_eq!(created["owner_agent_id"], json!("hestia-auditor"));

    // The session's agent is untouched afterwards.
    let current = call(&state, "get_current_agent", Value::Null).unwrap();
    assert_eq!(current["agent"]["agent_id"], json!("athena-conductor"));
    assert_eq!(current["history"], json!([]));
}

#[test]
fn execute_as_agent_restores_after_failures() {
    let state = state();
    // Empty content fails validation inside the scoped call.
    let err = call(
        &state,
        "execute_as_agent",
        json!({
            "name": "hestia",
            "action": "create_memory",
            "params": { "content": "" }
        }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "ErrValidation");

    let current = call(&state, "get_current_agent", Value::Null).unwrap();
    assert_eq!(current["agent"]["agent_id"], json!("athena-conductor"));
}

#[test]
fn execute_as_agent_refuses_context_mutators() {
    let state = state();
    let err = call(
        &state,
        "execute_as_agent",
        json!({"name": "hestia", "action": "switch_agent", "params": {"name": "eris"}}),
    )
    .unwrap_err();
    assert_eq!(err.code(), "ErrValidation");
}

#[test]
fn create_then_search_through_the_tool_surface() {
    let state = state();
    let created = call(
        &state,
        "create_memory",
        json!({
            "content": "Project Apollo kickoff",
            "tags": ["project", "kickoff"],
            "importance": 0.8
        }),
    )
    .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let hits = call(
        &state,
        "search_memories",
        json!({"query": "apollo launch", "limit": 5}),
    )
    .unwrap();
    let hits = hits.as_array().unwrap();
    let hit = hits
        .iter()
        .find(|h| h["id"].as_str() == Some(id.as_str()))
        .expect("created memory in results");
    assert!(hit["similarity"].as_f64().unwrap() > 0.2);
}

#[test]
fn register_agent_rejects_injection_shapes() {
    let state = state();
    let err = call(
        &state,
        "register_agent",
        json!({"agent_name": "'; DROP TABLE agents; --"}),
    )
    .unwrap_err();
    assert_eq!(err.code(), "ErrValidation");

    // The catalogue is intact: built-ins still list.
    let listing = call(&state, "list_trinitas_agents", Value::Null).unwrap();
    assert_eq!(listing["builtins"].as_array().unwrap().len(), 6);
}

#[test]
fn register_agent_caps_access_at_the_callers_level() {
    let state = state();
    call(&state, "switch_agent", json!({"name": "muses"})).unwrap();

    let err = call(
        &state,
        "register_agent",
        json!({"agent_name": "sneaky-admin", "access_level": "admin"}),
    )
    .unwrap_err();
    assert_eq!(err.code(), "ErrPermission");
}

#[test]
fn unregister_builtin_is_denied() {
    let state = state();
    let err = call(&state, "unregister_agent", json!({"name": "athena"})).unwrap_err();
    assert_eq!(err.code(), "ErrPermission");
}

#[test]
fn profile_tools_refuse_traversal_paths() {
    let state = state();
    for tool in ["load_agent_profiles", "save_agent_profiles"] {
        let err = call(&state, tool, json!({"path": "../../etc/passwd"})).unwrap_err();
        assert_eq!(err.code(), "ErrValidation", "{tool}");
    }
}

#[test]
fn unknown_params_are_rejected_at_the_wire() {
    let state = state();
    let err = call(
        &state,
        "create_memory",
        json!({"content": "x", "surprise_field": true}),
    )
    .unwrap_err();
    assert_eq!(err.code(), "ErrValidation");
}

#[tokio::test]
async fn frames_answer_in_request_order_with_matching_ids() {
    let state = state();
    let first = transport::handle_frame(
        state.clone(),
        SESSION.to_string(),
        json!({"id": 1, "tool": "create_memory", "params": {"content": "ordered one"}})
            .to_string(),
    )
    .await;
    let second = transport::handle_frame(
        state.clone(),
        SESSION.to_string(),
        json!({"id": 2, "tool": "get_current_agent"}).to_string(),
    )
    .await;

    assert_eq!(first["id"], json!(1));
    assert!(first.get("result").is_some());
    assert_eq!(second["id"], json!(2));
}

#[tokio::test]
async fn malformed_frames_answer_with_null_id_errors() {
    let state = state();
    let reply = transport::handle_frame(
        state.clone(),
        SESSION.to_string(),
        "this is not json".to_string(),
    )
    .await;
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], json!("ErrValidation"));
}

#[tokio::test]
async fn rate_limit_errors_carry_retry_after_on_the_wire() {
    let config_limited = TmwsConfig {
        database_url: "sqlite://:memory:".into(),
        secret_key: "kR8mX2vQ9pL4nW7jT3bY6hF1dS5gZ0cA".into(),
        environment: Environment::Development,
        agent_id: None,
        agent_namespace: None,
        agent_capabilities: serde_json::Map::new(),
        allow_default_agent: true,
        rate_limit_requests: 2,
        rate_limit_period_secs: 60,
        embedding_model: "hashed-term-v1".into(),
        vector_dimension: 64,
        log_level: None,
    };
    let state = bootstrap::build_state(config_limited).expect("build state");
    let athena = state.registry.resolve("athena").unwrap();
    state.sessions.create(SESSION, athena).unwrap();

    for i in 0..2 {
        let reply = transport::handle_frame(
            state.clone(),
            SESSION.to_string(),
            json!({"id": i, "tool": "recall_memories", "params": {}}).to_string(),
        )
        .await;
        assert!(reply.get("result").is_some(), "request {i} should pass");
    }

    let reply = transport::handle_frame(
        state.clone(),
        SESSION.to_string(),
        json!({"id": 99, "tool": "recall_memories", "params": {}}).to_string(),
    )
    .await;
    assert_eq!(reply["error"]["code"], json!("ErrRateLimited"));
    assert!(reply["error"]["retry_after"].as_u64().unwrap() <= 60);
}
