//! Profile file tools. Every path off the wire clears the allowlist
//! before the filesystem is touched.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::validation::{default_path_allowlist, validate_file_path};
use tmws_registry::profiles;

use crate::state::AppState;

use super::parse_params;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfilePathParams {
    path: String,
}

/// Write the registered (non-built-in) agents to a profile file.
pub fn save_agent_profiles(state: &AppState, _session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: ProfilePathParams = parse_params(params)?;
    let path = validate_file_path(&PathBuf::from(&params.path), &default_path_allowlist())?;

    let agents: Vec<_> = state
        .registry
        .list(None, None)
        .into_iter()
        .filter(|a| !tmws_registry::is_builtin(&a.agent_id))
        .collect();
    profiles::save_profiles(&path, &agents)?;
    Ok(json!({ "saved": agents.len(), "path": path.display().to_string() }))
}

/// Load a profile file and register its agents. Entries whose ids already
/// exist are skipped, not overwritten.
pub fn load_agent_profiles(state: &AppState, _session_id: &str, params: Value) -> TmwsResult<Value> {
    let params: ProfilePathParams = parse_params(params)?;
    let path = validate_file_path(&PathBuf::from(&params.path), &default_path_allowlist())?;

    let specs = profiles::load_profiles(&path)?;
    let mut loaded = 0usize;
    let mut skipped = 0usize;
    for spec in specs {
        match state.registry.register(spec, true) {
            Ok(_) => loaded += 1,
            Err(TmwsError::DuplicateId { .. }) | Err(TmwsError::NameConflict { .. }) => {
                skipped += 1;
            }
            Err(other) => return Err(other),
        }
    }
    Ok(json!({ "loaded": loaded, "skipped": skipped }))
}
