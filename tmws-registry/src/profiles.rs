//! Custom-agent profile files.
//!
//! JSON documents loaded from a fixed search path at startup, or through
//! the `save_agent_profiles`/`load_agent_profiles` tools — in which case
//! the path must clear the §validation allowlist first. Unknown fields are
//! ignored; one invalid entry rejects the whole file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tmws_core::constants::{MAX_PROFILE_FILE_BYTES, MAX_PROFILE_AGENTS};
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{AccessLevel, Agent, AgentType};
use tmws_core::validation::validate_config_content;

use crate::registry::AgentSpec;

/// On-disk document shape. serde ignores unknown fields by default, which
/// is exactly the contract for config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub custom_agents: Vec<ProfileEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    pub full_id: String,
    #[serde(default = "default_entry_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub access_level: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_entry_namespace() -> String {
    tmws_core::constants::DEFAULT_NAMESPACE.to_string()
}

impl ProfileEntry {
    /// Convert to a registration spec. Profile access levels use a looser
    /// vocabulary ("team" appears in the wild); anything that isn't one of
    /// the five agent levels maps to `standard`.
    fn to_spec(&self) -> AgentSpec {
        let mut capabilities = serde_json::Map::new();
        for cap in &self.capabilities {
            capabilities.insert(cap.clone(), serde_json::Value::Bool(true));
        }
        for (key, value) in &self.metadata {
            capabilities.entry(key.clone()).or_insert_with(|| value.clone());
        }
        AgentSpec {
            agent_id: self.full_id.clone(),
            display_name: if self.display_name.is_empty() {
                self.name.clone()
            } else {
                self.display_name.clone()
            },
            agent_type: AgentType::CustomAgent,
            namespace: self.namespace.clone(),
            capabilities,
            access_level: AccessLevel::parse(&self.access_level).unwrap_or(AccessLevel::Standard),
        }
    }
}

/// Search order for the startup profile file.
pub fn discover_profile_path() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("./custom_agents.json")];
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".tmws/custom_agents.json"));
    }
    candidates.push(PathBuf::from("/etc/tmws/custom_agents.json"));
    candidates.into_iter().find(|p| p.is_file())
}

/// Load and validate a profile file. The path is expected to be
/// allowlist-checked by the caller when it came off the wire.
pub fn load_profiles(path: &Path) -> TmwsResult<Vec<AgentSpec>> {
    let meta = std::fs::metadata(path)
        .map_err(|_| TmwsError::validation("profile file does not exist"))?;
    if meta.len() > MAX_PROFILE_FILE_BYTES {
        return Err(TmwsError::Validation {
            reason: format!("profile file exceeds {MAX_PROFILE_FILE_BYTES} bytes"),
        });
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| TmwsError::validation(format!("profile file unreadable: {e}")))?;
    let doc: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| TmwsError::validation(format!("profile file is not valid JSON: {e}")))?;

    // Structural checks (ids, namespaces, entry count) before typed parse.
    validate_config_content(&doc)?;

    let parsed: ProfileDocument = serde_json::from_value(doc)
        .map_err(|e| TmwsError::validation(format!("profile document malformed: {e}")))?;
    if parsed.custom_agents.len() > MAX_PROFILE_AGENTS {
        return Err(TmwsError::Validation {
            reason: format!("profile document exceeds {MAX_PROFILE_AGENTS} agents"),
        });
    }

    Ok(parsed.custom_agents.iter().map(ProfileEntry::to_spec).collect())
}

/// Write the given agents out as a profile document.
pub fn save_profiles(path: &Path, agents: &[Agent]) -> TmwsResult<()> {
    let entries: Vec<ProfileEntry> = agents
        .iter()
        .map(|a| ProfileEntry {
            name: a.agent_id.clone(),
            full_id: a.agent_id.clone(),
            namespace: a.namespace.clone(),
            display_name: a.display_name.clone(),
            access_level: a.access_level.as_str().to_string(),
            capabilities: a
                .capabilities
                .iter()
                .filter(|(_, v)| v.as_bool() == Some(true))
                .map(|(k, _)| k.clone())
                .collect(),
            metadata: serde_json::Map::new(),
        })
        .collect();

    let doc = ProfileDocument {
        version: default_version(),
        custom_agents: entries,
    };
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| TmwsError::internal(format!("serialize profiles: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| TmwsError::validation(format!("profile file unwritable: {e}")))?;
    tracing::info!(path = %path.display(), count = agents.len(), "agent profiles saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmws_core::models::AccessLevel;

    #[test]
    fn load_round_trips_through_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom_agents.json");

        let mut agent = Agent::new(
            "helper-bot",
            "Helper",
            AgentType::CustomAgent,
            "default",
            AccessLevel::Standard,
        );
        agent
            .capabilities
            .insert("review".into(), serde_json::Value::Bool(true));
        save_profiles(&path, &[agent]).unwrap();

        let specs = load_profiles(&path).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].agent_id, "helper-bot");
        assert_eq!(specs[0].display_name, "Helper");
        assert!(specs[0].capabilities.contains_key("review"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom_agents.json");
        std::fs::write(
            &path,
            r#"{
                "version": "1.0",
                "future_field": {"nested": true},
                "custom_agents": [
                    {"name": "spec-bot", "full_id": "spec-bot", "surprise": 42}
                ]
            }"#,
        )
        .unwrap();

        let specs = load_profiles(&path).unwrap();
        assert_eq!(specs[0].agent_id, "spec-bot");
    }

    #[test]
    fn one_invalid_entry_rejects_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom_agents.json");
        std::fs::write(
            &path,
            r#"{
                "custom_agents": [
                    {"name": "good-bot", "full_id": "good-bot"},
                    {"name": "'; DROP TABLE agents; --", "full_id": "evil-bot"}
                ]
            }"#,
        )
        .unwrap();

        let err = load_profiles(&path).unwrap_err();
        assert_eq!(err.code(), "ErrValidation");
    }

    #[test]
    fn loose_access_levels_default_to_standard() {
        let entry = ProfileEntry {
            name: "loose".into(),
            full_id: "loose-bot".into(),
            namespace: "default".into(),
            display_name: String::new(),
            access_level: "team".into(),
            capabilities: vec![],
            metadata: serde_json::Map::new(),
        };
        assert_eq!(entry.to_spec().access_level, AccessLevel::Standard);
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        assert!(load_profiles(Path::new("/nonexistent/profiles.json")).is_err());
    }
}
