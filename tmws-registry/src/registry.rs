//! The agent registry: built-ins + persisted agents + session-local
//! registrations, with cache coherence over the storage layer.

use std::sync::Arc;

use dashmap::DashMap;

use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{AccessLevel, Agent, AgentType};
use tmws_core::traits::IAgentStore;
use tmws_core::validation::{validate_agent_id, validate_namespace};
use tmws_storage::StorageEngine;

use crate::builtin::{find_builtin, is_builtin, TRINITAS_AGENTS};

/// Everything needed to register an agent.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AgentSpec {
    pub agent_id: String,
    pub display_name: String,
    #[serde(default)]
    pub agent_type: AgentType,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub capabilities: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub access_level: AccessLevel,
}

fn default_namespace() -> String {
    tmws_core::constants::DEFAULT_NAMESPACE.to_string()
}

/// Registry over the immutable built-in table plus a mutable map of
/// registered agents. Mutations go through `&self` methods that write
/// storage first and the cache second, so the cache never gets ahead of
/// the durable state.
pub struct AgentRegistry {
    storage: Arc<StorageEngine>,
    /// Registered agents by id. Ephemeral entries are present here but
    /// absent from storage.
    dynamic: DashMap<String, Agent>,
}

impl AgentRegistry {
    /// Build a registry, loading persisted agents from storage.
    pub fn new(storage: Arc<StorageEngine>) -> TmwsResult<Self> {
        let registry = Self {
            storage,
            dynamic: DashMap::new(),
        };
        for agent in registry.storage.list_agents(None, None)? {
            registry.dynamic.insert(agent.agent_id.clone(), agent);
        }
        tracing::info!(
            builtins = TRINITAS_AGENTS.len(),
            persisted = registry.dynamic.len(),
            "agent registry loaded"
        );
        Ok(registry)
    }

    /// Resolve a short alias or full id to an agent. Aliases win, then
    /// registered agents, then a storage read-through. Inactive agents do
    /// not resolve.
    pub fn resolve(&self, name_or_id: &str) -> TmwsResult<Agent> {
        if let Some(builtin) = find_builtin(name_or_id) {
            return Ok(builtin.to_agent());
        }
        if let Some(agent) = self.dynamic.get(name_or_id) {
            if agent.is_active {
                return Ok(agent.clone());
            }
            return Err(TmwsError::UnknownAgent { name: name_or_id.to_string() });
        }
        if let Some(agent) = self.storage.get_agent(name_or_id)? {
            if agent.is_active {
                self.dynamic.insert(agent.agent_id.clone(), agent.clone());
                return Ok(agent);
            }
        }
        Err(TmwsError::UnknownAgent { name: name_or_id.to_string() })
    }

    /// Register a new agent. `persist` controls whether the record outlives
    /// this process or stays session-local.
    pub fn register(&self, spec: AgentSpec, persist: bool) -> TmwsResult<Agent> {
        validate_agent_id(&spec.agent_id)?;
        validate_namespace(&spec.namespace)?;
        if spec.display_name.trim().is_empty() {
            return Err(TmwsError::validation("display_name is empty"));
        }
        // The system_agent type is reserved for the built-in catalogue;
        // minting one dynamically would bypass namespace reservation.
        if spec.agent_type == AgentType::SystemAgent {
            return Err(TmwsError::validation(
                "agent_type system_agent is reserved for built-in agents",
            ));
        }

        if is_builtin(&spec.agent_id) {
            return Err(TmwsError::NameConflict { name: spec.agent_id });
        }
        // An alias collision is a name conflict even for non-builtin ids.
        if TRINITAS_AGENTS.iter().any(|b| b.alias == spec.agent_id) {
            return Err(TmwsError::NameConflict { name: spec.agent_id });
        }
        if self.dynamic.contains_key(&spec.agent_id)
            || self.storage.get_agent(&spec.agent_id)?.is_some()
        {
            return Err(TmwsError::DuplicateId { id: spec.agent_id });
        }

        let mut agent = Agent::new(
            spec.agent_id,
            spec.display_name,
            spec.agent_type,
            spec.namespace,
            spec.access_level,
        );
        agent.capabilities = spec.capabilities;

        if persist {
            self.storage.upsert_agent(&agent)?;
        }
        self.dynamic.insert(agent.agent_id.clone(), agent.clone());

        tracing::info!(agent_id = %agent.agent_id, namespace = %agent.namespace,
            persist, "agent registered");
        Ok(agent)
    }

    /// Unregister an agent. Built-ins refuse; the record is archived, not
    /// deleted, and owned memories are left in place.
    pub fn unregister(&self, name_or_id: &str) -> TmwsResult<()> {
        if is_builtin(name_or_id) {
            return Err(TmwsError::Permission {
                reason: format!("built-in agent {name_or_id:?} cannot be unregistered"),
            });
        }
        let agent = self.resolve(name_or_id)?;
        // Deactivate durable records; ephemeral ones only live in the map.
        if self.storage.get_agent(&agent.agent_id)?.is_some() {
            self.storage.deactivate_agent(&agent.agent_id)?;
        }
        if let Some(mut entry) = self.dynamic.get_mut(&agent.agent_id) {
            entry.is_active = false;
        }
        tracing::info!(agent_id = %agent.agent_id, "agent unregistered");
        Ok(())
    }

    /// All visible agents: built-ins plus active registered agents, with
    /// optional namespace/type filters, ordered by `agent_id` ascending.
    pub fn list(
        &self,
        namespace: Option<&str>,
        agent_type: Option<AgentType>,
    ) -> Vec<Agent> {
        let mut agents: Vec<Agent> = TRINITAS_AGENTS.iter().map(|b| b.to_agent()).collect();
        for entry in self.dynamic.iter() {
            if entry.is_active {
                agents.push(entry.clone());
            }
        }
        agents.retain(|a| {
            namespace.map_or(true, |ns| a.namespace == ns)
                && agent_type.map_or(true, |ty| a.agent_type == ty)
        });
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        agents
    }

    /// Only the built-in catalogue, materialised.
    pub fn builtins(&self) -> Vec<Agent> {
        TRINITAS_AGENTS.iter().map(|b| b.to_agent()).collect()
    }

    /// Record activity for a persisted agent; built-ins and ephemeral
    /// agents track activity in-memory only.
    pub fn touch(&self, agent_id: &str) -> TmwsResult<()> {
        let now = chrono::Utc::now();
        if let Some(mut entry) = self.dynamic.get_mut(agent_id) {
            entry.last_activity = now;
        }
        if self.storage.get_agent(agent_id)?.is_some() {
            self.storage.touch_agent(agent_id, now)?;
        }
        Ok(())
    }
}
