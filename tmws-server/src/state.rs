//! Shared server state handed to every transport and tool handler.

use std::sync::Arc;

use tmws_core::config::TmwsConfig;
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{AccessLevel, Agent, AgentType};
use tmws_registry::{AgentRegistry, AgentSpec};
use tmws_service::MemoryService;

use crate::session::SessionManager;

/// Name of the development fallback principal.
const DEFAULT_AGENT_ID: &str = "default-agent";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TmwsConfig>,
    pub service: Arc<MemoryService>,
    pub registry: Arc<AgentRegistry>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    /// The agent a fresh unauthenticated session starts as: the configured
    /// `TMWS_AGENT_ID`, or the development fallback when permitted.
    pub fn default_session_agent(&self) -> TmwsResult<Agent> {
        if let Some(id) = &self.config.agent_id {
            let mut agent = self.registry.resolve(id)?;
            if !self.config.agent_capabilities.is_empty() {
                agent.capabilities = self.config.agent_capabilities.clone();
            }
            if let Some(ns) = &self.config.agent_namespace {
                agent.namespace = ns.clone();
            }
            return Ok(agent);
        }

        if self.config.allow_default_agent || !self.config.environment.is_production() {
            // Resolve-or-register the fallback, session-local only.
            return match self.registry.resolve(DEFAULT_AGENT_ID) {
                Ok(agent) => Ok(agent),
                Err(TmwsError::UnknownAgent { .. }) => self.registry.register(
                    AgentSpec {
                        agent_id: DEFAULT_AGENT_ID.to_string(),
                        display_name: "Default Agent".to_string(),
                        agent_type: AgentType::CustomAgent,
                        namespace: tmws_core::constants::DEFAULT_NAMESPACE.to_string(),
                        capabilities: self.config.agent_capabilities.clone(),
                        access_level: AccessLevel::Standard,
                    },
                    false,
                ),
                Err(other) => Err(other),
            };
        }

        Err(TmwsError::Permission {
            reason: "no agent configured and default agent is disabled".into(),
        })
    }

    /// Session token for `agent_id`: a keyed blake3 over the agent id,
    /// hex-encoded. The key is the first 32 bytes of the secret key, which
    /// config guarantees exist.
    pub fn session_token(&self, agent_id: &str) -> String {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.config.secret_key.as_bytes()[..32]);
        blake3::keyed_hash(&key, agent_id.as_bytes()).to_hex().to_string()
    }

    /// Check a presented token. Comparison goes through blake3 hashes,
    /// which compare in constant time.
    pub fn verify_token(&self, agent_id: &str, token: &str) -> bool {
        let expected = self.session_token(agent_id);
        blake3::hash(token.as_bytes()) == blake3::hash(expected.as_bytes())
    }
}
