//! Agent identity: the calling principal of every TMWS request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Privilege tier of an agent. Ordered: `Readonly < Standard < Elevated
/// < Admin < System`, so gates can be expressed as `level >= Elevated`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Readonly,
    #[default]
    Standard,
    Elevated,
    Admin,
    System,
}

impl AccessLevel {
    /// Parse from the lowercase wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "readonly" => Some(Self::Readonly),
            "standard" => Some(Self::Standard),
            "elevated" => Some(Self::Elevated),
            "admin" => Some(Self::Admin),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Standard => "standard",
            Self::Elevated => "elevated",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vendor/kind tag for an agent. Open vocabulary — unknown strings map to
/// `CustomAgent` at registration rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    AnthropicLlm,
    OpenaiLlm,
    GoogleLlm,
    MetaLlm,
    #[default]
    CustomAgent,
    SystemAgent,
}

impl AgentType {
    pub fn parse(s: &str) -> Self {
        match s {
            "anthropic_llm" => Self::AnthropicLlm,
            "openai_llm" => Self::OpenaiLlm,
            "google_llm" => Self::GoogleLlm,
            "meta_llm" => Self::MetaLlm,
            "system_agent" => Self::SystemAgent,
            _ => Self::CustomAgent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnthropicLlm => "anthropic_llm",
            Self::OpenaiLlm => "openai_llm",
            Self::GoogleLlm => "google_llm",
            Self::MetaLlm => "meta_llm",
            Self::CustomAgent => "custom_agent",
            Self::SystemAgent => "system_agent",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Globally unique id, `^[A-Za-z][A-Za-z0-9_.-]{2,63}$`.
    pub agent_id: String,
    pub display_name: String,
    pub agent_type: AgentType,
    /// Tenancy boundary; same charset as `agent_id`, max 64 chars.
    pub namespace: String,
    /// Free-form capability map.
    #[serde(default)]
    pub capabilities: serde_json::Map<String, serde_json::Value>,
    pub access_level: AccessLevel,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// A fresh active agent with timestamps set to now.
    pub fn new(
        agent_id: impl Into<String>,
        display_name: impl Into<String>,
        agent_type: AgentType,
        namespace: impl Into<String>,
        access_level: AccessLevel,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            display_name: display_name.into(),
            agent_type,
            namespace: namespace.into(),
            capabilities: serde_json::Map::new(),
            access_level,
            is_active: true,
            last_activity: now,
            created_at: now,
            updated_at: now,
        }
    }
}
