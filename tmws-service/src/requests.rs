//! Typed request shapes for the service operations. These deserialize
//! straight from tool params; unknown fields are rejected at the wire.

use serde::Deserialize;
use uuid::Uuid;

use tmws_core::models::MemoryAccess;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMemoryRequest {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub importance: Option<f64>,
    pub access_level: Option<MemoryAccess>,
    #[serde(default)]
    pub share_with: Vec<String>,
    /// Elevated callers may create on behalf of another agent.
    pub as_agent: Option<String>,
    pub parent_memory_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_similarity: f64,
    #[serde(default = "default_true")]
    pub include_shared: bool,
    pub namespace: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Restrict results to one access level.
    pub access_filter: Option<MemoryAccess>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecallRequest {
    /// Restrict to one owner.
    pub agent_id: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_recall_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

fn default_recall_limit() -> usize {
    100
}

fn default_true() -> bool {
    true
}
