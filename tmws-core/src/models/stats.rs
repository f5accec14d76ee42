//! Read-only summary shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-agent memory statistics for the `get_agent_statistics` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatistics {
    pub agent_id: String,
    pub memory_count: u64,
    pub archived_count: u64,
    pub shared_count: u64,
    pub average_importance: f64,
    pub total_access_count: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Storage health summary produced by the maintenance queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub memory_count: u64,
    pub archived_count: u64,
    pub agent_count: u64,
    pub embedding_count: u64,
    pub page_count: u64,
    pub freelist_count: u64,
}
