use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::TmwsResult;
use crate::models::{
    Agent, AgentStatistics, AgentType, Memory, MemoryAccess, RecallOrder, ScoredMemory,
    SearchFilters,
};

/// Memory persistence: transactional CRUD plus vector, lexical, and paged
/// retrieval. Every operation runs inside one database transaction.
pub trait IMemoryStore: Send + Sync {
    /// Persist a memory together with its embedding. Returns the id.
    fn insert_memory(&self, memory: &Memory, embedding: &[f32]) -> TmwsResult<Uuid>;

    fn get_memory(&self, id: Uuid) -> TmwsResult<Option<Memory>>;

    /// Full-row last-writer-wins update. When `embedding` is present the
    /// stored vector is replaced as well (content changed).
    fn update_memory(&self, memory: &Memory, embedding: Option<&[f32]>) -> TmwsResult<()>;

    /// Soft delete: flips `is_archived` without touching the row otherwise.
    fn archive_memory(&self, id: Uuid, archived: bool) -> TmwsResult<()>;

    /// Hard delete: removes the row and its embedding link.
    fn delete_memory(&self, id: Uuid) -> TmwsResult<()>;

    /// Top-k by cosine similarity among rows matching `filters`, with
    /// `similarity >= min_similarity`. Ties break by
    /// `(importance DESC, updated_at DESC, id ASC)`.
    fn search(
        &self,
        query_vec: &[f32],
        filters: &SearchFilters,
        k: usize,
        min_similarity: f64,
    ) -> TmwsResult<Vec<ScoredMemory>>;

    /// Non-semantic paged listing.
    fn recall(
        &self,
        filters: &SearchFilters,
        order: RecallOrder,
        limit: usize,
        offset: usize,
    ) -> TmwsResult<Vec<Memory>>;

    /// Increment access counters and refresh `last_accessed_at` for every
    /// id, in one transaction, without touching `updated_at`.
    fn bump_access(&self, ids: &[Uuid]) -> TmwsResult<()>;
}

/// Agent record persistence.
pub trait IAgentStore: Send + Sync {
    /// Insert or replace an agent record.
    fn upsert_agent(&self, agent: &Agent) -> TmwsResult<()>;

    fn get_agent(&self, agent_id: &str) -> TmwsResult<Option<Agent>>;

    /// List agents, optionally filtered, ordered by `agent_id` ascending.
    fn list_agents(
        &self,
        namespace: Option<&str>,
        agent_type: Option<AgentType>,
    ) -> TmwsResult<Vec<Agent>>;

    /// Deactivate an agent record. Owned memories are left in place.
    fn deactivate_agent(&self, agent_id: &str) -> TmwsResult<()>;

    fn touch_agent(&self, agent_id: &str, at: DateTime<Utc>) -> TmwsResult<()>;

    fn agent_statistics(&self, agent_id: &str) -> TmwsResult<AgentStatistics>;

    /// Memories in a namespace at a given access level (registry helpers).
    fn count_memories(&self, namespace: &str, access: Option<MemoryAccess>) -> TmwsResult<u64>;
}
