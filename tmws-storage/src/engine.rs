//! StorageEngine — owns the write connection and the read pool,
//! implements IMemoryStore + IAgentStore, runs migrations at startup,
//! retries transient failures.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tmws_core::constants::STORAGE_RETRY_ATTEMPTS;
use tmws_core::errors::TmwsResult;
use tmws_core::models::{
    Agent, AgentStatistics, AgentType, Memory, MemoryAccess, RecallOrder, ScoredMemory,
    SearchFilters, StorageHealth,
};
use tmws_core::traits::{IAgentStore, IMemoryStore};

use crate::migrations;
use crate::pool::{read_pool, ReadPool, WriteConnection};
use crate::queries::{agent_ops, maintenance, memory_crud, memory_search};

/// The main storage engine. All mutations serialise through `writer`;
/// reads go to the read pool when the database is file-backed.
pub struct StorageEngine {
    writer: WriteConnection,
    readers: ReadPool,
    /// When true, use the read pool for read operations (file-backed
    /// mode). When false, route all reads through the writer (in-memory
    /// mode, because in-memory read connections are isolated databases).
    use_read_pool: bool,
    /// Recorded with each stored embedding.
    model_name: String,
}

impl StorageEngine {
    /// Open a storage engine backed by a file on disk.
    pub fn open(path: &Path, model_name: &str) -> TmwsResult<Self> {
        let engine = Self {
            writer: WriteConnection::open(path)?,
            readers: ReadPool::open(path, read_pool::DEFAULT_SIZE)?,
            use_read_pool: true,
            model_name: model_name.to_string(),
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory storage engine (for testing).
    pub fn open_in_memory() -> TmwsResult<Self> {
        let engine = Self {
            writer: WriteConnection::open_in_memory()?,
            readers: ReadPool::open_in_memory()?,
            use_read_pool: false,
            model_name: "test-model".to_string(),
        };
        engine.initialize()?;
        Ok(engine)
    }

    fn initialize(&self) -> TmwsResult<()> {
        self.writer.with_conn_sync(migrations::run_migrations)
    }

    /// Run a multi-step mutation on the writer. The closure composes query
    /// functions; wrap them in a transaction for atomicity across steps.
    pub fn with_writer<F, T>(&self, f: F) -> TmwsResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> TmwsResult<T>,
    {
        self.writer.with_conn_sync(f)
    }

    /// Execute a read-only query on the best available connection.
    fn with_reader<F, T>(&self, f: F) -> TmwsResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> TmwsResult<T>,
    {
        if self.use_read_pool {
            self.readers.with_conn(f)
        } else {
            self.writer.with_conn_sync(f)
        }
    }

    /// Retry `f` on transient storage failures with exponential backoff.
    /// Only `ErrStorage` is retried; everything else propagates unchanged.
    fn retrying<T>(&self, mut f: impl FnMut() -> TmwsResult<T>) -> TmwsResult<T> {
        let mut attempt: u32 = 0;
        loop {
            match f() {
                Err(e) if e.is_retryable() && attempt < STORAGE_RETRY_ATTEMPTS => {
                    attempt += 1;
                    let backoff = Duration::from_millis(25u64 << attempt);
                    tracing::warn!(attempt, backoff_ms = backoff.as_millis() as u64,
                        "retrying transient storage failure");
                    std::thread::sleep(backoff);
                }
                other => return other,
            }
        }
    }

    // ── Maintenance (not part of the wire surface) ─────────────────────

    pub fn purge_archived(&self, older_than_days: i64) -> TmwsResult<usize> {
        self.writer
            .with_conn_sync(|conn| maintenance::purge_archived(conn, older_than_days))
    }

    pub fn incremental_vacuum(&self) -> TmwsResult<()> {
        self.writer.with_conn_sync(maintenance::incremental_vacuum)
    }

    pub fn storage_health(&self) -> TmwsResult<StorageHealth> {
        self.with_reader(maintenance::storage_health)
    }

    /// Lexical fallback used when no query vector is available.
    pub fn search_lexical(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> TmwsResult<Vec<Memory>> {
        self.with_reader(|conn| memory_search::search_lexical(conn, query, filters, limit))
    }
}

impl IMemoryStore for StorageEngine {
    fn insert_memory(&self, memory: &Memory, embedding: &[f32]) -> TmwsResult<Uuid> {
        self.retrying(|| {
            self.writer.with_conn_sync(|conn| {
                memory_crud::insert_memory(conn, memory, embedding, &self.model_name)
            })
        })
    }

    fn get_memory(&self, id: Uuid) -> TmwsResult<Option<Memory>> {
        self.with_reader(|conn| memory_crud::get_memory(conn, id))
    }

    fn update_memory(&self, memory: &Memory, embedding: Option<&[f32]>) -> TmwsResult<()> {
        self.retrying(|| {
            self.writer.with_conn_sync(|conn| {
                memory_crud::update_memory(conn, memory, embedding, &self.model_name)
            })
        })
    }

    fn archive_memory(&self, id: Uuid, archived: bool) -> TmwsResult<()> {
        self.retrying(|| {
            self.writer
                .with_conn_sync(|conn| memory_crud::set_archived(conn, id, archived))
        })
    }

    fn delete_memory(&self, id: Uuid) -> TmwsResult<()> {
        self.retrying(|| {
            self.writer
                .with_conn_sync(|conn| memory_crud::delete_memory(conn, id))
        })
    }

    fn search(
        &self,
        query_vec: &[f32],
        filters: &SearchFilters,
        k: usize,
        min_similarity: f64,
    ) -> TmwsResult<Vec<ScoredMemory>> {
        self.with_reader(|conn| memory_search::search(conn, query_vec, filters, k, min_similarity))
    }

    fn recall(
        &self,
        filters: &SearchFilters,
        order: RecallOrder,
        limit: usize,
        offset: usize,
    ) -> TmwsResult<Vec<Memory>> {
        self.with_reader(|conn| memory_search::recall(conn, filters, order, limit, offset))
    }

    fn bump_access(&self, ids: &[Uuid]) -> TmwsResult<()> {
        self.retrying(|| {
            self.writer
                .with_conn_sync(|conn| memory_crud::bump_access(conn, ids))
        })
    }
}

impl IAgentStore for StorageEngine {
    fn upsert_agent(&self, agent: &Agent) -> TmwsResult<()> {
        self.retrying(|| {
            self.writer
                .with_conn_sync(|conn| agent_ops::upsert_agent(conn, agent))
        })
    }

    fn get_agent(&self, agent_id: &str) -> TmwsResult<Option<Agent>> {
        self.with_reader(|conn| agent_ops::get_agent(conn, agent_id))
    }

    fn list_agents(
        &self,
        namespace: Option<&str>,
        agent_type: Option<AgentType>,
    ) -> TmwsResult<Vec<Agent>> {
        self.with_reader(|conn| agent_ops::list_agents(conn, namespace, agent_type))
    }

    fn deactivate_agent(&self, agent_id: &str) -> TmwsResult<()> {
        self.retrying(|| {
            self.writer
                .with_conn_sync(|conn| agent_ops::deactivate_agent(conn, agent_id))
        })
    }

    fn touch_agent(&self, agent_id: &str, at: DateTime<Utc>) -> TmwsResult<()> {
        self.writer
            .with_conn_sync(|conn| agent_ops::touch_agent(conn, agent_id, at))
    }

    fn agent_statistics(&self, agent_id: &str) -> TmwsResult<AgentStatistics> {
        self.with_reader(|conn| agent_ops::agent_statistics(conn, agent_id))
    }

    fn count_memories(&self, namespace: &str, access: Option<MemoryAccess>) -> TmwsResult<u64> {
        self.with_reader(|conn| agent_ops::count_memories(conn, namespace, access))
    }
}
