//! MemoryService — create, search, share, recall, update, delete.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use tmws_access::{evaluate, policy, Operation, QuotaKind, RateLimiter};
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{
    AccessLevel, Agent, AgentStatistics, Memory, MemoryAccess, MemoryPatch, ScoredMemory,
    SearchFilters, ShareGrant, SharePermission, Visibility,
};
use tmws_core::models::memory::content_hash;
use tmws_core::traits::{IAgentStore, IMemoryStore};
use tmws_core::validation;
use tmws_embeddings::EmbeddingGateway;
use tmws_registry::AgentRegistry;
use tmws_storage::StorageEngine;

use crate::hierarchy;
use crate::requests::{CreateMemoryRequest, RecallRequest, SearchRequest};

/// The façade tool handlers talk to. Owns nothing but references; all
/// state lives in storage, the gateway cache, and the limiter.
pub struct MemoryService {
    storage: Arc<StorageEngine>,
    embeddings: Arc<EmbeddingGateway>,
    registry: Arc<AgentRegistry>,
    limiter: Arc<RateLimiter>,
}

impl MemoryService {
    pub fn new(
        storage: Arc<StorageEngine>,
        embeddings: Arc<EmbeddingGateway>,
        registry: Arc<AgentRegistry>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self { storage, embeddings, registry, limiter }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Resolve the acting principal: the session's agent, or an `as_agent`
    /// override for elevated callers.
    pub fn resolve_principal(
        &self,
        session_agent: &Agent,
        as_agent: Option<&str>,
    ) -> TmwsResult<Agent> {
        match as_agent {
            None => Ok(session_agent.clone()),
            Some(name) => {
                if session_agent.access_level < AccessLevel::Elevated {
                    return Err(TmwsError::Permission {
                        reason: "as_agent override requires an elevated principal".into(),
                    });
                }
                self.registry.resolve(name)
            }
        }
    }

    /// Create a memory owned by the principal (or the `as_agent` target).
    pub fn create_memory(
        &self,
        session_agent: &Agent,
        req: CreateMemoryRequest,
    ) -> TmwsResult<Memory> {
        let principal = self.resolve_principal(session_agent, req.as_agent.as_deref())?;
        self.limiter.check(&principal.agent_id, QuotaKind::Request)?;
        self.limiter.check(&principal.agent_id, QuotaKind::Write)?;

        validation::validate_content(&req.content)?;
        let tags = validation::sanitize_tags(&req.tags)?;
        let importance = req.importance.unwrap_or(0.5);
        validation::validate_importance(importance)?;

        let access_level = req.access_level.unwrap_or(MemoryAccess::Private);
        let shared_with = self.build_grants(&req.share_with, SharePermission::Read)?;
        match access_level {
            MemoryAccess::Shared if shared_with.is_empty() => {
                return Err(TmwsError::validation(
                    "shared memories need at least one grantee",
                ));
            }
            MemoryAccess::Shared => {}
            _ if !shared_with.is_empty() => {
                return Err(TmwsError::validation(
                    "share_with requires access_level=shared",
                ));
            }
            _ => {}
        }
        if access_level == MemoryAccess::System
            && principal.access_level < AccessLevel::System
        {
            return Err(TmwsError::Permission {
                reason: "system memories can only be written by system principals".into(),
            });
        }
        policy::check_namespace_write(&principal, &principal.namespace)?;

        if let Some(parent) = req.parent_memory_id {
            hierarchy::ensure_parent_valid(&self.storage, parent, None)?;
            let parent_memory = self
                .storage
                .get_memory(parent)?
                .ok_or_else(|| TmwsError::validation("parent memory does not exist"))?;
            evaluate(&principal, Operation::Read, &parent_memory).into_result()?;
        }

        // Rejecting on embedder failure keeps every row searchable; the
        // caller may retry once the embedder is back.
        let embedding = self.embeddings.embed(&req.content)?;

        let mut memory = Memory::new(&principal.agent_id, &principal.namespace, req.content);
        memory.tags = tags;
        memory.importance = importance;
        memory.access_level = access_level;
        memory.shared_with = shared_with;
        memory.prior_access_level =
            (access_level == MemoryAccess::Shared).then_some(MemoryAccess::Private);
        memory.parent_memory_id = req.parent_memory_id;

        let id = self.storage.insert_memory(&memory, &embedding)?;
        let _ = self.registry.touch(&principal.agent_id);
        tracing::info!(memory_id = %id, owner = %principal.agent_id,
            access = %memory.access_level, "memory created");
        Ok(memory)
    }

    /// Read one memory, bumping its access counter.
    pub fn get_memory(&self, session_agent: &Agent, id: Uuid) -> TmwsResult<Memory> {
        self.limiter.check(&session_agent.agent_id, QuotaKind::Request)?;
        let memory = self
            .storage
            .get_memory(id)?
            .ok_or_else(|| TmwsError::not_found(format!("memory {id}")))?;
        evaluate(session_agent, Operation::Read, &memory).into_result()?;
        self.storage.bump_access(&[id])?;
        Ok(memory)
    }

    /// Semantic search scoped to what the principal may see.
    pub fn search_memories(
        &self,
        session_agent: &Agent,
        req: SearchRequest,
    ) -> TmwsResult<Vec<ScoredMemory>> {
        let principal = session_agent;
        self.limiter.check(&principal.agent_id, QuotaKind::Request)?;
        self.limiter.check(&principal.agent_id, QuotaKind::Search)?;

        if let Some(ns) = &req.namespace {
            validation::validate_namespace(ns)?;
        }
        let tags = validation::sanitize_tags(&req.tags)?;
        if !req.min_similarity.is_finite() {
            return Err(TmwsError::validation("min_similarity must be finite"));
        }

        let filters = SearchFilters {
            owner: None,
            namespace: req.namespace.clone(),
            access_levels: req.access_filter.into_iter().collect(),
            tags,
            include_archived: false,
            visible_to: Some(Visibility {
                agent_id: principal.agent_id.clone(),
                namespace: principal.namespace.clone(),
                include_shared: req.include_shared,
                can_read_system: principal.access_level >= AccessLevel::Elevated,
            }),
        };

        let hits = match self.embeddings.embed(&req.query) {
            Ok(query_vec) => self
                .storage
                .search(&query_vec, &filters, req.limit, req.min_similarity)?,
            Err(err @ TmwsError::Embedder { .. }) => {
                // Degrade to lexical matching rather than failing the call.
                tracing::warn!(error = %err, "embedder down, falling back to lexical search");
                self.storage
                    .search_lexical(&req.query, &filters, req.limit)?
                    .into_iter()
                    .map(|memory| ScoredMemory { memory, similarity: 0.0 })
                    .collect()
            }
            Err(other) => return Err(other),
        };

        // Defence in depth: the SQL visibility filter already narrowed the
        // rows, but every hit still passes the policy engine.
        let visible: Vec<ScoredMemory> = hits
            .into_iter()
            .filter(|hit| evaluate(principal, Operation::Read, &hit.memory).is_allowed())
            .collect();

        let ids: Vec<Uuid> = visible.iter().map(|h| h.memory.id).collect();
        self.storage.bump_access(&ids)?;
        Ok(visible)
    }

    /// Grant or revoke read/write/delete on a memory for a set of agents.
    /// An empty grantee list clears sharing and restores the prior level.
    pub fn share_memory(
        &self,
        session_agent: &Agent,
        memory_id: Uuid,
        grantees: &[String],
        permission: SharePermission,
    ) -> TmwsResult<Memory> {
        let principal = session_agent;
        self.limiter.check(&principal.agent_id, QuotaKind::Request)?;
        self.limiter.check(&principal.agent_id, QuotaKind::Write)?;

        let grants = self.build_grants(grantees, permission)?;
        let principal_id = principal.agent_id.clone();
        let principal_level = principal.access_level;

        // Read and rewrite the row in one writer transaction so two
        // concurrent share calls can't interleave their grant lists.
        let memory = self.storage.with_writer(|conn| {
            let mut memory = tmws_storage::queries::memory_crud::get_memory(conn, memory_id)?
                .ok_or_else(|| TmwsError::not_found(format!("memory {memory_id}")))?;

            if principal_id != memory.owner_agent_id && principal_level < AccessLevel::Admin {
                return Err(TmwsError::Permission {
                    reason: "only the owner or an admin may share a memory".into(),
                });
            }

            if grants.is_empty() {
                // Unshare: restore whatever the memory was before sharing.
                // A memory that was never shared keeps its level.
                if memory.access_level == MemoryAccess::Shared {
                    memory.access_level =
                        memory.prior_access_level.unwrap_or(MemoryAccess::Private);
                }
                memory.prior_access_level = None;
                memory.shared_with.clear();
            } else {
                if memory.access_level != MemoryAccess::Shared {
                    memory.prior_access_level = Some(memory.access_level);
                    memory.access_level = MemoryAccess::Shared;
                }
                memory.shared_with = grants.clone();
            }
            memory.updated_at = Utc::now();

            tmws_storage::queries::memory_crud::update_memory(conn, &memory, None, "")?;
            Ok(memory)
        })?;

        tracing::info!(memory_id = %memory_id, grantees = grantees.len(),
            access = %memory.access_level, "memory sharing updated");
        Ok(memory)
    }

    /// Patch a memory. Content changes re-embed; set-valued fields are
    /// replaced wholesale.
    pub fn update_memory(
        &self,
        session_agent: &Agent,
        memory_id: Uuid,
        patch: MemoryPatch,
    ) -> TmwsResult<Memory> {
        let principal = session_agent;
        self.limiter.check(&principal.agent_id, QuotaKind::Request)?;
        self.limiter.check(&principal.agent_id, QuotaKind::Write)?;

        let mut memory = self
            .storage
            .get_memory(memory_id)?
            .ok_or_else(|| TmwsError::not_found(format!("memory {memory_id}")))?;
        evaluate(principal, Operation::Write, &memory).into_result()?;

        if patch.is_empty() {
            return Ok(memory);
        }

        let mut embedding = None;
        if let Some(content) = patch.content {
            validation::validate_content(&content)?;
            embedding = Some(self.embeddings.embed(&content)?);
            memory.content_hash = content_hash(&content);
            memory.content = content;
        }
        if let Some(tags) = patch.tags {
            memory.tags = validation::sanitize_tags(&tags)?;
        }
        if let Some(importance) = patch.importance {
            validation::validate_importance(importance)?;
            memory.importance = importance;
        }
        if let Some(grants) = patch.shared_with {
            for grant in &grants {
                validation::validate_agent_id(&grant.agent_id)?;
                self.registry.resolve(&grant.agent_id)?;
            }
            memory.shared_with = grants;
        }
        if let Some(level) = patch.access_level {
            if level == MemoryAccess::System && principal.access_level < AccessLevel::System {
                return Err(TmwsError::Permission {
                    reason: "system memories can only be written by system principals".into(),
                });
            }
            if level == MemoryAccess::Shared && memory.access_level != MemoryAccess::Shared {
                memory.prior_access_level = Some(memory.access_level);
            }
            if level != MemoryAccess::Shared {
                memory.prior_access_level = None;
            }
            memory.access_level = level;
        }
        // The share invariant must hold for the patched row as a whole.
        match memory.access_level {
            MemoryAccess::Shared if memory.shared_with.is_empty() => {
                return Err(TmwsError::validation(
                    "shared memories need at least one grantee",
                ));
            }
            MemoryAccess::Shared => {}
            _ if !memory.shared_with.is_empty() => {
                return Err(TmwsError::validation(
                    "shared_with must be empty unless access_level=shared",
                ));
            }
            _ => {}
        }

        if patch.clear_parent {
            memory.parent_memory_id = None;
        } else if let Some(parent) = patch.parent_memory_id {
            hierarchy::ensure_parent_valid(&self.storage, parent, Some(memory.id))?;
            memory.parent_memory_id = Some(parent);
        }
        if let Some(archived) = patch.is_archived {
            memory.is_archived = archived;
        }

        memory.updated_at = Utc::now();
        self.storage.update_memory(&memory, embedding.as_deref())?;
        tracing::debug!(memory_id = %memory_id, "memory updated");
        Ok(memory)
    }

    /// Delete a memory: a soft archive, unless an admin asks for `hard`.
    pub fn delete_memory(
        &self,
        session_agent: &Agent,
        memory_id: Uuid,
        hard: bool,
    ) -> TmwsResult<()> {
        let principal = session_agent;
        self.limiter.check(&principal.agent_id, QuotaKind::Request)?;
        self.limiter.check(&principal.agent_id, QuotaKind::Write)?;

        let memory = self
            .storage
            .get_memory(memory_id)?
            .ok_or_else(|| TmwsError::not_found(format!("memory {memory_id}")))?;
        evaluate(principal, Operation::Delete, &memory).into_result()?;

        if hard {
            if principal.access_level < AccessLevel::Admin {
                return Err(TmwsError::Permission {
                    reason: "hard deletion requires an admin principal".into(),
                });
            }
            self.storage.delete_memory(memory_id)?;
            tracing::info!(memory_id = %memory_id, "memory hard-deleted");
        } else {
            self.storage.archive_memory(memory_id, true)?;
            tracing::info!(memory_id = %memory_id, "memory archived");
        }
        Ok(())
    }

    /// Non-semantic paged listing of visible memories.
    pub fn recall(&self, session_agent: &Agent, req: RecallRequest) -> TmwsResult<Vec<Memory>> {
        let principal = session_agent;
        self.limiter.check(&principal.agent_id, QuotaKind::Request)?;

        if let Some(owner) = &req.agent_id {
            validation::validate_agent_id(owner)?;
        }
        if let Some(ns) = &req.namespace {
            validation::validate_namespace(ns)?;
        }
        let tags = validation::sanitize_tags(&req.tags)?;

        let filters = SearchFilters {
            owner: req.agent_id.clone(),
            namespace: req.namespace.clone(),
            access_levels: Vec::new(),
            tags,
            include_archived: false,
            visible_to: Some(Visibility {
                agent_id: principal.agent_id.clone(),
                namespace: principal.namespace.clone(),
                include_shared: true,
                can_read_system: principal.access_level >= AccessLevel::Elevated,
            }),
        };

        let rows = self.storage.recall(
            &filters,
            Default::default(),
            req.limit,
            req.offset,
        )?;
        Ok(rows
            .into_iter()
            .filter(|m| evaluate(principal, Operation::Read, m).is_allowed())
            .collect())
    }

    /// Per-agent statistics; self-stats for anyone, others for elevated.
    pub fn agent_statistics(
        &self,
        session_agent: &Agent,
        agent_id: Option<&str>,
    ) -> TmwsResult<AgentStatistics> {
        self.limiter.check(&session_agent.agent_id, QuotaKind::Request)?;

        let target = match agent_id {
            None => session_agent.clone(),
            Some(name) => self.registry.resolve(name)?,
        };
        if target.agent_id != session_agent.agent_id
            && session_agent.access_level < AccessLevel::Elevated
        {
            return Err(TmwsError::Permission {
                reason: "statistics for other agents require an elevated principal".into(),
            });
        }
        self.storage.agent_statistics(&target.agent_id)
    }

    /// Validate and resolve grantee ids into grants at one permission.
    fn build_grants(
        &self,
        grantees: &[String],
        permission: SharePermission,
    ) -> TmwsResult<Vec<ShareGrant>> {
        let mut grants = Vec::with_capacity(grantees.len());
        for grantee in grantees {
            validation::validate_agent_id(grantee)?;
            let agent = self.registry.resolve(grantee)?;
            if !grants.iter().any(|g: &ShareGrant| g.agent_id == agent.agent_id) {
                grants.push(ShareGrant { agent_id: agent.agent_id, permission });
            }
        }
        Ok(grants)
    }
}
