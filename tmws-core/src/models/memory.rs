//! Memory: a unit of stored knowledge with embedding and access metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Visibility class of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryAccess {
    #[default]
    Private,
    Team,
    Shared,
    Public,
    System,
}

impl MemoryAccess {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "team" => Some(Self::Team),
            "shared" => Some(Self::Shared),
            "public" => Some(Self::Public),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Team => "team",
            Self::Shared => "shared",
            Self::Public => "public",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for MemoryAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a share grant lets the grantee do. Ordered so that `Write` implies
/// `Read` and `Delete` implies both.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    #[default]
    Read,
    Write,
    Delete,
}

impl SharePermission {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One permission edge: `(memory, grantee, permission)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub agent_id: String,
    #[serde(default)]
    pub permission: SharePermission,
}

/// A stored memory. The embedding itself lives in a separate table keyed by
/// content hash; this struct carries everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub owner_agent_id: String,
    /// Copied from the owner at creation; may diverge after a share.
    pub namespace: String,
    pub access_level: MemoryAccess,
    pub tags: Vec<String>,
    /// Relevance weight in `[0, 1]`.
    pub importance: f64,
    /// Non-empty iff `access_level == Shared`.
    #[serde(default)]
    pub shared_with: Vec<ShareGrant>,
    /// Access level to restore when the last grant is revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_access_level: Option<MemoryAccess>,
    pub parent_memory_id: Option<Uuid>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub is_archived: bool,
}

impl Memory {
    /// A fresh private memory owned by `owner`, hashed and timestamped now.
    pub fn new(
        owner_agent_id: impl Into<String>,
        namespace: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_hash: content_hash(&content),
            content,
            owner_agent_id: owner_agent_id.into(),
            namespace: namespace.into(),
            access_level: MemoryAccess::Private,
            tags: Vec::new(),
            importance: 0.5,
            shared_with: Vec::new(),
            prior_access_level: None,
            parent_memory_id: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
            is_archived: false,
        }
    }

    /// Whether `agent_id` holds a grant of at least `needed`.
    pub fn grant_for(&self, agent_id: &str, needed: SharePermission) -> bool {
        self.shared_with
            .iter()
            .any(|g| g.agent_id == agent_id && g.permission >= needed)
    }
}

/// Blake3 hex digest of memory content, used for embedding dedup and caching.
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// A search hit with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub memory: Memory,
    pub similarity: f64,
}

/// Partial update for a memory. Last-writer-wins on scalar fields;
/// set-valued fields are replaced wholesale when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<f64>,
    pub access_level: Option<MemoryAccess>,
    pub shared_with: Option<Vec<ShareGrant>>,
    pub parent_memory_id: Option<Uuid>,
    /// When true, detach from the current parent.
    #[serde(default)]
    pub clear_parent: bool,
    pub is_archived: Option<bool>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.tags.is_none()
            && self.importance.is_none()
            && self.access_level.is_none()
            && self.shared_with.is_none()
            && self.parent_memory_id.is_none()
            && !self.clear_parent
            && self.is_archived.is_none()
    }
}
