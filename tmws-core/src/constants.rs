/// TMWS system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding dimensionality.
pub const DEFAULT_VECTOR_DIMENSION: usize = 384;

/// Maximum memory content size in bytes.
pub const MAX_CONTENT_BYTES: usize = 65_535;

/// Maximum number of tags per memory.
pub const MAX_TAGS: usize = 32;

/// Maximum byte length of a single tag.
pub const MAX_TAG_BYTES: usize = 32;

/// Maximum prior agents retained in a session's switch history.
pub const MAX_AGENT_HISTORY: usize = 16;

/// Maximum ancestor hops walked when verifying the memory hierarchy.
pub const MAX_PARENT_DEPTH: usize = 64;

/// Maximum concurrent client sessions.
pub const MAX_SESSIONS: usize = 1_024;

/// Maximum size of a single JSON frame on the wire.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// Maximum size of a custom-agents profile file.
pub const MAX_PROFILE_FILE_BYTES: u64 = 1_048_576;

/// Maximum agent entries in a profile file.
pub const MAX_PROFILE_AGENTS: usize = 1_000;

/// Minimum entries held by the embedding cache.
pub const EMBEDDING_CACHE_ENTRIES: u64 = 1_024;

/// Seconds of silence before an idle session is evicted.
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 15 * 60;

/// Per-request deadline in seconds.
pub const REQUEST_DEADLINE_SECS: u64 = 30;

/// Per-agent request quota per minute.
pub const RATE_LIMIT_REQUESTS_PER_MIN: u32 = 1_000;

/// Per-agent search quota per minute.
pub const RATE_LIMIT_SEARCHES_PER_MIN: u32 = 100;

/// Per-agent write quota per minute.
pub const RATE_LIMIT_WRITES_PER_MIN: u32 = 500;

/// Namespaces only writable by elevated/admin/system principals.
pub const RESERVED_NAMESPACES: &[&str] = &["system", "trinitas"];

/// Namespace assigned to agents that don't request one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Transient storage failures are retried this many times.
pub const STORAGE_RETRY_ATTEMPTS: u32 = 3;
