//! The TMWS error taxonomy.
//!
//! Every error kind carries a stable identifier (`code()`) that travels on
//! the wire as `error.code`. Storage and internal failures keep their detail
//! server-side; `wire_message()` is what clients see.

/// Result alias used across all TMWS crates.
pub type TmwsResult<T> = Result<T, TmwsError>;

#[derive(Debug, thiserror::Error)]
pub enum TmwsError {
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("permission denied: {reason}")]
    Permission { reason: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("agent name conflicts with a built-in agent: {name}")]
    NameConflict { name: String },

    #[error("agent id already registered: {id}")]
    DuplicateId { id: String },

    #[error("unknown agent: {name}")]
    UnknownAgent { name: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("embedder unavailable: {reason}")]
    Embedder { reason: String },

    #[error("storage failure: {message}")]
    Storage { message: String },

    #[error("deadline of {seconds}s exceeded")]
    Timeout { seconds: u64 },

    #[error("internal error: {context}")]
    Internal { context: String },
}

impl TmwsError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    pub fn permission(reason: impl Into<String>) -> Self {
        Self::Permission { reason: reason.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal { context: context.into() }
    }

    /// Stable identifier carried on the wire as `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ErrValidation",
            Self::Permission { .. } => "ErrPermission",
            Self::RateLimited { .. } => "ErrRateLimited",
            Self::NotFound { .. } => "ErrNotFound",
            Self::NameConflict { .. } => "ErrNameConflict",
            Self::DuplicateId { .. } => "ErrDuplicateId",
            Self::UnknownAgent { .. } => "ErrUnknownAgent",
            Self::UnknownTool { .. } => "ErrUnknownTool",
            Self::Embedder { .. } => "ErrEmbedder",
            Self::Storage { .. } => "ErrStorage",
            Self::Timeout { .. } => "ErrTimeout",
            Self::Internal { .. } => "ErrInternal",
        }
    }

    /// Only transient storage failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Client-facing message. Storage and internal errors are logged with
    /// full detail server-side but must not leak paths or SQL to the wire.
    pub fn wire_message(&self) -> String {
        match self {
            Self::Storage { .. } => "transient storage failure".to_string(),
            Self::Internal { .. } => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Back-off hint for `ErrRateLimited`, if applicable.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
