//! # tmws-service
//!
//! The memory service façade used by tool handlers. Every operation
//! resolves the principal, validates inputs, consults the access policy
//! and rate limiter, and only then touches embeddings and storage.

pub mod hierarchy;
pub mod requests;
pub mod service;

pub use requests::{CreateMemoryRequest, RecallRequest, SearchRequest};
pub use service::MemoryService;
