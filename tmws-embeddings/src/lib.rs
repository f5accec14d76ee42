//! # tmws-embeddings
//!
//! The embedding gateway: the one component allowed to hold the external
//! embedder. Everything else asks the gateway, which caches by content
//! hash, batches, and degrades predictably when the embedder is down.

pub mod gateway;
pub mod provider;

pub use gateway::EmbeddingGateway;
pub use provider::HashedTermProvider;
