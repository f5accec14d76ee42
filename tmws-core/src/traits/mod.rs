pub mod embedding;
pub mod storage;

pub use embedding::IEmbeddingProvider;
pub use storage::{IAgentStore, IMemoryStore};
