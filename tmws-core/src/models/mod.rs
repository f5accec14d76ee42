pub mod agent;
pub mod filters;
pub mod memory;
pub mod stats;

pub use agent::{AccessLevel, Agent, AgentType};
pub use filters::{RecallOrder, SearchFilters, Visibility};
pub use memory::{Memory, MemoryAccess, MemoryPatch, ScoredMemory, ShareGrant, SharePermission};
pub use stats::{AgentStatistics, StorageHealth};
