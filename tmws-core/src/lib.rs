//! # tmws-core
//!
//! Foundation crate for the TMWS multi-agent memory service.
//! Defines all types, traits, errors, validation, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;
pub mod validation;

// Re-export the most commonly used types at the crate root.
pub use config::{Environment, TmwsConfig};
pub use errors::{TmwsError, TmwsResult};
pub use models::{
    AccessLevel, Agent, AgentType, Memory, MemoryAccess, ScoredMemory, SharePermission,
};
