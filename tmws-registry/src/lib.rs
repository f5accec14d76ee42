//! # tmws-registry
//!
//! The agent catalogue: six immutable built-in Trinitas agents, persisted
//! dynamic agents, and ephemeral session registrations — plus the
//! per-session current-agent context and profile file I/O.

pub mod builtin;
pub mod context;
pub mod profiles;
pub mod registry;

pub use builtin::{find_builtin, is_builtin, BuiltinAgent, TRINITAS_AGENTS};
pub use context::AgentContext;
pub use registry::{AgentRegistry, AgentSpec};
