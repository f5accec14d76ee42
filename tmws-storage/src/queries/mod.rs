//! Typed query modules. Free functions over `&Connection`; the engine
//! decides which connection they run on.

pub mod agent_ops;
pub mod embedding_ops;
pub mod maintenance;
pub mod memory_crud;
pub mod memory_search;
