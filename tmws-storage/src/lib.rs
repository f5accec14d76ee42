//! # tmws-storage
//!
//! SQLite persistence for TMWS. Owns the connection pool, the schema
//! migrations, and every query the rest of the system runs. Callers hand in
//! typed values; raw SQL fragments never cross this boundary.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;

use tmws_core::TmwsError;

/// Wrap a low-level database failure as `ErrStorage`. Detail stays
/// server-side; the wire sees a generic message.
pub fn to_storage_err(message: impl Into<String>) -> TmwsError {
    TmwsError::Storage { message: message.into() }
}
