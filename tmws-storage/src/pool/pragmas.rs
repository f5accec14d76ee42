//! Connection pragma configuration.

use rusqlite::Connection;

use tmws_core::errors::TmwsResult;

use crate::to_storage_err;

/// Configure a write connection: WAL journaling, incremental auto-vacuum,
/// and a busy timeout so concurrent writers queue instead of failing.
pub fn configure_writer(conn: &Connection) -> TmwsResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA auto_vacuum = INCREMENTAL;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(|e| to_storage_err(format!("writer pragmas: {e}")))
}

/// Configure a read connection: query-only, shared WAL view.
pub fn configure_reader(conn: &Connection) -> TmwsResult<()> {
    conn.execute_batch(
        "PRAGMA query_only = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(|e| to_storage_err(format!("reader pragmas: {e}")))
}
