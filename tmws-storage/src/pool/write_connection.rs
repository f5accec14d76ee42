//! The single write connection, serialised behind a mutex.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use tmws_core::errors::TmwsResult;

use crate::to_storage_err;

use super::pragmas;

/// All mutations flow through this one connection; SQLite's row locking
/// plus the mutex give writes a total order.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path) -> TmwsResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| to_storage_err(format!("open writer: {e}")))?;
        pragmas::configure_writer(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> TmwsResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| to_storage_err(format!("open in-memory writer: {e}")))?;
        pragmas::configure_writer(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run `f` while holding the write connection.
    pub fn with_conn_sync<F, T>(&self, f: F) -> TmwsResult<T>
    where
        F: FnOnce(&Connection) -> TmwsResult<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| to_storage_err("write connection mutex poisoned"))?;
        f(&guard)
    }
}
