//! Round-robin pool of read-only connections.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use tmws_core::errors::TmwsResult;

use crate::to_storage_err;

use super::pragmas;

/// Read connections opened per file-backed database.
pub const DEFAULT_SIZE: usize = 10;

/// Upper bound on read connections.
pub const MAX_SIZE: usize = 32;

/// Read connections handed out round-robin. Each connection sees the WAL
/// snapshot current at the start of its query, so searches and recalls
/// never contend with the writer.
pub struct ReadPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Open `size` readers against the database file; the size is
    /// clamped to `1..=MAX_SIZE`.
    pub fn open(path: &Path, size: usize) -> TmwsResult<Self> {
        let size = size.clamp(1, MAX_SIZE);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path)
                .map_err(|e| to_storage_err(format!("open reader: {e}")))?;
            pragmas::configure_reader(&conn)?;
            connections.push(Mutex::new(conn));
        }
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// A single in-memory reader. Note an in-memory reader is its own
    /// isolated database — callers route reads through the writer in
    /// that mode and keep this only so the engine shape stays uniform.
    pub fn open_in_memory() -> TmwsResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| to_storage_err(format!("open in-memory reader: {e}")))?;
        Ok(Self {
            connections: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
        })
    }

    /// Run `f` on the next reader in rotation.
    pub fn with_conn<F, T>(&self, f: F) -> TmwsResult<T>
    where
        F: FnOnce(&Connection) -> TmwsResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let guard = self.connections[idx]
            .lock()
            .map_err(|_| to_storage_err("read connection mutex poisoned"))?;
        f(&guard)
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }
}
