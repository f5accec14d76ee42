//! Versioned schema migrations, tracked via `PRAGMA user_version`.

use rusqlite::Connection;

use tmws_core::errors::TmwsResult;

use crate::to_storage_err;

/// Current schema version.
const SCHEMA_VERSION: u32 = 1;

/// Run all pending migrations. Safe to call on every startup.
pub fn run_migrations(conn: &Connection) -> TmwsResult<()> {
    let current: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| to_storage_err(format!("read user_version: {e}")))?;

    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    if current < 1 {
        migrate_v1(conn)?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| to_storage_err(format!("set user_version: {e}")))?;

    tracing::info!(from = current, to = SCHEMA_VERSION, "schema migrated");
    Ok(())
}

/// v1: agents, memories, deduplicated embeddings, and the FTS index.
///
/// Referential integrity between memories and agents is maintained by the
/// registry and service layers; the hierarchy's acyclicity is a service
/// invariant, so neither is encoded as a database constraint.
fn migrate_v1(conn: &Connection) -> TmwsResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS agents (
            agent_id        TEXT PRIMARY KEY,
            display_name    TEXT NOT NULL,
            agent_type      TEXT NOT NULL,
            namespace       TEXT NOT NULL,
            capabilities    TEXT NOT NULL DEFAULT '{}',
            access_level    TEXT NOT NULL,
            is_active       INTEGER NOT NULL DEFAULT 1,
            last_activity   TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_namespace_id
            ON agents (namespace, agent_id);

        CREATE TABLE IF NOT EXISTS memories (
            id                  TEXT PRIMARY KEY,
            content             TEXT NOT NULL,
            owner_agent_id      TEXT NOT NULL,
            namespace           TEXT NOT NULL,
            access_level        TEXT NOT NULL,
            tags                TEXT NOT NULL DEFAULT '[]',
            importance          REAL NOT NULL DEFAULT 0.5,
            shared_with         TEXT NOT NULL DEFAULT '[]',
            prior_access_level  TEXT,
            parent_memory_id    TEXT,
            content_hash        TEXT NOT NULL,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            last_accessed_at    TEXT NOT NULL,
            access_count        INTEGER NOT NULL DEFAULT 0,
            is_archived         INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_memories_owner
            ON memories (owner_agent_id, is_archived);
        CREATE INDEX IF NOT EXISTS idx_memories_namespace_access
            ON memories (namespace, access_level);
        CREATE INDEX IF NOT EXISTS idx_memories_parent
            ON memories (parent_memory_id);

        CREATE TABLE IF NOT EXISTS memory_embeddings (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            content_hash    TEXT NOT NULL UNIQUE,
            embedding       BLOB NOT NULL,
            dimensions      INTEGER NOT NULL,
            model_name      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memory_embedding_link (
            memory_id       TEXT PRIMARY KEY,
            embedding_id    INTEGER NOT NULL
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
            content,
            content='memories',
            content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS memories_fts_insert
        AFTER INSERT ON memories BEGIN
            INSERT INTO memory_fts (rowid, content) VALUES (new.rowid, new.content);
        END;
        CREATE TRIGGER IF NOT EXISTS memories_fts_delete
        AFTER DELETE ON memories BEGIN
            INSERT INTO memory_fts (memory_fts, rowid, content)
            VALUES ('delete', old.rowid, old.content);
        END;
        CREATE TRIGGER IF NOT EXISTS memories_fts_update
        AFTER UPDATE OF content ON memories BEGIN
            INSERT INTO memory_fts (memory_fts, rowid, content)
            VALUES ('delete', old.rowid, old.content);
            INSERT INTO memory_fts (rowid, content) VALUES (new.rowid, new.content);
        END;",
    )
    .map_err(|e| to_storage_err(format!("migration v1: {e}")))
}
