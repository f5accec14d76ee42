//! Insert, get, update, archive, and delete for memories.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use tmws_core::errors::TmwsResult;
use tmws_core::models::{Memory, MemoryAccess, ShareGrant};

use crate::to_storage_err;

use super::embedding_ops;

/// Column list shared by every memory SELECT. Order matters: it matches
/// `row_to_memory`.
pub(crate) const MEMORY_COLUMNS: &str = "id, content, owner_agent_id, namespace, access_level, \
     tags, importance, shared_with, prior_access_level, parent_memory_id, \
     content_hash, created_at, updated_at, last_accessed_at, access_count, is_archived";

/// Insert a memory row together with its embedding.
/// Wrapped in a transaction: row + embedding + link are all-or-nothing.
pub fn insert_memory(
    conn: &Connection,
    memory: &Memory,
    embedding: &[f32],
    model_name: &str,
) -> TmwsResult<Uuid> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("insert_memory begin: {e}")))?;

    match insert_memory_inner(&tx, memory, embedding, model_name) {
        Ok(()) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("insert_memory commit: {e}")))?;
            Ok(memory.id)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

fn insert_memory_inner(
    conn: &Connection,
    memory: &Memory,
    embedding: &[f32],
    model_name: &str,
) -> TmwsResult<()> {
    let tags_json =
        serde_json::to_string(&memory.tags).map_err(|e| to_storage_err(e.to_string()))?;
    let shared_json =
        serde_json::to_string(&memory.shared_with).map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO memories (
            id, content, owner_agent_id, namespace, access_level,
            tags, importance, shared_with, prior_access_level, parent_memory_id,
            content_hash, created_at, updated_at, last_accessed_at, access_count, is_archived
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            memory.id.to_string(),
            memory.content,
            memory.owner_agent_id,
            memory.namespace,
            memory.access_level.as_str(),
            tags_json,
            memory.importance,
            shared_json,
            memory.prior_access_level.map(|a| a.as_str()),
            memory.parent_memory_id.map(|p| p.to_string()),
            memory.content_hash,
            memory.created_at.to_rfc3339(),
            memory.updated_at.to_rfc3339(),
            memory.last_accessed_at.to_rfc3339(),
            memory.access_count as i64,
            memory.is_archived as i32,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    embedding_ops::store_embedding(
        conn,
        &memory.id.to_string(),
        &memory.content_hash,
        embedding,
        model_name,
    )
}

/// Get a single memory by id.
pub fn get_memory(conn: &Connection, id: Uuid) -> TmwsResult<Option<Memory>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let result = stmt
        .query_row(params![id.to_string()], |row| Ok(row_to_memory(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    match result {
        Some(parsed) => Ok(Some(parsed?)),
        None => Ok(None),
    }
}

/// Full-row update; last-writer-wins on every field. When `embedding` is
/// present the stored vector is replaced too (content changed).
/// Wrapped in a transaction: row + embedding are all-or-nothing.
pub fn update_memory(
    conn: &Connection,
    memory: &Memory,
    embedding: Option<&[f32]>,
    model_name: &str,
) -> TmwsResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("update_memory begin: {e}")))?;

    match update_memory_inner(&tx, memory, embedding, model_name) {
        Ok(()) => tx
            .commit()
            .map_err(|e| to_storage_err(format!("update_memory commit: {e}"))),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

fn update_memory_inner(
    conn: &Connection,
    memory: &Memory,
    embedding: Option<&[f32]>,
    model_name: &str,
) -> TmwsResult<()> {
    let tags_json =
        serde_json::to_string(&memory.tags).map_err(|e| to_storage_err(e.to_string()))?;
    let shared_json =
        serde_json::to_string(&memory.shared_with).map_err(|e| to_storage_err(e.to_string()))?;

    let rows = conn
        .execute(
            "UPDATE memories SET
                content = ?2, owner_agent_id = ?3, namespace = ?4, access_level = ?5,
                tags = ?6, importance = ?7, shared_with = ?8, prior_access_level = ?9,
                parent_memory_id = ?10, content_hash = ?11, updated_at = ?12,
                last_accessed_at = ?13, access_count = ?14, is_archived = ?15
             WHERE id = ?1",
            params![
                memory.id.to_string(),
                memory.content,
                memory.owner_agent_id,
                memory.namespace,
                memory.access_level.as_str(),
                tags_json,
                memory.importance,
                shared_json,
                memory.prior_access_level.map(|a| a.as_str()),
                memory.parent_memory_id.map(|p| p.to_string()),
                memory.content_hash,
                memory.updated_at.to_rfc3339(),
                memory.last_accessed_at.to_rfc3339(),
                memory.access_count as i64,
                memory.is_archived as i32,
            ],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    if rows == 0 {
        return Err(tmws_core::TmwsError::not_found(format!(
            "memory {}",
            memory.id
        )));
    }

    if let Some(vec) = embedding {
        embedding_ops::store_embedding(
            conn,
            &memory.id.to_string(),
            &memory.content_hash,
            vec,
            model_name,
        )?;
    }

    Ok(())
}

/// Flip the archived flag. Refreshes `updated_at`; soft deletion is a
/// visible mutation.
pub fn set_archived(conn: &Connection, id: Uuid, archived: bool) -> TmwsResult<()> {
    let rows = conn
        .execute(
            "UPDATE memories SET is_archived = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), archived as i32, Utc::now().to_rfc3339()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(tmws_core::TmwsError::not_found(format!("memory {id}")));
    }
    Ok(())
}

/// Hard delete: removes the row and its embedding link. The embedding
/// itself stays until maintenance collects orphans (it may be shared by
/// other rows with the same content hash).
pub fn delete_memory(conn: &Connection, id: Uuid) -> TmwsResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("delete_memory begin: {e}")))?;

    let result = (|| {
        tx.execute(
            "DELETE FROM memory_embedding_link WHERE memory_id = ?1",
            params![id.to_string()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        let rows = tx
            .execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()])
            .map_err(|e| to_storage_err(e.to_string()))?;
        if rows == 0 {
            return Err(tmws_core::TmwsError::not_found(format!("memory {id}")));
        }
        Ok(())
    })();

    match result {
        Ok(()) => tx
            .commit()
            .map_err(|e| to_storage_err(format!("delete_memory commit: {e}"))),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Increment access counters for a batch of ids in one transaction,
/// without touching `updated_at`.
pub fn bump_access(conn: &Connection, ids: &[Uuid]) -> TmwsResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("bump_access begin: {e}")))?;
    let now = Utc::now().to_rfc3339();
    for id in ids {
        tx.execute(
            "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?2
             WHERE id = ?1",
            params![id.to_string(), now],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    tx.commit()
        .map_err(|e| to_storage_err(format!("bump_access commit: {e}")))
}

/// Parse a row from the memories table into a `Memory`.
pub(crate) fn row_to_memory(row: &rusqlite::Row<'_>) -> TmwsResult<Memory> {
    let id_str: String = row.get(0).map_err(|e| to_storage_err(e.to_string()))?;
    let access_str: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    let tags_json: String = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;
    let shared_json: String = row.get(7).map_err(|e| to_storage_err(e.to_string()))?;
    let prior_str: Option<String> = row.get(8).map_err(|e| to_storage_err(e.to_string()))?;
    let parent_str: Option<String> = row.get(9).map_err(|e| to_storage_err(e.to_string()))?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| to_storage_err(format!("parse memory id '{id_str}': {e}")))?;
    let access_level = MemoryAccess::parse(&access_str)
        .ok_or_else(|| to_storage_err(format!("unknown access level '{access_str}'")))?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| to_storage_err(format!("parse tags: {e}")))?;
    let shared_with: Vec<ShareGrant> = serde_json::from_str(&shared_json)
        .map_err(|e| to_storage_err(format!("parse shared_with: {e}")))?;
    let prior_access_level = prior_str
        .as_deref()
        .map(|s| {
            MemoryAccess::parse(s)
                .ok_or_else(|| to_storage_err(format!("unknown prior access level '{s}'")))
        })
        .transpose()?;
    let parent_memory_id = parent_str
        .as_deref()
        .map(|s| {
            Uuid::parse_str(s).map_err(|e| to_storage_err(format!("parse parent id '{s}': {e}")))
        })
        .transpose()?;

    Ok(Memory {
        id,
        content: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        owner_agent_id: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
        namespace: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        access_level,
        tags,
        importance: row.get(6).map_err(|e| to_storage_err(e.to_string()))?,
        shared_with,
        prior_access_level,
        parent_memory_id,
        content_hash: row.get(10).map_err(|e| to_storage_err(e.to_string()))?,
        created_at: parse_dt(&row.get::<_, String>(11).map_err(|e| to_storage_err(e.to_string()))?)?,
        updated_at: parse_dt(&row.get::<_, String>(12).map_err(|e| to_storage_err(e.to_string()))?)?,
        last_accessed_at: parse_dt(
            &row.get::<_, String>(13).map_err(|e| to_storage_err(e.to_string()))?,
        )?,
        access_count: row
            .get::<_, i64>(14)
            .map_err(|e| to_storage_err(e.to_string()))? as u64,
        is_archived: row
            .get::<_, i32>(15)
            .map_err(|e| to_storage_err(e.to_string()))?
            != 0,
    })
}

pub(crate) fn parse_dt(s: &str) -> TmwsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| to_storage_err(format!("parse datetime '{s}': {e}")))
}

/// Helper trait to make `query_row` return `Option` on not-found.
pub(crate) trait OptionalRow<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalRow<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
