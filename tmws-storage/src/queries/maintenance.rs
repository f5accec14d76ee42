//! Storage maintenance: archived-row purging, orphan collection,
//! incremental vacuum, and health reporting.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection};

use tmws_core::errors::TmwsResult;
use tmws_core::models::StorageHealth;

use crate::to_storage_err;

/// Hard-delete archived memories older than the retention window.
/// Returns the number of rows removed.
pub fn purge_archived(conn: &Connection, older_than_days: i64) -> TmwsResult<usize> {
    let cutoff = (Utc::now() - Duration::days(older_than_days)).to_rfc3339();

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(format!("purge_archived begin: {e}")))?;

    let result = (|| {
        tx.execute(
            "DELETE FROM memory_embedding_link WHERE memory_id IN (
                SELECT id FROM memories WHERE is_archived = 1 AND updated_at < ?1
            )",
            params![cutoff],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        let purged = tx
            .execute(
                "DELETE FROM memories WHERE is_archived = 1 AND updated_at < ?1",
                params![cutoff],
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
        // Embeddings no memory links to anymore can go as well.
        tx.execute(
            "DELETE FROM memory_embeddings WHERE id NOT IN (
                SELECT embedding_id FROM memory_embedding_link
            )",
            [],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(purged)
    })();

    match result {
        Ok(purged) => {
            tx.commit()
                .map_err(|e| to_storage_err(format!("purge_archived commit: {e}")))?;
            if purged > 0 {
                tracing::info!(purged, older_than_days, "archived memories purged");
            }
            Ok(purged)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Reclaim free pages without blocking readers for a full rebuild.
pub fn incremental_vacuum(conn: &Connection) -> TmwsResult<()> {
    conn.execute_batch("PRAGMA incremental_vacuum;")
        .map_err(|e| to_storage_err(format!("incremental_vacuum: {e}")))
}

/// Row counts and page accounting for the health endpoint/logs.
pub fn storage_health(conn: &Connection) -> TmwsResult<StorageHealth> {
    let count = |sql: &str| -> TmwsResult<u64> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|v| v as u64)
            .map_err(|e| to_storage_err(e.to_string()))
    };

    Ok(StorageHealth {
        memory_count: count("SELECT COUNT(*) FROM memories WHERE is_archived = 0")?,
        archived_count: count("SELECT COUNT(*) FROM memories WHERE is_archived = 1")?,
        agent_count: count("SELECT COUNT(*) FROM agents WHERE is_active = 1")?,
        embedding_count: count("SELECT COUNT(*) FROM memory_embeddings")?,
        page_count: count("PRAGMA page_count")?,
        freelist_count: count("PRAGMA freelist_count")?,
    })
}
