//! Embedding rows: deduplicated by content hash, linked to memories,
//! stored as little-endian f32 BLOBs.

use rusqlite::{params, Connection};

use tmws_core::errors::TmwsResult;

use crate::to_storage_err;

/// Store an embedding for a memory, deduplicating by content hash.
/// Wrapped in a SAVEPOINT so the upsert + lookup + link are all-or-nothing
/// (callers may already hold a transaction).
pub fn store_embedding(
    conn: &Connection,
    memory_id: &str,
    content_hash: &str,
    embedding: &[f32],
    model_name: &str,
) -> TmwsResult<()> {
    conn.execute_batch("SAVEPOINT store_emb")
        .map_err(|e| to_storage_err(format!("store_embedding savepoint: {e}")))?;

    match store_embedding_inner(conn, memory_id, content_hash, embedding, model_name) {
        Ok(()) => {
            conn.execute_batch("RELEASE store_emb")
                .map_err(|e| to_storage_err(format!("store_embedding release: {e}")))?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK TO store_emb");
            let _ = conn.execute_batch("RELEASE store_emb");
            Err(e)
        }
    }
}

fn store_embedding_inner(
    conn: &Connection,
    memory_id: &str,
    content_hash: &str,
    embedding: &[f32],
    model_name: &str,
) -> TmwsResult<()> {
    let blob = f32_vec_to_bytes(embedding);
    let dims = embedding.len() as i64;

    conn.execute(
        "INSERT INTO memory_embeddings (content_hash, embedding, dimensions, model_name)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(content_hash) DO UPDATE SET
            embedding = excluded.embedding,
            dimensions = excluded.dimensions,
            model_name = excluded.model_name",
        params![content_hash, blob, dims, model_name],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    let embedding_id: i64 = conn
        .query_row(
            "SELECT id FROM memory_embeddings WHERE content_hash = ?1",
            params![content_hash],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO memory_embedding_link (memory_id, embedding_id)
         VALUES (?1, ?2)
         ON CONFLICT(memory_id) DO UPDATE SET embedding_id = excluded.embedding_id",
        params![memory_id, embedding_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    Ok(())
}

/// Convert an f32 slice to little-endian bytes.
pub(crate) fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert little-endian bytes back to an f32 vec.
pub(crate) fn bytes_to_f32_vec(bytes: &[u8], expected_dims: usize) -> Vec<f32> {
    let mut result = Vec::with_capacity(expected_dims);
    for chunk in bytes.chunks_exact(4) {
        result.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    result
}

/// Cosine similarity between two vectors, in f64 to avoid drift on long sums.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
