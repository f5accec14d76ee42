//! Vector, lexical, and paged retrieval over memories.

use rusqlite::Connection;
use uuid::Uuid;

use tmws_core::errors::TmwsResult;
use tmws_core::models::{Memory, RecallOrder, ScoredMemory, SearchFilters};

use crate::to_storage_err;

use super::embedding_ops::{bytes_to_f32_vec, cosine_similarity};
use super::memory_crud::{get_memory, row_to_memory, MEMORY_COLUMNS};

/// Search memories by vector similarity among rows satisfying `filters`.
///
/// Brute-force scan over the embeddings of candidate rows with cosine
/// similarity computed in-process; the candidate set is narrowed by SQL
/// first so the scan touches only visible rows. Results are the top `k`
/// with `similarity >= min_similarity`, ties broken by
/// `(importance DESC, updated_at DESC, id ASC)`.
pub fn search(
    conn: &Connection,
    query_vec: &[f32],
    filters: &SearchFilters,
    k: usize,
    min_similarity: f64,
) -> TmwsResult<Vec<ScoredMemory>> {
    // Zero-norm queries match nothing; skip the scan entirely.
    let query_norm_sq: f64 = query_vec.iter().map(|x| (*x as f64) * (*x as f64)).sum();
    if query_norm_sq == 0.0 || k == 0 {
        return Ok(vec![]);
    }

    let (clause, params) = filter_sql(filters, "m.");
    let sql = format!(
        "SELECT m.id, m.importance, m.updated_at, m.tags, me.embedding, me.dimensions
         FROM memories m
         JOIN memory_embedding_link mel ON mel.memory_id = m.id
         JOIN memory_embeddings me ON me.id = mel.embedding_id
         WHERE {clause}"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let id: String = row.get(0)?;
            let importance: f64 = row.get(1)?;
            let updated_at: String = row.get(2)?;
            let tags_json: String = row.get(3)?;
            let blob: Vec<u8> = row.get(4)?;
            let dims: i64 = row.get(5)?;
            Ok((id, importance, updated_at, tags_json, blob, dims))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    struct Candidate {
        id: String,
        similarity: f64,
        importance: f64,
        updated_at: String,
    }

    let mut scored: Vec<Candidate> = Vec::new();
    for row in rows {
        let (id, importance, updated_at, tags_json, blob, dims) =
            row.map_err(|e| to_storage_err(e.to_string()))?;
        // Skip dimension mismatches without deserializing the vector.
        if dims as usize != query_vec.len() {
            continue;
        }
        // LIKE-matched tags are a superset; confirm the exact subset here.
        if !tags_match(&tags_json, &filters.tags)? {
            continue;
        }
        let stored = bytes_to_f32_vec(&blob, dims as usize);
        let similarity = cosine_similarity(query_vec, &stored);
        if similarity >= min_similarity {
            scored.push(Candidate { id, similarity, importance, updated_at });
        }
    }

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.importance
                    .partial_cmp(&a.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(k);

    let mut results = Vec::with_capacity(scored.len());
    for candidate in scored {
        let id = Uuid::parse_str(&candidate.id)
            .map_err(|e| to_storage_err(format!("parse memory id: {e}")))?;
        if let Some(memory) = get_memory(conn, id)? {
            results.push(ScoredMemory { memory, similarity: candidate.similarity });
        }
    }
    Ok(results)
}

/// Lexical search over the FTS index, used when no query vector is
/// available. Ranked by BM25, constrained by the same filters.
pub fn search_lexical(
    conn: &Connection,
    query: &str,
    filters: &SearchFilters,
    limit: usize,
) -> TmwsResult<Vec<Memory>> {
    let match_expr = fts_query(query);
    if match_expr.is_empty() || limit == 0 {
        return Ok(vec![]);
    }

    let (clause, mut params) = filter_sql(filters, "m.");
    let sql = format!(
        "SELECT {cols}
         FROM memory_fts fts
         JOIN memories m ON m.rowid = fts.rowid
         WHERE memory_fts MATCH ? AND {clause}
         ORDER BY rank
         LIMIT {limit}",
        cols = qualified_columns("m."),
    );
    params.insert(0, match_expr);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(row_to_memory(row))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut results = Vec::new();
    for row in rows {
        let memory = row.map_err(|e| to_storage_err(e.to_string()))??;
        if subset_of(&filters.tags, &memory.tags) {
            results.push(memory);
        }
    }
    Ok(results)
}

/// Non-semantic paged listing.
pub fn recall(
    conn: &Connection,
    filters: &SearchFilters,
    order: RecallOrder,
    limit: usize,
    offset: usize,
) -> TmwsResult<Vec<Memory>> {
    let (clause, params) = filter_sql(filters, "");
    let sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM memories
         WHERE {clause}
         ORDER BY {order}
         LIMIT {limit} OFFSET {offset}",
        order = order.sql(),
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(row_to_memory(row))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut results = Vec::new();
    for row in rows {
        let memory = row.map_err(|e| to_storage_err(e.to_string()))??;
        if subset_of(&filters.tags, &memory.tags) {
            results.push(memory);
        }
    }
    Ok(results)
}

/// Build the WHERE clause for `filters`. Returns the clause and its bound
/// parameters; column names are prefixed with `prefix` for joined queries.
/// Caller input only ever lands in the parameter list.
fn filter_sql(filters: &SearchFilters, prefix: &str) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if !filters.include_archived {
        clauses.push(format!("{prefix}is_archived = 0"));
    }
    if let Some(owner) = &filters.owner {
        clauses.push(format!("{prefix}owner_agent_id = ?"));
        params.push(owner.clone());
    }
    if let Some(namespace) = &filters.namespace {
        clauses.push(format!("{prefix}namespace = ?"));
        params.push(namespace.clone());
    }
    if !filters.access_levels.is_empty() {
        let placeholders = vec!["?"; filters.access_levels.len()].join(", ");
        clauses.push(format!("{prefix}access_level IN ({placeholders})"));
        params.extend(filters.access_levels.iter().map(|a| a.as_str().to_string()));
    }
    for tag in &filters.tags {
        clauses.push(format!("{prefix}tags LIKE ? ESCAPE '\\'"));
        params.push(format!("%\"{}\"%", escape_like(tag)));
    }
    if let Some(vis) = &filters.visible_to {
        let mut branches = vec![
            format!("{prefix}owner_agent_id = ?"),
            format!("({prefix}access_level = 'team' AND {prefix}namespace = ?)"),
            format!("{prefix}access_level = 'public'"),
        ];
        params.push(vis.agent_id.clone());
        params.push(vis.namespace.clone());
        if vis.include_shared {
            branches.push(format!(
                "({prefix}access_level = 'shared' AND {prefix}shared_with LIKE ? ESCAPE '\\')"
            ));
            params.push(format!("%\"agent_id\":\"{}\"%", escape_like(&vis.agent_id)));
        }
        if vis.can_read_system {
            branches.push(format!("{prefix}access_level = 'system'"));
        }
        clauses.push(format!("({})", branches.join(" OR ")));
    }

    if clauses.is_empty() {
        ("1 = 1".to_string(), params)
    } else {
        (clauses.join(" AND "), params)
    }
}

/// Escape LIKE metacharacters so tags and agent ids match literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Reduce free text to a safe FTS5 MATCH expression: quoted terms OR-ed
/// together. Everything outside word characters is dropped.
fn fts_query(query: &str) -> String {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    terms.join(" OR ")
}

fn qualified_columns(prefix: &str) -> String {
    MEMORY_COLUMNS
        .split(", ")
        .map(|c| format!("{prefix}{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Exact subset check over the parsed tag list; the SQL LIKE filter is
/// only a pre-narrowing.
fn tags_match(tags_json: &str, required: &[String]) -> TmwsResult<bool> {
    if required.is_empty() {
        return Ok(true);
    }
    let tags: Vec<String> = serde_json::from_str(tags_json)
        .map_err(|e| to_storage_err(format!("parse tags: {e}")))?;
    Ok(subset_of(required, &tags))
}

fn subset_of(required: &[String], tags: &[String]) -> bool {
    required.iter().all(|t| tags.contains(t))
}
