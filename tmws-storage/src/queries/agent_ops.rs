//! Agent record persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use tmws_core::errors::TmwsResult;
use tmws_core::models::{AccessLevel, Agent, AgentStatistics, AgentType, MemoryAccess};

use crate::to_storage_err;

use super::memory_crud::OptionalRow;

const AGENT_COLUMNS: &str = "agent_id, display_name, agent_type, namespace, capabilities, \
     access_level, is_active, last_activity, created_at, updated_at";

/// Insert or replace an agent record.
pub fn upsert_agent(conn: &Connection, agent: &Agent) -> TmwsResult<()> {
    let capabilities_json = serde_json::to_string(&agent.capabilities)
        .map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO agents (
            agent_id, display_name, agent_type, namespace, capabilities,
            access_level, is_active, last_activity, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(agent_id) DO UPDATE SET
            display_name = excluded.display_name,
            agent_type = excluded.agent_type,
            namespace = excluded.namespace,
            capabilities = excluded.capabilities,
            access_level = excluded.access_level,
            is_active = excluded.is_active,
            last_activity = excluded.last_activity,
            updated_at = excluded.updated_at",
        params![
            agent.agent_id,
            agent.display_name,
            agent.agent_type.as_str(),
            agent.namespace,
            capabilities_json,
            agent.access_level.as_str(),
            agent.is_active as i32,
            agent.last_activity.to_rfc3339(),
            agent.created_at.to_rfc3339(),
            agent.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Get an agent by id.
pub fn get_agent(conn: &Connection, agent_id: &str) -> TmwsResult<Option<Agent>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE agent_id = ?1"))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let result = stmt
        .query_row(params![agent_id], |row| Ok(row_to_agent(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    match result {
        Some(parsed) => Ok(Some(parsed?)),
        None => Ok(None),
    }
}

/// List agents, optionally filtered by namespace and/or type, ordered by
/// `agent_id` ascending.
pub fn list_agents(
    conn: &Connection,
    namespace: Option<&str>,
    agent_type: Option<AgentType>,
) -> TmwsResult<Vec<Agent>> {
    let mut clauses = vec!["is_active = 1".to_string()];
    let mut params: Vec<String> = Vec::new();
    if let Some(ns) = namespace {
        clauses.push("namespace = ?".to_string());
        params.push(ns.to_string());
    }
    if let Some(ty) = agent_type {
        clauses.push("agent_type = ?".to_string());
        params.push(ty.as_str().to_string());
    }

    let sql = format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE {} ORDER BY agent_id ASC",
        clauses.join(" AND ")
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(row_to_agent(row))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut agents = Vec::new();
    for row in rows {
        agents.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(agents)
}

/// Deactivate an agent. The record stays; owned memories are untouched.
pub fn deactivate_agent(conn: &Connection, agent_id: &str) -> TmwsResult<()> {
    let rows = conn
        .execute(
            "UPDATE agents SET is_active = 0, updated_at = ?2 WHERE agent_id = ?1",
            params![agent_id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(tmws_core::TmwsError::not_found(format!("agent {agent_id}")));
    }
    Ok(())
}

/// Refresh an agent's activity timestamp.
pub fn touch_agent(conn: &Connection, agent_id: &str, at: DateTime<Utc>) -> TmwsResult<()> {
    conn.execute(
        "UPDATE agents SET last_activity = ?2 WHERE agent_id = ?1",
        params![agent_id, at.to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Per-agent memory statistics.
pub fn agent_statistics(conn: &Connection, agent_id: &str) -> TmwsResult<AgentStatistics> {
    let (memory_count, archived_count, shared_count, average_importance, total_access_count) =
        conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(is_archived), 0),
                COALESCE(SUM(access_level = 'shared'), 0),
                COALESCE(AVG(CASE WHEN is_archived = 0 THEN importance END), 0.0),
                COALESCE(SUM(access_count), 0)
             FROM memories WHERE owner_agent_id = ?1",
            params![agent_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let last_activity: Option<String> = conn
        .query_row(
            "SELECT last_activity FROM agents WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    Ok(AgentStatistics {
        agent_id: agent_id.to_string(),
        memory_count: memory_count as u64,
        archived_count: archived_count as u64,
        shared_count: shared_count as u64,
        average_importance,
        total_access_count: total_access_count as u64,
        last_activity: last_activity.as_deref().map(super::memory_crud::parse_dt).transpose()?,
    })
}

/// Count memories in a namespace, optionally at one access level.
pub fn count_memories(
    conn: &Connection,
    namespace: &str,
    access: Option<MemoryAccess>,
) -> TmwsResult<u64> {
    let count: i64 = match access {
        Some(level) => conn
            .query_row(
                "SELECT COUNT(*) FROM memories
                 WHERE namespace = ?1 AND access_level = ?2 AND is_archived = 0",
                params![namespace, level.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| to_storage_err(e.to_string()))?,
        None => conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE namespace = ?1 AND is_archived = 0",
                params![namespace],
                |row| row.get(0),
            )
            .map_err(|e| to_storage_err(e.to_string()))?,
    };
    Ok(count as u64)
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> TmwsResult<Agent> {
    let type_str: String = row.get(2).map_err(|e| to_storage_err(e.to_string()))?;
    let capabilities_json: String = row.get(4).map_err(|e| to_storage_err(e.to_string()))?;
    let level_str: String = row.get(5).map_err(|e| to_storage_err(e.to_string()))?;

    let capabilities = serde_json::from_str(&capabilities_json)
        .map_err(|e| to_storage_err(format!("parse capabilities: {e}")))?;
    let access_level = AccessLevel::parse(&level_str)
        .ok_or_else(|| to_storage_err(format!("unknown access level '{level_str}'")))?;

    let parse = super::memory_crud::parse_dt;
    Ok(Agent {
        agent_id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        display_name: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        agent_type: AgentType::parse(&type_str),
        namespace: row.get(3).map_err(|e| to_storage_err(e.to_string()))?,
        capabilities,
        access_level,
        is_active: row.get::<_, i32>(6).map_err(|e| to_storage_err(e.to_string()))? != 0,
        last_activity: parse(&row.get::<_, String>(7).map_err(|e| to_storage_err(e.to_string()))?)?,
        created_at: parse(&row.get::<_, String>(8).map_err(|e| to_storage_err(e.to_string()))?)?,
        updated_at: parse(&row.get::<_, String>(9).map_err(|e| to_storage_err(e.to_string()))?)?,
    })
}
