//! Session registry: one AgentContext per live connection.
//!
//! The transports process one request at a time per session, which is what
//! makes the `with_context` mutation below race-free for a single session.

use dashmap::DashMap;

use tmws_core::constants::{MAX_SESSIONS, SESSION_IDLE_TIMEOUT_SECS};
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::Agent;
use tmws_registry::AgentContext;

/// Thread-safe session map, sharded internally by DashMap.
pub struct SessionManager {
    sessions: DashMap<String, AgentContext>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    /// Open a session for `agent`. Refuses beyond the session cap.
    pub fn create(&self, session_id: &str, agent: Agent) -> TmwsResult<()> {
        if self.sessions.len() >= MAX_SESSIONS {
            return Err(TmwsError::Permission {
                reason: format!("session limit of {MAX_SESSIONS} reached"),
            });
        }
        self.sessions
            .insert(session_id.to_string(), AgentContext::new(session_id, agent));
        tracing::debug!(session_id, "session opened");
        Ok(())
    }

    /// Run `f` with mutable access to the session's context. The entry
    /// lock is held only for the closure — never across a dispatch.
    pub fn with_context<F, T>(&self, session_id: &str, f: F) -> TmwsResult<T>
    where
        F: FnOnce(&mut AgentContext) -> T,
    {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| TmwsError::not_found(format!("session {session_id}")))?;
        Ok(f(&mut entry))
    }

    /// Snapshot the session's current agent.
    pub fn current_agent(&self, session_id: &str) -> TmwsResult<Agent> {
        self.with_context(session_id, |ctx| ctx.current().clone())
    }

    pub fn remove(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            tracing::debug!(session_id, "session closed");
        }
    }

    /// Evict sessions idle past the timeout. Returns the evicted ids.
    /// A safety net behind the per-connection idle timers, for sessions
    /// whose transport died without cleanup.
    pub fn sweep_idle(&self) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.idle_secs() >= SESSION_IDLE_TIMEOUT_SECS as i64)
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in &expired {
            self.sessions.remove(session_id);
            tracing::info!(session_id, "idle session evicted");
        }
        expired
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmws_core::models::{AccessLevel, AgentType};

    fn agent(id: &str) -> Agent {
        Agent::new(id, id, AgentType::CustomAgent, "default", AccessLevel::Standard)
    }

    #[test]
    fn create_and_mutate_context() {
        let mgr = SessionManager::new();
        mgr.create("s1", agent("first")).unwrap();
        assert_eq!(mgr.current_agent("s1").unwrap().agent_id, "first");

        mgr.with_context("s1", |ctx| ctx.switch(agent("second"))).unwrap();
        assert_eq!(mgr.current_agent("s1").unwrap().agent_id, "second");
    }

    #[test]
    fn missing_sessions_are_not_found() {
        let mgr = SessionManager::new();
        assert_eq!(mgr.current_agent("ghost").unwrap_err().code(), "ErrNotFound");
    }

    #[test]
    fn remove_closes_the_session() {
        let mgr = SessionManager::new();
        mgr.create("s1", agent("a")).unwrap();
        assert_eq!(mgr.count(), 1);
        mgr.remove("s1");
        assert_eq!(mgr.count(), 0);
    }

    #[test]
    fn sweep_leaves_active_sessions() {
        let mgr = SessionManager::new();
        mgr.create("active", agent("a")).unwrap();
        assert!(mgr.sweep_idle().is_empty());
        assert_eq!(mgr.count(), 1);
    }
}
