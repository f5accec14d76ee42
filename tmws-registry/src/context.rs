//! Per-session current-agent context.
//!
//! Each session owns exactly one of these; the session layer's
//! single-request-at-a-time rule is what makes `&mut` access safe.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use tmws_core::constants::MAX_AGENT_HISTORY;
use tmws_core::models::Agent;

/// The "who is calling" slot for one session, with a bounded history of
/// prior agents.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub session_id: String,
    current: Agent,
    history: VecDeque<String>,
    pub switch_count: u64,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(session_id: impl Into<String>, agent: Agent) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            current: agent,
            history: VecDeque::new(),
            switch_count: 0,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn current(&self) -> &Agent {
        &self.current
    }

    /// Replace the current agent, recording the prior one in history.
    pub fn switch(&mut self, agent: Agent) {
        self.history.push_back(self.current.agent_id.clone());
        while self.history.len() > MAX_AGENT_HISTORY {
            self.history.pop_front();
        }
        self.current = agent;
        self.switch_count += 1;
        self.last_activity = Utc::now();
    }

    /// Swap the slot without touching history — the scoped half of
    /// `execute_as`. The caller must pair this with `restore` on every
    /// exit path.
    pub fn swap(&mut self, agent: Agent) -> Agent {
        std::mem::replace(&mut self.current, agent)
    }

    /// Put a previously swapped-out agent back.
    pub fn restore(&mut self, prior: Agent) {
        self.current = prior;
    }

    /// The most recent `n` prior agents, newest first.
    pub fn recent_history(&self, n: usize) -> Vec<String> {
        self.history.iter().rev().take(n).cloned().collect()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Seconds since the last request on this session.
    pub fn idle_secs(&self) -> i64 {
        (Utc::now() - self.last_activity).num_seconds()
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
    fn switch_records_history_and_count() {
        let mut ctx = AgentContext::new("s1", agent("first"));
        ctx.switch(agent("second"));
        ctx.switch(agent("third"));

        assert_eq!(ctx.current().agent_id, "third");
        assert_eq!(ctx.switch_count, 2);
        assert_eq!(ctx.recent_history(5), vec!["second", "first"]);
    }

    #[test]
    fn history_is_bounded_to_sixteen() {
        let mut ctx = AgentContext::new("s1", agent("agent-0"));
        for i in 1..=20 {
            ctx.switch(agent(&format!("agent-{i}")));
        }
        assert_eq!(ctx.recent_history(100).len(), MAX_AGENT_HISTORY);
        // Oldest entries dropped: agent-0 through agent-3 are gone.
        assert!(!ctx.recent_history(100).contains(&"agent-3".to_string()));
        assert!(ctx.recent_history(100).contains(&"agent-4".to_string()));
    }

    #[test]
    fn swap_and_restore_leave_history_untouched() {
        let mut ctx = AgentContext::new("s1", agent("athena-conductor"));
        let prior = ctx.swap(agent("hestia-auditor"));
        assert_eq!(ctx.current().agent_id, "hestia-auditor");

        ctx.restore(prior);
        assert_eq!(ctx.current().agent_id, "athena-conductor");
        assert_eq!(ctx.switch_count, 0);
        assert!(ctx.recent_history(5).is_empty());
    }
}
