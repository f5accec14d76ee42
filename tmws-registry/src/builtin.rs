//! The built-in Trinitas catalogue: an immutable compile-time table.
//!
//! These six agents always exist, are never persisted as mutable records,
//! and cannot be unregistered. Short aliases resolve before full ids.

use tmws_core::models::{AccessLevel, Agent, AgentType};

/// A compile-time agent definition.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinAgent {
    pub id: &'static str,
    pub alias: &'static str,
    pub display_name: &'static str,
    pub access_level: AccessLevel,
    pub role: &'static str,
}

/// The Trinitas agents, ordered by id.
pub const TRINITAS_AGENTS: [BuiltinAgent; 6] = [
    BuiltinAgent {
        id: "artemis-optimizer",
        alias: "artemis",
        display_name: "Artemis (Optimizer)",
        access_level: AccessLevel::Elevated,
        role: "performance optimization",
    },
    BuiltinAgent {
        id: "athena-conductor",
        alias: "athena",
        display_name: "Athena (Conductor)",
        access_level: AccessLevel::System,
        role: "orchestration",
    },
    BuiltinAgent {
        id: "eris-coordinator",
        alias: "eris",
        display_name: "Eris (Coordinator)",
        access_level: AccessLevel::Elevated,
        role: "tactical coordination",
    },
    BuiltinAgent {
        id: "hera-strategist",
        alias: "hera",
        display_name: "Hera (Strategist)",
        access_level: AccessLevel::Elevated,
        role: "strategic planning",
    },
    BuiltinAgent {
        id: "hestia-auditor",
        alias: "hestia",
        display_name: "Hestia (Auditor)",
        access_level: AccessLevel::System,
        role: "security auditing",
    },
    BuiltinAgent {
        id: "muses-documenter",
        alias: "muses",
        display_name: "Muses (Documenter)",
        access_level: AccessLevel::Standard,
        role: "documentation",
    },
];

/// Namespace all built-ins live in.
pub const TRINITAS_NAMESPACE: &str = "trinitas";

/// Find a built-in by alias or full id.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinAgent> {
    TRINITAS_AGENTS
        .iter()
        .find(|b| b.alias == name || b.id == name)
}

/// Whether `name` names a built-in (alias or full id).
pub fn is_builtin(name: &str) -> bool {
    find_builtin(name).is_some()
}

impl BuiltinAgent {
    /// Materialise as a regular `Agent` record.
    pub fn to_agent(&self) -> Agent {
        let mut agent = Agent::new(
            self.id,
            self.display_name,
            AgentType::SystemAgent,
            TRINITAS_NAMESPACE,
            self.access_level,
        );
        agent
            .capabilities
            .insert("role".into(), serde_json::Value::String(self.role.into()));
        agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_and_ids_both_resolve() {
        assert_eq!(find_builtin("athena").unwrap().id, "athena-conductor");
        assert_eq!(find_builtin("athena-conductor").unwrap().alias, "athena");
        assert!(find_builtin("apollo").is_none());
    }

    #[test]
    fn all_six_are_present_and_sorted() {
        assert_eq!(TRINITAS_AGENTS.len(), 6);
        for pair in TRINITAS_AGENTS.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[test]
    fn access_levels_match_the_catalogue() {
        assert_eq!(find_builtin("athena").unwrap().access_level, AccessLevel::System);
        assert_eq!(find_builtin("hestia").unwrap().access_level, AccessLevel::System);
        assert_eq!(find_builtin("artemis").unwrap().access_level, AccessLevel::Elevated);
        assert_eq!(find_builtin("muses").unwrap().access_level, AccessLevel::Standard);
    }

    #[test]
    fn materialised_agents_carry_role_capability() {
        let agent = find_builtin("hera").unwrap().to_agent();
        assert_eq!(agent.namespace, TRINITAS_NAMESPACE);
        assert!(agent.capabilities.contains_key("role"));
    }
}
