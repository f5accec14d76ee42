//! The access policy: `(principal, operation, resource)` → decision.
//!
//! Rules are evaluated in a fixed order; the first Allow wins and any
//! explicit Deny from a gate is final. Evaluation is pure — the caller
//! supplies in-memory copies of the agent and memory records, and the
//! registry keeps those copies coherent.

use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::models::{AccessLevel, Agent, Memory, MemoryAccess, SharePermission};
use tmws_core::validation::is_reserved_namespace;

/// What the principal is trying to do to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Delete,
    Share,
}

/// Outcome of a policy evaluation. Deny carries the reason given to logs;
/// clients only ever see `ErrPermission`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert to a result, mapping Deny to `ErrPermission`.
    pub fn into_result(self) -> TmwsResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(TmwsError::Permission { reason }),
        }
    }
}

/// Evaluate the default policy chain for `principal` performing `op` on
/// `memory`.
pub fn evaluate(principal: &Agent, op: Operation, memory: &Memory) -> Decision {
    // 1. Self-access: owners can do anything to their own memories.
    if principal.agent_id == memory.owner_agent_id {
        return Decision::Allow;
    }

    // 2. System/elevated override.
    match principal.access_level {
        AccessLevel::System => {
            if matches!(op, Operation::Read | Operation::Write) {
                return Decision::Allow;
            }
        }
        AccessLevel::Elevated | AccessLevel::Admin => {
            if op == Operation::Read {
                return Decision::Allow;
            }
            if op == Operation::Write
                && (principal.namespace == memory.namespace
                    || principal.access_level >= AccessLevel::Admin)
            {
                return Decision::Allow;
            }
        }
        _ => {}
    }

    // Readonly principals are denied mutations before the resource
    // gates: without this, team membership or a write grant would make
    // the level indistinguishable from standard.
    if principal.access_level == AccessLevel::Readonly && op != Operation::Read {
        return Decision::Deny("readonly principal cannot mutate".into());
    }

    // 3. Access-level gates on the resource.
    match memory.access_level {
        MemoryAccess::Private => {
            Decision::Deny(format!("memory {} is private to its owner", memory.id))
        }
        MemoryAccess::Team => {
            if principal.namespace != memory.namespace {
                return Decision::Deny(format!(
                    "team memory {} belongs to another namespace",
                    memory.id
                ));
            }
            match op {
                Operation::Read | Operation::Write => Decision::Allow,
                Operation::Delete | Operation::Share => {
                    Decision::Deny("only the owner may delete or share a team memory".into())
                }
            }
        }
        MemoryAccess::Shared => {
            let needed = match op {
                Operation::Read => SharePermission::Read,
                Operation::Write => SharePermission::Write,
                Operation::Delete => SharePermission::Delete,
                Operation::Share => {
                    return Decision::Deny("only the owner may re-share a memory".into());
                }
            };
            if memory.grant_for(&principal.agent_id, needed) {
                Decision::Allow
            } else {
                Decision::Deny(format!(
                    "no sufficient share grant on memory {}",
                    memory.id
                ))
            }
        }
        MemoryAccess::Public => match op {
            Operation::Read => Decision::Allow,
            _ => Decision::Deny("public memories are writable only by their owner".into()),
        },
        MemoryAccess::System => match op {
            Operation::Read => {
                if principal.access_level >= AccessLevel::Elevated {
                    Decision::Allow
                } else {
                    Decision::Deny("system memories require an elevated principal".into())
                }
            }
            // Write for system principals already allowed in rule 2.
            _ => Decision::Deny("system memories are mutable only by system principals".into()),
        },
    }
}

/// Rule 5: writes into reserved namespaces require an elevated principal.
/// Built-in system agents are the reserved namespaces' legitimate
/// inhabitants and pass regardless of level; the registry refuses to mint
/// `system_agent` records dynamically, so the type is trustworthy.
pub fn check_namespace_write(principal: &Agent, namespace: &str) -> TmwsResult<()> {
    if is_reserved_namespace(namespace)
        && principal.access_level < AccessLevel::Elevated
        && principal.agent_type != tmws_core::models::AgentType::SystemAgent
    {
        return Err(TmwsError::Permission {
            reason: format!("namespace {namespace:?} is reserved"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmws_core::models::{AgentType, ShareGrant};

    fn agent(id: &str, namespace: &str, level: AccessLevel) -> Agent {
        Agent::new(id, id, AgentType::CustomAgent, namespace, level)
    }

    fn memory(owner: &str, namespace: &str, access: MemoryAccess) -> Memory {
        let mut m = Memory::new(owner, namespace, "content");
        m.access_level = access;
        m
    }

    #[test]
    fn owner_is_allowed_everything() {
        let owner = agent("owner", "ns", AccessLevel::Standard);
        for access in [
            MemoryAccess::Private,
            MemoryAccess::Team,
            MemoryAccess::Shared,
            MemoryAccess::Public,
            MemoryAccess::System,
        ] {
            let m = memory("owner", "ns", access);
            for op in [Operation::Read, Operation::Write, Operation::Delete, Operation::Share] {
                assert!(evaluate(&owner, op, &m).is_allowed(), "{access:?}/{op:?}");
            }
        }
    }

    #[test]
    fn private_memories_are_isolated() {
        let stranger = agent("stranger", "ns", AccessLevel::Standard);
        let m = memory("owner", "ns", MemoryAccess::Private);
        for op in [Operation::Read, Operation::Write, Operation::Delete] {
            assert!(!evaluate(&stranger, op, &m).is_allowed());
        }
    }

    #[test]
    fn team_gate_follows_namespace() {
        let teammate = agent("teammate", "ns", AccessLevel::Standard);
        let outsider = agent("outsider", "other", AccessLevel::Standard);
        let m = memory("owner", "ns", MemoryAccess::Team);

        assert!(evaluate(&teammate, Operation::Read, &m).is_allowed());
        assert!(evaluate(&teammate, Operation::Write, &m).is_allowed());
        assert!(!evaluate(&teammate, Operation::Delete, &m).is_allowed());
        assert!(!evaluate(&outsider, Operation::Read, &m).is_allowed());
    }

    #[test]
    fn share_grants_gate_by_permission_rank() {
        let grantee = agent("grantee", "other", AccessLevel::Standard);
        let mut m = memory("owner", "ns", MemoryAccess::Shared);
        m.shared_with = vec![ShareGrant {
            agent_id: "grantee".into(),
            permission: SharePermission::Write,
        }];

        assert!(evaluate(&grantee, Operation::Read, &m).is_allowed());
        assert!(evaluate(&grantee, Operation::Write, &m).is_allowed());
        assert!(!evaluate(&grantee, Operation::Delete, &m).is_allowed());

        let ungrant = agent("ungranted", "other", AccessLevel::Standard);
        assert!(!evaluate(&ungrant, Operation::Read, &m).is_allowed());
    }

    #[test]
    fn public_memories_read_only_for_non_owners() {
        let reader = agent("reader", "anywhere", AccessLevel::Standard);
        let m = memory("owner", "ns", MemoryAccess::Public);
        assert!(evaluate(&reader, Operation::Read, &m).is_allowed());
        assert!(!evaluate(&reader, Operation::Write, &m).is_allowed());
        assert!(!evaluate(&reader, Operation::Delete, &m).is_allowed());
    }

    #[test]
    fn system_memories_need_elevation_to_read() {
        let standard = agent("std", "ns", AccessLevel::Standard);
        let elevated = agent("elv", "ns", AccessLevel::Elevated);
        let system = agent("sys", "ns", AccessLevel::System);
        let m = memory("owner", "system", MemoryAccess::System);

        assert!(!evaluate(&standard, Operation::Read, &m).is_allowed());
        assert!(evaluate(&elevated, Operation::Read, &m).is_allowed());
        assert!(evaluate(&system, Operation::Write, &m).is_allowed());
        assert!(!evaluate(&elevated, Operation::Delete, &m).is_allowed());
    }

    #[test]
    fn system_principal_reads_and_writes_everything() {
        let sys = agent("sys", "anywhere", AccessLevel::System);
        let m = memory("owner", "ns", MemoryAccess::Private);
        assert!(evaluate(&sys, Operation::Read, &m).is_allowed());
        assert!(evaluate(&sys, Operation::Write, &m).is_allowed());
    }

    #[test]
    fn elevated_writes_only_in_own_namespace_admin_anywhere() {
        let elevated = agent("elv", "ns", AccessLevel::Elevated);
        let admin = agent("adm", "elsewhere", AccessLevel::Admin);
        let same_ns = memory("owner", "ns", MemoryAccess::Private);
        let other_ns = memory("owner", "far", MemoryAccess::Private);

        assert!(evaluate(&elevated, Operation::Write, &same_ns).is_allowed());
        assert!(!evaluate(&elevated, Operation::Write, &other_ns).is_allowed());
        assert!(evaluate(&admin, Operation::Write, &other_ns).is_allowed());
    }

    #[test]
    fn readonly_principal_never_mutates() {
        let ro = agent("ro", "ns", AccessLevel::Readonly);
        let m = memory("owner", "ns", MemoryAccess::Team);
        assert!(evaluate(&ro, Operation::Read, &m).is_allowed());
        assert!(!evaluate(&ro, Operation::Write, &m).is_allowed());
    }

    #[test]
    fn reserved_namespaces_gate_writes() {
        let standard = agent("std", "ns", AccessLevel::Standard);
        let elevated = agent("elv", "ns", AccessLevel::Elevated);
        assert!(check_namespace_write(&standard, "system").is_err());
        assert!(check_namespace_write(&standard, "trinitas").is_err());
        assert!(check_namespace_write(&standard, "default").is_ok());
        assert!(check_namespace_write(&elevated, "system").is_ok());

        // Built-in system agents live in reserved namespaces at any level.
        let mut builtin = agent("muses-documenter", "trinitas", AccessLevel::Standard);
        builtin.agent_type = AgentType::SystemAgent;
        assert!(check_namespace_write(&builtin, "trinitas").is_ok());
    }

    #[test]
    fn deny_converts_to_permission_error() {
        let err = Decision::Deny("nope".into()).into_result().unwrap_err();
        assert_eq!(err.code(), "ErrPermission");
        assert!(Decision::Allow.into_result().is_ok());
    }
}
