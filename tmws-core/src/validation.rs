//! Identity and input validation.
//!
//! Pure, side-effect-free checks. Every external string — agent ids,
//! namespaces, tags, file paths, profile documents — passes through here
//! before it reaches persistence or the filesystem. All rejections are
//! `ErrValidation`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::constants::{
    MAX_CONTENT_BYTES, MAX_PROFILE_AGENTS, MAX_TAGS, MAX_TAG_BYTES, RESERVED_NAMESPACES,
};
use crate::errors::{TmwsError, TmwsResult};

fn agent_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]{2,63}$").expect("agent id regex"))
}

/// Validate an agent id: `^[A-Za-z][A-Za-z0-9_.-]{2,63}$`, no control or
/// null bytes, no `..` sequence.
pub fn validate_agent_id(s: &str) -> TmwsResult<()> {
    if s.chars().any(|c| c.is_control()) {
        return Err(TmwsError::validation("agent id contains control characters"));
    }
    if s.contains("..") {
        return Err(TmwsError::validation("agent id contains '..'"));
    }
    if !agent_id_regex().is_match(s) {
        return Err(TmwsError::Validation {
            reason: format!("agent id must match [A-Za-z][A-Za-z0-9_.-]{{2,63}}: {s:?}"),
        });
    }
    Ok(())
}

/// Validate a namespace: same charset as agent ids, max 64 chars.
/// Reservation (who may write into `system`/`trinitas`) is enforced by the
/// access policy, not here.
pub fn validate_namespace(s: &str) -> TmwsResult<()> {
    if s.len() > 64 {
        return Err(TmwsError::validation("namespace exceeds 64 characters"));
    }
    if s.chars().any(|c| c.is_control()) {
        return Err(TmwsError::validation("namespace contains control characters"));
    }
    if s.contains("..") {
        return Err(TmwsError::validation("namespace contains '..'"));
    }
    if !agent_id_regex().is_match(s) {
        return Err(TmwsError::Validation {
            reason: format!("namespace must match [A-Za-z][A-Za-z0-9_.-]{{2,63}}: {s:?}"),
        });
    }
    Ok(())
}

/// Whether writes into this namespace require an elevated principal.
pub fn is_reserved_namespace(s: &str) -> bool {
    RESERVED_NAMESPACES.contains(&s)
}

/// Normalise a tag to NFC, trim outer whitespace, reject empty or oversized.
pub fn sanitize_tag(s: &str) -> TmwsResult<String> {
    let tag: String = s.nfc().collect::<String>().trim().to_string();
    if tag.is_empty() {
        return Err(TmwsError::validation("tag is empty after trimming"));
    }
    if tag.len() > MAX_TAG_BYTES {
        return Err(TmwsError::Validation {
            reason: format!("tag exceeds {MAX_TAG_BYTES} bytes: {tag:?}"),
        });
    }
    if tag.chars().any(|c| c.is_control()) {
        return Err(TmwsError::validation("tag contains control characters"));
    }
    Ok(tag)
}

/// Sanitize a tag list: each tag individually, then dedup preserving order,
/// capped at `MAX_TAGS`.
pub fn sanitize_tags(tags: &[String]) -> TmwsResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len().min(MAX_TAGS));
    for tag in tags {
        let clean = sanitize_tag(tag)?;
        if !out.contains(&clean) {
            out.push(clean);
        }
    }
    if out.len() > MAX_TAGS {
        return Err(TmwsError::Validation {
            reason: format!("at most {MAX_TAGS} tags allowed, got {}", out.len()),
        });
    }
    Ok(out)
}

/// Validate memory content: UTF-8 is guaranteed by the type; enforce the
/// 1..=65,535 byte envelope.
pub fn validate_content(s: &str) -> TmwsResult<()> {
    if s.is_empty() {
        return Err(TmwsError::validation("content is empty"));
    }
    if s.len() > MAX_CONTENT_BYTES {
        return Err(TmwsError::Validation {
            reason: format!("content exceeds {MAX_CONTENT_BYTES} bytes"),
        });
    }
    Ok(())
}

/// Validate an importance weight: finite and within `[0, 1]`.
pub fn validate_importance(v: f64) -> TmwsResult<()> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(TmwsError::Validation {
            reason: format!("importance must be a finite value in [0, 1], got {v}"),
        });
    }
    Ok(())
}

/// The directories TMWS is willing to touch for profile I/O, in addition to
/// any explicitly configured extras.
pub fn default_path_allowlist() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        roots.push(home.join(".claude"));
        roots.push(home.join(".config/claude"));
        roots.push(home.join(".mcp"));
        roots.push(home.join(".tmws"));
    }
    roots
}

/// Canonicalise `p` (resolving symlinks and collapsing `..`) and accept it
/// only if the result falls under one of the allowlist roots.
///
/// For a path that does not exist yet (profile save), the parent directory
/// is canonicalised instead and the file name re-attached, so a symlinked
/// parent cannot smuggle the write outside the allowlist.
pub fn validate_file_path(p: &Path, allowlist: &[PathBuf]) -> TmwsResult<PathBuf> {
    if p.as_os_str().is_empty() {
        return Err(TmwsError::validation("empty path"));
    }
    if p.to_string_lossy().contains('\0') {
        return Err(TmwsError::validation("path contains a null byte"));
    }

    let canonical = match std::fs::canonicalize(p) {
        Ok(c) => c,
        Err(_) => {
            // Target may not exist yet: canonicalise the parent.
            let parent = p
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .ok_or_else(|| TmwsError::validation("path has no parent directory"))?;
            let file_name = p
                .file_name()
                .ok_or_else(|| TmwsError::validation("path has no file name"))?;
            let parent = std::fs::canonicalize(parent)
                .map_err(|_| TmwsError::validation("path parent does not resolve"))?;
            parent.join(file_name)
        }
    };

    // Canonical allowlist roots; a root that doesn't resolve can't admit
    // anything.
    let permitted = allowlist.iter().any(|root| {
        std::fs::canonicalize(root)
            .map(|root| canonical.starts_with(&root))
            .unwrap_or(false)
    });
    if !permitted {
        return Err(TmwsError::validation(
            "path is outside the allowed directories",
        ));
    }
    Ok(canonical)
}

/// Structural validation of a custom-agents profile document before any
/// typed parsing: `custom_agents` entries must carry valid `name` and
/// `full_id`, namespaces must be well-formed, and the entry count is capped.
/// One invalid entry rejects the whole document.
pub fn validate_config_content(doc: &serde_json::Value) -> TmwsResult<()> {
    let agents = doc
        .get("custom_agents")
        .and_then(|v| v.as_array())
        .ok_or_else(|| TmwsError::validation("profile document missing 'custom_agents' array"))?;

    if agents.len() > MAX_PROFILE_AGENTS {
        return Err(TmwsError::Validation {
            reason: format!("profile document exceeds {MAX_PROFILE_AGENTS} agents"),
        });
    }

    for (idx, entry) in agents.iter().enumerate() {
        let obj = entry
            .as_object()
            .ok_or_else(|| TmwsError::Validation {
                reason: format!("custom_agents[{idx}] is not an object"),
            })?;
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TmwsError::Validation {
                reason: format!("custom_agents[{idx}] missing 'name'"),
            })?;
        validate_agent_id(name)?;
        let full_id = obj
            .get("full_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TmwsError::Validation {
                reason: format!("custom_agents[{idx}] missing 'full_id'"),
            })?;
        validate_agent_id(full_id)?;
        if let Some(ns) = obj.get("namespace").and_then(|v| v.as_str()) {
            validate_namespace(ns)?;
        }
    }
    Ok(())
}
