//! Query filters passed from the service layer into storage.

use serde::{Deserialize, Serialize};

use super::memory::MemoryAccess;

/// Row-level constraints for `search` and `recall`. The storage layer turns
/// these into SQL; callers never hand it raw query fragments.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict to a single owner.
    pub owner: Option<String>,
    /// Restrict to a namespace.
    pub namespace: Option<String>,
    /// Restrict to specific access levels (empty = any).
    pub access_levels: Vec<MemoryAccess>,
    /// Every listed tag must be present on the row.
    pub tags: Vec<String>,
    /// Include archived rows (off for search, selectable for recall).
    pub include_archived: bool,
    /// Visibility disjunction evaluated for a principal. `None` means the
    /// caller has already scoped the query (e.g. owner-only recall).
    pub visible_to: Option<Visibility>,
}

/// What a given principal is allowed to see, expressed as data so storage
/// can push the disjunction into the WHERE clause. The service layer
/// re-checks every returned row against the policy engine regardless.
#[derive(Debug, Clone)]
pub struct Visibility {
    pub agent_id: String,
    pub namespace: String,
    /// Whether rows shared with this principal should be included.
    pub include_shared: bool,
    /// Principals at elevated level or above may read system rows.
    pub can_read_system: bool,
}

/// Sort order for non-semantic recall listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallOrder {
    #[default]
    UpdatedDesc,
    CreatedDesc,
    ImportanceDesc,
    AccessCountDesc,
}

impl RecallOrder {
    /// The ORDER BY clause for this ordering. Fixed strings only — never
    /// derived from caller input.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::UpdatedDesc => "updated_at DESC, id ASC",
            Self::CreatedDesc => "created_at DESC, id ASC",
            Self::ImportanceDesc => "importance DESC, updated_at DESC, id ASC",
            Self::AccessCountDesc => "access_count DESC, updated_at DESC, id ASC",
        }
    }
}
