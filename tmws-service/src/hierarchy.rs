//! Memory hierarchy checks. The parent chain must stay a DAG; the walk is
//! bounded so a corrupt chain can't spin the service.

use uuid::Uuid;

use tmws_core::constants::MAX_PARENT_DEPTH;
use tmws_core::errors::{TmwsError, TmwsResult};
use tmws_core::traits::IMemoryStore;
use tmws_storage::StorageEngine;

/// Verify that `parent_id` exists and that attaching `child_id` beneath it
/// introduces no cycle. Walks ancestors up to `MAX_PARENT_DEPTH` hops.
pub fn ensure_parent_valid(
    storage: &StorageEngine,
    parent_id: Uuid,
    child_id: Option<Uuid>,
) -> TmwsResult<()> {
    if child_id == Some(parent_id) {
        return Err(TmwsError::validation("memory cannot be its own parent"));
    }

    let mut cursor = Some(parent_id);
    for depth in 0..MAX_PARENT_DEPTH {
        let Some(current) = cursor else {
            return Ok(());
        };
        let memory = storage.get_memory(current)?.ok_or_else(|| {
            if depth == 0 {
                TmwsError::validation(format!("parent memory {current} does not exist"))
            } else {
                // A broken ancestor link; the chain ends here.
                TmwsError::validation(format!("hierarchy references missing memory {current}"))
            }
        })?;
        if Some(memory.id) == child_id {
            return Err(TmwsError::validation(
                "parent chain would form a cycle",
            ));
        }
        cursor = memory.parent_memory_id;
    }

    Err(TmwsError::Validation {
        reason: format!("hierarchy deeper than {MAX_PARENT_DEPTH} levels"),
    })
}
