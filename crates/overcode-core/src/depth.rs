//! Pure parent/child tree functions: depth computation and cycle detection.
//!
//! These operate over a caller-supplied lookup rather than a concrete
//! `Session Store` type, so the Session Store crate can reuse them without
//! this crate depending back on it.

use std::collections::HashSet;

use crate::error::CoreError;

/// Depth of the root of a parent chain is 0. Walks `parent_of` until it
/// returns `None`, tracking visited ids to detect a cycle.
///
/// Returns `Err(CycleDetected)` if a session's ancestor chain revisits a
/// node; `Err(UnknownParent)` is never returned here since a dangling
/// `parent_session_id` is treated as "that session simply has no further
/// ancestors" by callers that have already validated referential integrity
/// elsewhere — see [`has_cycle`] for the referential-integrity-aware
/// variant used by the Session Store on write.
pub fn compute_depth(id: &str, parent_of: impl Fn(&str) -> Option<String>) -> Result<u32, CoreError> {
    let mut seen = HashSet::new();
    seen.insert(id.to_string());

    let mut depth = 0u32;
    let mut current = id.to_string();
    while let Some(parent) = parent_of(&current) {
        if !seen.insert(parent.clone()) {
            return Err(CoreError::CycleDetected(id.to_string()));
        }
        depth += 1;
        current = parent;
    }
    Ok(depth)
}

/// `true` iff following `parent_of` from `id` ever revisits a node.
pub fn has_cycle(id: &str, parent_of: impl Fn(&str) -> Option<String>) -> bool {
    matches!(compute_depth(id, parent_of), Err(CoreError::CycleDetected(_)))
}

/// If the resolved parent is at depth 4, fail: the new child would land
/// at depth 5, so the launcher proactively refuses at depth 4 rather than
/// riding the invariant's `<= 5` bound to its edge.
pub fn validate_launch_depth(parent_depth: u32) -> Result<(), CoreError> {
    if parent_depth >= 4 {
        return Err(CoreError::DepthExceeded {
            name: String::new(),
            depth: parent_depth + 1,
            max: crate::types::MAX_SESSION_DEPTH,
        });
    }
    Ok(())
}
