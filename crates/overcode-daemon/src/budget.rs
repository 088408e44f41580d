//! Budget & Auto-Archive — a budget breach is surfaced, never enforced;
//! a `done` session past its archive grace period is cleaned up
//! automatically so `sessions.json` doesn't accumulate finished agents
//! forever.

use chrono::{DateTime, Utc};
use overcode_core::types::{LifecycleStatus, Session};

/// One hour grace period after a session goes `done`.
pub const ARCHIVE_GRACE_SECONDS: i64 = 3600;

pub fn budget_exceeded(session: &Session) -> bool {
    session.budget_exceeded()
}

/// `done` sessions whose `state_since` is older than the grace period are
/// ready for archival; everything else (including already-`terminated`
/// sessions) is left alone.
pub fn is_archivable(session: &Session, now: DateTime<Utc>) -> bool {
    if session.status != LifecycleStatus::Done {
        return false;
    }
    let age_seconds = (now - session.stats.state_since).num_seconds();
    age_seconds >= ARCHIVE_GRACE_SECONDS
}
