use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::ActivityStatus;

/// Maximum age, in seconds, before a `hook_state_<name>.json` record is
/// considered stale and the detector falls back to polling.
pub const HOOK_EVENT_STALE_SECONDS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEventKind {
    UserPromptSubmit,
    Stop,
    PermissionRequest,
    PostToolUse,
    SessionEnd,
}

/// The ephemeral per-agent hook record, overwritten in place by the
/// agent's own hook scripts each time one fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub event: HookEventKind,
    /// Float seconds since epoch — not an ISO string, to match the
    /// wire format the agent's hook script writes.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl HookEvent {
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        now.timestamp() as f64 - self.timestamp
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age_seconds(now) > HOOK_EVENT_STALE_SECONDS as f64
    }

    /// Event→status table. `has_parent` disambiguates `Stop` between
    /// `waiting_user` and `waiting_oversight`.
    pub fn to_status(&self, has_parent: bool) -> ActivityStatus {
        match self.event {
            HookEventKind::UserPromptSubmit => ActivityStatus::Running,
            HookEventKind::PostToolUse => ActivityStatus::Running,
            HookEventKind::Stop => {
                if has_parent {
                    ActivityStatus::WaitingOversight
                } else {
                    ActivityStatus::WaitingUser
                }
            }
            HookEventKind::PermissionRequest => ActivityStatus::Permission,
            HookEventKind::SessionEnd => ActivityStatus::Terminated,
        }
    }
}
