use serde::{Deserialize, Serialize};

/// The activity axis of a session: what the agent appears to be doing right
/// now, as opposed to [`super::LifecycleStatus`] (whether the session still
/// exists at all).
///
/// Ordering is not meaningful here — precedence among candidate statuses
/// is decided explicitly by the layering rule in
/// `MonitorLoop::effective_status`, not by enum discriminant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Blocked on a permission dialog (allow/deny, numbered option menu).
    Permission,
    /// A structural Claude-Code error line matched.
    Error,
    /// Actively working: spinner, tool execution verb, unresolved tool call.
    Running,
    /// Non-running, has an unpaused heartbeat configured.
    WaitingHeartbeat,
    /// One-shot marker emitted the tick after a heartbeat send is first
    /// observed running again.
    HeartbeatStart,
    /// Promoted from `HeartbeatStart` on the next tick the agent is still
    /// running.
    RunningHeartbeat,
    /// Waiting for the human: menu prompt, bare idle prompt, y/n.
    WaitingUser,
    /// A child waiting on its parent's oversight policy to resolve.
    WaitingOversight,
    /// Human-imposed pause; overrides every other signal.
    Asleep,
    /// The window is gone.
    Terminated,
}

impl ActivityStatus {
    /// The "green" set from the glossary: `running`, `running_heartbeat`,
    /// `heartbeat_start`. Everything else is non-green.
    pub fn is_green(self) -> bool {
        matches!(
            self,
            ActivityStatus::Running | ActivityStatus::RunningHeartbeat | ActivityStatus::HeartbeatStart
        )
    }

    pub fn is_asleep(self) -> bool {
        matches!(self, ActivityStatus::Asleep)
    }

    pub fn is_terminated(self) -> bool {
        matches!(self, ActivityStatus::Terminated)
    }
}

/// Output of the pure pattern engine (`overcode_core::pattern`), before the
/// detector elevates it into an [`ActivityStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifiedStatus {
    Permission,
    Error,
    Busy,
    Waiting,
    IdlePrompt,
}

impl ClassifiedStatus {
    /// Elevate the pure classification into an activity status.
    /// `busy -> running`, `idle_prompt -> waiting_user`; `permission` and
    /// `waiting` pass through unchanged in name (but as `ActivityStatus`
    /// variants).
    pub fn elevate(self) -> ActivityStatus {
        match self {
            ClassifiedStatus::Permission => ActivityStatus::Permission,
            ClassifiedStatus::Error => ActivityStatus::Error,
            ClassifiedStatus::Busy => ActivityStatus::Running,
            ClassifiedStatus::Waiting => ActivityStatus::WaitingUser,
            ClassifiedStatus::IdlePrompt => ActivityStatus::WaitingUser,
        }
    }
}

/// The lifecycle axis of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Running,
    Done,
    Terminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn green_set_is_exactly_three_variants() {
        let green: Vec<ActivityStatus> = [
            ActivityStatus::Permission,
            ActivityStatus::Error,
            ActivityStatus::Running,
            ActivityStatus::WaitingHeartbeat,
            ActivityStatus::HeartbeatStart,
            ActivityStatus::RunningHeartbeat,
            ActivityStatus::WaitingUser,
            ActivityStatus::WaitingOversight,
            ActivityStatus::Asleep,
            ActivityStatus::Terminated,
        ]
        .into_iter()
        .filter(|s| s.is_green())
        .collect();

        assert_eq!(
            green,
            vec![
                ActivityStatus::Running,
                ActivityStatus::HeartbeatStart,
                ActivityStatus::RunningHeartbeat,
            ]
        );
    }

    #[test]
    fn elevate_busy_to_running() {
        assert_eq!(ClassifiedStatus::Busy.elevate(), ActivityStatus::Running);
    }

    #[test]
    fn elevate_idle_prompt_to_waiting_user() {
        assert_eq!(ClassifiedStatus::IdlePrompt.elevate(), ActivityStatus::WaitingUser);
    }

    #[test]
    fn elevate_permission_and_waiting_pass_through() {
        assert_eq!(ClassifiedStatus::Permission.elevate(), ActivityStatus::Permission);
        assert_eq!(ClassifiedStatus::Waiting.elevate(), ActivityStatus::WaitingUser);
    }
}
