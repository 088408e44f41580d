//! Oversight Engine — resolves a child agent stuck at
//! `waiting_oversight` according to its parent-assigned policy, so an
//! unattended child doesn't block its parent forever.

use chrono::{DateTime, Utc};
use overcode_core::types::{ActivityStatus, LifecycleStatus, OversightPolicy, ReportStatus, Session};

#[derive(Debug, Clone, PartialEq)]
pub struct OversightResolution {
    pub report_status: ReportStatus,
    pub report_reason: String,
}

/// Applies only to sessions still `running` (not yet `done`) whose
/// *effective* activity status has been surfaced as `waiting_oversight`
/// this tick. `wait` never resolves anything; `fail` resolves
/// immediately; `timeout` resolves only once `oversight_deadline` has
/// passed.
pub fn resolve(session: &Session, effective_status: ActivityStatus, now: DateTime<Utc>) -> Option<OversightResolution> {
    if session.status != LifecycleStatus::Running || effective_status != ActivityStatus::WaitingOversight {
        return None;
    }

    match session.oversight_policy {
        OversightPolicy::Wait => None,
        OversightPolicy::Fail => Some(OversightResolution {
            report_status: ReportStatus::Failure,
            report_reason: "No report filed".to_string(),
        }),
        OversightPolicy::Timeout => {
            let deadline = session.oversight_deadline?;
            if now >= deadline {
                Some(OversightResolution {
                    report_status: ReportStatus::Failure,
                    report_reason: "Oversight timeout expired".to_string(),
                })
            } else {
                None
            }
        }
    }
}

/// The deadline is armed once, the first time the Stop hook fires for a
/// child — re-arming on every subsequent tick would let an agent that
/// keeps bouncing in and out of `waiting_oversight` dodge the timeout
/// indefinitely.
pub fn arm_deadline_if_unset(session: &Session, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if session.oversight_deadline.is_some() {
        return None;
    }
    Some(now + chrono::Duration::seconds(session.oversight_timeout_seconds as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcode_core::types::{PermissivenessMode, SessionStats};

    fn base_session(now: DateTime<Utc>) -> Session {
        Session {
            id: "child".into(),
            name: "child".into(),
            tmux_session: "main".into(),
            tmux_window: 0,
            command: vec!["claude".into()],
            start_directory: "/tmp".into(),
            start_time: now,
            repo_name: None,
            branch: None,
            status: LifecycleStatus::Running,
            parent_session_id: Some("parent".into()),
            is_asleep: false,
            standing_instructions: String::new(),
            standing_instructions_preset: None,
            standing_orders_complete: false,
            permissiveness_mode: PermissivenessMode::Normal,
            cost_budget_usd: 0.0,
            agent_value: 1000,
            human_annotation: String::new(),
            heartbeat_enabled: false,
            heartbeat_paused: false,
            heartbeat_frequency_seconds: 30,
            heartbeat_instruction: String::new(),
            last_heartbeat_time: None,
            time_context_enabled: true,
            hook_status_detection: false,
            oversight_policy: OversightPolicy::Wait,
            oversight_timeout_seconds: 600,
            oversight_deadline: None,
            report_status: None,
            report_reason: None,
            claude_session_ids: Default::default(),
            active_claude_session_id: None,
            stats: SessionStats::new(now),
            allowed_tools: Vec::new(),
            extra_claude_args: Vec::new(),
            is_remote: false,
            source_url: None,
            source_api_key: None,
            source_host: None,
        }
    }

    #[test]
    fn wait_policy_never_resolves() {
        let session = base_session(Utc::now());
        assert_eq!(resolve(&session, ActivityStatus::WaitingOversight, Utc::now()), None);
    }

    #[test]
    fn fail_policy_resolves_immediately() {
        let mut session = base_session(Utc::now());
        session.oversight_policy = OversightPolicy::Fail;
        let resolution = resolve(&session, ActivityStatus::WaitingOversight, Utc::now()).unwrap();
        assert_eq!(resolution.report_status, ReportStatus::Failure);
        assert_eq!(resolution.report_reason, "No report filed");
    }

    #[test]
    fn timeout_policy_waits_until_deadline() {
        let now = Utc::now();
        let mut session = base_session(now);
        session.oversight_policy = OversightPolicy::Timeout;
        session.oversight_deadline = Some(now + chrono::Duration::seconds(10));
        assert_eq!(resolve(&session, ActivityStatus::WaitingOversight, now), None);
    }

    #[test]
    fn timeout_policy_resolves_after_deadline() {
        let now = Utc::now();
        let mut session = base_session(now);
        session.oversight_policy = OversightPolicy::Timeout;
        session.oversight_deadline = Some(now - chrono::Duration::seconds(1));
        let resolution = resolve(&session, ActivityStatus::WaitingOversight, now).unwrap();
        assert_eq!(resolution.report_reason, "Oversight timeout expired");
    }

    #[test]
    fn timeout_policy_without_deadline_never_fires() {
        let now = Utc::now();
        let mut session = base_session(now);
        session.oversight_policy = OversightPolicy::Timeout;
        assert_eq!(resolve(&session, ActivityStatus::WaitingOversight, now), None);
    }

    #[test]
    fn done_sessions_are_never_resolved() {
        let mut session = base_session(Utc::now());
        session.status = LifecycleStatus::Done;
        session.oversight_policy = OversightPolicy::Fail;
        assert_eq!(resolve(&session, ActivityStatus::WaitingOversight, Utc::now()), None);
    }

    #[test]
    fn non_oversight_status_is_never_resolved() {
        let mut session = base_session(Utc::now());
        session.oversight_policy = OversightPolicy::Fail;
        assert_eq!(resolve(&session, ActivityStatus::WaitingUser, Utc::now()), None);
    }

    #[test]
    fn deadline_arms_once() {
        let now = Utc::now();
        let session = base_session(now);
        let armed = arm_deadline_if_unset(&session, now).unwrap();
        assert_eq!(armed, now + chrono::Duration::seconds(600));

        let mut already_armed = base_session(now);
        already_armed.oversight_deadline = Some(now);
        assert_eq!(arm_deadline_if_unset(&already_armed, now), None);
    }
}
