//! Heartbeat Engine — nudges a non-running agent with a canned
//! instruction on a fixed cadence, so a long-asleep Claude pane doesn't
//! need a human to notice it stalled.

use chrono::{DateTime, Utc};
use overcode_core::interfaces::{Keys, PaneController, PaneError};
use overcode_core::types::{ActivityStatus, Session};

/// The eligibility predicate, evaluated against the *previous* tick's
/// status (the Monitor Loop hasn't run detection for this tick yet when
/// the Heartbeat Engine runs — heartbeats send before detection).
pub fn is_heartbeat_eligible(session: &Session, previous_status: ActivityStatus) -> bool {
    session.heartbeat_enabled
        && !session.heartbeat_paused
        && !session.is_asleep
        && !previous_status.is_green()
        && !session.budget_exceeded()
        && !session.heartbeat_instruction.is_empty()
}

pub fn is_heartbeat_due(session: &Session, now: DateTime<Utc>) -> bool {
    let baseline = session.last_heartbeat_time.unwrap_or(session.start_time);
    let elapsed = (now - baseline).num_milliseconds() as f64 / 1000.0;
    elapsed >= session.heartbeat_frequency_seconds as f64
}

/// Sends `heartbeat_instruction + Enter` when both eligible and due.
/// Returns `true` iff a send actually happened, so the caller can stamp
/// `last_heartbeat_time`, register the session in
/// `sessions_running_from_heartbeat`, and arm the one-shot
/// `heartbeat_start_pending` marker.
pub fn maybe_send_heartbeat(
    controller: &impl PaneController,
    session: &Session,
    previous_status: ActivityStatus,
    now: DateTime<Utc>,
) -> Result<bool, PaneError> {
    if !is_heartbeat_eligible(session, previous_status) || !is_heartbeat_due(session, now) {
        return Ok(false);
    }

    controller.send_keys(
        &session.tmux_session,
        session.tmux_window,
        Keys::Text(session.heartbeat_instruction.clone()),
        true,
    )?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcode_core::types::{LifecycleStatus, OversightPolicy, PermissivenessMode, SessionStats};
    use std::cell::RefCell;

    fn base_session(now: DateTime<Utc>) -> Session {
        Session {
            id: "a".into(),
            name: "demo".into(),
            tmux_session: "main".into(),
            tmux_window: 0,
            command: vec!["claude".into()],
            start_directory: "/tmp".into(),
            start_time: now,
            repo_name: None,
            branch: None,
            status: LifecycleStatus::Running,
            parent_session_id: None,
            is_asleep: false,
            standing_instructions: String::new(),
            standing_instructions_preset: None,
            standing_orders_complete: false,
            permissiveness_mode: PermissivenessMode::Normal,
            cost_budget_usd: 0.0,
            agent_value: 1000,
            human_annotation: String::new(),
            heartbeat_enabled: true,
            heartbeat_paused: false,
            heartbeat_frequency_seconds: 30,
            heartbeat_instruction: "keep going".into(),
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
    fn running_previous_status_is_not_eligible() {
        let session = base_session(Utc::now());
        assert!(!is_heartbeat_eligible(&session, ActivityStatus::Running));
    }

    #[test]
    fn waiting_user_previous_status_is_eligible() {
        let session = base_session(Utc::now());
        assert!(is_heartbeat_eligible(&session, ActivityStatus::WaitingUser));
    }

    #[test]
    fn paused_heartbeat_is_not_eligible() {
        let mut session = base_session(Utc::now());
        session.heartbeat_paused = true;
        assert!(!is_heartbeat_eligible(&session, ActivityStatus::WaitingUser));
    }

    #[test]
    fn asleep_session_is_not_eligible() {
        let mut session = base_session(Utc::now());
        session.is_asleep = true;
        assert!(!is_heartbeat_eligible(&session, ActivityStatus::WaitingUser));
    }

    #[test]
    fn budget_exceeded_is_not_eligible() {
        let mut session = base_session(Utc::now());
        session.cost_budget_usd = 1.0;
        session.stats.estimated_cost_usd = 2.0;
        assert!(!is_heartbeat_eligible(&session, ActivityStatus::WaitingUser));
    }

    #[test]
    fn empty_instruction_is_not_eligible() {
        let mut session = base_session(Utc::now());
        session.heartbeat_instruction = String::new();
        assert!(!is_heartbeat_eligible(&session, ActivityStatus::WaitingUser));
    }

    #[test]
    fn not_due_before_frequency_elapses() {
        let now = Utc::now();
        let mut session = base_session(now);
        session.last_heartbeat_time = Some(now - chrono::Duration::seconds(5));
        assert!(!is_heartbeat_due(&session, now));
    }

    #[test]
    fn due_uses_start_time_when_never_sent() {
        let now = Utc::now();
        let mut session = base_session(now - chrono::Duration::seconds(31));
        session.start_time = now - chrono::Duration::seconds(31);
        assert!(is_heartbeat_due(&session, now));
    }

    struct RecordingController {
        sent: RefCell<Vec<String>>,
    }
    impl PaneController for RecordingController {
        fn ensure_session(&self, _s: &str) -> Result<(), PaneError> {
            Ok(())
        }
        fn new_window(&self, _s: &str, _n: &str, _c: &str) -> Result<u32, PaneError> {
            Ok(0)
        }
        fn kill_window(&self, _s: &str, _i: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn window_exists(&self, _s: &str, _i: u32) -> Result<bool, PaneError> {
            Ok(true)
        }
        fn send_keys(&self, _s: &str, _i: u32, keys: Keys, _enter: bool) -> Result<(), PaneError> {
            if let Keys::Text(t) = keys {
                self.sent.borrow_mut().push(t);
            }
            Ok(())
        }
        fn capture_pane(&self, _s: &str, _i: u32, _l: u32) -> Result<String, PaneError> {
            Ok(String::new())
        }
        fn select_window(&self, _s: &str, _i: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn list_windows(&self, _s: &str) -> Result<Vec<overcode_core::interfaces::WindowInfo>, PaneError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn sends_when_eligible_and_due() {
        let now = Utc::now();
        let mut session = base_session(now - chrono::Duration::seconds(31));
        session.start_time = now - chrono::Duration::seconds(31);
        let controller = RecordingController { sent: RefCell::new(Vec::new()) };
        let sent = maybe_send_heartbeat(&controller, &session, ActivityStatus::WaitingUser, now).unwrap();
        assert!(sent);
        assert_eq!(controller.sent.borrow().as_slice(), ["keep going"]);
    }

    #[test]
    fn does_not_send_when_not_due() {
        let now = Utc::now();
        let mut session = base_session(now);
        session.last_heartbeat_time = Some(now);
        let controller = RecordingController { sent: RefCell::new(Vec::new()) };
        let sent = maybe_send_heartbeat(&controller, &session, ActivityStatus::WaitingUser, now).unwrap();
        assert!(!sent);
        assert!(controller.sent.borrow().is_empty());
    }
}
