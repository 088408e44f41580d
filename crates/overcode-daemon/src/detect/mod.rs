//! Status Dispatcher — the only entry point the Monitor Loop calls.
//! Holds both detectors and picks one per session, per tick.

pub mod hook;
pub mod polling;

use chrono::{DateTime, Utc};
use overcode_core::interfaces::{Filesystem, PaneController, PaneError};
use overcode_core::types::{ActivityStatus, Session};

pub use polling::PollResult;

/// Per-session, not process-wide: `session.hook_status_detection` picks
/// the hook-based detector when true, else the polling detector, so a
/// fleet can mix hook-instrumented and plain agents.
pub fn detect_for_session(
    fs: &impl Filesystem,
    controller: &impl PaneController,
    session: &Session,
    hook_state_path: &str,
    now: DateTime<Utc>,
) -> Result<PollResult, PaneError> {
    let previous_status = session.stats.current_state;
    let previous_activity = &session.stats.current_task;
    let has_parent = session.parent_session_id.is_some();

    if session.hook_status_detection {
        hook::detect(
            fs,
            controller,
            hook_state_path,
            &session.tmux_session,
            session.tmux_window,
            has_parent,
            now,
            previous_status,
            previous_activity,
        )
    } else {
        polling::poll(controller, &session.tmux_session, session.tmux_window, previous_status, previous_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcode_core::interfaces::{FsError, Keys, WindowInfo};
    use overcode_core::types::{LifecycleStatus, OversightPolicy, PermissivenessMode, SessionStats};

    struct StubFs;
    impl Filesystem for StubFs {
        fn write_atomic(&self, _p: &str, _c: &[u8]) -> Result<(), FsError> {
            Ok(())
        }
        fn append_line(&self, _p: &str, _l: &str) -> Result<(), FsError> {
            Ok(())
        }
        fn touch(&self, _p: &str) -> Result<(), FsError> {
            Ok(())
        }
        fn read_to_string(&self, _p: &str) -> Result<Option<String>, FsError> {
            Ok(None)
        }
        fn mtime_seconds(&self, _p: &str) -> Result<Option<f64>, FsError> {
            Ok(None)
        }
    }

    struct StubController;
    impl PaneController for StubController {
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
        fn send_keys(&self, _s: &str, _i: u32, _k: Keys, _e: bool) -> Result<(), PaneError> {
            Ok(())
        }
        fn capture_pane(&self, _s: &str, _i: u32, _l: u32) -> Result<String, PaneError> {
            Ok("❯".into())
        }
        fn select_window(&self, _s: &str, _i: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn list_windows(&self, _s: &str) -> Result<Vec<WindowInfo>, PaneError> {
            Ok(Vec::new())
        }
    }

    fn base_session(hook_status_detection: bool) -> Session {
        let now = Utc::now();
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
            heartbeat_enabled: false,
            heartbeat_paused: false,
            heartbeat_frequency_seconds: 30,
            heartbeat_instruction: String::new(),
            last_heartbeat_time: None,
            time_context_enabled: true,
            hook_status_detection,
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
    fn dispatches_to_polling_when_hook_detection_disabled() {
        let session = base_session(false);
        let result = detect_for_session(&StubFs, &StubController, &session, "hook.json", Utc::now()).unwrap();
        assert_eq!(result.status, ActivityStatus::WaitingUser);
        assert!(!result.stale);
    }

    #[test]
    fn dispatches_to_hook_when_enabled_but_falls_back_on_missing_file() {
        let session = base_session(true);
        let result = detect_for_session(&StubFs, &StubController, &session, "hook.json", Utc::now()).unwrap();
        // StubFs never has the file, so this still resolves through polling.
        assert_eq!(result.status, ActivityStatus::WaitingUser);
    }
}
