//! Status Detector (Polling) — classify a session's pane text via the
//! pure pattern engine. The only detector that actually touches a
//! `PaneController`; the hook detector falls back to this one whenever
//! hook state is missing or stale.

use overcode_core::interfaces::{PaneController, PaneError};
use overcode_core::pattern;
use overcode_core::types::ActivityStatus;

/// Default capture depth.
pub const CAPTURE_LINES: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub status: ActivityStatus,
    pub activity: String,
    pub raw_pane: String,
    /// Set when this tick's capture failed transiently and `status`/
    /// `activity` were carried over from the caller-supplied previous
    /// values rather than freshly observed.
    pub stale: bool,
}

/// On a transient `PaneError`, returns the previous tick's status rather
/// than treating the session as lost — a single flaky capture (subprocess
/// hiccup) must not flap the dashboard. A confirmed-gone window still
/// propagates as `PaneError::Gone` so the caller can transition lifecycle.
pub fn poll(
    controller: &impl PaneController,
    tmux_session: &str,
    tmux_window: u32,
    previous_status: ActivityStatus,
    previous_activity: &str,
) -> Result<PollResult, PaneError> {
    let raw_pane = match controller.capture_pane(tmux_session, tmux_window, CAPTURE_LINES) {
        Ok(text) => text,
        Err(PaneError::Transient(_)) => {
            return Ok(PollResult {
                status: previous_status,
                activity: previous_activity.to_string(),
                raw_pane: String::new(),
                stale: true,
            });
        }
        Err(err @ PaneError::Gone(_)) => return Err(err),
    };

    let lines: Vec<&str> = raw_pane.lines().collect();
    let classification = pattern::classify(&lines);

    Ok(PollResult {
        status: classification.status.elevate(),
        activity: classification.activity,
        raw_pane,
        stale: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcode_core::interfaces::{Keys, WindowInfo};
    use std::cell::RefCell;

    enum Scripted {
        Text(String),
        Transient(String),
        Gone(String),
    }

    struct FakeController {
        response: RefCell<Scripted>,
    }

    impl PaneController for FakeController {
        fn ensure_session(&self, _session: &str) -> Result<(), PaneError> {
            Ok(())
        }
        fn new_window(&self, _session: &str, _name: &str, _cwd: &str) -> Result<u32, PaneError> {
            Ok(0)
        }
        fn kill_window(&self, _session: &str, _index: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn window_exists(&self, _session: &str, _index: u32) -> Result<bool, PaneError> {
            Ok(true)
        }
        fn send_keys(&self, _session: &str, _index: u32, _keys: Keys, _enter: bool) -> Result<(), PaneError> {
            Ok(())
        }
        fn capture_pane(&self, _session: &str, _index: u32, _lines: u32) -> Result<String, PaneError> {
            match &*self.response.borrow() {
                Scripted::Text(s) => Ok(s.clone()),
                Scripted::Transient(s) => Err(PaneError::Transient(s.clone())),
                Scripted::Gone(s) => Err(PaneError::Gone(s.clone())),
            }
        }
        fn select_window(&self, _session: &str, _index: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn list_windows(&self, _session: &str) -> Result<Vec<WindowInfo>, PaneError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn busy_line_elevates_to_running() {
        let controller = FakeController { response: RefCell::new(Scripted::Text("Reading src/lib.rs\n(esc to interrupt)".into())) };
        let result = poll(&controller, "main", 0, ActivityStatus::WaitingUser, "").unwrap();
        assert_eq!(result.status, ActivityStatus::Running);
        assert!(!result.stale);
    }

    #[test]
    fn transient_error_falls_back_to_previous_status() {
        let controller = FakeController { response: RefCell::new(Scripted::Transient("tmux hiccup".into())) };
        let result = poll(&controller, "main", 0, ActivityStatus::Running, "Editing foo.rs").unwrap();
        assert_eq!(result.status, ActivityStatus::Running);
        assert_eq!(result.activity, "Editing foo.rs");
        assert!(result.stale);
    }

    #[test]
    fn gone_error_propagates() {
        let controller = FakeController { response: RefCell::new(Scripted::Gone("window 0 not found".into())) };
        let err = poll(&controller, "main", 0, ActivityStatus::Running, "").unwrap_err();
        assert!(matches!(err, PaneError::Gone(_)));
    }

    #[test]
    fn idle_prompt_elevates_to_waiting_user() {
        let controller = FakeController { response: RefCell::new(Scripted::Text("some output\n❯".into())) };
        let result = poll(&controller, "main", 0, ActivityStatus::Running, "").unwrap();
        assert_eq!(result.status, ActivityStatus::WaitingUser);
    }
}
