//! Launcher — creates a new tmux window running an interactive agent
//! and registers it in the Session Store. Every launched session is
//! interactive: an initial prompt is sent as keystrokes after the agent
//! starts, never baked into the CLI invocation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use overcode_core::depth::{compute_depth, validate_launch_depth};
use overcode_core::interfaces::{Keys, PaneController, PaneError};
use overcode_core::pattern::{detect_spawn_failure, is_prompt_line, strip_ansi};
use overcode_core::types::{LifecycleStatus, OversightPolicy, PermissivenessMode, Session, SessionStats};
use overcode_core::CoreError;

use crate::store::SessionStore;

static SESSION_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

const PROMPT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const PROMPT_POLL_TIMEOUT_SECONDS: u64 = 30;
const STARTUP_FALLBACK_DELAY: Duration = Duration::from_secs(3);
const PROMPT_POLL_CAPTURE_LINES: u32 = 5;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid agent name {0:?}: must match ^[A-Za-z0-9_-]{{1,64}}$")]
    InvalidName(String),
    #[error("parent agent {0:?} not found")]
    ParentNotFound(String),
    #[error(transparent)]
    DepthExceeded(#[from] CoreError),
    #[error("missing dependency: {binary} ({hint})")]
    MissingDependency { binary: String, hint: String },
    #[error(transparent)]
    Pane(#[from] PaneError),
    #[error("agent failed to start: {0}")]
    SpawnFailed(String),
    #[error("store error: {0}")]
    Store(String),
}

pub fn validate_name(name: &str) -> Result<(), LaunchError> {
    if SESSION_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(LaunchError::InvalidName(name.to_string()))
    }
}

/// `bypass` always wins over `permissive`. `pub(crate)` so `restart_agent`
/// in the Control Surface can reuse it.
pub(crate) fn permission_flags(mode: PermissivenessMode) -> Vec<String> {
    match mode {
        PermissivenessMode::Normal => Vec::new(),
        PermissivenessMode::Permissive => vec!["--permission-mode".to_string(), "dontAsk".to_string()],
        PermissivenessMode::Bypass => vec!["--dangerously-skip-permissions".to_string()],
    }
}

/// Checks that both the multiplexer and the agent binary resolve on
/// `PATH` before a launch commits to anything.
pub fn preflight_check(tmux_bin: &str, agent_bin: &str) -> Result<(), LaunchError> {
    for (binary, hint) in [
        (tmux_bin, "install tmux and ensure it is on PATH"),
        (agent_bin, "install the agent CLI and ensure it is on PATH"),
    ] {
        let found = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
            .unwrap_or(false);
        if !found {
            return Err(LaunchError::MissingDependency { binary: binary.to_string(), hint: hint.to_string() });
        }
    }
    Ok(())
}

pub struct LaunchRequest {
    pub name: String,
    pub tmux_session: String,
    pub start_directory: String,
    pub initial_prompt: Option<String>,
    pub permissiveness_mode: PermissivenessMode,
    pub parent_name: Option<String>,
    pub allowed_tools: Vec<String>,
    pub extra_claude_args: Vec<String>,
    pub standing_instructions: String,
}

/// Resolves a parent by explicit name or the `OVERCODE_SESSION_NAME`
/// environment variable left by a launching parent, then enforces the
/// depth-4 cutoff.
fn resolve_parent(store: &SessionStore, request: &LaunchRequest) -> Result<Option<Session>, LaunchError> {
    let parent_name = request
        .parent_name
        .clone()
        .or_else(|| std::env::var("OVERCODE_SESSION_NAME").ok())
        .filter(|n| !n.is_empty());

    let Some(parent_name) = parent_name else {
        return Ok(None);
    };

    let parent = store
        .find_by_name(&parent_name, &request.tmux_session)
        .ok_or_else(|| LaunchError::ParentNotFound(parent_name.clone()))?;

    let all = store.list_all();
    let parent_depth = compute_depth(&parent.id, |id| all.iter().find(|s| s.id == id).and_then(|s| s.parent_session_id.clone()))?;
    validate_launch_depth(parent_depth)?;

    Ok(Some(parent))
}

/// The launcher's full algorithm. `controller`/`fs` are the real
/// tmux/filesystem bindings; tests supply fakes.
pub fn launch(
    store: &SessionStore,
    controller: &impl PaneController,
    request: LaunchRequest,
    now: DateTime<Utc>,
) -> Result<Session, LaunchError> {
    validate_name(&request.name)?;
    let parent = resolve_parent(store, &request)?;

    // Step 3: reuse or clean up a stale existing session with this name.
    if let Some(existing) = store.find_by_name(&request.name, &request.tmux_session) {
        if existing.status != LifecycleStatus::Terminated {
            let alive = controller.window_exists(&existing.tmux_session, existing.tmux_window).unwrap_or(false);
            if alive {
                return Ok(existing);
            }
            let _ = store.with_session_mut(&existing.id, |s| s.status = LifecycleStatus::Terminated);
        }
    }

    // Step 4.
    controller.ensure_session(&request.tmux_session)?;
    let window_index = controller.new_window(&request.tmux_session, &request.name, &request.start_directory)?;

    // Step 5: compose and send the launch command.
    let mut claude_cmd = vec!["claude".to_string(), "code".to_string()];
    claude_cmd.extend(permission_flags(request.permissiveness_mode));
    if !request.allowed_tools.is_empty() {
        claude_cmd.push("--allowedTools".to_string());
        claude_cmd.push(request.allowed_tools.join(","));
    }
    claude_cmd.extend(request.extra_claude_args.iter().cloned());

    let mut env_prefix = format!("OVERCODE_SESSION_NAME={} OVERCODE_TMUX_SESSION={}", request.name, request.tmux_session);
    if let Some(parent) = &parent {
        env_prefix.push_str(&format!(" OVERCODE_PARENT_SESSION_ID={} OVERCODE_PARENT_NAME={}", parent.id, parent.name));
    }

    let command_line = format!("{env_prefix} {}", claude_cmd.join(" "));
    let send_result = controller.send_keys(&request.tmux_session, window_index, Keys::Text(command_line), true);
    if let Err(e) = send_result {
        let _ = controller.kill_window(&request.tmux_session, window_index);
        return Err(e.into());
    }

    // Post-spawn spawn-failure check: give the shell a brief moment
    // to surface an immediate error before we commit to registering.
    std::thread::sleep(Duration::from_millis(500));
    if let Ok(pane) = controller.capture_pane(&request.tmux_session, window_index, 20) {
        if detect_spawn_failure(&pane) {
            let _ = controller.kill_window(&request.tmux_session, window_index);
            return Err(LaunchError::SpawnFailed(format!("agent failed to start in window {window_index}")));
        }
    }

    // Step 6: register.
    let session = Session {
        id: ulid::Ulid::new().to_string(),
        name: request.name.clone(),
        tmux_session: request.tmux_session.clone(),
        tmux_window: window_index,
        command: claude_cmd,
        start_directory: request.start_directory.clone(),
        start_time: now,
        repo_name: None,
        branch: None,
        status: LifecycleStatus::Running,
        parent_session_id: parent.as_ref().map(|p| p.id.clone()),
        is_asleep: false,
        standing_instructions: request.standing_instructions,
        standing_instructions_preset: None,
        standing_orders_complete: false,
        permissiveness_mode: request.permissiveness_mode,
        cost_budget_usd: 0.0,
        agent_value: 1000,
        human_annotation: String::new(),
        heartbeat_enabled: false,
        heartbeat_paused: false,
        heartbeat_frequency_seconds: overcode_core::stats::MIN_HEARTBEAT_FREQUENCY_SECONDS,
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
        allowed_tools: request.allowed_tools,
        extra_claude_args: request.extra_claude_args,
        is_remote: false,
        source_url: None,
        source_api_key: None,
        source_host: None,
    };

    store.insert_new(session.clone()).map_err(|e| LaunchError::Store(e.to_string()))?;

    // Step 7: send the initial prompt, if any, once the prompt is ready.
    if let Some(prompt) = request.initial_prompt {
        send_initial_prompt(controller, &request.tmux_session, window_index, &prompt);
    }

    Ok(session)
}

/// Polls for Claude's bare input-prompt cursor for up to 30s; falls back
/// to a fixed startup delay and sends anyway if it never appears.
fn send_initial_prompt(controller: &impl PaneController, tmux_session: &str, window_index: u32, prompt: &str) {
    let deadline = std::time::Instant::now() + Duration::from_secs(PROMPT_POLL_TIMEOUT_SECONDS);
    let mut ready = false;
    while std::time::Instant::now() < deadline {
        if let Ok(content) = controller.capture_pane(tmux_session, window_index, PROMPT_POLL_CAPTURE_LINES) {
            if content.lines().any(|line| is_prompt_line(&strip_ansi(line))) {
                ready = true;
                break;
            }
        }
        std::thread::sleep(PROMPT_POLL_INTERVAL);
    }
    if !ready {
        std::thread::sleep(STARTUP_FALLBACK_DELAY);
    }
    let _ = controller.send_keys(tmux_session, window_index, Keys::Text(prompt.to_string()), true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcode_core::interfaces::WindowInfo;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeController {
        next_window: RefCell<u32>,
        captures: HashMap<u32, String>,
        fail_send: bool,
    }

    impl FakeController {
        fn new() -> Self {
            FakeController { next_window: RefCell::new(0), captures: HashMap::new(), fail_send: false }
        }
    }

    impl PaneController for FakeController {
        fn ensure_session(&self, _s: &str) -> Result<(), PaneError> {
            Ok(())
        }
        fn new_window(&self, _s: &str, _n: &str, _c: &str) -> Result<u32, PaneError> {
            let mut next = self.next_window.borrow_mut();
            let idx = *next;
            *next += 1;
            Ok(idx)
        }
        fn kill_window(&self, _s: &str, _i: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn window_exists(&self, _s: &str, _i: u32) -> Result<bool, PaneError> {
            Ok(true)
        }
        fn send_keys(&self, _s: &str, _i: u32, _k: Keys, _e: bool) -> Result<(), PaneError> {
            if self.fail_send {
                Err(PaneError::Transient("boom".into()))
            } else {
                Ok(())
            }
        }
        fn capture_pane(&self, _s: &str, i: u32, _l: u32) -> Result<String, PaneError> {
            Ok(self.captures.get(&i).cloned().unwrap_or_else(|| "❯".to_string()))
        }
        fn select_window(&self, _s: &str, _i: u32) -> Result<(), PaneError> {
            Ok(())
        }
        fn list_windows(&self, _s: &str) -> Result<Vec<WindowInfo>, PaneError> {
            Ok(Vec::new())
        }
    }

    fn base_request(name: &str) -> LaunchRequest {
        LaunchRequest {
            name: name.to_string(),
            tmux_session: "main".to_string(),
            start_directory: "/tmp".to_string(),
            initial_prompt: None,
            permissiveness_mode: PermissivenessMode::Normal,
            parent_name: None,
            allowed_tools: Vec::new(),
            extra_claude_args: Vec::new(),
            standing_instructions: String::new(),
        }
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(validate_name("ok-name_1").is_ok());
        assert!(validate_name("has spaces").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn launches_and_registers_a_session() {
        let store = SessionStore::empty();
        let controller = FakeController::new();
        let session = launch(&store, &controller, base_request("demo"), Utc::now()).unwrap();
        assert_eq!(session.name, "demo");
        assert_eq!(session.tmux_window, 0);
        assert!(store.find_by_name("demo", "main").is_some());
    }

    #[test]
    fn reuses_existing_live_session_by_name() {
        let store = SessionStore::empty();
        let controller = FakeController::new();
        let first = launch(&store, &controller, base_request("demo"), Utc::now()).unwrap();
        let second = launch(&store, &controller, base_request("demo"), Utc::now()).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn permission_flags_map_bypass_and_permissive_correctly() {
        assert!(permission_flags(PermissivenessMode::Normal).is_empty());
        assert_eq!(permission_flags(PermissivenessMode::Permissive), vec!["--permission-mode", "dontAsk"]);
        assert_eq!(permission_flags(PermissivenessMode::Bypass), vec!["--dangerously-skip-permissions"]);
    }

    #[test]
    fn unknown_parent_name_fails_launch() {
        let store = SessionStore::empty();
        let controller = FakeController::new();
        let mut request = base_request("child");
        request.parent_name = Some("nope".to_string());
        let result = launch(&store, &controller, request, Utc::now());
        assert!(matches!(result, Err(LaunchError::ParentNotFound(_))));
    }

    #[test]
    fn send_keys_failure_kills_window_and_propagates() {
        let store = SessionStore::empty();
        let controller = FakeController { fail_send: true, ..FakeController::new() };
        let result = launch(&store, &controller, base_request("demo"), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn preflight_check_flags_missing_binary() {
        let result = preflight_check("definitely-not-a-real-binary-xyz", "also-not-real-xyz");
        assert!(matches!(result, Err(LaunchError::MissingDependency { .. })));
    }
}
