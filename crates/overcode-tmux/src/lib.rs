//! tmux-backed implementation of `overcode_core::interfaces::PaneController`.

pub mod executor;

use std::collections::HashMap;
use std::io::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use overcode_core::interfaces::{Keys, NamedKey, PaneController, PaneError, WindowInfo};

pub use executor::{TmuxError, TmuxExecutor};

/// How long a confirmed-existing `(session, window)` pair is trusted
/// without re-querying tmux. Entries are invalidated on error rather than
/// waiting out the TTL.
const HANDLE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Tab-separated `list-windows` format: index, name, width, height, active.
/// Tab avoids ambiguity with colons that can appear in window names.
const LIST_WINDOWS_FMT: &str = "#{window_index}\t#{window_name}\t#{window_width}\t#{window_height}\t#{window_active}";
const LIST_WINDOWS_FIELDS: usize = 5;

pub struct TmuxController {
    executor: TmuxExecutor,
    handle_cache: Mutex<HashMap<(String, u32), Instant>>,
}

impl TmuxController {
    pub fn new() -> Self {
        Self { executor: TmuxExecutor::new(), handle_cache: Mutex::new(HashMap::new()) }
    }

    pub fn with_executor(executor: TmuxExecutor) -> Self {
        Self { executor, handle_cache: Mutex::new(HashMap::new()) }
    }

    fn cache_mark_good(&self, session: &str, index: u32) {
        let mut cache = self.handle_cache.lock().expect("handle cache mutex poisoned");
        cache.insert((session.to_string(), index), Instant::now());
    }

    fn cache_invalidate(&self, session: &str, index: u32) {
        let mut cache = self.handle_cache.lock().expect("handle cache mutex poisoned");
        cache.remove(&(session.to_string(), index));
    }

    fn cache_is_fresh(&self, session: &str, index: u32) -> bool {
        let cache = self.handle_cache.lock().expect("handle cache mutex poisoned");
        match cache.get(&(session.to_string(), index)) {
            Some(seen_at) => seen_at.elapsed() < HANDLE_CACHE_TTL,
            None => false,
        }
    }

    fn target(session: &str, index: u32) -> String {
        format!("{session}:{index}")
    }

    fn named_key_arg(key: &NamedKey) -> String {
        match key {
            NamedKey::Enter => "Enter".to_string(),
            NamedKey::Escape => "Escape".to_string(),
            NamedKey::Up => "Up".to_string(),
            NamedKey::Down => "Down".to_string(),
            NamedKey::Left => "Left".to_string(),
            NamedKey::Right => "Right".to_string(),
            NamedKey::Digit(d) => d.to_string(),
            NamedKey::CtrlC => "C-c".to_string(),
        }
    }
}

impl Default for TmuxController {
    fn default() -> Self {
        Self::new()
    }
}

fn map_command_error(session: &str, index: Option<u32>, err: TmuxError) -> PaneError {
    match err {
        TmuxError::NotFound => PaneError::Transient("tmux binary not found".into()),
        TmuxError::Io(e) => PaneError::Transient(format!("tmux io error: {e}")),
        TmuxError::Parse(detail) => PaneError::Transient(detail),
        TmuxError::CommandFailed(detail) => {
            let target = index.map(|i| TmuxController::target(session, i)).unwrap_or_else(|| session.to_string());
            PaneError::Gone(format!("{target}: {detail}"))
        }
    }
}

impl PaneController for TmuxController {
    fn ensure_session(&self, session: &str) -> Result<(), PaneError> {
        if self.executor.run(&["has-session", "-t", session]).is_ok() {
            return Ok(());
        }
        self.executor
            .run(&["new-session", "-d", "-s", session])
            .map(|_| ())
            .map_err(|e| map_command_error(session, None, e))
    }

    fn new_window(&self, session: &str, name: &str, cwd: &str) -> Result<u32, PaneError> {
        let output = self
            .executor
            .run(&["new-window", "-t", session, "-n", name, "-c", cwd, "-P", "-F", "#{window_index}"])
            .map_err(|e| map_command_error(session, None, e))?;
        let index: u32 = output
            .trim()
            .parse()
            .map_err(|_| PaneError::Transient(format!("unparseable window index: {output:?}")))?;
        self.cache_mark_good(session, index);
        Ok(index)
    }

    fn kill_window(&self, session: &str, index: u32) -> Result<(), PaneError> {
        let target = Self::target(session, index);
        self.cache_invalidate(session, index);
        match self.executor.run(&["kill-window", "-t", &target]) {
            Ok(_) => Ok(()),
            // Already gone is success from the caller's point of view.
            Err(TmuxError::CommandFailed(_)) => Ok(()),
            Err(e) => Err(map_command_error(session, Some(index), e)),
        }
    }

    fn window_exists(&self, session: &str, index: u32) -> Result<bool, PaneError> {
        if self.cache_is_fresh(session, index) {
            return Ok(true);
        }
        let target = Self::target(session, index);
        match self.executor.run(&["list-panes", "-t", &target, "-F", "#{pane_id}"]) {
            Ok(_) => {
                self.cache_mark_good(session, index);
                Ok(true)
            }
            Err(TmuxError::CommandFailed(_)) => {
                self.cache_invalidate(session, index);
                Ok(false)
            }
            Err(e) => Err(map_command_error(session, Some(index), e)),
        }
    }

    fn send_keys(&self, session: &str, index: u32, keys: Keys, enter: bool) -> Result<(), PaneError> {
        let target = Self::target(session, index);

        match keys {
            Keys::Named(key) => {
                let arg = Self::named_key_arg(&key);
                self.executor
                    .run(&["send-keys", "-t", &target, &arg])
                    .map_err(|e| map_command_error(session, Some(index), e))?;
            }
            Keys::Text(text) => {
                if text.contains('\n') {
                    self.paste_via_buffer(session, index, &text)?;
                } else if !text.is_empty() {
                    self.executor
                        .run(&["send-keys", "-t", &target, "-l", "--", &text])
                        .map_err(|e| map_command_error(session, Some(index), e))?;
                }
                if enter {
                    self.executor
                        .run(&["send-keys", "-t", &target, "Enter"])
                        .map_err(|e| map_command_error(session, Some(index), e))?;
                }
            }
        }
        Ok(())
    }

    fn capture_pane(&self, session: &str, index: u32, lines: u32) -> Result<String, PaneError> {
        let target = Self::target(session, index);
        let start = format!("-{lines}");
        self.executor
            .run(&["capture-pane", "-t", &target, "-p", "-e", "-S", &start])
            .map_err(|e| map_command_error(session, Some(index), e))
    }

    fn select_window(&self, session: &str, index: u32) -> Result<(), PaneError> {
        let target = Self::target(session, index);
        self.executor
            .run(&["select-window", "-t", &target])
            .map(|_| ())
            .map_err(|e| map_command_error(session, Some(index), e))
    }

    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, PaneError> {
        let output = self
            .executor
            .run(&["list-windows", "-t", session, "-F", LIST_WINDOWS_FMT])
            .map_err(|e| map_command_error(session, None, e))?;
        Ok(parse_list_windows_output(&output))
    }
}

impl TmuxController {
    /// Multi-line sends go through a buffer paste rather than line-by-line
    /// `send-keys`, which reorders output and trips length limits on long
    /// prompts.
    fn paste_via_buffer(&self, session: &str, index: u32, text: &str) -> Result<(), PaneError> {
        let target = Self::target(session, index);
        let mut file = tempfile::NamedTempFile::new()
            .map_err(|e| PaneError::Transient(format!("tempfile create failed: {e}")))?;
        file.write_all(text.as_bytes())
            .map_err(|e| PaneError::Transient(format!("tempfile write failed: {e}")))?;
        file.flush().map_err(|e| PaneError::Transient(format!("tempfile flush failed: {e}")))?;

        let path = file.path().to_string_lossy().into_owned();
        let buffer_name = format!("overcode-paste-{session}-{index}");

        self.executor
            .run(&["load-buffer", "-b", &buffer_name, &path])
            .map_err(|e| map_command_error(session, Some(index), e))?;
        let paste_result = self.executor.run(&["paste-buffer", "-b", &buffer_name, "-t", &target]);
        // best-effort cleanup regardless of paste outcome
        let _ = self.executor.run(&["delete-buffer", "-b", &buffer_name]);
        paste_result.map(|_| ()).map_err(|e| map_command_error(session, Some(index), e))
    }
}

fn parse_list_windows_output(output: &str) -> Vec<WindowInfo> {
    let mut windows = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_list_windows_line(line) {
            Some(window) => windows.push(window),
            None => tracing::warn!(line, "skipping malformed list-windows line"),
        }
    }
    windows
}

fn parse_list_windows_line(line: &str) -> Option<WindowInfo> {
    let parts: Vec<&str> = line.splitn(LIST_WINDOWS_FIELDS, '\t').collect();
    if parts.len() < LIST_WINDOWS_FIELDS {
        return None;
    }
    let index: u32 = parts[0].parse().ok()?;
    let width: u32 = parts[2].parse().ok()?;
    let height: u32 = parts[3].parse().ok()?;
    Some(WindowInfo { index, name: parts[1].to_string(), width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_window_line() {
        let line = "0\teditor\t120\t40\t1";
        let window = parse_list_windows_line(line).unwrap();
        assert_eq!(window.index, 0);
        assert_eq!(window.name, "editor");
        assert_eq!(window.width, 120);
        assert_eq!(window.height, 40);
    }

    #[test]
    fn malformed_window_line_is_skipped() {
        let output = "bad\tline\nwork\tshell\t80\t24\t0\n1\teditor\t120\t40\t1\n";
        let windows = parse_list_windows_output(output);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].index, 1);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let output = "\n  \n0\tmain\t80\t24\t1\n\n";
        let windows = parse_list_windows_output(output);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn colon_free_names_round_trip_via_tabs() {
        let line = "2\twindow:with:colon\t80\t24\t0";
        let window = parse_list_windows_line(line).unwrap();
        assert_eq!(window.name, "window:with:colon");
    }

    #[test]
    fn target_formats_session_colon_index() {
        assert_eq!(TmuxController::target("main", 3), "main:3");
    }

    #[test]
    fn named_key_mapping() {
        assert_eq!(TmuxController::named_key_arg(&NamedKey::Enter), "Enter");
        assert_eq!(TmuxController::named_key_arg(&NamedKey::Digit(2)), "2");
    }

    #[test]
    fn command_failed_maps_to_gone() {
        let err = map_command_error("main", Some(1), TmuxError::CommandFailed("no such window".into()));
        assert!(matches!(err, PaneError::Gone(_)));
    }

    #[test]
    fn io_error_maps_to_transient() {
        let err = map_command_error("main", Some(1), TmuxError::NotFound);
        assert!(matches!(err, PaneError::Transient(_)));
    }

    #[test]
    fn cache_freshness_window() {
        let controller = TmuxController::new();
        assert!(!controller.cache_is_fresh("main", 0));
        controller.cache_mark_good("main", 0);
        assert!(controller.cache_is_fresh("main", 0));
        controller.cache_invalidate("main", 0);
        assert!(!controller.cache_is_fresh("main", 0));
    }
}
