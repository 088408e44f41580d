//! Follow Mode — stream an agent's pane to stdout until it stops, without
//! killing it. The pure ring-buffer dedup/overlap logic lives here so it's
//! testable without a real tmux pane, and `run` wires it to a
//! `PaneController` + `Filesystem` + [`crate::signal::ShutdownFlag`] for
//! the blocking CLI command.

use std::collections::VecDeque;
use std::time::Duration;

use overcode_core::interfaces::{Filesystem, PaneController, PaneError};
use overcode_core::pattern::strip_ansi;
use overcode_core::types::{HookEventKind, LifecycleStatus};

use crate::signal::ShutdownFlag;

pub const DEDUP_CAPACITY: usize = 50;
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Lines captured per poll; generous relative to the usual 50-line status
/// window since follow mode needs enough overlap to resync reliably.
const CAPTURE_LINES: u32 = 200;

/// Locates where in `new_lines` the previously emitted tail resumes, by
/// scanning backward for the last emitted line and requiring up to 2 more
/// lines of surrounding context to also match — guards against a short,
/// frequently repeated line (a lone `>` prompt) causing a false resync.
fn find_overlap_start(recent: &VecDeque<String>, new_lines: &[String]) -> usize {
    let Some(last_known) = recent.back() else {
        return 0;
    };
    for i in (0..new_lines.len()).rev() {
        if &new_lines[i] != last_known {
            continue;
        }
        let check_count = 3.min(recent.len()).min(i + 1);
        let mut matched = true;
        for j in 1..check_count {
            if i >= j {
                let rl_idx = recent.len() - 1 - j;
                if recent[rl_idx] != new_lines[i - j] {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return i + 1;
        }
    }
    0
}

/// Cleans a raw capture into ANSI-stripped, whitespace-stripped lines —
/// stripping ANSI *then* whitespace, matching the original exactly (a
/// trailing ANSI reset sequence can itself look like trailing whitespace
/// once stripped, so order matters).
fn clean_lines(raw: &str) -> Vec<String> {
    raw.trim_end().lines().map(|line| strip_ansi(line).trim().to_string()).collect()
}

/// Feeds one capture through the dedup ring, returning only the
/// newly-emitted non-empty lines. Every cleaned line (empty or not) is
/// still pushed into `recent` so overlap detection on the next capture
/// lines up with what the original printed.
pub fn process_capture(raw: &str, recent: &mut VecDeque<String>) -> Vec<String> {
    let new_lines = clean_lines(raw);
    let start = find_overlap_start(recent, &new_lines);

    let mut emitted = Vec::new();
    for line in &new_lines[start..] {
        if !line.is_empty() {
            emitted.push(line.clone());
        }
        recent.push_back(line.clone());
        if recent.len() > DEDUP_CAPACITY {
            recent.pop_front();
        }
    }
    emitted
}

/// `true` iff `hook_state_<name>.json` shows the most recent event was
/// `Stop`. A malformed or unreadable file reads as "no Stop yet".
pub fn hook_shows_stop(fs: &impl Filesystem, hook_state_path: &str) -> bool {
    let Ok(Some(contents)) = fs.read_to_string(hook_state_path) else {
        return false;
    };
    let Ok(event) = serde_json::from_str::<overcode_core::types::HookEvent>(&contents) else {
        return false;
    };
    event.event == HookEventKind::Stop
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowExit {
    /// Agent reached `Stop`; followed to completion.
    Stopped,
    /// The tmux window is gone.
    Terminated,
    /// SIGINT: stopped following, agent left running.
    Interrupted,
}

impl FollowExit {
    pub fn exit_code(self) -> i32 {
        match self {
            FollowExit::Stopped => 0,
            FollowExit::Terminated => 1,
            FollowExit::Interrupted => 130,
        }
    }
}

/// Blocking drive loop: polls the pane every [`POLL_INTERVAL`], printing
/// newly observed lines via `emit`, until Stop, termination, or
/// `shutdown` is set. Does not kill the agent under any exit path.
pub fn run(
    controller: &impl PaneController,
    fs: &impl Filesystem,
    tmux_session: &str,
    tmux_window: u32,
    hook_state_path: &str,
    lifecycle: impl Fn() -> LifecycleStatus,
    shutdown: &ShutdownFlag,
    mut emit: impl FnMut(&str),
) -> FollowExit {
    let mut recent: VecDeque<String> = VecDeque::with_capacity(DEDUP_CAPACITY);

    loop {
        if shutdown.is_set() {
            return FollowExit::Interrupted;
        }

        match controller.capture_pane(tmux_session, tmux_window, CAPTURE_LINES) {
            Ok(raw) => {
                for line in process_capture(&raw, &mut recent) {
                    emit(&line);
                }
            }
            Err(PaneError::Gone(_)) => return FollowExit::Terminated,
            Err(PaneError::Transient(_)) => {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
        }

        if hook_shows_stop(fs, hook_state_path) {
            std::thread::sleep(POLL_INTERVAL);
            if let Ok(raw) = controller.capture_pane(tmux_session, tmux_window, CAPTURE_LINES) {
                for line in process_capture(&raw, &mut recent) {
                    emit(&line);
                }
            }
            return FollowExit::Stopped;
        }

        if lifecycle() == LifecycleStatus::Terminated {
            return FollowExit::Terminated;
        }

        if shutdown.is_set() {
            return FollowExit::Interrupted;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
