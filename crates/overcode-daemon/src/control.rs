//! Control Surface — the single set of mutating actions shared by the
//! web API's authenticated POST handlers (and, eventually, a TUI). One
//! method per action, each raising a `ControlError(message, status)` that
//! carries its own HTTP-status-shaped error code.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use overcode_core::interfaces::{Keys, NamedKey, PaneController};
use overcode_core::stats::parse_frequency_seconds;
use overcode_core::types::{LifecycleStatus, PermissivenessMode, Session};

use crate::launcher::{self, LaunchRequest};
use crate::paths;
use crate::store::SessionStore;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ControlError {
    /// The HTTP status `overcode-web` maps this onto.
    pub fn status(&self) -> u16 {
        match self {
            ControlError::BadRequest(_) => 400,
            ControlError::NotFound(_) => 404,
            ControlError::Conflict(_) => 409,
            ControlError::Internal(_) => 500,
        }
    }
}

fn ok() -> serde_json::Value {
    serde_json::json!({"ok": true})
}

/// The keys `send_key_to_agent` accepts, mirroring the original's
/// `allowed_keys` table. Lowercase on input.
fn named_key(key: &str) -> Result<(Keys, bool), ControlError> {
    match key.to_ascii_lowercase().trim() {
        "enter" => Ok((Keys::Text(String::new()), true)),
        "escape" => Ok((Keys::Named(NamedKey::Escape), false)),
        "tab" => Ok((Keys::Text("\t".to_string()), false)),
        "up" => Ok((Keys::Named(NamedKey::Up), false)),
        "down" => Ok((Keys::Named(NamedKey::Down), false)),
        "1" => Ok((Keys::Named(NamedKey::Digit(1)), false)),
        "2" => Ok((Keys::Named(NamedKey::Digit(2)), false)),
        "3" => Ok((Keys::Named(NamedKey::Digit(3)), false)),
        "4" => Ok((Keys::Named(NamedKey::Digit(4)), false)),
        "5" => Ok((Keys::Named(NamedKey::Digit(5)), false)),
        other => Err(ControlError::BadRequest(format!(
            "Invalid key: '{other}'. Allowed: 1, 2, 3, 4, 5, down, enter, escape, tab, up"
        ))),
    }
}

pub struct ControlSurface<'a, PC> {
    pub store: &'a SessionStore,
    pub controller: &'a PC,
    pub tmux_session: String,
    /// `Config::instruction_presets`, passed in rather than owned so the
    /// caller can reload `config.yaml` between requests.
    pub instruction_presets: &'a HashMap<String, String>,
}

impl<'a, PC: PaneController> ControlSurface<'a, PC> {
    fn find(&self, name: &str) -> Result<Session, ControlError> {
        self.store.find_by_name(name, &self.tmux_session).ok_or_else(|| ControlError::NotFound(format!("Agent '{name}' not found")))
    }

    /// Any action that sends keys first wakes a sleeping agent.
    fn wake_if_asleep(&self, session: &Session) {
        if session.is_asleep {
            let _ = self.store.with_session_mut(&session.id, |s| s.is_asleep = false);
        }
    }

    // -- Agent interaction ---------------------------------------------

    pub fn send_to_agent(&self, name: &str, text: &str, enter: bool) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        self.wake_if_asleep(&session);
        self.controller
            .send_keys(&session.tmux_session, session.tmux_window, Keys::Text(text.to_string()), enter)
            .map_err(|e| ControlError::Internal(format!("failed to send to agent: {e}")))?;
        Ok(ok())
    }

    pub fn send_key_to_agent(&self, name: &str, key: &str) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        let (keys, enter) = named_key(key)?;
        self.wake_if_asleep(&session);
        self.controller
            .send_keys(&session.tmux_session, session.tmux_window, keys, enter)
            .map_err(|e| ControlError::Internal(format!("failed to send key to agent: {e}")))?;
        Ok(ok())
    }

    /// Tears down `name`. `cascade=true` kills descendants deepest-first
    /// before the named agent; `cascade=false` orphans its children by
    /// nulling their `parent_session_id`.
    pub fn kill(&self, name: &str, cascade: bool) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;

        if cascade {
            let mut order = Vec::new();
            collect_descendants_deepest_first(self.store, &session.id, &mut order);
            for descendant in &order {
                let _ = self.controller.kill_window(&descendant.tmux_session, descendant.tmux_window);
                let _ = self.store.with_session_mut(&descendant.id, |s| s.status = LifecycleStatus::Terminated);
            }
        } else {
            for child in self.store.list_children(&session.id) {
                let _ = self.store.with_session_mut(&child.id, |s| s.parent_session_id = None);
            }
        }

        self.controller
            .kill_window(&session.tmux_session, session.tmux_window)
            .map_err(|e| ControlError::Internal(format!("failed to kill agent: {e}")))?;
        let _ = self.store.with_session_mut(&session.id, |s| s.status = LifecycleStatus::Terminated);
        Ok(ok())
    }

    /// Ctrl-C, then relaunch the same command line, preserving permission
    /// mode.
    pub fn restart(&self, name: &str) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;

        self.controller
            .send_keys(&session.tmux_session, session.tmux_window, Keys::Named(NamedKey::CtrlC), false)
            .map_err(|e| ControlError::Internal(format!("failed to send Ctrl-C: {e}")))?;
        std::thread::sleep(Duration::from_millis(500));

        let mut claude_cmd = vec!["claude".to_string(), "code".to_string()];
        claude_cmd.extend(launcher::permission_flags(session.permissiveness_mode));
        let env_prefix = format!("OVERCODE_SESSION_NAME={} OVERCODE_TMUX_SESSION={}", session.name, session.tmux_session);
        let command_line = format!("{env_prefix} {}", claude_cmd.join(" "));

        self.controller
            .send_keys(&session.tmux_session, session.tmux_window, Keys::Text(command_line), true)
            .map_err(|e| ControlError::Internal(format!("failed to restart agent: {e}")))?;
        Ok(ok())
    }

    pub fn launch_agent(
        &self,
        directory: &str,
        name: &str,
        prompt: Option<String>,
        permissions: PermissivenessMode,
    ) -> Result<serde_json::Value, ControlError> {
        let request = LaunchRequest {
            name: name.to_string(),
            tmux_session: self.tmux_session.clone(),
            start_directory: directory.to_string(),
            initial_prompt: prompt,
            permissiveness_mode: permissions,
            parent_name: None,
            allowed_tools: Vec::new(),
            extra_claude_args: Vec::new(),
            standing_instructions: String::new(),
        };
        let session = launcher::launch(self.store, self.controller, request, Utc::now())
            .map_err(|e| ControlError::Internal(format!("failed to launch agent: {e}")))?;
        Ok(serde_json::json!({"ok": true, "session_id": session.id}))
    }

    // -- Agent configuration ---------------------------------------------

    pub fn set_standing_orders(&self, name: &str, text: Option<&str>, preset: Option<&str>) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;

        if let Some(preset_name) = preset {
            let text = self
                .instruction_presets
                .get(preset_name)
                .ok_or_else(|| ControlError::BadRequest(format!("Unknown preset: '{preset_name}'")))?
                .clone();
            let _ = self.store.with_session_mut(&session.id, |s| {
                s.standing_instructions = text;
                s.standing_instructions_preset = Some(preset_name.to_string());
            });
            Ok(serde_json::json!({"ok": true, "preset": preset_name}))
        } else if let Some(text) = text {
            let _ = self.store.with_session_mut(&session.id, |s| {
                s.standing_instructions = text.to_string();
                s.standing_instructions_preset = None;
            });
            Ok(ok())
        } else {
            Err(ControlError::BadRequest("Provide 'text' or 'preset'".to_string()))
        }
    }

    pub fn clear_standing_orders(&self, name: &str) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        let _ = self.store.with_session_mut(&session.id, |s| {
            s.standing_instructions = String::new();
            s.standing_instructions_preset = None;
        });
        Ok(ok())
    }

    pub fn set_budget(&self, name: &str, usd: f64) -> Result<serde_json::Value, ControlError> {
        if usd < 0.0 {
            return Err(ControlError::BadRequest("Budget cannot be negative".to_string()));
        }
        let session = self.find(name)?;
        let _ = self.store.with_session_mut(&session.id, |s| s.cost_budget_usd = usd);
        Ok(ok())
    }

    pub fn set_value(&self, name: &str, value: i64) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        let _ = self.store.with_session_mut(&session.id, |s| s.agent_value = value);
        Ok(ok())
    }

    pub fn set_annotation(&self, name: &str, text: &str) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        let _ = self.store.with_session_mut(&session.id, |s| s.human_annotation = text.to_string());
        Ok(ok())
    }

    /// Rejects sleeping a *running* agent, and rejects it while an
    /// unpaused heartbeat is active — both 409.
    pub fn set_sleep(&self, name: &str, asleep: bool) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;

        if asleep {
            if session.stats.current_state.is_green() {
                return Err(ControlError::Conflict("Cannot put a running agent to sleep".to_string()));
            }
            if session.heartbeat_enabled && !session.heartbeat_paused {
                return Err(ControlError::Conflict("Cannot sleep agent with active heartbeat — disable heartbeat first".to_string()));
            }
        }

        let _ = self.store.with_session_mut(&session.id, |s| s.is_asleep = asleep);
        Ok(ok())
    }

    // -- Heartbeat control ------------------------------------------------

    pub fn configure_heartbeat(
        &self,
        name: &str,
        enabled: bool,
        frequency: Option<&str>,
        instruction: Option<&str>,
    ) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;

        let frequency_seconds = frequency
            .map(|f| parse_frequency_seconds(f).map_err(|e| ControlError::BadRequest(e.to_string())))
            .transpose()?;

        let _ = self.store.with_session_mut(&session.id, |s| {
            s.heartbeat_enabled = enabled;
            if let Some(seconds) = frequency_seconds {
                s.heartbeat_frequency_seconds = seconds;
            }
            if let Some(instruction) = instruction {
                s.heartbeat_instruction = instruction.to_string();
            }
        });
        Ok(ok())
    }

    pub fn pause_heartbeat(&self, name: &str) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        if !session.heartbeat_enabled {
            return Err(ControlError::Conflict("No heartbeat configured".to_string()));
        }
        if session.heartbeat_paused {
            return Err(ControlError::Conflict("Heartbeat already paused".to_string()));
        }
        let _ = self.store.with_session_mut(&session.id, |s| s.heartbeat_paused = true);
        Ok(ok())
    }

    pub fn resume_heartbeat(&self, name: &str) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        if !session.heartbeat_enabled {
            return Err(ControlError::Conflict("No heartbeat configured".to_string()));
        }
        if !session.heartbeat_paused {
            return Err(ControlError::Conflict("Heartbeat not paused".to_string()));
        }
        if session.is_asleep {
            return Err(ControlError::Conflict("Cannot resume heartbeat on sleeping agent".to_string()));
        }
        let _ = self.store.with_session_mut(&session.id, |s| s.heartbeat_paused = false);
        Ok(ok())
    }

    // -- Feature toggles ---------------------------------------------------

    pub fn set_time_context(&self, name: &str, enabled: bool) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        let _ = self.store.with_session_mut(&session.id, |s| s.time_context_enabled = enabled);
        Ok(ok())
    }

    pub fn set_hook_detection(&self, name: &str, enabled: bool) -> Result<serde_json::Value, ControlError> {
        let session = self.find(name)?;
        let _ = self.store.with_session_mut(&session.id, |s| s.hook_status_detection = enabled);
        Ok(ok())
    }

    // -- Bulk operations ----------------------------------------------------

    /// Sends a fixed handover instruction to every active, awake agent in
    /// this tmux session.
    pub fn transport_all(&self) -> Result<serde_json::Value, ControlError> {
        let active: Vec<Session> = self
            .store
            .list_for_tmux_session(&self.tmux_session)
            .into_iter()
            .filter(|s| s.status != LifecycleStatus::Terminated && !s.is_asleep)
            .collect();

        if active.is_empty() {
            return Err(ControlError::Conflict("No active agents to transport".to_string()));
        }

        let mut sent = 0u64;
        for session in &active {
            if self.controller.send_keys(&session.tmux_session, session.tmux_window, Keys::Text(HANDOVER_INSTRUCTION.to_string()), true).is_ok() {
                sent += 1;
            }
        }
        Ok(serde_json::json!({"ok": true, "sent": sent, "total": active.len()}))
    }

    /// Archives terminated (and optionally `done`) sessions out of the live
    /// set, triggered on demand here rather than only on the auto-archive
    /// cadence.
    pub fn cleanup_agents(&self, include_done: bool) -> Result<serde_json::Value, ControlError> {
        let targets: Vec<Session> = self
            .store
            .list_for_tmux_session(&self.tmux_session)
            .into_iter()
            .filter(|s| s.status == LifecycleStatus::Terminated || (include_done && s.status == LifecycleStatus::Done))
            .collect();

        for session in &targets {
            let _ = self.store.archive(&session.id);
        }
        Ok(serde_json::json!({"ok": true, "cleaned": targets.len()}))
    }

    // -- System control -------------------------------------------------

    /// Best-effort SIGTERM to the running monitor daemon's PID, then
    /// relaunch the same binary in `monitor` mode. Starting/stopping a
    /// separate Supervisor-Claude daemon is out of scope for this crate,
    /// which never orchestrates one.
    pub fn restart_monitor(&self) -> Result<serde_json::Value, ControlError> {
        let pid_path = paths::pid_path(&self.tmux_session);
        if let Ok(contents) = std::fs::read_to_string(&pid_path) {
            if let Ok(pid) = contents.trim().parse::<u32>() {
                let _ = std::process::Command::new("kill").arg("-TERM").arg(pid.to_string()).status();
            }
        }
        std::thread::sleep(Duration::from_millis(500));

        let exe = std::env::current_exe().map_err(|e| ControlError::Internal(format!("cannot locate own binary: {e}")))?;
        std::process::Command::new(exe)
            .args(["monitor", "--tmux-session", &self.tmux_session])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ControlError::Internal(format!("failed to relaunch monitor: {e}")))?;
        Ok(ok())
    }
}

const HANDOVER_INSTRUCTION: &str = "Please prepare for handover. Follow these steps in order:\n\n\
1. Check your current branch with `git branch --show-current`\n\
   - If on main or master, create and switch to a new branch: `git checkout -b handover/<brief-task-description>`\n\
   - Never push directly to main/master\n\n\
2. Commit all your current changes with a descriptive commit message\n\n\
3. Push to your branch: `git push -u origin <branch-name>`\n\n\
4. Check if a PR exists: `gh pr list --head $(git branch --show-current)`\n\
   - If no PR exists, create a draft PR: `gh pr create --draft --title '<brief title>' --body 'WIP'`\n\n\
5. Post a handover comment on the PR using `gh pr comment` with what you've accomplished, current state, pending tasks, and known issues.";

/// Depth-first post-order walk of `root`'s descendants — children appended
/// after their own subtrees are fully collected, so a caller iterating the
/// result kills leaves before the ancestors above them.
fn collect_descendants_deepest_first(store: &SessionStore, root_id: &str, out: &mut Vec<Session>) {
    for child in store.list_children(root_id) {
        collect_descendants_deepest_first(store, &child.id, out);
        out.push(child);
    }
}
