//! `overcode hook-handler` and `overcode setup-hooks` — the hook half of
//! the Status Detector. Reads the vendor CLI's own documented hook-event
//! shape off stdin and writes one state file, in the same "never fail the
//! agent's turn" style `report.rs` already uses for the agent-facing side
//! of the CLI.

use std::io::Read;

use overcode_core::interfaces::Filesystem;
use overcode_core::types::{HookEvent, HookEventKind};
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::paths;

use crate::cli::SetupHooksArgs;

/// Raw shape the vendor CLI feeds every hook script on stdin. Only the
/// fields the Status Detector's event table cares about are named;
/// everything else (`session_id`, `transcript_path`, `cwd`, ...) is ignored.
#[derive(Debug, serde::Deserialize)]
struct RawHookPayload {
    hook_event_name: String,
    #[serde(default)]
    tool_name: Option<String>,
    /// Present on `Notification` events; a permission-prompt notification
    /// carries wording like "needs your permission" that distinguishes it
    /// from an informational notification the Status Detector should
    /// ignore entirely (exit 0, write nothing).
    #[serde(default)]
    message: Option<String>,
}

/// Maps the vendor's hook-event name onto our smaller closed set.
/// `PreToolUse` and purely informational `Notification`s have no
/// counterpart in [`HookEventKind`] and are intentionally dropped — the
/// Status Detector only needs to know when an agent starts, finishes, or
/// needs a human, not every tool invocation.
fn classify(payload: &RawHookPayload) -> Option<HookEventKind> {
    match payload.hook_event_name.as_str() {
        "UserPromptSubmit" => Some(HookEventKind::UserPromptSubmit),
        "PostToolUse" => Some(HookEventKind::PostToolUse),
        "Stop" | "SubagentStop" => Some(HookEventKind::Stop),
        "SessionEnd" => Some(HookEventKind::SessionEnd),
        "Notification" => {
            let is_permission = payload.message.as_deref().map(|m| m.to_lowercase().contains("permission")).unwrap_or(false);
            is_permission.then_some(HookEventKind::PermissionRequest)
        }
        _ => None,
    }
}

/// Reads one hook payload off stdin and overwrites
/// `hook_state_<agent>.json` for the agent named by `OVERCODE_SESSION_NAME` —
/// every hook script this command is wired to runs inside the agent's own
/// tmux pane, where the launcher already exported that var.
/// Always exits 0: a hook that fails the vendor CLI's own turn would be far
/// more disruptive than one that silently drops a status update.
pub fn run_handler() -> anyhow::Result<()> {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        return Ok(());
    }

    let Ok(payload) = serde_json::from_str::<RawHookPayload>(&input) else {
        return Ok(());
    };
    let Some(kind) = classify(&payload) else {
        return Ok(());
    };

    let (Ok(agent_name), Ok(tmux_session)) = (std::env::var("OVERCODE_SESSION_NAME"), std::env::var("OVERCODE_TMUX_SESSION")) else {
        return Ok(());
    };

    let event = HookEvent { event: kind, timestamp: chrono::Utc::now().timestamp() as f64, tool_name: payload.tool_name.clone() };
    let Ok(body) = serde_json::to_string_pretty(&event) else { return Ok(()) };

    let path = paths::hook_state_path(&tmux_session, &agent_name);
    let fs = RealFilesystem;
    let _ = fs.write_atomic(path.to_string_lossy().as_ref(), body.as_bytes());

    Ok(())
}

const HOOK_EVENT_NAMES: &[&str] = &["UserPromptSubmit", "PostToolUse", "Stop", "SubagentStop", "SessionEnd", "Notification"];

/// Writes (merging into, not clobbering) the vendor CLI's hook
/// configuration so each tracked event is piped through
/// `overcode hook-handler`. `--scope project` targets `.claude/settings.json`
/// under the current directory, `--scope user` targets
/// `~/.claude/settings.json`, matching the two scopes the vendor CLI itself
/// recognizes.
pub fn run_setup(args: SetupHooksArgs) -> anyhow::Result<()> {
    let path = settings_path(&args.scope)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut settings: serde_json::Value = match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|_| serde_json::json!({})),
        Err(_) => serde_json::json!({}),
    };

    if !settings.is_object() {
        settings = serde_json::json!({});
    }
    let hooks = settings.as_object_mut().unwrap().entry("hooks").or_insert_with(|| serde_json::json!({}));
    if !hooks.is_object() {
        *hooks = serde_json::json!({});
    }
    let hooks = hooks.as_object_mut().unwrap();

    for event_name in HOOK_EVENT_NAMES {
        hooks.insert(event_name.to_string(), hook_matcher_entry());
    }

    std::fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
    println!("wrote hook configuration to {}", path.display());
    Ok(())
}

fn hook_matcher_entry() -> serde_json::Value {
    serde_json::json!([{
        "matcher": "",
        "hooks": [{"type": "command", "command": "overcode hook-handler"}],
    }])
}

fn settings_path(scope: &str) -> anyhow::Result<std::path::PathBuf> {
    match scope {
        "project" => Ok(std::env::current_dir()?.join(".claude").join("settings.json")),
        "user" => {
            let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME not set"))?;
            Ok(std::path::PathBuf::from(home).join(".claude").join("settings.json"))
        }
        other => anyhow::bail!("--scope must be 'project' or 'user', got {other:?}"),
    }
}
