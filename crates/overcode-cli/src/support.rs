//! Shared setup every subcommand needs: the real filesystem/tmux bindings,
//! the session store loaded off disk, and `config.yaml` with its defaults.

use std::collections::HashMap;

use overcode_core::config::Config;
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::paths;
use overcode_daemon::store::SessionStore;
use overcode_tmux::TmuxController;

pub fn load_config() -> Config {
    let path = paths::config_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => match Config::from_yaml_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "malformed config.yaml, using defaults");
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

pub fn load_store() -> SessionStore {
    let fs = RealFilesystem;
    let path = paths::sessions_path();
    SessionStore::load_or_default(&fs, path.to_string_lossy().as_ref())
}

pub fn persist_store(store: &SessionStore) -> anyhow::Result<()> {
    let fs = RealFilesystem;
    let path = paths::sessions_path();
    store.persist(&fs, path.to_string_lossy().as_ref())?;
    Ok(())
}

/// tmux socket override from `OVERCODE_TMUX_SOCKET`, applied to every
/// subcommand that talks to the multiplexer.
pub fn controller() -> TmuxController {
    match std::env::var("OVERCODE_TMUX_SOCKET") {
        Ok(socket) if !socket.is_empty() => {
            TmuxController::with_executor(overcode_tmux::executor::TmuxExecutor::new().with_socket(socket))
        }
        _ => TmuxController::new(),
    }
}

pub fn instruction_presets() -> HashMap<String, String> {
    load_config().instruction_presets
}

/// Finds a session by name in the caller's tmux session, or prints a
/// uniform error and exits 1 — the shape every mutating subcommand wants.
pub fn require_session(store: &SessionStore, name: &str, tmux_session: &str) -> anyhow::Result<overcode_core::types::Session> {
    store
        .find_by_name(name, tmux_session)
        .ok_or_else(|| anyhow::anyhow!("agent '{name}' not found in tmux session '{tmux_session}'"))
}

pub fn print_result(result: serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
}
