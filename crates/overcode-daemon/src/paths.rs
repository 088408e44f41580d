//! Filesystem layout: `~/.overcode/...`, overridable via
//! `OVERCODE_STATE_DIR` for tests.

use std::path::PathBuf;

pub const STATE_DIR_ENV: &str = "OVERCODE_STATE_DIR";

pub fn base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs_home().join(".overcode")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    base_dir().join("config.yaml")
}

pub fn sessions_path() -> PathBuf {
    base_dir().join("sessions").join("sessions.json")
}

pub fn session_dir(tmux_session: &str) -> PathBuf {
    base_dir().join("sessions").join(tmux_session)
}

pub fn pid_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("monitor_daemon.pid")
}

pub fn log_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("monitor_daemon.log")
}

pub fn monitor_state_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("monitor_state.json")
}

pub fn activity_signal_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("activity_signal")
}

pub fn agent_history_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("agent_history.csv")
}

pub fn hook_state_path(tmux_session: &str, agent_name: &str) -> PathBuf {
    session_dir(tmux_session).join(format!("hook_state_{agent_name}.json"))
}

pub fn report_path(tmux_session: &str, agent_name: &str) -> PathBuf {
    session_dir(tmux_session).join(format!("report_{agent_name}.json"))
}

pub fn supervisor_stats_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("supervisor_stats.json")
}

pub fn tui_heartbeat_path(tmux_session: &str) -> PathBuf {
    session_dir(tmux_session).join("tui_heartbeat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_dir_env_override_wins() {
        std::env::set_var(STATE_DIR_ENV, "/tmp/overcode-test-base");
        assert_eq!(base_dir(), PathBuf::from("/tmp/overcode-test-base"));
        std::env::remove_var(STATE_DIR_ENV);
    }

    #[test]
    fn session_scoped_paths_nest_under_session_dir() {
        std::env::set_var(STATE_DIR_ENV, "/tmp/overcode-test-base");
        let dir = session_dir("main");
        assert_eq!(pid_path("main"), dir.join("monitor_daemon.pid"));
        assert_eq!(hook_state_path("main", "demo"), dir.join("hook_state_demo.json"));
        assert_eq!(report_path("main", "demo"), dir.join("report_demo.json"));
        std::env::remove_var(STATE_DIR_ENV);
    }
}
