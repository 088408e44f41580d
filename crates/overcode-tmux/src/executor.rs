use std::process::{Command, Output};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux command failed: {0}")]
    CommandFailed(String),
    #[error("tmux not found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Synchronous tmux command executor. Each call spawns a `tmux` process; a
/// blocking subprocess call per operation is the model, fanned out across
/// the Monitor Loop's worker pool rather than made async.
pub struct TmuxExecutor {
    tmux_bin: String,
    socket: Option<String>,
}

impl TmuxExecutor {
    pub fn new() -> Self {
        Self { tmux_bin: "tmux".into(), socket: None }
    }

    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { tmux_bin: bin.into(), socket: None }
    }

    /// `OVERCODE_TMUX_SOCKET` override, for test isolation.
    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    pub fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let output = self.run_raw(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed(format!(
                "exit {}: {}",
                output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".into()),
                stderr.trim(),
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn run_unchecked(&self, args: &[&str]) -> Result<Output, TmuxError> {
        self.run_raw(args)
    }

    fn run_raw(&self, args: &[&str]) -> Result<Output, TmuxError> {
        let mut cmd = Command::new(&self.tmux_bin);
        if let Some(socket) = &self.socket {
            cmd.args(["-S", socket]);
        }
        cmd.args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TmuxError::NotFound
            } else {
                TmuxError::Io(e)
            }
        })
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_binary() {
        let exec = TmuxExecutor::with_bin("/nonexistent/tmux-binary");
        let err = exec.run(&["list-sessions"]).unwrap_err();
        assert!(matches!(err, TmuxError::NotFound), "expected NotFound, got: {err:?}");
    }

    #[test]
    fn socket_override_is_passed_before_subcommand() {
        // Can't exercise a real tmux here without tmux installed in CI,
        // but a bad binary path with a socket set should still surface
        // NotFound rather than panicking on argument construction.
        let exec = TmuxExecutor::with_bin("/nonexistent/tmux-binary").with_socket("test-sock");
        let err = exec.run(&["list-sessions"]).unwrap_err();
        assert!(matches!(err, TmuxError::NotFound));
    }
}
