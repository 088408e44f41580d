//! PaneController — abstract terminal-multiplexer operations. The
//! concrete tmux binding lives in `overcode-tmux`; this crate only declares
//! the shape so `overcode-daemon` can depend on the interface without
//! depending on a concrete backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaneError {
    /// Capture/send/list failed in a way that's likely to clear up next
    /// tick (subprocess hiccup, momentary resource exhaustion). Callers
    /// invalidate their handle cache and retry next tick rather than
    /// treating the session as gone.
    #[error("transient pane error: {0}")]
    Transient(String),

    /// The window is confirmed gone. Callers transition the session's
    /// lifecycle to `terminated`.
    #[error("window is gone: {0}")]
    Gone(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedKey {
    Enter,
    Escape,
    Digit(u8),
    Up,
    Down,
    Left,
    Right,
    /// Interrupt signal sent to a running pane (tmux's `C-c`), used to stop
    /// an agent process before resending a restart command.
    CtrlC,
}

/// What to send via `SendKeys`. Multi-line text must be sent through a
/// buffer paste by the implementation, not line-by-line `send-keys` (loses
/// ordering and trips length limits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keys {
    Text(String),
    Named(NamedKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub index: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

pub trait PaneController {
    /// Idempotent — succeeds whether or not the session already exists.
    fn ensure_session(&self, session: &str) -> Result<(), PaneError>;

    fn new_window(&self, session: &str, name: &str, cwd: &str) -> Result<u32, PaneError>;

    fn kill_window(&self, session: &str, index: u32) -> Result<(), PaneError>;

    /// A missing window is *not* an error: returns `Ok(false)`.
    fn window_exists(&self, session: &str, index: u32) -> Result<bool, PaneError>;

    fn send_keys(&self, session: &str, index: u32, keys: Keys, enter: bool) -> Result<(), PaneError>;

    /// Returns the last `lines` visual lines, ANSI escape sequences
    /// preserved; stripping happens downstream in the pattern engine.
    fn capture_pane(&self, session: &str, index: u32, lines: u32) -> Result<String, PaneError>;

    fn select_window(&self, session: &str, index: u32) -> Result<(), PaneError>;

    fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, PaneError>;
}
