//! The activity-signal touch file and the shutdown flag the Monitor Loop's
//! chunked sleep checks at each boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use overcode_core::interfaces::Filesystem;

/// Consumes the activity-signal file: `true` if it existed (and was
/// removed). A TOCTOU-free "just try to unlink" check — existence and
/// consumption are the same atomic operation.
pub fn consume_activity_signal(path: &str) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(_) => false,
    }
}

#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        ShutdownFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Installs a SIGTERM/SIGINT handler that sets this flag. A dedicated
    /// OS-signal thread rather than `tokio::signal`, since the Monitor Loop
    /// itself has no async runtime.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.request())
    }
}

/// Sleep for `total`, but in chunks no longer than 10s so the activity
/// signal (and shutdown flag) can cancel the remainder early.
pub fn chunked_sleep(
    total: Duration,
    chunk: Duration,
    fs: &impl Filesystem,
    activity_signal_path: &str,
    shutdown: &ShutdownFlag,
) {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if shutdown.is_set() {
            return;
        }
        let this_chunk = remaining.min(chunk);
        std::thread::sleep(this_chunk);
        remaining = remaining.saturating_sub(this_chunk);

        if fs.mtime_seconds(activity_signal_path).ok().flatten().is_some() {
            consume_activity_signal(activity_signal_path);
            return;
        }
        if shutdown.is_set() {
            return;
        }
    }
}
