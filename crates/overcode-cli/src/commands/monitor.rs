//! `overcode monitor --tmux-session NAME` — runs the blocking Monitor Loop
//! for a single multiplexer session, one process per `--tmux-session`
//! enforced by [`overcode_daemon::lock::DaemonLock`]. Wires up the store,
//! clock, filesystem, and transcript reader, then loops synchronously until
//! a shutdown signal arrives.

use overcode_core::interfaces::SystemClock;
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::lock::DaemonLock;
use overcode_daemon::monitor_loop::MonitorLoop;
use overcode_daemon::signal::{chunked_sleep, ShutdownFlag};
use overcode_daemon::transcript::JsonlTranscriptReader;
use overcode_daemon::{paths, SessionStore};

use crate::cli::MonitorArgs;
use crate::support;

pub fn run(tmux_session: &str, args: MonitorArgs) -> anyhow::Result<()> {
    if args.restart {
        kill_existing(tmux_session);
    }

    let lock_path = paths::pid_path(tmux_session);
    let _lock = DaemonLock::acquire(lock_path.to_string_lossy().as_ref())
        .map_err(|e| anyhow::anyhow!("another monitor daemon is already running for '{tmux_session}': {e}"))?;

    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler()?;

    let config = support::load_config();
    let fs = RealFilesystem;
    let sessions_path = paths::sessions_path();
    let store = SessionStore::load_or_default(&fs, sessions_path.to_string_lossy().as_ref());
    let controller = support::controller();

    let mut monitor_loop = MonitorLoop::new(
        tmux_session.to_string(),
        store,
        SystemClock,
        fs,
        controller,
        JsonlTranscriptReader,
        config.pricing.to_token_prices(),
        config.monitor.interval_seconds,
        config.monitor.worker_pool_size,
        config.monitor.auto_archive_after_loops,
    );

    tracing::info!(tmux_session, "monitor daemon starting");

    let interval = std::time::Duration::from_secs(config.monitor.interval_seconds.max(1));
    let activity_signal_path = paths::activity_signal_path(tmux_session);
    let sleep_fs = RealFilesystem;

    while !shutdown.is_set() {
        match monitor_loop.tick() {
            Ok(summary) => tracing::info!(%summary, "tick complete"),
            Err(e) => tracing::warn!(error = %e, "tick failed"),
        }

        chunked_sleep(
            interval,
            std::time::Duration::from_secs(10),
            &sleep_fs,
            activity_signal_path.to_string_lossy().as_ref(),
            &shutdown,
        );
    }

    tracing::info!(tmux_session, "monitor daemon stopped");
    Ok(())
}

/// SIGTERM any already-running daemon for this session and give it a moment
/// to release its [`DaemonLock`] before we try to acquire our own.
fn kill_existing(tmux_session: &str) {
    let pid_path = paths::pid_path(tmux_session);
    if let Ok(contents) = std::fs::read_to_string(&pid_path) {
        if let Ok(pid) = contents.trim().parse::<u32>() {
            let _ = std::process::Command::new("kill").arg("-TERM").arg(pid.to_string()).status();
        }
    }
    std::thread::sleep(std::time::Duration::from_millis(500));
}
