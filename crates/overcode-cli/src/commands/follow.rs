//! `overcode follow NAME` and the tail end of `overcode launch --follow`.
//! Wraps `overcode_daemon::follow::run` with the store bookkeeping a caller
//! is expected to do: on a clean Stop, a child with a filed report is
//! marked `done` before the command exits.

use overcode_core::types::LifecycleStatus;
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::signal::ShutdownFlag;
use overcode_daemon::{follow, paths};

use crate::cli::FollowArgs;
use crate::support;

pub fn run(tmux_session: &str, args: FollowArgs) -> anyhow::Result<()> {
    let exit = run_follow(tmux_session, &args.name)?;
    std::process::exit(exit.exit_code());
}

/// Shared by the standalone `follow` command and `launch --follow`.
pub fn run_follow(tmux_session: &str, name: &str) -> anyhow::Result<follow::FollowExit> {
    let store = support::load_store();
    let session = support::require_session(&store, name, tmux_session)?;
    let controller = support::controller();
    let fs = RealFilesystem;

    let hook_path = paths::hook_state_path(tmux_session, name);
    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler()?;

    let lifecycle = || {
        let store = support::load_store();
        store.find_by_name(name, tmux_session).map(|s| s.status).unwrap_or(LifecycleStatus::Terminated)
    };

    let exit = follow::run(
        &controller,
        &fs,
        &session.tmux_session,
        session.tmux_window,
        hook_path.to_string_lossy().as_ref(),
        lifecycle,
        &shutdown,
        |line| println!("{line}"),
    );

    if exit == follow::FollowExit::Stopped {
        mark_done_if_reported(tmux_session, name);
    }

    Ok(exit)
}

/// A Stop with a parent and an on-disk report marks the child `done`
/// before `follow` hands control back to its caller, so the parent
/// sees a resolved child the moment `follow`/`launch --follow` returns
/// rather than waiting for the next monitor tick.
fn mark_done_if_reported(tmux_session: &str, name: &str) {
    let store = support::load_store();
    let Some(session) = store.find_by_name(name, tmux_session) else { return };
    if session.parent_session_id.is_none() || session.status == LifecycleStatus::Done {
        return;
    }

    let report_path = paths::report_path(tmux_session, name);
    let Ok(contents) = std::fs::read_to_string(&report_path) else { return };
    let Ok(report) = serde_json::from_str::<overcode_core::types::Report>(&contents) else { return };

    let _ = store.with_session_mut(&session.id, |s| {
        s.status = LifecycleStatus::Done;
        s.report_status = Some(report.status);
        s.report_reason = Some(report.reason.clone());
    });
    let _ = support::persist_store(&store);
}
