//! `overcode report --status success|failure [--reason ...]` — called by a
//! child agent itself, reading `OVERCODE_SESSION_NAME`/`OVERCODE_TMUX_SESSION`
//! from its own environment.

use chrono::Utc;
use overcode_core::types::{LifecycleStatus, Report, ReportStatus};
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::paths;

use crate::cli::ReportArgs;
use crate::support;

pub fn run(args: ReportArgs) -> anyhow::Result<()> {
    let status = match args.status.as_str() {
        "success" => ReportStatus::Success,
        "failure" => ReportStatus::Failure,
        other => anyhow::bail!("--status must be 'success' or 'failure', got {other:?}"),
    };

    let agent_name = std::env::var("OVERCODE_SESSION_NAME")
        .map_err(|_| anyhow::anyhow!("OVERCODE_SESSION_NAME and OVERCODE_TMUX_SESSION env vars required; run this from within a child agent"))?;
    let tmux_session = std::env::var("OVERCODE_TMUX_SESSION")
        .map_err(|_| anyhow::anyhow!("OVERCODE_SESSION_NAME and OVERCODE_TMUX_SESSION env vars required; run this from within a child agent"))?;

    let reason = args.reason.clone().unwrap_or_default();
    let report = Report { status, reason: reason.clone(), timestamp: Utc::now() };

    let report_path = paths::report_path(&tmux_session, &agent_name);
    let fs = RealFilesystem;
    overcode_core::interfaces::Filesystem::write_atomic(&fs, report_path.to_string_lossy().as_ref(), serde_json::to_string_pretty(&report)?.as_bytes())?;

    let store = support::load_store();
    if let Some(session) = store.find_by_name(&agent_name, &tmux_session) {
        let _ = store.with_session_mut(&session.id, |s| {
            s.report_status = Some(status);
            s.report_reason = Some(reason.clone());
            if s.parent_session_id.is_some() {
                s.status = LifecycleStatus::Done;
            }
        });
        support::persist_store(&store)?;
    }

    println!("report filed: {}{}", args.status, if reason.is_empty() { String::new() } else { format!(" ({reason})") });
    Ok(())
}
