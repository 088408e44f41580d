//! Thin CLI wrappers over `overcode_daemon::control::ControlSurface` —
//! the same methods the Web API's POST handlers call. Every subcommand
//! here does the same reload-act-persist critical section `overcode-web`'s
//! `dispatch` does, so a concurrently running monitor daemon or web server
//! observes a consistent store.

use overcode_daemon::control::{ControlError, ControlSurface};

use crate::cli::{AnnotateArgs, CleanupArgs, HeartbeatArgs, InstructArgs, KillArgs, NameArg, SendArgs, SendKeyArgs, SetBudgetArgs, SetValueArgs};
use crate::support;

fn report(result: Result<serde_json::Value, ControlError>) -> anyhow::Result<()> {
    match result {
        Ok(value) => {
            support::print_result(value);
            Ok(())
        }
        Err(e) => anyhow::bail!("{e} ({})", e.status()),
    }
}

macro_rules! with_surface {
    ($tmux_session:expr, |$surface:ident| $body:expr) => {{
        let store = support::load_store();
        let controller = support::controller();
        let presets = support::instruction_presets();
        let result = {
            let $surface = ControlSurface { store: &store, controller: &controller, tmux_session: $tmux_session.to_string(), instruction_presets: &presets };
            $body
        };
        support::persist_store(&store)?;
        report(result)
    }};
}

pub fn send(tmux_session: &str, args: SendArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.send_to_agent(&args.name, &args.text, !args.no_enter))
}

pub fn send_key(tmux_session: &str, args: SendKeyArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.send_key_to_agent(&args.name, &args.key))
}

pub fn kill(tmux_session: &str, args: KillArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.kill(&args.name, args.cascade))
}

pub fn restart(tmux_session: &str, args: NameArg) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.restart(&args.name))
}

pub fn set_budget(tmux_session: &str, args: SetBudgetArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.set_budget(&args.name, args.usd))
}

pub fn set_value(tmux_session: &str, args: SetValueArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.set_value(&args.name, args.value))
}

pub fn annotate(tmux_session: &str, args: AnnotateArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.set_annotation(&args.name, &args.text))
}

pub fn sleep(tmux_session: &str, args: NameArg) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.set_sleep(&args.name, true))
}

pub fn wake(tmux_session: &str, args: NameArg) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.set_sleep(&args.name, false))
}

pub fn transport(tmux_session: &str) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.transport_all())
}

pub fn cleanup(tmux_session: &str, args: CleanupArgs) -> anyhow::Result<()> {
    with_surface!(tmux_session, |s| s.cleanup_agents(args.done))
}

pub fn instruct(tmux_session: &str, args: InstructArgs) -> anyhow::Result<()> {
    if args.clear {
        return with_surface!(tmux_session, |s| s.clear_standing_orders(&args.name));
    }
    if args.preset.is_some() {
        return with_surface!(tmux_session, |s| s.set_standing_orders(&args.name, None, args.preset.as_deref()));
    }
    let text = args.text.as_deref().ok_or_else(|| anyhow::anyhow!("provide TEXT, --preset, or --clear"))?;
    with_surface!(tmux_session, |s| s.set_standing_orders(&args.name, Some(text), None))
}

/// Precedence: show wins over everything (explicit `--show`, or no
/// mutating flag/value at all); then disable, pause, resume; then enable
/// (which requires `--instruction`); anything left is an update-only that
/// leaves the current enabled/disabled state alone.
pub fn heartbeat(tmux_session: &str, args: HeartbeatArgs) -> anyhow::Result<()> {
    let mutating = args.disable || args.pause || args.resume || args.enable || args.frequency.is_some() || args.instruction.is_some();
    if args.show || !mutating {
        let store = support::load_store();
        let session = support::require_session(&store, &args.name, tmux_session)?;
        support::print_result(serde_json::json!({
            "name": session.name,
            "heartbeat_enabled": session.heartbeat_enabled,
            "heartbeat_paused": session.heartbeat_paused,
            "heartbeat_frequency_seconds": session.heartbeat_frequency_seconds,
            "heartbeat_instruction": session.heartbeat_instruction,
        }));
        return Ok(());
    }

    if args.disable {
        return with_surface!(tmux_session, |s| s.configure_heartbeat(&args.name, false, None, Some("")));
    }
    if args.pause {
        return with_surface!(tmux_session, |s| s.pause_heartbeat(&args.name));
    }
    if args.resume {
        return with_surface!(tmux_session, |s| s.resume_heartbeat(&args.name));
    }
    if args.enable {
        let instruction = args.instruction.as_deref().ok_or_else(|| anyhow::anyhow!("--enable requires --instruction"))?;
        let frequency = args.frequency.as_deref().or(Some("5m"));
        return with_surface!(tmux_session, |s| s.configure_heartbeat(&args.name, true, frequency, Some(instruction)));
    }

    // Update-only: frequency and/or instruction given with no state-change
    // flag. Preserve whatever `heartbeat_enabled` already is.
    let store = support::load_store();
    let session = support::require_session(&store, &args.name, tmux_session)?;
    let enabled = session.heartbeat_enabled;
    with_surface!(tmux_session, |s| s.configure_heartbeat(&args.name, enabled, args.frequency.as_deref(), args.instruction.as_deref()))
}
