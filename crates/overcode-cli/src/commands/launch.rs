use chrono::Utc;
use overcode_core::types::{OversightPolicy, PermissivenessMode};
use overcode_daemon::launcher::{self, LaunchRequest};

use crate::cli::LaunchArgs;
use crate::commands::follow::run_follow;
use crate::support;

/// `--bypass-permissions` wins over `--skip-permissions`.
fn permissiveness_mode(args: &LaunchArgs) -> PermissivenessMode {
    if args.bypass_permissions {
        PermissivenessMode::Bypass
    } else if args.skip_permissions {
        PermissivenessMode::Permissive
    } else {
        PermissivenessMode::Normal
    }
}

/// `--on-stuck wait|fail|<duration>`: a bare duration is shorthand for the
/// `timeout` policy at that duration, mirroring `--oversight-timeout`.
fn oversight_policy(on_stuck: &str) -> anyhow::Result<(OversightPolicy, u64)> {
    match on_stuck {
        "wait" => Ok((OversightPolicy::Wait, 600)),
        "fail" => Ok((OversightPolicy::Fail, 600)),
        duration => {
            let seconds = overcode_core::stats::parse_frequency_seconds(duration)?;
            Ok((OversightPolicy::Timeout, seconds))
        }
    }
}

pub fn run(tmux_session: &str, args: LaunchArgs) -> anyhow::Result<()> {
    launcher::preflight_check("tmux", "claude")?;

    let store = support::load_store();
    let controller = support::controller();

    let directory = args.directory.clone().unwrap_or_else(|| {
        std::env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_else(|_| ".".to_string())
    });
    let allowed_tools: Vec<String> = args.allowed_tools.as_deref().map(|s| s.split(',').map(|t| t.trim().to_string()).collect()).unwrap_or_default();

    let request = LaunchRequest {
        name: args.name.clone(),
        tmux_session: tmux_session.to_string(),
        start_directory: directory,
        initial_prompt: args.prompt.clone(),
        permissiveness_mode: permissiveness_mode(&args),
        parent_name: args.parent.clone(),
        allowed_tools,
        extra_claude_args: args.claude_arg.clone(),
        standing_instructions: String::new(),
    };

    let session = launcher::launch(&store, &controller, request, Utc::now())?;

    if let Some(on_stuck) = &args.on_stuck {
        let (policy, timeout_seconds) = oversight_policy(on_stuck)?;
        let _ = store.with_session_mut(&session.id, |s| {
            s.oversight_policy = policy;
            s.oversight_timeout_seconds = timeout_seconds;
        });
    }

    support::persist_store(&store)?;
    println!("launched '{}' in {}:{}", session.name, session.tmux_session, session.tmux_window);

    if args.follow {
        let exit = run_follow(tmux_session, &session.name)?;
        std::process::exit(exit.exit_code());
    }

    Ok(())
}
