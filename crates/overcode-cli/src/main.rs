//! `overcode` — the fleet-supervisor binary. Parses [`cli::Cli`] and
//! dispatches to one `commands::*` module per subcommand; every module
//! does its own store load/act/persist critical section so this file is
//! pure routing.

mod cli;
mod commands;
mod support;

use clap::Parser;

use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let tmux_session = cli.tmux_session.as_str();

    match cli.command {
        Command::Launch(args) => commands::launch::run(tmux_session, args),
        Command::Follow(args) => commands::follow::run(tmux_session, args),
        Command::Report(args) => commands::report::run(args),
        Command::Send(args) => commands::control::send(tmux_session, args),
        Command::SendKey(args) => commands::control::send_key(tmux_session, args),
        Command::Kill(args) => commands::control::kill(tmux_session, args),
        Command::Restart(args) => commands::control::restart(tmux_session, args),
        Command::Instruct(args) => commands::control::instruct(tmux_session, args),
        Command::Heartbeat(args) => commands::control::heartbeat(tmux_session, args),
        Command::SetBudget(args) => commands::control::set_budget(tmux_session, args),
        Command::SetValue(args) => commands::control::set_value(tmux_session, args),
        Command::Annotate(args) => commands::control::annotate(tmux_session, args),
        Command::Sleep(args) => commands::control::sleep(tmux_session, args),
        Command::Wake(args) => commands::control::wake(tmux_session, args),
        Command::Transport => commands::control::transport(tmux_session),
        Command::Cleanup(args) => commands::control::cleanup(tmux_session, args),
        Command::Monitor(args) => commands::monitor::run(tmux_session, args),
        Command::Web(args) => commands::web::run(tmux_session, args),
        Command::HookHandler => commands::hooks::run_handler(),
        Command::SetupHooks(args) => commands::hooks::run_setup(args),
        Command::Config(args) => commands::config::run(args),
    }
}
