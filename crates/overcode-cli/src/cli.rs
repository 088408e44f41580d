//! CLI surface: `launch`/`follow`/`kill`/`report`/`cleanup`/`annotate`/
//! `send`/`instruct`/`heartbeat`/`monitor`/`web` and friends.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "overcode", about = "Supervise a fleet of Claude Code agents in tmux", arg_required_else_help = true)]
pub struct Cli {
    /// tmux session all subcommands operate against.
    #[arg(long, global = true, default_value = "agents")]
    pub tmux_session: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Launch a new agent window.
    Launch(LaunchArgs),
    /// Stream an agent's pane until it stops, without killing it.
    Follow(FollowArgs),
    /// File a completion report from inside a child agent.
    Report(ReportArgs),
    /// Send literal text (and optionally Enter) to an agent.
    Send(SendArgs),
    /// Send one named key (Enter, Escape, Up, Down, 1..5, ...) to an agent.
    SendKey(SendKeyArgs),
    /// Tear down an agent's window.
    Kill(KillArgs),
    /// Ctrl-C then relaunch an agent, preserving its permission mode.
    Restart(NameArg),
    /// Set or clear an agent's standing instructions.
    Instruct(InstructArgs),
    /// Configure, pause, or resume an agent's heartbeat.
    Heartbeat(HeartbeatArgs),
    /// Set an agent's cost budget in USD (0 = unlimited).
    #[command(name = "set-budget")]
    SetBudget(SetBudgetArgs),
    /// Set an agent's priority value.
    #[command(name = "set-value")]
    SetValue(SetValueArgs),
    /// Set a free-text human annotation on an agent.
    Annotate(AnnotateArgs),
    /// Put an agent to sleep (pauses heartbeat/monitoring expectations).
    Sleep(NameArg),
    /// Wake a sleeping agent.
    Wake(NameArg),
    /// Send the standard handover instruction to every active agent.
    Transport,
    /// Archive terminated (and optionally done) agents out of the live set.
    Cleanup(CleanupArgs),
    /// Run the Monitor Daemon loop (blocking).
    Monitor(MonitorArgs),
    /// Serve the read-only/control Web API (blocking).
    Web(WebArgs),
    /// Internal: translate one Claude Code hook event from stdin into
    /// `hook_state_<agent>.json`. Wired up by `setup-hooks`.
    #[command(name = "hook-handler", hide = true)]
    HookHandler,
    /// Write the Claude Code hook configuration that invokes `hook-handler`.
    SetupHooks(SetupHooksArgs),
    /// Print the current config, or write out defaults if missing.
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct LaunchArgs {
    /// Name for the agent; must match ^[A-Za-z0-9_-]{1,64}$.
    #[arg(long, short = 'n')]
    pub name: String,
    /// Working directory (defaults to the current directory).
    #[arg(long, short = 'd')]
    pub directory: Option<String>,
    /// Initial prompt to send once the agent's input prompt is ready.
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,
    /// Auto-deny permission prompts (--permission-mode dontAsk).
    #[arg(long)]
    pub skip_permissions: bool,
    /// Bypass all permission checks (--dangerously-skip-permissions).
    #[arg(long)]
    pub bypass_permissions: bool,
    /// Parent agent name for hierarchy; falls back to OVERCODE_SESSION_NAME.
    #[arg(long)]
    pub parent: Option<String>,
    /// Stream the child's output and block until it stops.
    #[arg(long, short = 'f')]
    pub follow: bool,
    /// Oversight policy when the child stops: wait (default), fail, or a
    /// frequency-style duration treated as a timeout (e.g. 5m, 1h).
    #[arg(long)]
    pub on_stuck: Option<String>,
    /// Comma-separated tools passed through as --allowedTools.
    #[arg(long)]
    pub allowed_tools: Option<String>,
    /// Extra Claude CLI flag, repeatable (e.g. --claude-arg --model --claude-arg haiku).
    #[arg(long)]
    pub claude_arg: Vec<String>,
}

#[derive(clap::Args)]
pub struct FollowArgs {
    pub name: String,
}

#[derive(clap::Args)]
pub struct ReportArgs {
    /// success or failure.
    #[arg(long, short = 's')]
    pub status: String,
    #[arg(long, short = 'r')]
    pub reason: Option<String>,
}

#[derive(clap::Args)]
pub struct SendArgs {
    pub name: String,
    pub text: String,
    /// Suppress the trailing Enter.
    #[arg(long)]
    pub no_enter: bool,
}

#[derive(clap::Args)]
pub struct SendKeyArgs {
    pub name: String,
    /// enter, escape, tab, up, down, left, right, 1..5, ctrl-c.
    pub key: String,
}

#[derive(clap::Args)]
pub struct KillArgs {
    pub name: String,
    /// Kill descendants too (deepest-first) instead of orphaning them.
    #[arg(long)]
    pub cascade: bool,
}

#[derive(clap::Args)]
pub struct NameArg {
    pub name: String,
}

#[derive(clap::Args)]
pub struct InstructArgs {
    pub name: String,
    /// Free text, or a name from config.instruction_presets with --preset.
    pub text: Option<String>,
    #[arg(long)]
    pub preset: Option<String>,
    #[arg(long, short = 'c')]
    pub clear: bool,
}

#[derive(clap::Args)]
pub struct HeartbeatArgs {
    pub name: String,
    #[arg(long, short = 'e')]
    pub enable: bool,
    #[arg(long, short = 'd')]
    pub disable: bool,
    #[arg(long)]
    pub pause: bool,
    #[arg(long)]
    pub resume: bool,
    /// Ns|Nm|Nh|N, minimum 30s.
    #[arg(long, short = 'f')]
    pub frequency: Option<String>,
    #[arg(long, short = 'i')]
    pub instruction: Option<String>,
    /// Print the current heartbeat config instead of changing it.
    #[arg(long, short = 's')]
    pub show: bool,
}

#[derive(clap::Args)]
pub struct SetBudgetArgs {
    pub name: String,
    pub usd: f64,
}

#[derive(clap::Args)]
pub struct SetValueArgs {
    pub name: String,
    pub value: i64,
}

#[derive(clap::Args)]
pub struct AnnotateArgs {
    pub name: String,
    pub text: String,
}

#[derive(clap::Args)]
pub struct CleanupArgs {
    /// Also archive `done` agents, not only `terminated` ones.
    #[arg(long)]
    pub done: bool,
}

#[derive(clap::Args)]
pub struct MonitorArgs {
    /// Restart an already-running monitor daemon before taking over.
    #[arg(long)]
    pub restart: bool,
}

#[derive(clap::Args)]
pub struct WebArgs {
    #[arg(long, short = 'h')]
    pub host: Option<String>,
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
}

#[derive(clap::Args)]
pub struct SetupHooksArgs {
    /// "project" writes .claude/settings.json, "user" writes ~/.claude/settings.json.
    #[arg(long, default_value = "project")]
    pub scope: String,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Write out default config.yaml if one doesn't exist yet.
    #[arg(long)]
    pub init: bool,
}
