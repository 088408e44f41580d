//! Monitor Loop — the central contract. One instance per multiplexer
//! session; owns the tick that turns raw pane state into persisted
//! `Session`/`MonitorState` facts.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use overcode_core::interfaces::{Clock, Filesystem, PaneController, PaneError, TranscriptReader};
use overcode_core::stats::{accumulate_time, TimeAccumulatorInput, TokenPrices};
use overcode_core::types::{
    ActivityStatus, GitDiffStat, LifecycleStatus, MonitorState, MonitorSummary, OversightPolicy, PermissivenessMode,
    ReportStatus, Session, SessionSnapshot,
};

use crate::detect::detect_for_session;
use crate::error::DaemonError;
use crate::history;
use crate::oversight;
use crate::paths;
use crate::store::SessionStore;
use crate::vcs;

/// How often `active_claude_session_id` is refreshed off the vendor
/// transcript tail.
const SESSION_ID_REFRESH_SECONDS: i64 = 10;
/// How often transcript token/interaction totals are merged into
/// `SessionStats`.
const STATS_MERGE_SECONDS: i64 = 60;

/// One-shot/promoted heartbeat marker, tracked per session id across ticks
/// so `effective_status` can surface `heartbeat_start` exactly once and
/// `running_heartbeat` on every subsequent tick the agent stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeartbeatMark {
    None,
    Pending,
    Running,
}

/// Bounded fan-out for the per-session work. `std::thread` rather than a
/// crate like rayon, matching the Monitor Loop's synchronous, `tokio`-free
/// design.
fn worker_pool_size(session_count: usize, configured_max: usize) -> usize {
    session_count.min(configured_max).max(1)
}

/// Exposed so `overcode-web` and `overcode-sisters` can render remote/ad-hoc
/// sessions with the same glyphs the Monitor Loop itself persists.
pub fn status_emoji(status: ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::Permission => "🔐",
        ActivityStatus::Error => "❌",
        ActivityStatus::Running => "🟢",
        ActivityStatus::WaitingHeartbeat => "💤",
        ActivityStatus::HeartbeatStart => "💓",
        ActivityStatus::RunningHeartbeat => "🟢",
        ActivityStatus::WaitingUser => "⏸️",
        ActivityStatus::WaitingOversight => "👀",
        ActivityStatus::Asleep => "😴",
        ActivityStatus::Terminated => "⬛",
    }
}

pub fn status_color(status: ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::Permission => "#f59e0b",
        ActivityStatus::Error => "#ef4444",
        ActivityStatus::Running => "#22c55e",
        ActivityStatus::WaitingHeartbeat => "#6366f1",
        ActivityStatus::HeartbeatStart => "#22c55e",
        ActivityStatus::RunningHeartbeat => "#22c55e",
        ActivityStatus::WaitingUser => "#eab308",
        ActivityStatus::WaitingOversight => "#a855f7",
        ActivityStatus::Asleep => "#64748b",
        ActivityStatus::Terminated => "#1e293b",
    }
}

pub fn permissiveness_emoji(mode: PermissivenessMode) -> &'static str {
    match mode {
        PermissivenessMode::Normal => "🛡️",
        PermissivenessMode::Permissive => "🟡",
        PermissivenessMode::Bypass => "🔓",
    }
}

/// The status layering rule, applied per session: `asleep` overrides
/// everything; a pending heartbeat send promotes to a one-shot
/// `heartbeat_start` the tick the agent is first observed running again,
/// then to `running_heartbeat` on every subsequent running tick; an
/// enabled, unpaused heartbeat on a non-running agent surfaces
/// `waiting_heartbeat`; otherwise the detector's status passes through.
fn effective_status(
    is_asleep: bool,
    heartbeat_enabled: bool,
    heartbeat_paused: bool,
    detected: ActivityStatus,
    heartbeat_sent_this_tick: bool,
    mark: &mut HeartbeatMark,
) -> ActivityStatus {
    if is_asleep {
        *mark = HeartbeatMark::None;
        return ActivityStatus::Asleep;
    }

    if heartbeat_sent_this_tick {
        *mark = HeartbeatMark::Pending;
    }

    match *mark {
        HeartbeatMark::Pending => {
            if detected.is_green() {
                *mark = HeartbeatMark::Running;
                return ActivityStatus::HeartbeatStart;
            }
        }
        HeartbeatMark::Running => {
            if detected.is_green() {
                return ActivityStatus::RunningHeartbeat;
            }
            *mark = HeartbeatMark::None;
        }
        HeartbeatMark::None => {}
    }

    if !detected.is_green() && heartbeat_enabled && !heartbeat_paused {
        return ActivityStatus::WaitingHeartbeat;
    }

    detected
}

/// A worker's verdict for one session this tick, reduced to what the main
/// thread needs to persist and log — the detect/VCS/accumulate work itself
/// runs off the main thread.
struct TickOutcome {
    session_id: String,
    name: String,
    effective: ActivityStatus,
    activity: String,
    git_diff_stat: Option<GitDiffStat>,
}

pub struct MonitorLoop<C, FS, PC, TR> {
    pub tmux_session: String,
    pub store: SessionStore,
    pub clock: C,
    pub fs: FS,
    pub controller: PC,
    pub transcript: TR,
    pub prices: TokenPrices,
    pub interval_seconds: u64,
    pub worker_pool_max: usize,
    pub auto_archive_after_loops: u64,

    loop_count: u64,
    last_session_id_refresh: Mutex<Option<DateTime<Utc>>>,
    last_stats_merge: Mutex<Option<DateTime<Utc>>>,
    heartbeat_marks: Mutex<HashMap<String, HeartbeatMark>>,
}

impl<C, FS, PC, TR> MonitorLoop<C, FS, PC, TR>
where
    C: Clock,
    FS: Filesystem + Send + Sync + 'static,
    PC: PaneController + Send + Sync + 'static,
    TR: TranscriptReader,
{
    pub fn new(
        tmux_session: String,
        store: SessionStore,
        clock: C,
        fs: FS,
        controller: PC,
        transcript: TR,
        prices: TokenPrices,
        interval_seconds: u64,
        worker_pool_max: usize,
        auto_archive_after_loops: u64,
    ) -> Self {
        MonitorLoop {
            tmux_session,
            store,
            clock,
            fs,
            controller,
            transcript,
            prices,
            interval_seconds,
            worker_pool_max,
            auto_archive_after_loops,
            loop_count: 0,
            last_session_id_refresh: Mutex::new(None),
            last_stats_merge: Mutex::new(None),
            heartbeat_marks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs exactly one tick, through its numbered steps below. Returns
    /// the summary line emitted at step 10.
    pub fn tick(&mut self) -> Result<String, DaemonError> {
        let now = self.clock.now_utc();

        // Step 1: consume the activity-signal file. The Monitor Loop owns
        // draining it even though it's the sleep-cancellation mechanism —
        // a stray touch between ticks must not leak into the next sleep.
        let signal_path = paths::activity_signal_path(&self.tmux_session);
        crate::signal::consume_activity_signal(signal_path.to_string_lossy().as_ref());

        // The Session Store file may have been written since our last tick
        // by a `launch`/`kill`/control-surface invocation running in a
        // separate process. Reload before reading so step 2's list
        // reflects those writes.
        let sessions_path = paths::sessions_path();
        self.store.reload(&self.fs, sessions_path.to_string_lossy().as_ref());

        // Step 2.
        let sessions = self.store.list_for_tmux_session(&self.tmux_session);

        // Step 3: once every 10s.
        let refresh_session_ids = {
            let mut guard = self.last_session_id_refresh.lock().expect("lock poisoned");
            let due = guard.map(|t| (now - t).num_seconds() >= SESSION_ID_REFRESH_SECONDS).unwrap_or(true);
            if due {
                *guard = Some(now);
            }
            due
        };
        if refresh_session_ids {
            for session in &sessions {
                if let Ok(Some(id)) = self.transcript.current_session_id(session) {
                    let _ = self.store.with_session_mut(&session.id, |s| {
                        s.active_claude_session_id = Some(id.clone());
                        s.claude_session_ids.insert(id);
                    });
                }
            }
        }

        // Step 4: once every 60s.
        let merge_stats = {
            let mut guard = self.last_stats_merge.lock().expect("lock poisoned");
            let due = guard.map(|t| (now - t).num_seconds() >= STATS_MERGE_SECONDS).unwrap_or(true);
            if due {
                *guard = Some(now);
            }
            due
        };
        if merge_stats {
            for session in &sessions {
                if let Ok(stats) = self.transcript.stats(session) {
                    let prices = self.prices;
                    let _ = self.store.with_session_mut(&session.id, |s| {
                        s.stats.input_tokens = stats.tokens.input_tokens;
                        s.stats.output_tokens = stats.tokens.output_tokens;
                        s.stats.cache_creation_tokens = stats.tokens.cache_creation_tokens;
                        s.stats.cache_read_tokens = stats.tokens.cache_read_tokens;
                        s.stats.total_tokens = stats.tokens.input_tokens
                            + stats.tokens.output_tokens
                            + stats.tokens.cache_creation_tokens
                            + stats.tokens.cache_read_tokens;
                        s.stats.interaction_count = stats.interaction_count;
                        s.stats.steers_count = stats.steers_count;
                        s.stats.estimated_cost_usd = overcode_core::stats::compute_cost_usd(stats.tokens, prices);
                    });
                }
            }
        }

        // Step 5: Heartbeat Engine. Runs before detection so a send this
        // tick can be observed running on the very same tick's capture.
        let mut heartbeat_sent: HashMap<String, bool> = HashMap::new();
        for session in &sessions {
            let previous_status = session.stats.current_state;
            let sent = crate::heartbeat::maybe_send_heartbeat(&self.controller, session, previous_status, now).unwrap_or(false);
            if sent {
                let _ = self.store.with_session_mut(&session.id, |s| {
                    s.last_heartbeat_time = Some(now);
                });
            }
            heartbeat_sent.insert(session.id.clone(), sent);
        }
        // Re-read: heartbeat sends may have touched `last_heartbeat_time`.
        let sessions = self.store.list_for_tmux_session(&self.tmux_session);

        // Step 6: fan out detect + VCS refresh + accumulate across a
        // bounded worker pool.
        let pool_size = worker_pool_size(sessions.len(), self.worker_pool_max);
        let this: &Self = self;
        let outcomes: Vec<TickOutcome> = std::thread::scope(|scope| {
            let chunks: Vec<Vec<Session>> = chunk_round_robin(sessions.clone(), pool_size);
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|chunk| {
                    let heartbeat_sent = &heartbeat_sent;
                    scope.spawn(move || {
                        chunk
                            .into_iter()
                            .map(|session| this.process_one(&session, now, *heartbeat_sent.get(&session.id).unwrap_or(&false)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap_or_default()).collect()
        });

        let history_path = paths::agent_history_path(&self.tmux_session);
        let mut diff_stats: HashMap<String, GitDiffStat> = HashMap::new();
        for outcome in &outcomes {
            let _ = history::append_row(
                &self.fs,
                history_path.to_string_lossy().as_ref(),
                now,
                &outcome.name,
                outcome.effective,
                &outcome.activity,
            );
            if let Some(stat) = outcome.git_diff_stat {
                diff_stats.insert(outcome.session_id.clone(), stat);
            }
        }

        // Step 7: build and persist MonitorState.
        let sessions = self.store.list_for_tmux_session(&self.tmux_session);
        let state = self.build_monitor_state(&sessions, &diff_stats, now);
        let state_json = serde_json::to_vec_pretty(&state).map_err(DaemonError::Serde)?;
        self.fs
            .write_atomic(paths::monitor_state_path(&self.tmux_session).to_string_lossy().as_ref(), &state_json)
            .map_err(DaemonError::Store)?;

        // Step 8: Oversight Engine.
        for session in &sessions {
            if let Some(resolution) = oversight::resolve(session, session.stats.current_state, now) {
                let _ = self.store.with_session_mut(&session.id, |s| {
                    s.status = LifecycleStatus::Done;
                    s.report_status = Some(resolution.report_status);
                    s.report_reason = Some(resolution.report_reason.clone());
                });
            } else if session.stats.current_state == ActivityStatus::WaitingOversight && session.status == LifecycleStatus::Running {
                if let Some(deadline) = oversight::arm_deadline_if_unset(session, now) {
                    let _ = self.store.with_session_mut(&session.id, |s| {
                        s.oversight_deadline = Some(deadline);
                    });
                }
            }
        }

        // Step 9: auto-archive roughly once a minute.
        self.loop_count += 1;
        if self.loop_count % self.auto_archive_after_loops.max(1) == 0 {
            let sessions = self.store.list_for_tmux_session(&self.tmux_session);
            for session in &sessions {
                if crate::budget::is_archivable(session, now) {
                    let _ = self.controller.kill_window(&session.tmux_session, session.tmux_window);
                    let _ = self.store.with_session_mut(&session.id, |s| {
                        s.status = LifecycleStatus::Terminated;
                    });
                }
            }
        }

        // Persist the Session Store once per tick, after steps 5-9's
        // mutations have all landed in memory, so a sibling process's next
        // reload sees this tick's oversight/archive/stats outcome whole
        // rather than in some partially-applied state.
        if let Err(e) = self.store.persist(&self.fs, sessions_path.to_string_lossy().as_ref()) {
            tracing::warn!(%e, "failed to persist session store");
        }

        // Step 10: one-line summary.
        let summary = state.summary;
        let line = format!(
            "loop {}: {} running, {} waiting, {} asleep, {} error/permission, {} terminated, {} done (interval {}s)",
            self.loop_count,
            summary.running,
            summary.waiting,
            summary.asleep,
            summary.budget_exceeded_count,
            summary.terminated,
            summary.done,
            self.interval_seconds,
        );
        tracing::info!(target: "overcode_daemon::monitor_loop", "{line}");

        Ok(line)
    }

    fn process_one(&self, session: &Session, now: DateTime<Utc>, heartbeat_sent: bool) -> TickOutcome {
        let (detected, activity, newly_terminated) = match session.status {
            LifecycleStatus::Terminated => (ActivityStatus::Terminated, session.stats.current_task.clone(), false),
            LifecycleStatus::Done => (session.stats.current_state, session.stats.current_task.clone(), false),
            LifecycleStatus::Running => {
                let hook_path = paths::hook_state_path(&self.tmux_session, &session.name);
                match detect_for_session(&self.fs, &self.controller, session, hook_path.to_string_lossy().as_ref(), now) {
                    Ok(poll) => (poll.status, poll.activity, false),
                    Err(PaneError::Gone(_)) => (ActivityStatus::Terminated, session.stats.current_task.clone(), true),
                    Err(PaneError::Transient(_)) => (session.stats.current_state, session.stats.current_task.clone(), false),
                }
            }
        };

        let (repo_name, branch) = if session.status == LifecycleStatus::Running {
            vcs::refresh_repo_context(&session.start_directory)
        } else {
            (session.repo_name.clone(), session.branch.clone())
        };
        let diff_stat = if session.status == LifecycleStatus::Running {
            vcs::diff_stat(&session.start_directory)
        } else {
            None
        };

        let effective = {
            let mut marks = self.heartbeat_marks.lock().expect("lock poisoned");
            let mark = marks.entry(session.id.clone()).or_insert(HeartbeatMark::None);
            effective_status(session.is_asleep, session.heartbeat_enabled, session.heartbeat_paused, detected, heartbeat_sent, mark)
        };

        let _ = self.store.with_session_mut(&session.id, |s| {
            s.repo_name = repo_name;
            s.branch = branch;
            if newly_terminated || (effective == ActivityStatus::Terminated && s.status != LifecycleStatus::Terminated) {
                s.status = LifecycleStatus::Terminated;
            }

            let input = TimeAccumulatorInput {
                previous_status: s.stats.current_state,
                state_since: s.stats.state_since,
                green_time_seconds: s.stats.green_time_seconds,
                non_green_time_seconds: s.stats.non_green_time_seconds,
                sleep_time_seconds: s.stats.sleep_time_seconds,
                last_tick: s.stats.last_time_accumulation,
                start_time: s.start_time,
            };
            let out = accumulate_time(input, effective, now);
            if out.capped_and_reset {
                tracing::warn!(session = %s.name, "time accumulator drift cap fired, totals reset");
            }
            s.stats.green_time_seconds = out.green_time_seconds;
            s.stats.non_green_time_seconds = out.non_green_time_seconds;
            s.stats.sleep_time_seconds = out.sleep_time_seconds;
            s.stats.state_since = out.state_since;
            s.stats.last_time_accumulation = Some(out.last_tick);
            s.stats.current_state = effective;
            s.stats.set_current_task(&activity);
        });

        TickOutcome { session_id: session.id.clone(), name: session.name.clone(), effective, activity, git_diff_stat: diff_stat }
    }

    fn build_monitor_state(
        &self,
        sessions: &[Session],
        diff_stats: &HashMap<String, GitDiffStat>,
        now: DateTime<Utc>,
    ) -> MonitorState {
        let mut summary = MonitorSummary::default();
        let snapshots: Vec<SessionSnapshot> = sessions
            .iter()
            .map(|s| {
                summary.total_sessions += 1;
                match s.status {
                    LifecycleStatus::Terminated => summary.terminated += 1,
                    LifecycleStatus::Done => summary.done += 1,
                    LifecycleStatus::Running => {
                        if s.is_asleep {
                            summary.asleep += 1;
                        } else if s.stats.current_state.is_green() {
                            summary.running += 1;
                        } else {
                            summary.waiting += 1;
                        }
                    }
                }
                if s.budget_exceeded() {
                    summary.budget_exceeded_count += 1;
                }
                if s.is_remote {
                    summary.remote_sessions += 1;
                }

                SessionSnapshot {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    lifecycle_status: s.status,
                    status: s.stats.current_state,
                    status_emoji: status_emoji(s.stats.current_state),
                    status_color: status_color(s.stats.current_state),
                    activity: s.stats.current_task.clone(),
                    repo_name: s.repo_name.clone(),
                    branch: s.branch.clone(),
                    parent_session_id: s.parent_session_id.clone(),
                    green_time_seconds: s.stats.green_time_seconds,
                    non_green_time_seconds: s.stats.non_green_time_seconds,
                    sleep_time_seconds: s.stats.sleep_time_seconds,
                    total_tokens: s.stats.total_tokens,
                    estimated_cost_usd: s.stats.estimated_cost_usd,
                    budget_exceeded: s.budget_exceeded(),
                    interaction_count: s.stats.interaction_count,
                    steers_count: s.stats.steers_count,
                    standing_orders_complete: s.standing_orders_complete,
                    has_standing_instructions: !s.standing_instructions.is_empty(),
                    permissiveness_mode: s.permissiveness_mode,
                    permissiveness_emoji: permissiveness_emoji(s.permissiveness_mode),
                    oversight_policy: s.oversight_policy,
                    report_status: s.report_status,
                    is_asleep: s.is_asleep,
                    heartbeat_enabled: s.heartbeat_enabled,
                    heartbeat_paused: s.heartbeat_paused,
                    git_diff_stat: diff_stats.get(&s.id).copied(),
                    ai_summary: None,
                    is_remote: s.is_remote,
                    source_host: s.source_host.clone(),
                }
            })
            .collect();

        MonitorState {
            daemon_pid: std::process::id(),
            loop_count: self.loop_count,
            interval_seconds: self.interval_seconds,
            last_loop_time: now,
            version: overcode_core::types::MONITOR_STATE_VERSION,
            sessions: snapshots,
            presence: None,
            summary,
        }
    }
}

/// Splits `sessions` into `pool_size` interleaved chunks so no single
/// worker is stuck with a run of consecutive slow sessions.
fn chunk_round_robin(sessions: Vec<Session>, pool_size: usize) -> Vec<Vec<Session>> {
    let mut chunks: Vec<Vec<Session>> = (0..pool_size.max(1)).map(|_| Vec::new()).collect();
    for (i, session) in sessions.into_iter().enumerate() {
        chunks[i % chunks.len()].push(session);
    }
    chunks
}
