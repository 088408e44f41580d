//! Sister Aggregator — pulls `/api/status` from peer Overcode instances
//! ("sisters") and materializes their agents as read-mostly virtual
//! sessions, so a single web view or CLI can show a fleet spread across
//! multiple hosts. A `reqwest` client with hard per-call timeouts ensures
//! a flaky remote never blocks the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use overcode_core::config::SisterConfig;
use overcode_core::types::{
    ActivityStatus, LifecycleStatus, MonitorState, OversightPolicy, PermissivenessMode, Session,
    SessionSnapshot, SessionStats,
};

/// Timeouts: 5s for the whole sister pull, 3s per individual agent
/// (here: per sister, since one HTTP call returns the whole agent list).
const SISTER_OVERALL_TIMEOUT: Duration = Duration::from_secs(5);
const SISTER_PER_AGENT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum SisterError {
    #[error("request to sister {0:?} failed: {1}")]
    Request(String, String),
    #[error("sister {0:?} returned status {1}")]
    BadStatus(String, u16),
    #[error("sister {0:?} returned unparseable body: {1}")]
    Decode(String, String),
}

/// Outcome of pulling a single sister, kept separate from the sessions it
/// produced so a caller can surface `reachable`/`last_error` even when
/// `sessions` ends up empty.
#[derive(Debug, Clone)]
pub struct SisterPullResult {
    pub name: String,
    pub reachable: bool,
    pub last_error: Option<String>,
    pub sessions: Vec<Session>,
}

/// Polls every configured sister and returns one result each, in
/// configuration order. Uses a private single-threaded Tokio runtime since
/// the rest of the daemon is deliberately synchronous and sisters are the
/// one place an async HTTP client earns its keep.
pub fn pull_all(client: &reqwest::Client, sisters: &[SisterConfig]) -> Vec<SisterPullResult> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to build sister-pull runtime: {e}");
            return sisters
                .iter()
                .map(|s| SisterPullResult { name: s.name.clone(), reachable: false, last_error: Some(e.to_string()), sessions: Vec::new() })
                .collect();
        }
    };

    runtime.block_on(async {
        let futures = sisters.iter().map(|sister| pull_one(client, sister));
        futures_util::future::join_all(futures).await
    })
}

async fn pull_one(client: &reqwest::Client, sister: &SisterConfig) -> SisterPullResult {
    match tokio::time::timeout(SISTER_PER_AGENT_TIMEOUT, fetch_status(client, sister)).await {
        Ok(Ok(state)) => {
            let sessions = materialize_sessions(sister, &state);
            SisterPullResult { name: sister.name.clone(), reachable: true, last_error: None, sessions }
        }
        Ok(Err(e)) => {
            tracing::warn!("sister {:?} pull failed: {e}", sister.name);
            SisterPullResult { name: sister.name.clone(), reachable: false, last_error: Some(e.to_string()), sessions: Vec::new() }
        }
        Err(_) => {
            let message = format!("timed out after {}s", SISTER_PER_AGENT_TIMEOUT.as_secs());
            tracing::warn!("sister {:?} {}", sister.name, message);
            SisterPullResult { name: sister.name.clone(), reachable: false, last_error: Some(message), sessions: Vec::new() }
        }
    }
}

async fn fetch_status(client: &reqwest::Client, sister: &SisterConfig) -> Result<MonitorState, SisterError> {
    let url = format!("{}/api/status", sister.url.trim_end_matches('/'));
    let mut request = client.get(&url).timeout(SISTER_OVERALL_TIMEOUT);
    if let Some(api_key) = &sister.api_key {
        request = request.header("X-API-Key", api_key);
    }

    let response = request.send().await.map_err(|e| SisterError::Request(sister.name.clone(), e.to_string()))?;
    if !response.status().is_success() {
        return Err(SisterError::BadStatus(sister.name.clone(), response.status().as_u16()));
    }

    response
        .json::<MonitorState>()
        .await
        .map_err(|e| SisterError::Decode(sister.name.clone(), e.to_string()))
}

/// Builds one virtual [`Session`] per remote agent, `id = "remote:<host>:<name>"`,
/// with parent hierarchy resolved within the remote set by mapping
/// `parent_session_id` (the remote's own local ID) back onto the
/// corresponding virtual ID.
fn materialize_sessions(sister: &SisterConfig, state: &MonitorState) -> Vec<Session> {
    let host = host_from_url(&sister.url);
    let virtual_id = |remote_id: &str| format!("remote:{host}:{remote_id}");

    state.sessions.iter().map(|snapshot| to_virtual_session(sister, &host, snapshot, &virtual_id)).collect()
}

fn host_from_url(url: &str) -> String {
    url.trim_start_matches("https://").trim_start_matches("http://").trim_end_matches('/').to_string()
}

fn to_virtual_session(
    sister: &SisterConfig,
    host: &str,
    snapshot: &SessionSnapshot,
    virtual_id: &impl Fn(&str) -> String,
) -> Session {
    let now = Utc::now();
    let stats = stats_from_snapshot(snapshot, now);

    Session {
        id: virtual_id(&snapshot.id),
        name: snapshot.name.clone(),
        tmux_session: String::new(),
        tmux_window: 0,
        command: Vec::new(),
        start_directory: String::new(),
        start_time: now,
        repo_name: snapshot.repo_name.clone(),
        branch: snapshot.branch.clone(),
        status: snapshot.lifecycle_status,
        parent_session_id: snapshot.parent_session_id.as_deref().map(virtual_id),
        is_asleep: snapshot.is_asleep,
        standing_instructions: String::new(),
        standing_instructions_preset: None,
        standing_orders_complete: snapshot.standing_orders_complete,
        permissiveness_mode: snapshot.permissiveness_mode,
        cost_budget_usd: 0.0,
        agent_value: 0,
        human_annotation: String::new(),
        heartbeat_enabled: snapshot.heartbeat_enabled,
        heartbeat_paused: snapshot.heartbeat_paused,
        heartbeat_frequency_seconds: overcode_core::stats::MIN_HEARTBEAT_FREQUENCY_SECONDS,
        heartbeat_instruction: String::new(),
        last_heartbeat_time: None,
        time_context_enabled: true,
        hook_status_detection: false,
        oversight_policy: snapshot.oversight_policy,
        oversight_timeout_seconds: 0,
        oversight_deadline: None,
        report_status: snapshot.report_status,
        report_reason: None,
        claude_session_ids: Default::default(),
        active_claude_session_id: None,
        stats,
        allowed_tools: Vec::new(),
        extra_claude_args: Vec::new(),
        is_remote: true,
        source_url: Some(sister.url.clone()),
        source_api_key: sister.api_key.clone(),
        source_host: Some(host.to_string()),
    }
}

fn stats_from_snapshot(snapshot: &SessionSnapshot, now: DateTime<Utc>) -> SessionStats {
    let mut stats = SessionStats::new(now);
    stats.interaction_count = snapshot.interaction_count;
    stats.steers_count = snapshot.steers_count;
    stats.total_tokens = snapshot.total_tokens;
    stats.estimated_cost_usd = snapshot.estimated_cost_usd;
    stats.green_time_seconds = snapshot.green_time_seconds;
    stats.non_green_time_seconds = snapshot.non_green_time_seconds;
    stats.sleep_time_seconds = snapshot.sleep_time_seconds;
    stats.current_state = snapshot.status;
    stats.state_since = now;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcode_core::types::{MonitorSummary, MONITOR_STATE_VERSION};

    fn snapshot(id: &str, name: &str, parent: Option<&str>) -> SessionSnapshot {
        SessionSnapshot {
            id: id.to_string(),
            name: name.to_string(),
            lifecycle_status: LifecycleStatus::Running,
            status: ActivityStatus::Running,
            status_emoji: "🟢",
            status_color: "#00ff00",
            activity: "writing code".to_string(),
            repo_name: Some("demo".to_string()),
            branch: Some("main".to_string()),
            parent_session_id: parent.map(String::from),
            green_time_seconds: 120.0,
            non_green_time_seconds: 30.0,
            sleep_time_seconds: 0.0,
            total_tokens: 5000,
            estimated_cost_usd: 0.12,
            budget_exceeded: false,
            interaction_count: 3,
            steers_count: 1,
            standing_orders_complete: false,
            has_standing_instructions: false,
            permissiveness_mode: PermissivenessMode::Normal,
            permissiveness_emoji: "🔒",
            oversight_policy: OversightPolicy::Wait,
            report_status: None,
            is_asleep: false,
            heartbeat_enabled: false,
            heartbeat_paused: false,
            git_diff_stat: None,
            ai_summary: None,
            is_remote: false,
            source_host: None,
        }
    }

    fn state_with(snapshots: Vec<SessionSnapshot>) -> MonitorState {
        MonitorState {
            daemon_pid: 1,
            loop_count: 1,
            interval_seconds: 10,
            last_loop_time: Utc::now(),
            version: MONITOR_STATE_VERSION,
            sessions: snapshots,
            presence: None,
            summary: MonitorSummary::default(),
        }
    }

    #[test]
    fn materializes_virtual_session_ids() {
        let sister = SisterConfig { name: "west".to_string(), url: "http://west.example.com:8420".to_string(), api_key: None };
        let state = state_with(vec![snapshot("abc", "writer", None)]);
        let sessions = materialize_sessions(&sister, &state);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "remote:west.example.com:8420:abc");
        assert!(sessions[0].is_remote);
        assert_eq!(sessions[0].source_url.as_deref(), Some("http://west.example.com:8420"));
    }

    #[test]
    fn resolves_parent_hierarchy_within_remote_set() {
        let sister = SisterConfig { name: "west".to_string(), url: "http://west.example.com".to_string(), api_key: None };
        let state = state_with(vec![snapshot("parent", "lead", None), snapshot("child", "worker", Some("parent"))]);
        let sessions = materialize_sessions(&sister, &state);
        let child = sessions.iter().find(|s| s.name == "worker").unwrap();
        let parent = sessions.iter().find(|s| s.name == "lead").unwrap();
        assert_eq!(child.parent_session_id.as_deref(), Some(parent.id.as_str()));
    }

    #[test]
    fn stats_carry_over_from_snapshot() {
        let sister = SisterConfig { name: "west".to_string(), url: "http://west.example.com".to_string(), api_key: None };
        let state = state_with(vec![snapshot("abc", "writer", None)]);
        let sessions = materialize_sessions(&sister, &state);
        assert_eq!(sessions[0].stats.total_tokens, 5000);
        assert_eq!(sessions[0].stats.green_time_seconds, 120.0);
        assert_eq!(sessions[0].stats.interaction_count, 3);
    }

    #[test]
    fn host_from_url_strips_scheme() {
        assert_eq!(host_from_url("https://sister.example.com:9000/"), "sister.example.com:9000");
        assert_eq!(host_from_url("http://sister.local"), "sister.local");
    }
}
