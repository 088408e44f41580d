use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::{ActivityStatus, LifecycleStatus};
use super::session::{OversightPolicy, PermissivenessMode, ReportStatus};

/// Bumped whenever the published shape changes in a way a consumer ought to
/// notice. Not a semver string — just a small monotone tag.
pub const MONITOR_STATE_VERSION: u32 = 1;

/// A single JSON document the Monitor Loop rewrites atomically each
/// tick. Consumers treat it as read-only and as *stale* once its mtime is
/// more than `2 * fast_interval_seconds` old.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub daemon_pid: u32,
    pub loop_count: u64,
    pub interval_seconds: u64,
    pub last_loop_time: DateTime<Utc>,
    pub version: u32,

    pub sessions: Vec<SessionSnapshot>,

    pub presence: Option<PresenceInfo>,

    pub summary: MonitorSummary,
}

impl MonitorState {
    pub fn is_stale(&self, now: DateTime<Utc>, fast_interval_seconds: u64) -> bool {
        let age = (now - self.last_loop_time).num_milliseconds() as f64 / 1000.0;
        age > (2 * fast_interval_seconds) as f64
    }
}

/// One agent's projection into [`MonitorState`], the shape the status
/// API serves per-agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub name: String,

    pub lifecycle_status: LifecycleStatus,
    pub status: ActivityStatus,
    pub status_emoji: &'static str,
    pub status_color: &'static str,

    pub activity: String,

    pub repo_name: Option<String>,
    pub branch: Option<String>,

    pub parent_session_id: Option<String>,

    pub green_time_seconds: f64,
    pub non_green_time_seconds: f64,
    pub sleep_time_seconds: f64,

    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub budget_exceeded: bool,

    pub interaction_count: u64,
    pub steers_count: u64,

    pub standing_orders_complete: bool,
    pub has_standing_instructions: bool,

    pub permissiveness_mode: PermissivenessMode,
    pub permissiveness_emoji: &'static str,

    pub oversight_policy: OversightPolicy,
    pub report_status: Option<ReportStatus>,

    pub is_asleep: bool,
    pub heartbeat_enabled: bool,
    pub heartbeat_paused: bool,

    /// `Some` once a VCS diffstat has been sampled; absent while the repo
    /// context hasn't resolved yet.
    pub git_diff_stat: Option<GitDiffStat>,

    /// Optional AI-generated one-line summary of recent activity, when a
    /// summarizer is configured. The daemon core never generates this
    /// itself; it is populated by an external summarizer writing back
    /// through the Control Surface and merely passed through here.
    pub ai_summary: Option<String>,

    /// `true` for sessions materialized by the Sister Aggregator.
    pub is_remote: bool,
    pub source_host: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitDiffStat {
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
}

/// Liveness of a platform-specific presence-detection capability. Omitted
/// from [`MonitorState`] entirely when the platform doesn't support it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceInfo {
    pub presence_available: bool,
    pub human_present: Option<bool>,
    pub last_input_seconds_ago: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub total_sessions: u32,
    pub running: u32,
    pub waiting: u32,
    pub asleep: u32,
    pub terminated: u32,
    pub done: u32,
    pub budget_exceeded_count: u32,
    pub remote_sessions: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn minimal_state(last_loop_time: DateTime<Utc>) -> MonitorState {
        MonitorState {
            daemon_pid: 1234,
            loop_count: 10,
            interval_seconds: 10,
            last_loop_time,
            version: MONITOR_STATE_VERSION,
            sessions: Vec::new(),
            presence: None,
            summary: MonitorSummary::default(),
        }
    }

    #[test]
    fn stale_after_double_interval() {
        let now = Utc::now();
        let state = minimal_state(now - Duration::seconds(25));
        assert!(state.is_stale(now, 10));
    }

    #[test]
    fn fresh_within_double_interval() {
        let now = Utc::now();
        let state = minimal_state(now - Duration::seconds(5));
        assert!(!state.is_stale(now, 10));
    }

    #[test]
    fn serde_roundtrip_with_empty_sessions() {
        let state = minimal_state(Utc::now());
        let json = serde_json::to_string(&state).unwrap();
        let back: MonitorState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
