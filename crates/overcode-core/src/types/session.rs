use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::{ActivityStatus, LifecycleStatus};

/// Maximum ring length for [`SessionStats::operation_times`].
pub const OPERATION_TIMES_CAPACITY: usize = 100;

/// Maximum parent-chain depth.
pub const MAX_SESSION_DEPTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissivenessMode {
    Normal,
    Permissive,
    Bypass,
}

impl Default for PermissivenessMode {
    fn default() -> Self {
        PermissivenessMode::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversightPolicy {
    Wait,
    Fail,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Failure,
}

/// A completed agent report, filed by a child into `report_<name>.json` and
/// mirrored onto the parent-visible fields of [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Time/token/op accumulators, persisted inside [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub interaction_count: u64,
    pub steers_count: u64,

    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,

    pub green_time_seconds: f64,
    pub non_green_time_seconds: f64,
    pub sleep_time_seconds: f64,

    pub current_state: ActivityStatus,
    pub state_since: DateTime<Utc>,

    /// Wall-clock of the daemon's last accumulation tick. `None` only before
    /// the first tick has ever run for this session.
    pub last_time_accumulation: Option<DateTime<Utc>>,

    /// Bounded ring of completed "prompt to next prompt" durations, seconds.
    /// Capacity [`OPERATION_TIMES_CAPACITY`]; the median is derived, not
    /// stored.
    operation_times: Vec<f64>,
    /// Index of the next ring slot to overwrite once the ring is full.
    operation_times_cursor: usize,

    /// Short activity string, truncated to 100 chars by the writer.
    pub current_task: String,
}

impl SessionStats {
    pub fn new(now: DateTime<Utc>) -> Self {
        SessionStats {
            interaction_count: 0,
            steers_count: 0,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            total_tokens: 0,
            estimated_cost_usd: 0.0,
            green_time_seconds: 0.0,
            non_green_time_seconds: 0.0,
            sleep_time_seconds: 0.0,
            current_state: ActivityStatus::WaitingUser,
            state_since: now,
            last_time_accumulation: None,
            operation_times: Vec::new(),
            operation_times_cursor: 0,
            current_task: String::new(),
        }
    }

    /// Push a completed operation duration into the ring, evicting the
    /// oldest entry once full.
    pub fn push_operation_time(&mut self, seconds: f64) {
        if self.operation_times.len() < OPERATION_TIMES_CAPACITY {
            self.operation_times.push(seconds);
        } else {
            self.operation_times[self.operation_times_cursor] = seconds;
            self.operation_times_cursor = (self.operation_times_cursor + 1) % OPERATION_TIMES_CAPACITY;
        }
    }

    pub fn operation_times(&self) -> &[f64] {
        &self.operation_times
    }

    /// 50th percentile of the ring contents, `None` if empty.
    pub fn median_operation_time(&self) -> Option<f64> {
        if self.operation_times.is_empty() {
            return None;
        }
        let mut sorted = self.operation_times.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("operation times are never NaN"));
        let mid = sorted.len() / 2;
        Some(if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        })
    }

    pub fn set_current_task(&mut self, task: &str) {
        self.current_task = task.chars().take(100).collect();
    }
}

/// One agent, one multiplexer window. The canonical, persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,

    pub tmux_session: String,
    pub tmux_window: u32,

    pub command: Vec<String>,
    pub start_directory: String,
    pub start_time: DateTime<Utc>,

    pub repo_name: Option<String>,
    pub branch: Option<String>,

    pub status: LifecycleStatus,

    pub parent_session_id: Option<String>,

    pub is_asleep: bool,

    pub standing_instructions: String,
    pub standing_instructions_preset: Option<String>,
    pub standing_orders_complete: bool,

    pub permissiveness_mode: PermissivenessMode,

    pub cost_budget_usd: f64,
    pub agent_value: i64,
    pub human_annotation: String,

    pub heartbeat_enabled: bool,
    pub heartbeat_paused: bool,
    pub heartbeat_frequency_seconds: u64,
    pub heartbeat_instruction: String,
    pub last_heartbeat_time: Option<DateTime<Utc>>,

    pub time_context_enabled: bool,
    pub hook_status_detection: bool,

    pub oversight_policy: OversightPolicy,
    pub oversight_timeout_seconds: u64,
    pub oversight_deadline: Option<DateTime<Utc>>,

    pub report_status: Option<ReportStatus>,
    pub report_reason: Option<String>,

    pub claude_session_ids: BTreeSet<String>,
    pub active_claude_session_id: Option<String>,

    pub stats: SessionStats,

    pub allowed_tools: Vec<String>,
    pub extra_claude_args: Vec<String>,

    /// True for sessions materialized from a sister's `/api/status` response,
    /// required for control round-trip. Defaults to `false` and is never
    /// set by the launcher.
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_api_key: Option<String>,
    #[serde(default)]
    pub source_host: Option<String>,
}

impl Session {
    /// `heartbeat_enabled ⇒ heartbeat_frequency_seconds ≥ 30` and the
    /// asleep/heartbeat mutual-exclusion invariant.
    pub fn invariants_hold(&self) -> bool {
        if self.heartbeat_enabled && self.heartbeat_frequency_seconds < 30 {
            return false;
        }
        if self.is_asleep && self.heartbeat_enabled && !self.heartbeat_paused {
            return false;
        }
        if let Some(active) = &self.active_claude_session_id {
            if !self.claude_session_ids.contains(active) {
                return false;
            }
        }
        true
    }

    pub fn budget_exceeded(&self) -> bool {
        self.cost_budget_usd > 0.0 && self.stats.estimated_cost_usd >= self.cost_budget_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_session(now: DateTime<Utc>) -> Session {
        Session {
            id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".into(),
            name: "demo".into(),
            tmux_session: "main".into(),
            tmux_window: 0,
            command: vec!["claude".into(), "code".into()],
            start_directory: "/tmp/p".into(),
            start_time: now,
            repo_name: None,
            branch: None,
            status: LifecycleStatus::Running,
            parent_session_id: None,
            is_asleep: false,
            standing_instructions: String::new(),
            standing_instructions_preset: None,
            standing_orders_complete: false,
            permissiveness_mode: PermissivenessMode::Normal,
            cost_budget_usd: 0.0,
            agent_value: 1000,
            human_annotation: String::new(),
            heartbeat_enabled: false,
            heartbeat_paused: false,
            heartbeat_frequency_seconds: 30,
            heartbeat_instruction: String::new(),
            last_heartbeat_time: None,
            time_context_enabled: true,
            hook_status_detection: false,
            oversight_policy: OversightPolicy::Wait,
            oversight_timeout_seconds: 600,
            oversight_deadline: None,
            report_status: None,
            report_reason: None,
            claude_session_ids: BTreeSet::new(),
            active_claude_session_id: None,
            stats: SessionStats::new(now),
            allowed_tools: Vec::new(),
            extra_claude_args: Vec::new(),
            is_remote: false,
            source_url: None,
            source_api_key: None,
            source_host: None,
        }
    }

    #[test]
    fn serde_roundtrip_is_identity() {
        let now = Utc::now();
        let session = base_session(now);
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(session, back);
    }

    #[test]
    fn heartbeat_below_30s_violates_invariant() {
        let mut session = base_session(Utc::now());
        session.heartbeat_enabled = true;
        session.heartbeat_frequency_seconds = 10;
        assert!(!session.invariants_hold());
    }

    #[test]
    fn asleep_and_active_heartbeat_is_invalid() {
        let mut session = base_session(Utc::now());
        session.is_asleep = true;
        session.heartbeat_enabled = true;
        session.heartbeat_paused = false;
        assert!(!session.invariants_hold());
    }

    #[test]
    fn asleep_with_paused_heartbeat_is_valid() {
        let mut session = base_session(Utc::now());
        session.is_asleep = true;
        session.heartbeat_enabled = true;
        session.heartbeat_paused = true;
        assert!(session.invariants_hold());
    }

    #[test]
    fn active_session_id_must_be_member() {
        let mut session = base_session(Utc::now());
        session.active_claude_session_id = Some("sess-1".into());
        assert!(!session.invariants_hold());
        session.claude_session_ids.insert("sess-1".into());
        assert!(session.invariants_hold());
    }

    #[test]
    fn budget_exceeded_requires_nonzero_budget() {
        let mut session = base_session(Utc::now());
        session.stats.estimated_cost_usd = 5.0;
        assert!(!session.budget_exceeded());
        session.cost_budget_usd = 1.0;
        assert!(session.budget_exceeded());
    }

    #[test]
    fn operation_times_ring_evicts_oldest() {
        let mut stats = SessionStats::new(Utc::now());
        for i in 0..OPERATION_TIMES_CAPACITY + 10 {
            stats.push_operation_time(i as f64);
        }
        assert_eq!(stats.operation_times().len(), OPERATION_TIMES_CAPACITY);
        // the oldest 10 values (0..10) were evicted
        assert!(!stats.operation_times().contains(&0.0));
        assert!(stats.operation_times().contains(&(OPERATION_TIMES_CAPACITY as f64 + 9.0)));
    }

    #[test]
    fn median_of_empty_ring_is_none() {
        let stats = SessionStats::new(Utc::now());
        assert_eq!(stats.median_operation_time(), None);
    }

    #[test]
    fn median_odd_and_even_counts() {
        let mut stats = SessionStats::new(Utc::now());
        for v in [1.0, 3.0, 2.0] {
            stats.push_operation_time(v);
        }
        assert_eq!(stats.median_operation_time(), Some(2.0));
        stats.push_operation_time(4.0);
        assert_eq!(stats.median_operation_time(), Some(2.5));
    }

    #[test]
    fn current_task_truncated_to_100_chars() {
        let mut stats = SessionStats::new(Utc::now());
        let long = "x".repeat(250);
        stats.set_current_task(&long);
        assert_eq!(stats.current_task.len(), 100);
    }
}
