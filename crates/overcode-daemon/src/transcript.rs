//! TranscriptReader (concrete) — walks the vendor CLI's on-disk session
//! transcripts under `~/.claude/projects/<encoded-path>/*.jsonl` and sums
//! the token-usage fields out of each assistant message. Stateless,
//! read-per-call: this reader is only ever invoked on the Monitor Loop's
//! 10s/60s cadence gates, not per-tick, so there is no hot path to cache.

use std::path::{Path, PathBuf};

use overcode_core::interfaces::{TranscriptError, TranscriptReader, TranscriptStats};
use overcode_core::stats::TokenCounts;
use overcode_core::types::Session;

pub const PROJECTS_DIR_ENV: &str = "OVERCODE_CLAUDE_PROJECTS_DIR";

fn projects_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(PROJECTS_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".claude").join("projects")
}

/// Absolute path, every `/` replaced with `-`.
pub fn encode_project_path(path: &str) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path));
    absolute.to_string_lossy().replace('/', "-")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlTranscriptReader;

impl JsonlTranscriptReader {
    fn project_dir(&self, start_directory: &str) -> PathBuf {
        projects_dir().join(encode_project_path(start_directory))
    }

    /// Most recently modified `*.jsonl` file's stem in the project
    /// directory — the session the vendor CLI is actively writing.
    fn latest_session_file(&self, project_dir: &Path) -> Option<PathBuf> {
        let entries = std::fs::read_dir(project_dir).ok()?;
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
            .max_by_key(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
    }
}

impl TranscriptReader for JsonlTranscriptReader {
    fn current_session_id(&self, session: &Session) -> Result<Option<String>, TranscriptError> {
        let dir = self.project_dir(&session.start_directory);
        let Some(path) = self.latest_session_file(&dir) else {
            return Ok(None);
        };
        Ok(path.file_stem().map(|s| s.to_string_lossy().into_owned()))
    }

    fn stats(&self, session: &Session) -> Result<TranscriptStats, TranscriptError> {
        let Some(claude_session_id) = &session.active_claude_session_id else {
            return Ok(TranscriptStats::default());
        };
        let path = self.project_dir(&session.start_directory).join(format!("{claude_session_id}.jsonl"));
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Ok(TranscriptStats::default());
        };
        Ok(sum_usage(&contents))
    }
}

/// Tolerant of partial/trailing lines — the vendor CLI may be mid-write —
/// and of any line that isn't a well-formed assistant-usage record; both
/// are simply skipped rather than aborting the whole read.
fn sum_usage(contents: &str) -> TranscriptStats {
    let mut tokens = TokenCounts::default();
    let mut interaction_count = 0u64;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if value.get("type").and_then(|t| t.as_str()) != Some("assistant") {
            continue;
        }
        let Some(usage) = value.get("message").and_then(|m| m.get("usage")) else {
            continue;
        };
        tokens.input_tokens += usage.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        tokens.output_tokens += usage.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        tokens.cache_creation_tokens += usage.get("cache_creation_input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        tokens.cache_read_tokens += usage.get("cache_read_input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        interaction_count += 1;
    }

    TranscriptStats { tokens, interaction_count, steers_count: 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use overcode_core::types::{LifecycleStatus, OversightPolicy, PermissivenessMode, SessionStats};
    use tempfile::tempdir;

    fn session_for(start_directory: &str, active_claude_session_id: Option<&str>) -> Session {
        let now = Utc::now();
        Session {
            id: "a".into(),
            name: "demo".into(),
            tmux_session: "main".into(),
            tmux_window: 0,
            command: vec!["claude".into()],
            start_directory: start_directory.into(),
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
            claude_session_ids: Default::default(),
            active_claude_session_id: active_claude_session_id.map(String::from),
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
    fn encode_project_path_replaces_slashes() {
        let encoded = encode_project_path("/home/user/myproject");
        assert_eq!(encoded, "-home-user-myproject");
    }

    #[test]
    fn no_active_session_id_yields_zero_stats() {
        let reader = JsonlTranscriptReader;
        let session = session_for("/tmp", None);
        let stats = reader.stats(&session).unwrap();
        assert_eq!(stats.tokens, TokenCounts::default());
    }

    #[test]
    fn missing_project_dir_yields_no_current_session() {
        let reader = JsonlTranscriptReader;
        let dir = tempdir().unwrap();
        std::env::set_var(PROJECTS_DIR_ENV, dir.path());
        let session = session_for("/nonexistent/path", None);
        let result = reader.current_session_id(&session).unwrap();
        std::env::remove_var(PROJECTS_DIR_ENV);
        assert_eq!(result, None);
    }

    #[test]
    fn stats_sum_usage_across_assistant_lines_and_skip_others() {
        let reader = JsonlTranscriptReader;
        let dir = tempdir().unwrap();
        std::env::set_var(PROJECTS_DIR_ENV, dir.path());

        let project_dir = dir.path().join(encode_project_path("/tmp/proj"));
        std::fs::create_dir_all(&project_dir).unwrap();
        let session_file = project_dir.join("sess-1.jsonl");
        std::fs::write(
            &session_file,
            concat!(
                r#"{"type":"user","message":{}}"#, "\n",
                r#"{"type":"assistant","message":{"usage":{"input_tokens":10,"output_tokens":5,"cache_creation_input_tokens":2,"cache_read_input_tokens":1}}}"#, "\n",
                r#"not json at all"#, "\n",
                r#"{"type":"assistant","message":{"usage":{"input_tokens":3,"output_tokens":1,"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}"#, "\n",
            ),
        )
        .unwrap();

        let session = session_for("/tmp/proj", Some("sess-1"));
        let stats = reader.stats(&session).unwrap();
        std::env::remove_var(PROJECTS_DIR_ENV);

        assert_eq!(stats.tokens.input_tokens, 13);
        assert_eq!(stats.tokens.output_tokens, 6);
        assert_eq!(stats.tokens.cache_creation_tokens, 2);
        assert_eq!(stats.tokens.cache_read_tokens, 1);
        assert_eq!(stats.interaction_count, 2);
    }

    #[test]
    fn current_session_id_picks_latest_modified_file() {
        let reader = JsonlTranscriptReader;
        let dir = tempdir().unwrap();
        std::env::set_var(PROJECTS_DIR_ENV, dir.path());

        let project_dir = dir.path().join(encode_project_path("/tmp/proj2"));
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("older.jsonl"), "{}").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(project_dir.join("newer.jsonl"), "{}").unwrap();

        let session = session_for("/tmp/proj2", None);
        let result = reader.current_session_id(&session).unwrap();
        std::env::remove_var(PROJECTS_DIR_ENV);

        assert_eq!(result, Some("newer".to_string()));
    }
}
