//! `agent_history.csv` — append-only per-tick status log, and the
//! incremental tailing reader `/api/timeline` consumes.

use chrono::{DateTime, Utc};
use overcode_core::interfaces::Filesystem;
use overcode_core::types::ActivityStatus;

use crate::error::DaemonError;

const HEADER: &str = "timestamp,agent,status,activity";
/// Activity strings are truncated before they hit the CSV so an embedded
/// comma or newline in pane text can't corrupt the row.
const ACTIVITY_TRUNCATE_LEN: usize = 60;

pub fn activity_status_csv_token(status: ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::Permission => "permission",
        ActivityStatus::Error => "error",
        ActivityStatus::Running => "running",
        ActivityStatus::WaitingHeartbeat => "waiting_heartbeat",
        ActivityStatus::HeartbeatStart => "heartbeat_start",
        ActivityStatus::RunningHeartbeat => "running_heartbeat",
        ActivityStatus::WaitingUser => "waiting_user",
        ActivityStatus::WaitingOversight => "waiting_oversight",
        ActivityStatus::Asleep => "asleep",
        ActivityStatus::Terminated => "terminated",
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Appends one row, writing the header first iff the file is new.
pub fn append_row(
    fs: &impl Filesystem,
    path: &str,
    now: DateTime<Utc>,
    agent: &str,
    status: ActivityStatus,
    activity: &str,
) -> Result<(), DaemonError> {
    if fs.read_to_string(path)?.is_none() {
        fs.append_line(path, HEADER)?;
    }

    let truncated: String = activity.chars().take(ACTIVITY_TRUNCATE_LEN).collect();
    let row = format!(
        "{},{},{},{}",
        now.to_rfc3339(),
        csv_escape(agent),
        activity_status_csv_token(status),
        csv_escape(&truncated),
    );
    fs.append_line(path, &row)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub status: String,
    pub activity: String,
}

/// Tolerant line parser: a malformed row is skipped rather than aborting
/// the whole read, since the writer may be mid-append.
pub fn parse_rows(contents: &str) -> Vec<HistoryRow> {
    let mut rows = Vec::new();
    for line in contents.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(row) = parse_row(line) {
            rows.push(row);
        }
    }
    rows
}

fn parse_row(line: &str) -> Option<HistoryRow> {
    let fields = split_csv_line(line);
    if fields.len() != 4 {
        return None;
    }
    let timestamp = DateTime::parse_from_rfc3339(&fields[0]).ok()?.with_timezone(&Utc);
    Some(HistoryRow { timestamp, agent: fields[1].clone(), status: fields[2].clone(), activity: fields[3].clone() })
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// `/api/timeline?hours=H&slots=S`: map each row into bucket
/// `⌊(ts - (now - H)) / (H/S)⌋`, keeping only the latest row observed per
/// bucket per agent.
pub fn build_timeline_slots(
    rows: &[HistoryRow],
    agent: &str,
    now: DateTime<Utc>,
    hours: f64,
    slots: usize,
) -> Vec<Option<HistoryRow>> {
    let mut buckets: Vec<Option<HistoryRow>> = vec![None; slots];
    if slots == 0 || hours <= 0.0 {
        return buckets;
    }
    let window_start = now - chrono::Duration::milliseconds((hours * 3_600_000.0) as i64);
    let slot_width_ms = (hours * 3_600_000.0) / slots as f64;

    for row in rows.iter().filter(|r| r.agent == agent) {
        if row.timestamp < window_start || row.timestamp > now {
            continue;
        }
        let offset_ms = (row.timestamp - window_start).num_milliseconds() as f64;
        let idx = (offset_ms / slot_width_ms).floor() as usize;
        let idx = idx.min(slots - 1);
        match &buckets[idx] {
            Some(existing) if existing.timestamp >= row.timestamp => {}
            _ => buckets[idx] = Some(row.clone()),
        }
    }
    buckets
}
