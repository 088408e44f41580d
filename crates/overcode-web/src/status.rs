//! Read-only routes: `/health`, `/api/status`, `/api/timeline`. Each
//! handler reshapes the already-persisted [`MonitorState`]/[`SessionSnapshot`]
//! the Monitor Loop writes rather than re-deriving the data itself.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use overcode_core::interfaces::{Filesystem, PaneController};
use overcode_core::types::{ActivityStatus, Session, SessionSnapshot};
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::history::{self, HistoryRow};
use overcode_daemon::{paths, permissiveness_emoji, status_color, status_emoji};

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

fn internal_error(message: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"ok": false, "error": message.to_string()})))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "timestamp": Utc::now().to_rfc3339()}))
}

/// Projects a freshly-pulled sister [`Session`] into the same
/// [`SessionSnapshot`] shape the Monitor Loop persists, reusing its emoji
/// and color tables so a remote agent renders identically to a local one.
pub fn session_to_snapshot(s: &Session) -> SessionSnapshot {
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
        git_diff_stat: None,
        ai_summary: None,
        is_remote: s.is_remote,
        source_host: s.source_host.clone(),
    }
}

pub async fn get_status<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
) -> Result<Json<Value>, ApiError> {
    let path = paths::monitor_state_path(&ctx.tmux_session);
    let contents = RealFilesystem
        .read_to_string(path.to_string_lossy().as_ref())
        .map_err(internal_error)?;

    let Some(contents) = contents else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"ok": false, "error": "monitor daemon has not written state yet; is it running?"})),
        ));
    };
    let mut state: overcode_core::types::MonitorState = serde_json::from_str(&contents).map_err(internal_error)?;

    if !ctx.sisters.is_empty() {
        let client = ctx.sister_client.clone();
        let sisters = ctx.sisters.clone();
        let results = tokio::task::spawn_blocking(move || overcode_sisters::pull_all(&client, &sisters))
            .await
            .unwrap_or_default();
        for result in results {
            for session in &result.sessions {
                state.sessions.push(session_to_snapshot(session));
                state.summary.remote_sessions += 1;
                state.summary.total_sessions += 1;
            }
        }
    }

    Ok(Json(serde_json::to_value(state).map_err(internal_error)?))
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    #[serde(default = "default_hours")]
    pub hours: f64,
    #[serde(default = "default_slots")]
    pub slots: usize,
}

fn default_hours() -> f64 {
    3.0
}

fn default_slots() -> usize {
    60
}

/// The status legend the original's `status_chars`/`status_colors` top-level
/// fields provided, reused here so a timeline view doesn't need a second
/// round trip to learn what each status token means.
fn status_legend() -> Value {
    const ALL: [ActivityStatus; 10] = [
        ActivityStatus::Permission,
        ActivityStatus::Error,
        ActivityStatus::Running,
        ActivityStatus::WaitingHeartbeat,
        ActivityStatus::HeartbeatStart,
        ActivityStatus::RunningHeartbeat,
        ActivityStatus::WaitingUser,
        ActivityStatus::WaitingOversight,
        ActivityStatus::Asleep,
        ActivityStatus::Terminated,
    ];
    let mut emoji = serde_json::Map::new();
    let mut color = serde_json::Map::new();
    for status in ALL {
        let token = history::activity_status_csv_token(status);
        emoji.insert(token.to_string(), json!(status_emoji(status)));
        color.insert(token.to_string(), json!(status_color(status)));
    }
    json!({"status_emoji": emoji, "status_colors": color})
}

fn history_row_to_json(row: &HistoryRow) -> Value {
    json!({
        "timestamp": row.timestamp.to_rfc3339(),
        "agent": row.agent,
        "status": row.status,
        "activity": row.activity,
    })
}

const GREEN_TOKENS: [&str; 3] = ["running", "heartbeat_start", "running_heartbeat"];

pub async fn get_timeline<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = paths::agent_history_path(&ctx.tmux_session);
    let contents = RealFilesystem
        .read_to_string(path.to_string_lossy().as_ref())
        .map_err(internal_error)?
        .unwrap_or_default();
    let rows = history::parse_rows(&contents);

    let now = Utc::now();
    let mut agent_names: Vec<&str> = rows.iter().map(|r| r.agent.as_str()).collect();
    agent_names.sort_unstable();
    agent_names.dedup();

    let mut agents = serde_json::Map::new();
    for name in agent_names {
        let slots = history::build_timeline_slots(&rows, name, now, query.hours, query.slots);
        let filled = slots.iter().filter(|s| s.is_some()).count();
        let green = slots.iter().filter(|s| s.as_ref().is_some_and(|r| GREEN_TOKENS.contains(&r.status.as_str()))).count();
        let percent_green = if filled == 0 { 0.0 } else { (green as f64 / filled as f64) * 100.0 };

        let slot_values: Vec<Value> = slots.iter().map(|slot| slot.as_ref().map(history_row_to_json).unwrap_or(Value::Null)).collect();
        agents.insert(name.to_string(), json!({"slots": slot_values, "percent_green": percent_green}));
    }

    let mut body = json!({"hours": query.hours, "slot_count": query.slots, "agents": agents});
    if let Value::Object(legend) = status_legend() {
        if let Value::Object(map) = &mut body {
            map.extend(legend);
        }
    }
    Ok(Json(body))
}
