//! Authenticated POST routes. Each handler just parses a JSON payload and
//! forwards to the matching `ControlSurface` method — the surface owns all
//! validation and side effects, this module only does HTTP framing.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use overcode_core::interfaces::PaneController;
use overcode_core::types::PermissivenessMode;
use overcode_daemon::control::{ControlError, ControlSurface};
use overcode_daemon::fs::RealFilesystem;
use overcode_daemon::paths;

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn respond(result: Result<Value, ControlError>) -> Result<Json<Value>, ApiError> {
    result
        .map(Json)
        .map_err(|e| (status_code(e.status()), Json(serde_json::json!({"ok": false, "error": e.to_string()}))))
}

fn surface<PC: PaneController>(ctx: &AppState<PC>) -> ControlSurface<'_, PC> {
    ControlSurface {
        store: &ctx.store,
        controller: &ctx.controller,
        tmux_session: ctx.tmux_session.clone(),
        instruction_presets: &ctx.instruction_presets,
    }
}

/// Every mutating route runs as a read-modify-write critical section
/// against the on-disk Session Store: reload so this request sees
/// whatever the Monitor Loop or a sibling request last wrote, run the
/// action, then persist so the next reload (by any process) sees this
/// request's effect — unconditionally, since a partially-applied cascade
/// (e.g. `kill`'s descendants) must not be lost just because the final
/// step of the same call returned an error.
fn dispatch<PC: PaneController>(ctx: &AppState<PC>, f: impl FnOnce(ControlSurface<'_, PC>) -> Result<Value, ControlError>) -> Result<Json<Value>, ApiError> {
    let sessions_path = paths::sessions_path();
    let sessions_path = sessions_path.to_string_lossy();
    ctx.store.reload(&RealFilesystem, &sessions_path);
    let result = f(surface(ctx));
    if let Err(e) = ctx.store.persist(&RealFilesystem, &sessions_path) {
        tracing::warn!(%e, "failed to persist session store after control action");
    }
    respond(result)
}

#[derive(Debug, Deserialize)]
pub struct SendPayload {
    pub name: String,
    pub text: String,
    #[serde(default = "default_true")]
    pub enter: bool,
}

fn default_true() -> bool {
    true
}

pub async fn send<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<SendPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.send_to_agent(&payload.name, &payload.text, payload.enter))
}

#[derive(Debug, Deserialize)]
pub struct SendKeyPayload {
    pub name: String,
    pub key: String,
}

pub async fn send_key<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<SendKeyPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.send_key_to_agent(&payload.name, &payload.key))
}

#[derive(Debug, Deserialize)]
pub struct KillPayload {
    pub name: String,
    #[serde(default)]
    pub cascade: bool,
}

pub async fn kill<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<KillPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.kill(&payload.name, payload.cascade))
}

#[derive(Debug, Deserialize)]
pub struct NamePayload {
    pub name: String,
}

pub async fn restart<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.restart(&payload.name))
}

#[derive(Debug, Deserialize)]
pub struct LaunchPayload {
    pub directory: String,
    pub name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub permissions: PermissivenessMode,
}

pub async fn launch<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<LaunchPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.launch_agent(&payload.directory, &payload.name, payload.prompt, payload.permissions))
}

#[derive(Debug, Deserialize)]
pub struct StandingOrdersPayload {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

pub async fn set_standing_orders<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<StandingOrdersPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_standing_orders(&payload.name, payload.text.as_deref(), payload.preset.as_deref()))
}

pub async fn clear_standing_orders<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.clear_standing_orders(&payload.name))
}

#[derive(Debug, Deserialize)]
pub struct BudgetPayload {
    pub name: String,
    pub usd: f64,
}

pub async fn set_budget<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<BudgetPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_budget(&payload.name, payload.usd))
}

#[derive(Debug, Deserialize)]
pub struct ValuePayload {
    pub name: String,
    pub value: i64,
}

pub async fn set_value<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<ValuePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_value(&payload.name, payload.value))
}

#[derive(Debug, Deserialize)]
pub struct AnnotationPayload {
    pub name: String,
    pub text: String,
}

pub async fn set_annotation<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<AnnotationPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_annotation(&payload.name, &payload.text))
}

#[derive(Debug, Deserialize)]
pub struct SleepPayload {
    pub name: String,
    pub asleep: bool,
}

pub async fn set_sleep<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<SleepPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_sleep(&payload.name, payload.asleep))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatConfigPayload {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

pub async fn configure_heartbeat<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<HeartbeatConfigPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.configure_heartbeat(&payload.name, payload.enabled, payload.frequency.as_deref(), payload.instruction.as_deref()))
}

pub async fn pause_heartbeat<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.pause_heartbeat(&payload.name))
}

pub async fn resume_heartbeat<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.resume_heartbeat(&payload.name))
}

#[derive(Debug, Deserialize)]
pub struct TogglePayload {
    pub name: String,
    pub enabled: bool,
}

pub async fn set_time_context<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<TogglePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_time_context(&payload.name, payload.enabled))
}

pub async fn set_hook_detection<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<TogglePayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.set_hook_detection(&payload.name, payload.enabled))
}

pub async fn transport_all<PC: PaneController + Send + Sync + 'static>(State(ctx): State<Arc<AppState<PC>>>) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.transport_all())
}

#[derive(Debug, Deserialize, Default)]
pub struct CleanupPayload {
    #[serde(default)]
    pub include_done: bool,
}

pub async fn cleanup_agents<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    Json(payload): Json<CleanupPayload>,
) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.cleanup_agents(payload.include_done))
}

pub async fn restart_monitor<PC: PaneController + Send + Sync + 'static>(State(ctx): State<Arc<AppState<PC>>>) -> Result<Json<Value>, ApiError> {
    dispatch(&ctx, |s| s.restart_monitor())
}
