//! The Web API component. A thin axum layer over the same
//! [`overcode_daemon::control::ControlSurface`] and persisted
//! `monitor_state.json` the rest of the system already produces; this
//! crate adds no state of its own beyond HTTP framing and the sister
//! aggregation fan-out.

pub mod auth;
pub mod control;
pub mod state;
pub mod status;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use overcode_core::interfaces::PaneController;

use state::AppState;

/// Builds the full route table. Read-only routes serve straight off
/// `monitor_state.json`; the `/api/control/*` group sits behind
/// [`auth::require_control_access`].
pub fn build_router<PC: PaneController + Send + Sync + 'static>(ctx: Arc<AppState<PC>>) -> Router {
    let control_routes = Router::new()
        .route("/api/control/send", post(control::send))
        .route("/api/control/send-key", post(control::send_key))
        .route("/api/control/kill", post(control::kill))
        .route("/api/control/restart", post(control::restart))
        .route("/api/control/launch", post(control::launch))
        .route("/api/control/standing-orders", post(control::set_standing_orders))
        .route("/api/control/standing-orders/clear", post(control::clear_standing_orders))
        .route("/api/control/budget", post(control::set_budget))
        .route("/api/control/value", post(control::set_value))
        .route("/api/control/annotation", post(control::set_annotation))
        .route("/api/control/sleep", post(control::set_sleep))
        .route("/api/control/heartbeat", post(control::configure_heartbeat))
        .route("/api/control/heartbeat/pause", post(control::pause_heartbeat))
        .route("/api/control/heartbeat/resume", post(control::resume_heartbeat))
        .route("/api/control/time-context", post(control::set_time_context))
        .route("/api/control/hook-detection", post(control::set_hook_detection))
        .route("/api/control/transport", post(control::transport_all))
        .route("/api/control/cleanup", post(control::cleanup_agents))
        .route("/api/control/restart-monitor", post(control::restart_monitor))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth::require_control_access::<PC>));

    Router::new()
        .route("/health", get(status::health))
        .route("/api/status", get(status::get_status))
        .route("/api/timeline", get(status::get_timeline))
        .merge(control_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
