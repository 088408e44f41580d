//! `X-API-Key` gate on mutating routes. Read-only routes (`/api/status`,
//! `/api/timeline`, `/health`) never pass through this middleware, only the
//! control routes do.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use overcode_core::interfaces::PaneController;
use serde_json::json;

use crate::state::AppState;

const API_KEY_HEADER: &str = "X-API-Key";

pub async fn require_control_access<PC: PaneController + Send + Sync + 'static>(
    State(ctx): State<Arc<AppState<PC>>>,
    request: Request,
    next: Next,
) -> Response {
    if !ctx.allow_control {
        return (StatusCode::FORBIDDEN, Json(json!({"ok": false, "error": "control surface disabled (web.allow_control is false)"})))
            .into_response();
    }

    if let Some(expected) = &ctx.api_key {
        let provided = request.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"ok": false, "error": "missing or invalid X-API-Key"}))).into_response();
        }
    }

    next.run(request).await
}
