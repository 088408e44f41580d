//! `overcode web [--host H] [--port P]` — serves the read-only/control
//! HTTP API. A thin wrapper around `overcode_web::build_router`; this crate
//! owns the tokio runtime and socket bind, the web crate owns everything
//! past that.

use std::sync::Arc;

use overcode_web::state::AppState;

use crate::cli::WebArgs;
use crate::support;

pub fn run(tmux_session: &str, args: WebArgs) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(serve(tmux_session, args))
}

async fn serve(tmux_session: &str, args: WebArgs) -> anyhow::Result<()> {
    let config = support::load_config();
    let store = support::load_store();
    let controller = support::controller();
    let presets = support::instruction_presets();

    let bind = match (args.host, args.port) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => format!("{host}:8420"),
        (None, Some(port)) => format!("127.0.0.1:{port}"),
        (None, None) => config.web.bind.clone(),
    };

    let state = Arc::new(AppState::new(
        tmux_session.to_string(),
        store,
        controller,
        presets,
        config.sisters.clone(),
        config.web.api_key.clone(),
        config.web.allow_control,
    ));

    tracing::info!(%bind, allow_control = config.web.allow_control, "web API listening");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, overcode_web::build_router(state)).await?;
    Ok(())
}
