//! Shared state handed to every axum handler. One instance per running
//! `web` command; `overcode-cli` builds it once and wraps it in an `Arc`.

use std::collections::HashMap;

use overcode_core::config::SisterConfig;
use overcode_core::interfaces::PaneController;
use overcode_daemon::SessionStore;

pub struct AppState<PC> {
    pub tmux_session: String,
    pub store: SessionStore,
    pub controller: PC,
    pub instruction_presets: HashMap<String, String>,
    pub sisters: Vec<SisterConfig>,
    pub sister_client: reqwest::Client,
    pub api_key: Option<String>,
    pub allow_control: bool,
}

impl<PC: PaneController> AppState<PC> {
    pub fn new(
        tmux_session: String,
        store: SessionStore,
        controller: PC,
        instruction_presets: HashMap<String, String>,
        sisters: Vec<SisterConfig>,
        api_key: Option<String>,
        allow_control: bool,
    ) -> Self {
        AppState {
            tmux_session,
            store,
            controller,
            instruction_presets,
            sisters,
            sister_client: reqwest::Client::new(),
            api_key,
            allow_control,
        }
    }
}
