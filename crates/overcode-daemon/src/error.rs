use thiserror::Error;

use overcode_core::interfaces::{FsError, PaneError, TranscriptError};
use overcode_core::CoreError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("session store io error: {0}")]
    Store(#[from] FsError),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pane(#[from] PaneError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
