//! TranscriptReader — per-session token/interaction counts out of the
//! vendor's on-disk transcript format, modeled only as counts and token
//! sums: no attempt to parse the LLM vendor's proprietary formats beyond
//! counting messages and summing token fields.

use thiserror::Error;

use crate::stats::TokenCounts;
use crate::types::Session;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript io error: {0}")]
    Io(String),
    #[error("transcript parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TranscriptStats {
    pub tokens: TokenCounts,
    pub interaction_count: u64,
    pub steers_count: u64,
}

pub trait TranscriptReader: Send + Sync {
    /// Refreshed every 10s: the vendor session id whose transcript
    /// currently defines context-window size for this agent. `None` if no
    /// transcript has been observed yet.
    fn current_session_id(&self, session: &Session) -> Result<Option<String>, TranscriptError>;

    /// Refreshed every 60s: totals to merge into `SessionStats`. Always
    /// scoped to `session.active_claude_session_id` so a `/clear` causes a
    /// drop in reported tokens rather than pinning to the historical max.
    fn stats(&self, session: &Session) -> Result<TranscriptStats, TranscriptError>;
}

/// Used where no transcript integration is configured — every call reports
/// "nothing observed yet" rather than an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTranscriptReader;

impl TranscriptReader for NullTranscriptReader {
    fn current_session_id(&self, _session: &Session) -> Result<Option<String>, TranscriptError> {
        Ok(None)
    }

    fn stats(&self, _session: &Session) -> Result<TranscriptStats, TranscriptError> {
        Ok(TranscriptStats::default())
    }
}
