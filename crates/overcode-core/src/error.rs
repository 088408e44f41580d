use thiserror::Error;

/// Errors raised by pure `overcode-core` logic. Most of the taxonomy in the
/// spec's error-handling design (missing-dependency, multiplexer,
/// lock-contention) belongs to the I/O crates layered on top of this one;
/// this enum only covers failures a pure function can actually produce.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("session depth exceeds maximum of {max}: {name} would be at depth {depth}")]
    DepthExceeded { name: String, depth: u32, max: u32 },

    #[error("parent chain cycle detected starting at session {0}")]
    CycleDetected(String),

    #[error("unknown parent session id: {0}")]
    UnknownParent(String),

    #[error("invalid frequency string: {0}")]
    InvalidFrequency(String),

    #[error("invalid agent name {0:?}: must match ^[A-Za-z0-9_-]{{1,64}}$")]
    InvalidAgentName(String),
}
