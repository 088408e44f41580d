//! Filesystem — the atomic-write half. Every persisted JSON document
//! is written tmp-then-rename so readers never observe a half-written
//! file; this crate only declares the contract, `overcode-daemon` supplies
//! the real `std::fs`-backed implementation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Filesystem: Send + Sync {
    /// Write `contents` to `path` atomically: write to a temp file in the
    /// same directory, then rename over `path`.
    fn write_atomic(&self, path: &str, contents: &[u8]) -> Result<(), FsError>;

    /// Append one line (caller supplies the trailing newline convention) to
    /// `path`, creating it if absent.
    fn append_line(&self, path: &str, line: &str) -> Result<(), FsError>;

    /// Create an empty file or update its mtime if it already exists — the
    /// activity-signal and TUI-heartbeat touch files use this.
    fn touch(&self, path: &str) -> Result<(), FsError>;

    /// `Ok(None)` for a missing file; readers must tolerate this rather
    /// than treating it as an error.
    fn read_to_string(&self, path: &str) -> Result<Option<String>, FsError>;

    /// `Ok(None)` if the path does not exist.
    fn mtime_seconds(&self, path: &str) -> Result<Option<f64>, FsError>;
}
