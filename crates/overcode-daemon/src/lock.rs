//! PID-file advisory lock enforcing single ownership of a monitor-daemon
//! instance per multiplexer session.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock already held by pid {0}")]
    HeldBy(u32),
    #[error("lock io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Holds the lock for as long as it's alive; the lock releases automatically
/// when the file descriptor closes (process exit or explicit `drop`).
pub struct DaemonLock {
    file: File,
    path: String,
}

impl DaemonLock {
    /// Atomically acquire-or-fail. On failure, reads back the PID already
    /// in the file so the caller can report it.
    pub fn acquire(path: &str) -> Result<DaemonLock, LockError> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            fs::create_dir_all(dir)?;
        }

        // Open without truncating — truncating before we hold the lock
        // would wipe the running daemon's PID out from under it.
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;

        if file.try_lock_exclusive().is_err() {
            let holder = read_pid(path).unwrap_or(0);
            return Err(LockError::HeldBy(holder));
        }

        let mut file = file;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(DaemonLock { file, path: path.to_string() })
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

fn read_pid(path: &str) -> Option<u32> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_pid_file_with_own_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let lock = DaemonLock::acquire(path.to_str().unwrap()).unwrap();
        let pid = read_pid(path.to_str().unwrap()).unwrap();
        assert_eq!(pid, std::process::id());
        drop(lock);
    }

    #[test]
    fn second_acquire_fails_while_first_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let _first = DaemonLock::acquire(path.to_str().unwrap()).unwrap();
        let err = DaemonLock::acquire(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, LockError::HeldBy(pid) if pid == std::process::id()));
    }

    #[test]
    fn lock_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let lock = DaemonLock::acquire(path.to_str().unwrap()).unwrap();
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn acquire_succeeds_again_after_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let first = DaemonLock::acquire(path.to_str().unwrap()).unwrap();
        drop(first);
        let second = DaemonLock::acquire(path.to_str().unwrap());
        assert!(second.is_ok());
    }
}
