//! `std::fs`-backed implementation of `overcode_core::interfaces::Filesystem`.
//! Every write is tmp-file-then-rename so a reader never observes a
//! half-written document.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use overcode_core::interfaces::{Filesystem, FsError};

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

fn io_err(path: &str, source: std::io::Error) -> FsError {
    FsError::Io { path: path.to_string(), source }
}

impl Filesystem for RealFilesystem {
    fn write_atomic(&self, path: &str, contents: &[u8]) -> Result<(), FsError> {
        let target = Path::new(path);
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| io_err(path, e))?;

        let tmp_path = dir.join(format!(
            ".{}.tmp-{}",
            target.file_name().and_then(|n| n.to_str()).unwrap_or("overcode"),
            std::process::id()
        ));

        {
            let mut tmp = fs::File::create(&tmp_path).map_err(|e| io_err(path, e))?;
            tmp.write_all(contents).map_err(|e| io_err(path, e))?;
            tmp.sync_all().map_err(|e| io_err(path, e))?;
        }
        fs::rename(&tmp_path, target).map_err(|e| io_err(path, e))?;
        Ok(())
    }

    fn append_line(&self, path: &str, line: &str) -> Result<(), FsError> {
        if let Some(dir) = Path::new(path).parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(path, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        writeln!(file, "{line}").map_err(|e| io_err(path, e))?;
        Ok(())
    }

    fn touch(&self, path: &str) -> Result<(), FsError> {
        if let Some(dir) = Path::new(path).parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(path, e))?;
        }
        if Path::new(path).exists() {
            bump_mtime(path).map_err(|e| io_err(path, e))
        } else {
            OpenOptions::new().create(true).write(true).open(path).map_err(|e| io_err(path, e))?;
            Ok(())
        }
    }

    fn read_to_string(&self, path: &str) -> Result<Option<String>, FsError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e)),
        }
    }

    fn mtime_seconds(&self, path: &str) -> Result<Option<f64>, FsError> {
        match fs::metadata(path) {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| io_err(path, e))?;
                let secs = modified
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                Ok(Some(secs))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e)),
        }
    }
}

/// Bump mtime on an existing file without a `filetime` dependency:
/// `set_len` to the file's own current length is a metadata-only write
/// that still advances mtime on every common filesystem.
fn bump_mtime(path: &str) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    file.set_len(len)?;
    Ok(())
}
