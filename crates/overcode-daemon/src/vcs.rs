//! Refreshes `repo_name`/`branch` for a session's `start_directory`. Run
//! once per session per tick — cheap relative to pane capture, so no
//! separate cadence gate like the 10s/60s ones around transcript reads.

use std::path::Path;
use std::process::Command;
use std::sync::mpsc;
use std::time::Duration;

/// Subprocess VCS timeout. A git invocation against a huge repo or a
/// stuck filesystem mount must not stall a worker's whole tick.
const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Best-effort: any failure (not a repo, `git` missing, detached HEAD)
/// yields `(None, None)` rather than an error — VCS context is decorative,
/// never load-bearing for the status model.
pub fn refresh_repo_context(start_directory: &str) -> (Option<String>, Option<String>) {
    let repo_name = repo_name(start_directory);
    let branch = if repo_name.is_some() { current_branch(start_directory) } else { None };
    (repo_name, branch)
}

/// Runs `git` with the given args, current dir, enforcing [`GIT_TIMEOUT`].
/// The child runs to completion on its own thread even if we give up
/// waiting on it — we just never block the caller past the deadline.
fn run_git(args: &[&str], start_directory: &str) -> Option<std::process::Output> {
    let mut command = Command::new("git");
    command.args(args).current_dir(start_directory);

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let output = command.output();
        let _ = tx.send(output);
    });

    rx.recv_timeout(GIT_TIMEOUT).ok()?.ok()
}

fn repo_name(start_directory: &str) -> Option<String> {
    let output = run_git(&["rev-parse", "--show-toplevel"], start_directory)?;
    if !output.status.success() {
        return None;
    }
    let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Path::new(&toplevel).file_name().map(|n| n.to_string_lossy().into_owned())
}

fn current_branch(start_directory: &str) -> Option<String> {
    let output = run_git(&["symbolic-ref", "--short", "HEAD"], start_directory)?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() {
        None
    } else {
        Some(branch)
    }
}

/// Files changed / insertions / deletions against the working tree's
/// `HEAD`, from `git diff --shortstat`.
pub fn diff_stat(start_directory: &str) -> Option<overcode_core::types::GitDiffStat> {
    let output = run_git(&["diff", "--shortstat", "HEAD"], start_directory)?;
    if !output.status.success() {
        return None;
    }
    parse_shortstat(&String::from_utf8_lossy(&output.stdout))
}

fn parse_shortstat(text: &str) -> Option<overcode_core::types::GitDiffStat> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut files_changed = 0;
    let mut insertions = 0;
    let mut deletions = 0;
    for part in text.split(',') {
        let part = part.trim();
        let Some(count_str) = part.split_whitespace().next() else { continue };
        let Ok(count) = count_str.parse::<u32>() else { continue };
        if part.contains("file") {
            files_changed = count;
        } else if part.contains("insertion") {
            insertions = count;
        } else if part.contains("deletion") {
            deletions = count;
        }
    }
    Some(overcode_core::types::GitDiffStat { files_changed, insertions, deletions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_repo_directory_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, branch) = refresh_repo_context(dir.path().to_str().unwrap());
        assert_eq!(repo, None);
        assert_eq!(branch, None);
    }

    #[test]
    fn parse_shortstat_full_line() {
        let stat = parse_shortstat(" 3 files changed, 42 insertions(+), 7 deletions(-)").unwrap();
        assert_eq!(stat.files_changed, 3);
        assert_eq!(stat.insertions, 42);
        assert_eq!(stat.deletions, 7);
    }

    #[test]
    fn parse_shortstat_insertions_only() {
        let stat = parse_shortstat(" 1 file changed, 5 insertions(+)").unwrap();
        assert_eq!(stat.files_changed, 1);
        assert_eq!(stat.insertions, 5);
        assert_eq!(stat.deletions, 0);
    }

    #[test]
    fn empty_shortstat_is_none() {
        assert_eq!(parse_shortstat(""), None);
    }
}
