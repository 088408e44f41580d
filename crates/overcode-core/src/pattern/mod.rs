//! Status Pattern Engine — a pure text classifier. Takes a sliding
//! window of pane text (already captured by a `PaneController`) and returns
//! an activity classification plus a short activity string. Contains no
//! I/O; every table is immutable data declared in [`tables`].

mod tables;

use once_cell::sync::Lazy;
use regex::Regex;

pub use tables::*;

use crate::types::ClassifiedStatus;

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap());
static FREE_TEXT_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(FREE_TEXT_OPTION_REGEX).unwrap());
static COMMAND_MENU: Lazy<Regex> = Lazy::new(|| Regex::new(COMMAND_MENU_REGEX).unwrap());
static ERROR_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| ERROR_REGEXES.iter().map(|p| Regex::new(p).unwrap()).collect());
static BACKGROUND_BASH_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(BACKGROUND_BASH_COUNT_REGEX).unwrap());
static LIVE_SUBAGENT_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(LIVE_SUBAGENT_COUNT_REGEX).unwrap());
static PLAN_APPROVAL_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| PLAN_APPROVAL_REGEXES.iter().map(|p| Regex::new(p).unwrap()).collect());

/// Remove ANSI escape sequences. `tmux capture-pane -e` preserves color
/// codes; matching needs plain text, display keeps the raw bytes.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

pub fn is_prompt_line(line: &str) -> bool {
    PROMPT_CHARS.contains(&line.trim())
}

pub fn is_status_bar_line(line: &str) -> bool {
    let trimmed = line.trim();
    STATUS_BAR_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

pub fn is_command_menu_line(line: &str) -> bool {
    COMMAND_MENU.is_match(line)
}

/// Strip one known prefix (first match only) and truncate for display.
pub fn clean_line(line: &str) -> String {
    let trimmed = line.trim();
    let mut cleaned = trimmed;
    for prefix in LINE_PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            cleaned = rest;
            break;
        }
    }
    if cleaned.chars().count() > CLEAN_LINE_MAX_LENGTH {
        let truncated: String = cleaned.chars().take(CLEAN_LINE_MAX_LENGTH - 3).collect();
        format!("{truncated}...")
    } else {
        cleaned.to_string()
    }
}

/// Bottom-up scan for the last status-bar line — old status bars persist in
/// scrollback, so only the last match reflects the agent's current state.
fn last_status_bar_line<'a>(stripped_lines: &'a [String]) -> Option<&'a str> {
    stripped_lines.iter().rev().map(String::as_str).find(|l| is_status_bar_line(l))
}

pub fn extract_background_bash_count(stripped_lines: &[String]) -> u32 {
    let Some(line) = last_status_bar_line(stripped_lines) else {
        return 0;
    };
    if let Some(caps) = BACKGROUND_BASH_COUNT.captures(line) {
        return caps[1].parse().unwrap_or(0);
    }
    if line.contains("(running)") && !line.contains("bashes") {
        return 1;
    }
    0
}

/// Post-spawn check: a freshly-created window whose pane already
/// shows a shell error (`command not found`, etc.) never got as far as
/// starting the agent. Checked against the whole capture, not just the
/// tail window, since the failing line may have already scrolled past a
/// slow shell banner.
pub fn detect_spawn_failure(pane_text: &str) -> bool {
    let stripped = strip_ansi(pane_text).to_lowercase();
    SPAWN_FAILURE_LITERALS.iter().any(|literal| stripped.contains(literal))
}

pub fn extract_live_subagent_count(stripped_lines: &[String]) -> u32 {
    let Some(line) = last_status_bar_line(stripped_lines) else {
        return 0;
    };
    LIVE_SUBAGENT_COUNT
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: ClassifiedStatus,
    pub activity: String,
    /// Set only when `status == Permission` and the matched option invites
    /// free-text input.
    pub free_text_option: bool,
}

/// Classify a window of pane text. `raw_lines` may still carry ANSI escape
/// codes — they are stripped internally before any matching happens.
pub fn classify(raw_lines: &[&str]) -> Classification {
    let stripped: Vec<String> = raw_lines.iter().map(|l| strip_ansi(l)).collect();

    // "Meaningful" lines exclude the `/`-autocomplete menu so it never
    // looks like agent output.
    let meaningful: Vec<&str> = stripped
        .iter()
        .map(String::as_str)
        .filter(|l| !is_command_menu_line(l))
        .collect();

    let tail: Vec<&str> = tail_window(&meaningful, TAIL_WINDOW);
    let haystack = tail.join("\n").to_lowercase();

    if let Some(status) = check_permission(&haystack) {
        let free_text_option = FREE_TEXT_OPTION.is_match(&haystack);
        return Classification { status, activity: activity_from_tail(&tail), free_text_option };
    }

    let error_tail = tail_window(&meaningful, ERROR_TAIL_WINDOW);
    if check_error(&error_tail) {
        return Classification {
            status: ClassifiedStatus::Error,
            activity: activity_from_tail(&tail),
            free_text_option: false,
        };
    }

    if check_busy(&haystack, &tail) {
        return Classification {
            status: ClassifiedStatus::Busy,
            activity: activity_from_tail(&tail),
            free_text_option: false,
        };
    }

    let last_non_empty = meaningful.iter().rev().find(|l| !l.trim().is_empty()).copied();

    // A bare prompt glyph anywhere in the tail *except* the final line is
    // treated as a waiting menu selector still on screen above fresh
    // output; the identical glyph as the final line, with nothing active
    // above it, is the narrower idle_prompt case below.
    let glyph_elsewhere = tail
        .iter()
        .rev()
        .skip(1)
        .any(|l| is_prompt_line(l));

    if check_waiting(&haystack) || glyph_elsewhere {
        return Classification {
            status: ClassifiedStatus::Waiting,
            activity: activity_from_tail(&tail),
            free_text_option: false,
        };
    }

    if let Some(last) = last_non_empty {
        if is_prompt_line(last) {
            return Classification {
                status: ClassifiedStatus::IdlePrompt,
                activity: String::new(),
                free_text_option: false,
            };
        }
    }

    Classification {
        status: ClassifiedStatus::IdlePrompt,
        activity: activity_from_tail(&tail),
        free_text_option: false,
    }
}

fn tail_window<'a>(lines: &[&'a str], window: usize) -> Vec<&'a str> {
    let start = lines.len().saturating_sub(window);
    lines[start..].to_vec()
}

fn check_permission(haystack: &str) -> Option<ClassifiedStatus> {
    PERMISSION_LITERALS
        .iter()
        .any(|p| haystack.contains(&p.to_lowercase()))
        .then_some(ClassifiedStatus::Permission)
}

fn check_error(error_tail: &[&str]) -> bool {
    error_tail
        .iter()
        .any(|line| ERROR_PATTERNS.iter().any(|re| re.is_match(line)))
}

fn check_busy(haystack: &str, tail: &[&str]) -> bool {
    if ACTIVE_INDICATOR_LITERALS.iter().any(|p| haystack.contains(&p.to_lowercase())) {
        return true;
    }
    tail.iter().any(|line| {
        let trimmed = line.trim_start();
        EXECUTION_VERB_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
    })
}

fn check_waiting(haystack: &str) -> bool {
    WAITING_LITERALS.iter().any(|p| haystack.contains(p))
        || PLAN_APPROVAL_PATTERNS.iter().any(|re| re.is_match(haystack))
}

fn activity_from_tail(tail: &[&str]) -> String {
    tail.iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| clean_line(l))
        .unwrap_or_default()
}
