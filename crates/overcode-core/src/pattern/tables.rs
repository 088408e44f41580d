//! Immutable pattern data consumed by [`super::classify`]. Declared as data,
//! not control flow, per the component's own rule.

/// Highest priority. Checked against a lowercased join of the tail window.
pub const PERMISSION_LITERALS: &[&str] = &[
    "enter to confirm",
    "esc to reject",
    "allow this",
    "do you want to proceed",
    "❯ 1. yes",
    "tell claude what to do differently",
];

/// A numbered permission option whose body asks for free text is flagged so
/// callers can auto-open a compose buffer on that key.
pub const FREE_TEXT_OPTION_REGEX: &str = r"(?i)tell\s+claude\s+what\s+to\s+do";

/// Lowercased substring match, tail window. Claude is actively working even
/// if a prompt happens to be visible underneath a stale redraw.
pub const ACTIVE_INDICATOR_LITERALS: &[&str] = &[
    "web search",
    "searching",
    "fetching",
    "esc to interrupt",
    "thinking",
    "✽",
    "razzmatazzing",
    "fiddle-faddling",
    "pondering",
    "cogitating",
];

/// Case-sensitive line prefixes. A tool is executing.
pub const EXECUTION_VERB_PREFIXES: &[&str] = &[
    "Reading",
    "Writing",
    "Editing",
    "Running",
    "Executing",
    "Searching",
    "Analyzing",
    "Processing",
    "Installing",
    "Building",
    "Compiling",
    "Testing",
    "Deploying",
];

/// Lowercased substring match, tail window.
pub const WAITING_LITERALS: &[&str] = &[
    "paused",
    "do you want",
    "proceed",
    "continue",
    "yes/no",
    "[y/n]",
    "press any key",
];

/// Plan/approval sub-patterns, checked against the same lowercased tail
/// window as [`WAITING_LITERALS`] but needing more than a plain substring
/// match.
pub const PLAN_APPROVAL_REGEXES: &[&str] = &[
    r"waiting for.*approval",
    r"plan mode",
    r"approve.*plan",
    r"select.*option",
    r"choose.*[1-4]",
    r"review the plan",
    r"approve this plan",
    r"plan requires approval",
];

/// Exact-match (after trim) prompt cursor glyphs.
pub const PROMPT_CHARS: &[&str] = &[">", "›", "❯"];

/// Stripped, in order, from the start of a line — first match only.
pub const LINE_PREFIXES: &[&str] = &["› ", "> ", "❯ ", "- ", "• "];

/// A line whose trimmed form starts with one of these is UI chrome, not
/// agent output.
pub const STATUS_BAR_PREFIXES: &[&str] = &["⏵⏵"];

/// `^\s*/[\w-]+\s{2,}\S` — the `/`-autocomplete menu Claude Code shows while
/// the user is mid-slash-command; excluded from "last meaningful line".
pub const COMMAND_MENU_REGEX: &str = r"^\s*/[\w-]+\s{2,}\S";

pub const SPAWN_FAILURE_LITERALS: &[&str] = &[
    "command not found",
    "not found:",
    "no such file or directory",
    "permission denied",
    "cannot execute",
    "is not recognized",
];

/// Case-sensitive regexes, checked per-line (not joined) against the last 3
/// meaningful lines. Deliberately narrow: prose that merely *discusses* an
/// error must not match.
pub const ERROR_REGEXES: &[&str] = &[
    r"⎿\s*API Error",
    r"⎿\s*TypeError",
    r"⎿\s*Unable to connect",
    r"⎿\s*Error:.*compaction",
    r"You've hit your limit",
    r"Invalid API key",
    r"Missing API key",
    r"Retrying in.*seconds.*attempt",
];

pub const BACKGROUND_BASH_COUNT_REGEX: &str = r"(\d+)\s+bashes";
pub const LIVE_SUBAGENT_COUNT_REGEX: &str = r"(\d+)\s+local\s+agents?";

pub const CLEAN_LINE_MAX_LENGTH: usize = 80;
/// How many trailing meaningful lines feed the joined lowercase haystack
/// used by the permission/busy/waiting literal checks.
pub const TAIL_WINDOW: usize = 5;
/// How many trailing meaningful lines are checked individually for
/// structural error lines.
pub const ERROR_TAIL_WINDOW: usize = 3;
