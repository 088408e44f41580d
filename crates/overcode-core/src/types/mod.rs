pub mod activity;
pub mod hook_event;
pub mod monitor_state;
pub mod session;

pub use activity::{ActivityStatus, ClassifiedStatus, LifecycleStatus};
pub use hook_event::{HookEvent, HookEventKind, HOOK_EVENT_STALE_SECONDS};
pub use monitor_state::{GitDiffStat, MonitorState, MonitorSummary, PresenceInfo, SessionSnapshot, MONITOR_STATE_VERSION};
pub use session::{
    OversightPolicy, PermissivenessMode, Report, ReportStatus, Session, SessionStats,
    MAX_SESSION_DEPTH, OPERATION_TIMES_CAPACITY,
};
