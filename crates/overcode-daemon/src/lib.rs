//! Session Store, detectors, and the Monitor Loop: the stateful core that
//! binds `overcode-core`'s pure logic to a concrete `PaneController` and
//! filesystem.

pub mod budget;
pub mod control;
pub mod detect;
pub mod error;
pub mod follow;
pub mod fs;
pub mod heartbeat;
pub mod history;
pub mod launcher;
pub mod lock;
pub mod monitor_loop;
pub mod oversight;
pub mod paths;
pub mod signal;
pub mod store;
pub mod transcript;
pub mod vcs;

pub use error::DaemonError;
pub use monitor_loop::{permissiveness_emoji, status_color, status_emoji};
pub use store::SessionStore;
