//! Clock — the wall-clock half of the interfaces module. Abstracted so
//! Monitor Loop logic can be driven by a `FakeClock` in tests instead of
//! `Utc::now()`.

use chrono::{DateTime, Utc};
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// A monotonic instant, immune to wall-clock adjustments (NTP, DST).
    /// Used for cadence bookkeeping (the "once every 10s" / "once every
    /// 60s" tick gates), never for anything persisted.
    fn monotonic_now(&self) -> Instant;
}

/// The real clock, backed by `Utc::now()` / `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}
