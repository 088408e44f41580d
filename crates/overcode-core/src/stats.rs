//! Stats Accumulator — pure time accumulation and cost computation.
//! No I/O; the Monitor Loop owns reading/writing the underlying `Session`.

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::types::ActivityStatus;

/// Minimum heartbeat frequency, shared by the `Ns|Nm|Nh|N` parser and the
/// `Session` invariant.
pub const MIN_HEARTBEAT_FREQUENCY_SECONDS: u64 = 30;

/// The previous tick's accumulated state, as read off a `Session`.
#[derive(Debug, Clone, Copy)]
pub struct TimeAccumulatorInput {
    pub previous_status: ActivityStatus,
    pub state_since: DateTime<Utc>,
    pub green_time_seconds: f64,
    pub non_green_time_seconds: f64,
    pub sleep_time_seconds: f64,
    /// `None` only on the very first tick after a session is created or the
    /// daemon restarts without a prior `last_time_accumulation`.
    pub last_tick: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAccumulatorOutput {
    pub green_time_seconds: f64,
    pub non_green_time_seconds: f64,
    pub sleep_time_seconds: f64,
    pub state_since: DateTime<Utc>,
    pub last_tick: DateTime<Utc>,
    /// Set when the drift cap fired and totals were reset to zero.
    pub capped_and_reset: bool,
}

/// Time accumulation rules, including the terminated-freezes-accumulation
/// and drift-cap behaviors.
pub fn accumulate_time(
    input: TimeAccumulatorInput,
    new_status: ActivityStatus,
    now: DateTime<Utc>,
) -> TimeAccumulatorOutput {
    let last_tick = input.last_tick.unwrap_or(input.start_time);

    let elapsed = (now - last_tick).num_milliseconds() as f64 / 1000.0;

    let mut green = input.green_time_seconds;
    let mut non_green = input.non_green_time_seconds;
    let mut sleep = input.sleep_time_seconds;

    if elapsed > 0.0 && !input.previous_status.is_terminated() {
        if input.previous_status.is_asleep() {
            sleep += elapsed;
        } else if input.previous_status.is_green() {
            green += elapsed;
        } else {
            non_green += elapsed;
        }
    }

    let uptime = (now - input.start_time).num_milliseconds() as f64 / 1000.0;
    let mut capped_and_reset = false;
    if green + non_green + sleep > uptime {
        green = 0.0;
        non_green = 0.0;
        sleep = 0.0;
        capped_and_reset = true;
    }

    let state_since = if input.previous_status != new_status {
        now
    } else {
        input.state_since
    };

    TimeAccumulatorOutput {
        green_time_seconds: green,
        non_green_time_seconds: non_green,
        sleep_time_seconds: sleep,
        state_since,
        last_tick: now,
        capped_and_reset,
    }
}

/// Token unit prices, USD per token (configuration supplies these as
/// per-million-token prices divided down — see `overcode_core::config`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPrices {
    pub input_usd_per_token: f64,
    pub output_usd_per_token: f64,
    pub cache_write_usd_per_token: f64,
    pub cache_read_usd_per_token: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

pub fn compute_cost_usd(tokens: TokenCounts, prices: TokenPrices) -> f64 {
    tokens.input_tokens as f64 * prices.input_usd_per_token
        + tokens.output_tokens as f64 * prices.output_usd_per_token
        + tokens.cache_creation_tokens as f64 * prices.cache_write_usd_per_token
        + tokens.cache_read_tokens as f64 * prices.cache_read_usd_per_token
}

/// Parses `Ns|Nm|Nh|N` (bare form is seconds) into a second count.
/// Rejects anything below [`MIN_HEARTBEAT_FREQUENCY_SECONDS`].
pub fn parse_frequency_seconds(input: &str) -> Result<u64, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidFrequency(input.to_string()));
    }

    let (digits, multiplier) = match trimmed.chars().last() {
        Some('s') => (&trimmed[..trimmed.len() - 1], 1u64),
        Some('m') => (&trimmed[..trimmed.len() - 1], 60u64),
        Some('h') => (&trimmed[..trimmed.len() - 1], 3600u64),
        Some(c) if c.is_ascii_digit() => (trimmed, 1u64),
        _ => return Err(CoreError::InvalidFrequency(input.to_string())),
    };

    let n: u64 = digits
        .parse()
        .map_err(|_| CoreError::InvalidFrequency(input.to_string()))?;
    let seconds = n
        .checked_mul(multiplier)
        .ok_or_else(|| CoreError::InvalidFrequency(input.to_string()))?;

    if seconds < MIN_HEARTBEAT_FREQUENCY_SECONDS {
        return Err(CoreError::InvalidFrequency(input.to_string()));
    }
    Ok(seconds)
}

/// Canonical formatting used for round-tripping: whole hours as `Nh`,
/// whole minutes as `Nm`, else bare seconds.
pub fn format_frequency_seconds(seconds: u64) -> String {
    if seconds % 3600 == 0 && seconds / 3600 > 0 {
        format!("{}h", seconds / 3600)
    } else if seconds % 60 == 0 && seconds / 60 > 0 {
        format!("{}m", seconds / 60)
    } else {
        seconds.to_string()
    }
}
