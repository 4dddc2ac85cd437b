//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Next persisted-at timestamp after `previous`
///
/// Returns the current time unless that would not be strictly later than
/// `previous` (same clock tick, or a clock that stepped backwards), in which
/// case `previous + 1µs` is used. Successive calls therefore never repeat a
/// value, which keeps `saved_at` monotonically increasing across a batch.
pub fn next_saved_at(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let current = now();
    match previous {
        Some(prev) if current <= prev => prev + Duration::microseconds(1),
        _ => current,
    }
}
