//! High-precision timestamps
//!
//! Timestamps are fixed-width, zero-padded RFC 3339 strings with microsecond
//! resolution (`2023-01-01T00:00:00.000000Z`), so lexicographic order equals
//! chronological order.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time as a high-precision timestamp string.
///
/// Successive calls within one process never return the same value, even when
/// the wall clock has not advanced by a full microsecond.
pub fn current_timestamp() -> String {
    let now = Utc::now().timestamp_micros();
    let previous = LAST_ISSUED_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or(now);
    let issued = if now > previous { now } else { previous + 1 };
    format_micros(issued)
}

/// Formats microseconds since the unix epoch
pub fn format_micros(micros: i64) -> String {
    match Utc.timestamp_micros(micros).single() {
        Some(dt) => format_timestamp(&dt),
        None => format_timestamp(&DateTime::<Utc>::UNIX_EPOCH),
    }
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp produced by [`current_timestamp`]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
