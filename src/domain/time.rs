//! Timestamp normalization.
//!
//! Chart time is unix seconds (UTC). Input tables carry either integer epoch
//! values (seconds or milliseconds) or calendar strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Integer epochs with at least this many digits are treated as milliseconds.
const MILLIS_DIGITS: usize = 13;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a timestamp cell into unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(n) = s.parse::<i64>() {
        return Some(normalize_epoch(n));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn is_millis(n: i64) -> bool {
    n.unsigned_abs().to_string().len() >= MILLIS_DIGITS
}

/// Millisecond epochs are truncated to whole seconds.
pub fn normalize_epoch(n: i64) -> i64 {
    if is_millis(n) { n / 1000 } else { n }
}

/// Whether `raw` is an integer epoch in milliseconds.
pub fn is_epoch_millis(raw: &str) -> bool {
    raw.trim().parse::<i64>().is_ok_and(is_millis)
}

/// Render unix seconds for console output.
pub fn display_timestamp(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}
