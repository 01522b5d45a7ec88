use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use super::utils::clean_str;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %I:%M:%S %p",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse an incident timestamp into naive microseconds since the epoch.
///
/// Offsets (RFC 3339) are converted to UTC; date-only values land on midnight.
/// Returns None for empty or unrecognised input.
pub fn parse_timestamp_micros(s: &str) -> Option<i64> {
    let s = clean_str(s);
    if s.is_empty() {
        return None;
    }
    parse_naive(s).map(|ts| ts.and_utc().timestamp_micros())
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    // date-only fast path: "YYYY-MM-DD" / "YYYY/MM/DD"
    if s.len() == 10 && s.as_bytes()[4] == s.as_bytes()[7] {
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return d.and_hms_opt(0, 0, 0);
            }
        }
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Truncate naive microseconds to the first day of their month, 00:00:00.
pub fn month_start_micros(micros: i64) -> Option<i64> {
    let ts = DateTime::from_timestamp_micros(micros)?.naive_utc();
    let first = ts.date().with_day0(0)?;
    Some(first.and_hms_opt(0, 0, 0)?.and_utc().timestamp_micros())
}
