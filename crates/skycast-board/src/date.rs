//! Date normalization and English display formats.
//!
//! Record dates are free text. Loosely padded `Y-M-D` strings are
//! canonicalized before parsing, and anything that still does not parse is
//! shown verbatim.

use chrono::NaiveDate;

/// Pad month and day of a three-part `Y-M-D` string to two digits.
///
/// Input with any other number of `-` separated parts is returned unchanged.
pub fn normalize_date(s: &str) -> String {
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month, day] => format!("{}-{:0>2}-{:0>2}", year, month, day),
        _ => s.to_string(),
    }
}

/// Parse a record date as a local calendar date.
pub fn parse_local_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&normalize_date(s.trim()), "%Y-%m-%d").ok()
}

/// `Saturday, February 14, 2026`
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// `Feb 14`
pub fn short_date(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

fn short_label(s: &str) -> String {
    parse_local_date(s)
        .map(short_date)
        .unwrap_or_else(|| s.to_string())
}

/// Card date label: `Feb 14`, or `Feb 14 - Feb 16` when an end date is set.
pub fn date_label(date: &str, to_date: Option<&str>) -> String {
    let start = short_label(date);
    match to_date.map(str::trim).filter(|s| !s.is_empty()) {
        Some(end) => format!("{} - {}", start, short_label(end)),
        None => start,
    }
}
