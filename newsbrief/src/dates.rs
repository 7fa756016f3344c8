//! Publication date extraction for feed entries.
//!
//! Feeds disagree wildly on date fields and formats, so an entry's timestamp
//! comes from the first strategy in [`STRATEGIES`] that yields a value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::ingestion::RawEntry;

type DateStrategy = fn(&RawEntry) -> Option<DateTime<Utc>>;

/// Ordered date strategies: free-form strings first, then pre-parsed values.
pub const STRATEGIES: [(&str, DateStrategy); 5] = [
    ("published", published_str),
    ("updated", updated_str),
    ("created", created_str),
    ("published_parsed", published_parsed),
    ("updated_parsed", updated_parsed),
];

fn published_str(e: &RawEntry) -> Option<DateTime<Utc>> {
    e.published.as_deref().and_then(parse_loose)
}

fn updated_str(e: &RawEntry) -> Option<DateTime<Utc>> {
    e.updated.as_deref().and_then(parse_loose)
}

fn created_str(e: &RawEntry) -> Option<DateTime<Utc>> {
    e.created.as_deref().and_then(parse_loose)
}

fn published_parsed(e: &RawEntry) -> Option<DateTime<Utc>> {
    e.published_parsed
}

fn updated_parsed(e: &RawEntry) -> Option<DateTime<Utc>> {
    e.updated_parsed
}

/// Timestamp of an entry, or `None` when every strategy fails.
pub fn entry_timestamp(entry: &RawEntry) -> Option<DateTime<Utc>> {
    STRATEGIES.iter().find_map(|(_, strategy)| strategy(entry))
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

// Timestamps without an offset are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%B %d, %Y", "%b %d, %Y", "%Y/%m/%d"];

/// Permissive date parser for feed date strings.
pub fn parse_loose(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // "GMT"/"UTC" suffixes on otherwise naive stamps
    let s = s
        .strip_suffix(" GMT")
        .or_else(|| s.strip_suffix(" UTC"))
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s);

    OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}
