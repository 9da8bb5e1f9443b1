//! Helpers for text cleanup, date handling, and output-path checks.
//!
//! - Whitespace collapsing and XML-safe text for extracted fields
//! - Tolerant parsing of the date strings news sites print
//! - RFC 822 formatting for `pubDate`
//! - Early validation that the output location is writable

use crate::error::OutputError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:last\s+)?(?:published|posted|updated|modified)(?:\s+on)?\s*:?\s*").unwrap()
});
static ORDINAL_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());
static MERIDIEM_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b([ap])\.m\.").unwrap());
static ABBREV_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z]{3,4})\.").unwrap());
static TRAILING_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(?:ET|EST|EDT|CT|CST|CDT|MT|MST|MDT|PT|PST|PDT|UTC|GMT)$").unwrap());
static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+)\s+(minute|min|hour|hr|day|week)s?\s+ago$").unwrap()
});

const ZONED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S %z"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%A, %B %d, %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Drop control characters that XML 1.0 cannot carry (everything below
/// U+0020 except tab, newline and carriage return).
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes on a character boundary, with
/// an ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Format a timestamp for RSS `pubDate` / `lastBuildDate`.
pub fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.to_rfc2822()
}

/// Parse a publication date as printed by a site.
///
/// With `format`, only that strftime-style format is tried (with offset,
/// then as naive date-time, then as plain date). Without it a tolerant
/// parser handles RFC 2822, RFC 3339, ISO dates, long-form English dates,
/// US numeric dates, and "N hours ago". Naive values are taken as UTC.
/// Anything unparseable yields `None`.
pub fn parse_published(raw: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    parse_published_at(raw, format, Utc::now())
}

fn parse_published_at(raw: &str, format: Option<&str>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return None;
    }

    if let Some(fmt) = format {
        let parsed = parse_with_format(&text, fmt);
        if parsed.is_none() {
            debug!(%text, %fmt, "Date did not match configured format");
        }
        return parsed;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }

    let cleaned = normalize_date_text(&text);

    if let Some(caps) = RELATIVE.captures(&cleaned) {
        let amount: i64 = caps[1].parse().ok()?;
        let delta = match caps[2].to_ascii_lowercase().as_str() {
            "minute" | "min" => Duration::try_minutes(amount),
            "hour" | "hr" => Duration::try_hours(amount),
            "day" => Duration::try_days(amount),
            _ => Duration::try_weeks(amount),
        }?;
        return now.checked_sub_signed(delta);
    }

    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    debug!(%text, "Unrecognised date");
    None
}

fn parse_with_format(text: &str, fmt: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Strip the decorations sites wrap around dates ("Published:", ordinals,
/// "a.m.", abbreviation dots, "at", trailing US zone names).
fn normalize_date_text(text: &str) -> String {
    let s = DATE_PREFIX.replace(text, "");
    let s = ORDINAL_SUFFIX.replace_all(&s, "$1");
    let s = MERIDIEM_DOTS.replace_all(&s, "${1}m");
    let s = ABBREV_DOT.replace_all(&s, "$1");
    let s = TRAILING_ZONE.replace(&s, "");
    let s = s.replace(" at ", " ").replace("Sept ", "Sep ");
    collapse_whitespace(&s)
}

/// Make sure the directory that will hold `path` exists and is writable.
///
/// Creates missing parent directories, then writes and removes a probe file
/// so that a read-only destination is reported before any site is fetched.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let io_err = |source| OutputError::Io {
        path: dir.display().to_string(),
        source,
    };

    fs::create_dir_all(&dir).await.map_err(io_err)?;
    let probe = dir.join("..__probe_write__");
    fs::write(&probe, b"").await.map_err(io_err)?;
    let _ = fs::remove_file(&probe).await;
    info!("Output directory is writable");
    Ok(())
}
