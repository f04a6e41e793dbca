//! Text, date and URL normalization for scraped markup.
//!
//! Everything here is pure: no I/O, no panics on bad input.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// "2023年5月" / "5 月" -> "2023-5-"
static YEAR_MONTH_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s*[年月]\s*").unwrap());
static DAY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s*[日号]").unwrap());
static CJK_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x{4e00}-\x{9fa5}]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&[a-zA-Z]+;").unwrap());

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Parse a localized, possibly decorated date string into a calendar date.
///
/// Year/month markers become `-`, day markers are dropped and any remaining
/// descriptive CJK text (labels such as "成立日期") is stripped before the
/// cleaned string is tried against a list of common layouts.
/// Returns `None` when nothing matches.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.trim().is_empty() {
        return None;
    }

    let cleaned = YEAR_MONTH_MARKER.replace_all(text, "${1}-");
    let cleaned = DAY_MARKER.replace_all(&cleaned, "${1}");
    let cleaned = CJK_TEXT.replace_all(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim_matches(|c: char| !c.is_ascii_alphanumeric());

    let parsed = parse_free_text(cleaned);
    if parsed.is_none() {
        debug!("Failed to parse date '{}' (cleaned: '{}')", text, cleaned);
    }
    parsed
}

fn parse_free_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s[0..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(date);
    }

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Collapse whitespace runs, trim the ends and drop raw HTML entity tokens.
pub fn clean_text(text: &str) -> String {
    let without_entities = HTML_ENTITY.replace_all(text, " ");
    WHITESPACE
        .replace_all(&without_entities, " ")
        .trim()
        .to_string()
}

/// Ensure the URL carries a scheme and drop a single trailing slash.
pub fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let mut normalized = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    if normalized.ends_with('/') {
        normalized.pop();
    }
    Some(normalized)
}
