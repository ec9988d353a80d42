//! Text normalization helpers.
//!
//! Turns the loosely formatted dates and markup found on news pages into
//! timestamps and plain text. Nothing here fails: unusable input yields
//! `None`.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use scraper::Html;

/// Formats carrying an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Formats without offset; interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Swedish and English month names.
const MONTHS: &[(u32, &[&str])] = &[
    (1, &["januari", "january"]),
    (2, &["februari", "february"]),
    (3, &["mars", "march"]),
    (4, &["april"]),
    (5, &["maj", "may"]),
    (6, &["juni", "june"]),
    (7, &["juli", "july"]),
    (8, &["augusti", "august"]),
    (9, &["september", "sept"]),
    (10, &["oktober", "october"]),
    (11, &["november"]),
    (12, &["december"]),
];

static EMBEDDED_ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ](\d{1,2})[:.](\d{2})(?::(\d{2}))?(?:\.\d+)?(Z|[+-]\d{2}:?\d{2})?)?",
    )
    .expect("valid regex")
});

// "5 mars 2024", "5 mars 2024 kl. 10:00", "5. Mar. 2024"
static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\.?\s+(\p{L}+)\.?,?\s+(\d{4})(?:\D{1,8}?(\d{1,2})[:.](\d{2}))?")
        .expect("valid regex")
});

// "March 5, 2024", "Mar 5th 2024 10:00"
static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\p{L}+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})(?:\D{1,8}?(\d{1,2})[:.](\d{2}))?",
    )
    .expect("valid regex")
});

/// Parse free-form date text into a UTC timestamp.
///
/// Accepts ISO 8601 / RFC 3339 (as found in `datetime` attributes),
/// RFC 2822, common numeric formats and day/month-name/year display text
/// in Swedish or English. Text without an offset is taken as UTC.
///
/// # Examples
/// ```
/// use kommun_news::services::normalize::parse_date;
///
/// assert!(parse_date("2024-03-05T10:00:00").is_some());
/// assert!(parse_date("not a date").is_none());
/// ```
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    parse_structured(text)
        .or_else(|| parse_embedded_iso(text))
        .or_else(|| parse_month_name(text))
}

fn parse_structured(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    None
}

fn parse_embedded_iso(text: &str) -> Option<DateTime<Utc>> {
    let caps = EMBEDDED_ISO.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let (month, day) = (num(2)?, num(3)?);

    let with_time = build_naive(
        year,
        month,
        day,
        num(4).unwrap_or(0),
        num(5).unwrap_or(0),
        num(6).unwrap_or(0),
    );
    let Some(naive) = with_time else {
        return build_utc(year, month, day, 0, 0, 0);
    };

    match caps.get(7).and_then(|m| parse_offset(m.as_str())) {
        Some(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        None => Some(naive.and_utc()),
    }
}

/// Parse `Z`, `+HH:MM` or `+HHMM`.
fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match text.split_at_checked(1)? {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let digits = rest.replace(':', "");
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_month_name(text: &str) -> Option<DateTime<Utc>> {
    for caps in DAY_MONTH_YEAR.captures_iter(text) {
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        let day = caps[1].parse().ok()?;
        let year = caps[3].parse().ok()?;
        if let Some(dt) = build_with_time_or_midnight(year, month, day, &caps) {
            return Some(dt);
        }
    }

    for caps in MONTH_DAY_YEAR.captures_iter(text) {
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        if let Some(dt) = build_with_time_or_midnight(year, month, day, &caps) {
            return Some(dt);
        }
    }

    None
}

/// Digits after the date that are not a valid clock time (prices,
/// counts) leave the date at midnight.
fn build_with_time_or_midnight(
    year: i32,
    month: u32,
    day: u32,
    caps: &regex::Captures<'_>,
) -> Option<DateTime<Utc>> {
    let (hour, minute) = time_of_day(caps);
    build_utc(year, month, day, hour, minute, 0).or_else(|| build_utc(year, month, day, 0, 0, 0))
}

fn time_of_day(caps: &regex::Captures<'_>) -> (u32, u32) {
    let hour = caps.get(4).and_then(|m| m.as_str().parse().ok());
    let minute = caps.get(5).and_then(|m| m.as_str().parse().ok());
    match (hour, minute) {
        (Some(h), Some(m)) => (h, m),
        _ => (0, 0),
    }
}

/// Map a full or abbreviated (3+ letters) month name to its number.
fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.chars().count() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(_, names)| names.iter().any(|full| full.starts_with(name.as_str())))
        .map(|(number, _)| *number)
}

fn build_naive(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn build_utc(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<DateTime<Utc>> {
    build_naive(year, month, day, hour, minute, second).map(|naive| naive.and_utc())
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip markup and collapse whitespace.
///
/// Script and style contents are dropped. Returns `None` when nothing
/// readable is left.
pub fn html_to_text(markup: &str) -> Option<String> {
    if markup.trim().is_empty() {
        return None;
    }

    let fragment = Html::parse_fragment(markup);
    let mut parts: Vec<&str> = Vec::new();
    for node in fragment.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_code = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style"));
        if !in_code {
            parts.push(&**text);
        }
    }

    let text = collapse_whitespace(&parts.join(" "));
    (!text.is_empty()).then_some(text)
}
