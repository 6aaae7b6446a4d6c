//! Date parsing for model-supplied dates.
//!
//! Three tiers: strict ISO forms, then a lenient parser for the looser
//! shapes models tend to produce ("June 1st, 2025", "in 3 weeks",
//! "12/31/2025"), then an optional fallback horizon chosen by the caller.
//! Date-only values resolve to midnight UTC.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc,
    Weekday,
};
use regex::Regex;
use serde_json::Value;

use strategist_core::types::Timestamp;

/// Which tier produced a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Strict,
    Lenient,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: Timestamp,
    pub source: DateSource,
}

impl ResolvedDate {
    pub fn fell_back(&self) -> bool {
        self.source == DateSource::Fallback
    }
}

const STRICT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

// US order is tried before EU order, so "03/04/2025" is March 4th.
const LENIENT_DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%d/%m/%y",
    "%B %d %Y",
    "%d %B %Y",
    "%Y %B %d",
];

// `%Y` accepts any digit count, so "03/04/25" would otherwise land in year 25.
const MIN_YEAR: i32 = 1900;

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap());
static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:in\s+)?(\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+(day|week|month|year)s?(?:\s+from\s+(?:now|today))?$",
    )
    .unwrap()
});
static NEXT_UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^next\s+(week|month|year)$").unwrap());
static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:next\s+|this\s+|on\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)$",
    )
    .unwrap()
});
static END_OF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:by\s+)?(?:the\s+)?end\s+of\s+(?:the\s+|this\s+)?(week|month|year)$")
        .unwrap()
});

/// Strict ISO forms: `YYYY-MM-DD`, RFC 3339, `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_strict(input: &str) -> Option<Timestamp> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in STRICT_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .map(midnight)
}

/// Looser absolute and relative forms, resolved against `now`.
pub fn parse_lenient(input: &str, now: Timestamp) -> Option<Timestamp> {
    let cleaned = normalize(input);
    if cleaned.is_empty() {
        return None;
    }
    parse_relative(&cleaned, now).or_else(|| parse_absolute(&cleaned, now))
}

/// Strict, then lenient.
pub fn parse_date(input: &str, now: Timestamp) -> Option<ResolvedDate> {
    if let Some(date) = parse_strict(input) {
        return Some(ResolvedDate {
            date,
            source: DateSource::Strict,
        });
    }
    parse_lenient(input, now).map(|date| ResolvedDate {
        date,
        source: DateSource::Lenient,
    })
}

/// Parse a JSON date value. Only strings carry dates.
pub fn parse_value(value: &Value, now: Timestamp) -> Option<ResolvedDate> {
    value.as_str().and_then(|s| parse_date(s, now))
}

/// Parse a JSON date value, falling back to `now + fallback_days`.
pub fn resolve_or_fallback(value: &Value, now: Timestamp, fallback_days: i64) -> ResolvedDate {
    parse_value(value, now).unwrap_or(ResolvedDate {
        date: fallback_date(now, fallback_days),
        source: DateSource::Fallback,
    })
}

/// Midnight UTC, `days` after the day of `now`.
///
/// Saturates at the last representable date instead of overflowing.
pub fn fallback_date(now: Timestamp, days: i64) -> Timestamp {
    let today = now.date_naive();
    let date = Duration::try_days(days)
        .and_then(|offset| today.checked_add_signed(offset))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX });
    midnight(date)
}

fn midnight(date: NaiveDate) -> Timestamp {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn normalize(input: &str) -> String {
    let without_ordinals = ORDINAL_RE.replace_all(input.trim(), "$1");
    without_ordinals
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_relative(input: &str, now: Timestamp) -> Option<Timestamp> {
    let today = now.date_naive();
    match input.to_ascii_lowercase().as_str() {
        "today" | "now" => return Some(midnight(today)),
        "tomorrow" => return today.succ_opt().map(midnight),
        _ => {}
    }

    if let Some(caps) = RELATIVE_RE.captures(input) {
        let amount = word_to_number(&caps[1])?;
        return add_units(today, amount, &caps[2].to_ascii_lowercase()).map(midnight);
    }

    if let Some(caps) = NEXT_UNIT_RE.captures(input) {
        return add_units(today, 1, &caps[1].to_ascii_lowercase()).map(midnight);
    }

    if let Some(caps) = WEEKDAY_RE.captures(input) {
        let target: Weekday = caps[1].parse().ok()?;
        let current = today.weekday().num_days_from_monday() as i64;
        let wanted = target.num_days_from_monday() as i64;
        let mut ahead = (wanted - current).rem_euclid(7);
        if ahead == 0 {
            ahead = 7;
        }
        return today.checked_add_signed(Duration::days(ahead)).map(midnight);
    }

    if let Some(caps) = END_OF_RE.captures(input) {
        let date = match caps[1].to_ascii_lowercase().as_str() {
            "week" => {
                let to_sunday = 6 - today.weekday().num_days_from_monday() as i64;
                today.checked_add_signed(Duration::days(to_sunday))?
            }
            "month" => {
                let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
                first.checked_add_months(Months::new(1))?.pred_opt()?
            }
            _ => NaiveDate::from_ymd_opt(today.year(), 12, 31)?,
        };
        return Some(midnight(date));
    }

    None
}

fn parse_absolute(input: &str, now: Timestamp) -> Option<Timestamp> {
    let parse = |text: &str, format: &str| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .filter(|date| date.year() >= MIN_YEAR)
    };

    for format in LENIENT_DATE_FORMATS {
        if let Some(date) = parse(input, format) {
            return Some(midnight(date));
        }
    }

    // "June 2025" -> first of the month.
    if let Some(date) = parse(&format!("1 {}", input), "%d %B %Y") {
        return Some(midnight(date));
    }

    // "June 15" -> next occurrence.
    let today = now.date_naive();
    for format in ["%B %d %Y", "%d %B %Y"] {
        if let Some(date) = parse(&format!("{} {}", input, today.year()), format) {
            let date = if date < today {
                date.with_year(today.year() + 1)?
            } else {
                date
            };
            return Some(midnight(date));
        }
    }

    None
}

fn add_units(date: NaiveDate, amount: u32, unit: &str) -> Option<NaiveDate> {
    match unit {
        "day" => date.checked_add_days(Days::new(amount.into())),
        "week" => date.checked_add_days(Days::new(u64::from(amount) * 7)),
        "month" => date.checked_add_months(Months::new(amount)),
        "year" => date.checked_add_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

fn word_to_number(word: &str) -> Option<u32> {
    let n = match word.to_ascii_lowercase().as_str() {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    Some(n)
}
