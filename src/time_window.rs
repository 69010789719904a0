//! Arrival-window and job-window construction from free-form sheet text.
//!
//! All instants are naive local timestamps at second precision. Two output
//! encodings exist and fields of the scheduling document use them
//! deliberately: job windows use [`format_zulu`] (`...:SSZ`), arrival windows
//! use [`format_zulu_millis`] (`...:SS.000Z`).

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use thiserror::Error;

/// Job durations must stay below 30 days.
pub const MAX_JOB_MINUTES: i64 = 24 * 60 * 30;

/// Day zero of spreadsheet date serials.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const SECONDS_PER_DAY: f64 = 86_400.0;

static TIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}(?::\d{2})?").expect("valid regex"));

static BOUNDED_TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2}):(\d{2})(?::(\d{2}))?\b").expect("valid regex")
});

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[./-](\d{1,2})[./-](\d{2,4})").expect("valid regex")
});

static YMD_HMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[ T](\d{2}):(\d{2})(?::(\d{2}))?$").expect("valid regex")
});

static DMY_HMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[./-](\d{1,2})[./-](\d{4})\s+(\d{1,2}):(\d{2})(?::(\d{2}))?$")
        .expect("valid regex")
});

static YMD_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"));

static DMY_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[./-](\d{1,2})[./-](\d{4})$").expect("valid regex"));

/// Formats tried, in order, when no explicit job-start form matched.
const PERMISSIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H.%M",
    "%d.%m.%y %H:%M:%S",
    "%d.%m.%y %H:%M",
    "%d/%m/%y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const PERMISSIVE_DATE_FORMATS: &[&str] = &["%d.%m.%y", "%d/%m/%y", "%Y/%m/%d", "%Y.%m.%d"];

/// Half-open `[start, end)` interval between two naive instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeBuildError {
    #[error("duration out of range: {0} minutes")]
    DurationOutOfRange(i64),
    #[error("job window leaves the representable time range")]
    Overflow,
}

/// Parse an arrival window such as `"11.03.2025 08:00-10:00"`.
///
/// Unicode dashes and non-breaking spaces are normalized, and two time tokens
/// written back to back (`"15:00:0017:00:00"`) are split before parsing.
/// Returns `None` when the date does not parse, fewer than two time tokens are
/// present, or the window is empty.
pub fn parse_arrival_window(raw: &str) -> Option<TimeWindow> {
    let text = separate_jammed_times(&normalize_dashes(raw));

    let date_caps = DATE_TOKEN.captures(&text)?;
    let date = day_first_date(
        number(&date_caps, 1)?,
        number(&date_caps, 2)?,
        expand_year(date_caps.get(3)?.as_str())?,
    )?;

    let mut times = BOUNDED_TIME_TOKEN.captures_iter(&text);
    let start = clock_time(&times.next()?)?;
    let end = clock_time(&times.next()?)?;

    let window = TimeWindow {
        start: date.and_time(start),
        end: date.and_time(end),
    };
    (window.start < window.end).then_some(window)
}

/// Parse a job-start cell.
///
/// Forms are tried in a fixed order: spreadsheet serial number, ISO-like
/// `YYYY-MM-DD[ T]HH:MM[:SS]`, day-first `DD.MM.YYYY HH:MM[:SS]`, the two
/// date-only variants (midnight), then a permissive day-first fallback. A value
/// that matches an explicit form but names an impossible date is rejected
/// rather than reinterpreted. Text with an offset is folded into UTC, as in
/// [`parse_document_instant`].
pub fn parse_job_start(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(serial) = s.parse::<f64>() {
        return from_serial(serial);
    }

    if let Some(caps) = YMD_HMS.captures(s) {
        let date = NaiveDate::from_ymd_opt(number(&caps, 1)?, number(&caps, 2)?, number(&caps, 3)?)?;
        return Some(date.and_time(hms(&caps, 4)?));
    }

    if let Some(caps) = DMY_HMS.captures(s) {
        let date = NaiveDate::from_ymd_opt(number(&caps, 3)?, number(&caps, 2)?, number(&caps, 1)?)?;
        return Some(date.and_time(hms(&caps, 4)?));
    }

    if let Some(caps) = YMD_ONLY.captures(s) {
        let date = NaiveDate::from_ymd_opt(number(&caps, 1)?, number(&caps, 2)?, number(&caps, 3)?)?;
        return Some(date.and_time(NaiveTime::MIN));
    }

    if let Some(caps) = DMY_ONLY.captures(s) {
        let date = NaiveDate::from_ymd_opt(number(&caps, 3)?, number(&caps, 2)?, number(&caps, 1)?)?;
        return Some(date.and_time(NaiveTime::MIN));
    }

    parse_permissive(s)
}

/// Execution window for a job of `minutes` length.
///
/// With a job start the window ends there; otherwise it opens at the start of
/// the arrival window.
pub fn build_job_window(
    job_start: Option<NaiveDateTime>,
    arrival_start: NaiveDateTime,
    minutes: i64,
) -> Result<TimeWindow, TimeBuildError> {
    if minutes <= 0 || minutes >= MAX_JOB_MINUTES {
        return Err(TimeBuildError::DurationOutOfRange(minutes));
    }
    let length = Duration::try_minutes(minutes).ok_or(TimeBuildError::Overflow)?;

    match job_start {
        Some(end) => Ok(TimeWindow {
            start: end.checked_sub_signed(length).ok_or(TimeBuildError::Overflow)?,
            end,
        }),
        None => Ok(TimeWindow {
            start: arrival_start,
            end: arrival_start
                .checked_add_signed(length)
                .ok_or(TimeBuildError::Overflow)?,
        }),
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ`, used for job windows.
pub fn format_zulu(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// `YYYY-MM-DDTHH:MM:SS.000Z`, used for arrival windows.
pub fn format_zulu_millis(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// `YYYY-MM-DDTHH:MM:SS`, used for the planning horizon and work times.
pub fn format_local(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Read back a timestamp from an optimizer document or result.
///
/// Offsets are folded into UTC; naive text is taken as written.
pub fn parse_document_instant(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(aware) = DateTime::parse_from_rfc3339(s) {
        return Some(aware.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn normalize_dashes(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}' => '-',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Insert `-` between time tokens separated by nothing but whitespace.
fn separate_jammed_times(text: &str) -> String {
    let tokens: Vec<_> = TIME_TOKEN.find_iter(text).collect();
    let mut out = String::with_capacity(text.len() + tokens.len());
    let mut cursor = 0;

    for pair in tokens.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let gap = &text[current.end()..next.start()];
        if gap.trim().is_empty() {
            out.push_str(&text[cursor..current.end()]);
            out.push('-');
            cursor = next.start();
        }
    }
    out.push_str(&text[cursor..]);
    out
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

fn hms(caps: &Captures<'_>, first_group: usize) -> Option<NaiveTime> {
    let seconds = match caps.get(first_group + 2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(
        number(caps, first_group)?,
        number(caps, first_group + 1)?,
        seconds,
    )
}

fn clock_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    hms(caps, 1)
}

fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    Some(if text.len() == 2 { 2000 + year } else { year })
}

/// Day-first date, swapping day and month when the month slot cannot be a month.
fn day_first_date(day: u32, month: u32, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| {
        if month > 12 {
            NaiveDate::from_ymd_opt(year, day, month)
        } else {
            None
        }
    })
}

fn from_serial(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() {
        return None;
    }
    let seconds = (days * SECONDS_PER_DAY).round();
    if seconds.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_time(NaiveTime::MIN);
    epoch.checked_add_signed(Duration::try_seconds(seconds as i64)?)
}

fn parse_permissive(s: &str) -> Option<NaiveDateTime> {
    if let Ok(aware) = DateTime::parse_from_rfc3339(s) {
        return Some(aware.naive_utc());
    }
    PERMISSIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            PERMISSIVE_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}
