//! Resolution of an event's `[start, end)` from extracted fragments.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::debug;

use super::parse::{extract_date_from_text, localize, parse_datetime, parse_duration, parse_time_only, resolve_date};
use super::range::{infer_at, infer_by, infer_explicit_range};

/// Duration used when neither an end nor a duration is given.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Why a window could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalError {
    #[error("I need a date plus a start time and either an end time or a duration.")]
    MissingDate,

    #[error(
        "I need a concrete start time and duration (or end time) to create the event. \
         Please provide a start time and either an end time or a duration."
    )]
    MissingTime,

    #[error("I couldn't understand the start time '{0}'. Please use a format like '14:00' or '2pm'.")]
    InvalidStart(String),

    #[error("I couldn't understand the end time '{0}'. Please use a format like '15:00' or '3pm'.")]
    InvalidEnd(String),

    #[error("I couldn't understand the duration '{0}'. Please use a format like '90 minutes' or '1.5 hours'.")]
    InvalidDuration(String),
}

/// Date and time fragments for one event.
#[derive(Debug, Clone, Default)]
pub struct WindowRequest<'a> {
    /// The user's raw text, used for range and date inference.
    pub text: &'a str,
    pub date: Option<&'a str>,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub duration: Option<&'a str>,
}

/// A resolved event window in the caller's timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ResolvedWindow {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

enum Point {
    /// A full date-time from the extractor.
    Absolute(DateTime<FixedOffset>),
    /// A time of day still needing a date.
    TimeOfDay(NaiveTime),
}

fn parse_point(value: &str, tz: Tz) -> Option<Point> {
    if let Some(dt) = parse_datetime(value, tz) {
        return Some(Point::Absolute(dt));
    }
    parse_time_only(value).map(Point::TimeOfDay)
}

fn on_date(point: Point, date: Option<NaiveDate>, tz: Tz) -> Option<DateTime<Tz>> {
    match point {
        // The natural-language date wins over the model's date; the
        // time of day and offset are kept.
        Point::Absolute(dt) => match date {
            Some(d) if dt.date_naive() != d => {
                let naive = d.and_time(dt.time());
                let snapped = naive.and_local_timezone(*dt.offset()).single()?;
                Some(snapped.with_timezone(&tz))
            }
            _ => Some(dt.with_timezone(&tz)),
        },
        Point::TimeOfDay(t) => localize(tz, date?.and_time(t)),
    }
}

/// Resolve a request into an absolute window.
///
/// Precedence for start/end tokens: an explicit range in the text, then the
/// extractor's values, then `by A`, then `at A`. A natural-language date in
/// the text beats the extractor's date. A missing end is `start + duration`
/// (60 minutes by default); a missing start is `end - duration`. An end whose
/// time of day is not after the start's moves to the next day.
pub fn resolve_window(request: &WindowRequest<'_>, now: DateTime<Tz>) -> Result<ResolvedWindow, TemporalError> {
    let tz = now.timezone();
    let today = now.date_naive();

    let duration = match request.duration.map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(parse_duration(raw).ok_or_else(|| TemporalError::InvalidDuration(raw.to_string()))?),
        None => None,
    };

    let mut start_token = request.start.map(str::to_string).filter(|s| !s.trim().is_empty());
    let mut end_token = request.end.map(str::to_string).filter(|s| !s.trim().is_empty());

    // A date field that is really a date-time can stand in for the start.
    if start_token.is_none() {
        if let Some(date) = request.date {
            if parse_datetime(date, tz).is_some() {
                start_token = Some(date.to_string());
            }
        }
    }

    if let Some(hint) = infer_explicit_range(request.text) {
        debug!(pattern = ?hint.pattern, "TEMPORAL_RANGE_FROM_TEXT");
        start_token = hint.start;
        end_token = hint.end;
    } else if start_token.is_none() || end_token.is_none() {
        if let Some(hint) = infer_by(request.text, duration.is_some()) {
            debug!(pattern = ?hint.pattern, "TEMPORAL_BY_FROM_TEXT");
            if hint.start.is_some() && start_token.is_none() {
                start_token = hint.start;
            }
            if hint.end.is_some() && end_token.is_none() {
                end_token = hint.end;
            }
        }
    }
    if start_token.is_none() {
        if let Some(hint) = infer_at(request.text) {
            debug!(pattern = ?hint.pattern, "TEMPORAL_AT_FROM_TEXT");
            start_token = hint.start;
        }
    }

    let text_date = extract_date_from_text(request.text, today);
    let model_date = request
        .date
        .and_then(|d| resolve_date(d, today).or_else(|| parse_datetime(d, tz).map(|dt| dt.date_naive())));
    let date = text_date.or(model_date);

    let start_point = match &start_token {
        Some(token) => Some(parse_point(token, tz).ok_or_else(|| TemporalError::InvalidStart(token.clone()))?),
        None => None,
    };
    let end_point = match &end_token {
        Some(token) => Some(parse_point(token, tz).ok_or_else(|| TemporalError::InvalidEnd(token.clone()))?),
        None => None,
    };

    let needs_date = matches!(start_point, Some(Point::TimeOfDay(_))) || matches!(end_point, Some(Point::TimeOfDay(_)));
    if needs_date && date.is_none() {
        return Err(TemporalError::MissingDate);
    }

    let mut start = start_point.and_then(|p| on_date(p, date, tz));
    let mut end = end_point.and_then(|p| on_date(p, date, tz));
    let length = duration.unwrap_or_else(|| Duration::minutes(DEFAULT_DURATION_MINUTES));

    match (start, end) {
        (Some(s), None) => end = Some(s + length),
        (None, Some(e)) => start = Some(e - length),
        (None, None) => {
            return Err(if date.is_some() {
                TemporalError::MissingTime
            } else {
                TemporalError::MissingDate
            })
        }
        (Some(_), Some(_)) => {}
    }

    let (Some(start), Some(mut end)) = (start, end) else {
        return Err(TemporalError::MissingTime);
    };

    if end <= start {
        let next_day = localize(tz, (end.date_naive() + Duration::days(1)).and_time(end.time()));
        end = match next_day {
            Some(moved) if moved > start => moved,
            _ => start + length,
        };
    }

    Ok(ResolvedWindow { start, end })
}
