//! Event matching: narrowing provider results to the event a request means.

use calendar::{CalendarError, CalendarEvent, CalendarProvider};
use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::temporal::{parse_datetime, parse_time_only};

/// Minutes of slack allowed when matching a time of day.
pub const TIME_TOLERANCE_MINUTES: u32 = 15;

/// What to look for among listed events.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    /// Case-insensitive title substring.
    pub title: Option<String>,
    /// Local time of day of the event start.
    pub time: Option<NaiveTime>,
    /// 1-based ordinal among the sorted candidates.
    pub match_index: Option<usize>,
}

/// Result of matching.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    NotFound,
    Single(CalendarEvent),
    Multiple(Vec<CalendarEvent>),
}

/// Parse a time-of-day filter. Full date-times contribute their local time.
pub fn parse_filter_time(value: &str, tz: Tz) -> Option<NaiveTime> {
    parse_time_only(value).or_else(|| parse_datetime(value, tz).map(|dt| dt.with_timezone(&tz).time()))
}

fn title_matches(event: &CalendarEvent, title: &str) -> bool {
    event.summary.to_lowercase().contains(&title.trim().to_lowercase())
}

fn time_matches(event: &CalendarEvent, time: NaiveTime, tz: Tz) -> bool {
    match event.start.time_in(tz) {
        Some(start) => start.hour() == time.hour() && start.minute().abs_diff(time.minute()) < TIME_TOLERANCE_MINUTES,
        None => false,
    }
}

/// Apply the query to listed events.
///
/// Title filter, then time filter (ignored when it would remove every
/// candidate), then sort by start, then the ordinal. An out-of-range
/// ordinal leaves the full list in place.
pub fn select(events: Vec<CalendarEvent>, query: &MatchQuery, tz: Tz) -> Vec<CalendarEvent> {
    let mut matches: Vec<CalendarEvent> = match query.title.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(title) => events.into_iter().filter(|e| title_matches(e, title)).collect(),
        None => events,
    };
    matches.retain(|e| !e.is_cancelled());

    if let Some(time) = query.time {
        let timed: Vec<CalendarEvent> = matches.iter().filter(|e| time_matches(e, time, tz)).cloned().collect();
        if timed.is_empty() {
            debug!(time = %time, "MATCH_TIME_FILTER_EMPTY");
        } else {
            matches = timed;
        }
    }

    matches.sort_by_key(|e| e.start.instant(tz));

    if let Some(index) = query.match_index {
        match index.checked_sub(1).filter(|i| *i < matches.len()) {
            Some(i) => matches = vec![matches.swap_remove(i)],
            None => debug!(index, candidates = matches.len(), "MATCH_INDEX_OUT_OF_RANGE"),
        }
    }
    matches
}

/// Classify the selected candidates.
pub fn outcome(matches: Vec<CalendarEvent>) -> MatchOutcome {
    match matches.len() {
        0 => MatchOutcome::NotFound,
        1 => matches.into_iter().next().map_or(MatchOutcome::NotFound, MatchOutcome::Single),
        _ => MatchOutcome::Multiple(matches),
    }
}

/// Classify candidates for a series-wide request.
///
/// When the first candidate belongs to a recurring series it stands in for
/// the whole series instead of prompting for disambiguation.
pub fn series_outcome(matches: Vec<CalendarEvent>) -> MatchOutcome {
    match matches.first() {
        Some(first) if first.is_recurring_instance() || !first.recurrence.is_empty() => {
            matches.into_iter().next().map_or(MatchOutcome::NotFound, MatchOutcome::Single)
        }
        _ => outcome(matches),
    }
}

/// The series master of a recurring instance, or the event itself.
///
/// A failed fetch is returned as an error; it is never replaced by the
/// instance.
pub async fn series_target(
    provider: &dyn CalendarProvider,
    calendar_id: &str,
    event: CalendarEvent,
) -> Result<CalendarEvent, CalendarError> {
    let Some(master_id) = event.recurring_event_id.clone() else {
        return Ok(event);
    };
    match provider.get_event(calendar_id, &master_id).await {
        Ok(master) => {
            debug!(instance = %event.id, master = %master.id, "MATCH_SERIES_MASTER");
            Ok(master)
        }
        Err(e) => {
            warn!(instance = %event.id, master = %master_id, error = %e, "MATCH_SERIES_MASTER_FAILED");
            Err(e)
        }
    }
}
