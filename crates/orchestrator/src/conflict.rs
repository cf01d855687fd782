//! Conflict detection and alternative slots for a proposed window.

use calendar::{CalendarError, CalendarEvent, CalendarProvider, EventTime};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::temporal::{day_span, localize};

/// Start of the business day searched for alternatives.
pub const BUSINESS_START_HOUR: u32 = 9;
/// End of the business day searched for alternatives.
pub const BUSINESS_END_HOUR: u32 = 18;
/// Step between candidate slots.
pub const SLOT_STEP_MINUTES: i64 = 30;
/// Maximum alternatives offered.
pub const MAX_ALTERNATIVES: usize = 3;

/// An existing event colliding with the proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
}

impl From<&CalendarEvent> for ConflictSummary {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            id: event.id.clone(),
            summary: event.title().to_string(),
            start: event.start.clone(),
            end: event.end.clone(),
        }
    }
}

/// A free slot offered instead of a conflicting time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// Conflicts for a window and, when asked, alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    pub conflicts: Vec<ConflictSummary>,
    pub alternatives: Vec<Slot>,
}

impl ConflictReport {
    pub fn has_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Strict interval overlap.
pub fn overlaps(a_start: DateTime<Utc>, a_end: DateTime<Utc>, b_start: DateTime<Utc>, b_end: DateTime<Utc>) -> bool {
    a_start < b_end && b_start < a_end
}

/// Timed events overlapping `[start, end)`, excluding `exclude_id`.
///
/// All-day events do not block times of day.
pub fn find_conflicts(
    events: &[CalendarEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Vec<ConflictSummary> {
    events
        .iter()
        .filter(|e| !e.is_all_day() && !e.is_cancelled())
        .filter(|e| exclude_id != Some(e.id.as_str()))
        .filter(|e| {
            let (s, en) = e.window(Tz::UTC);
            overlaps(s, en, start, end)
        })
        .map(ConflictSummary::from)
        .collect()
}

/// Up to three free slots of `length` within business hours of `day`.
pub fn find_alternatives(events: &[CalendarEvent], day: DateTime<Tz>, length: Duration, exclude_id: Option<&str>) -> Vec<Slot> {
    let tz = day.timezone();
    let date = day.date_naive();
    let at = |hour: u32| NaiveTime::from_hms_opt(hour, 0, 0).and_then(|t| localize(tz, date.and_time(t)));
    let (Some(mut cursor), Some(close)) = (at(BUSINESS_START_HOUR), at(BUSINESS_END_HOUR)) else {
        return Vec::new();
    };

    let mut slots = Vec::new();
    while cursor + length <= close && slots.len() < MAX_ALTERNATIVES {
        let slot_end = cursor + length;
        let busy = !find_conflicts(events, cursor.with_timezone(&Utc), slot_end.with_timezone(&Utc), exclude_id).is_empty();
        if !busy {
            slots.push(Slot {
                start: cursor.fixed_offset(),
                end: slot_end.fixed_offset(),
            });
        }
        cursor += Duration::minutes(SLOT_STEP_MINUTES);
    }
    slots
}

/// Check `[start, end)` against every event of its local day.
///
/// Alternatives are searched only when `suggest` is set and a conflict exists.
pub async fn check_window(
    provider: &dyn CalendarProvider,
    calendar_id: &str,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    exclude_id: Option<&str>,
    suggest: bool,
) -> Result<ConflictReport, CalendarError> {
    let tz = start.timezone();
    let (day_start, day_end) = day_span(start.date_naive(), end.date_naive(), tz);
    let events = provider.list_events(calendar_id, day_start, day_end, &[]).await?;

    let conflicts = find_conflicts(&events, start.with_timezone(&Utc), end.with_timezone(&Utc), exclude_id);
    let alternatives = if suggest && !conflicts.is_empty() {
        find_alternatives(&events, start, end - start, exclude_id)
    } else {
        Vec::new()
    };
    debug!(
        conflicts = conflicts.len(),
        alternatives = alternatives.len(),
        "CONFLICT_CHECKED"
    );
    Ok(ConflictReport { conflicts, alternatives })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calendar::{InMemoryCalendar, PRIMARY_CALENDAR};
    use chrono::TimeZone;

    fn event(id: &str, start: (u32, u32), end: (u32, u32)) -> CalendarEvent {
        let s = Utc.with_ymd_and_hms(2024, 1, 2, start.0, start.1, 0).unwrap();
        let e = Utc.with_ymd_and_hms(2024, 1, 2, end.0, end.1, 0).unwrap();
        CalendarEvent {
            id: id.to_string(),
            summary: id.to_string(),
            start: EventTime::timed(s.fixed_offset(), None),
            end: EventTime::timed(e.fixed_offset(), None),
            recurrence: vec![],
            recurring_event_id: None,
            html_link: None,
            attendees: vec![],
            status: None,
        }
    }

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, h, m, 0).unwrap()
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!overlaps(utc(9, 0), utc(10, 0), utc(10, 0), utc(11, 0)));
        assert!(overlaps(utc(9, 0), utc(10, 1), utc(10, 0), utc(11, 0)));
    }

    #[test]
    fn test_update_excludes_itself() {
        let events = vec![event("self", (14, 0), (15, 0)), event("other", (14, 30), (15, 30))];
        let conflicts = find_conflicts(&events, utc(14, 0), utc(15, 0), Some("self"));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "other");
    }

    #[test]
    fn test_all_day_events_do_not_conflict() {
        let mut holiday = event("holiday", (0, 0), (0, 0));
        holiday.start = EventTime::all_day(chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        holiday.end = EventTime::all_day(chrono::NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!(find_conflicts(&[holiday], utc(14, 0), utc(15, 0), None).is_empty());
    }

    #[test]
    fn test_alternatives_skip_busy_slots() {
        let events = vec![event("busy", (9, 0), (10, 0))];
        let day = Tz::UTC.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let slots = find_alternatives(&events, day, Duration::hours(1), None);
        let starts: Vec<String> = slots.iter().map(|s| s.start.format("%H:%M").to_string()).collect();
        assert_eq!(starts, vec!["10:00", "10:30", "11:00"]);
    }

    #[test]
    fn test_alternatives_fit_business_hours() {
        let events = vec![event("busy", (9, 0), (17, 0))];
        let day = Tz::UTC.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let slots = find_alternatives(&events, day, Duration::hours(1), None);
        let starts: Vec<String> = slots.iter().map(|s| s.start.format("%H:%M").to_string()).collect();
        assert_eq!(starts, vec!["17:00"]);
    }

    #[tokio::test]
    async fn test_check_window_reports_conflict_and_alternatives() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("standup", (14, 0), (15, 0))).await;

        let start = Tz::UTC.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        let report = check_window(&calendar, PRIMARY_CALENDAR, start, start + Duration::minutes(30), None, true)
            .await
            .unwrap();
        assert!(report.has_conflict());
        assert_eq!(report.conflicts[0].summary, "standup");
        assert_eq!(report.alternatives.len(), MAX_ALTERNATIVES);
        assert_eq!(report.alternatives[0].start.format("%H:%M").to_string(), "09:00");
    }
}
