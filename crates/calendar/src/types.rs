//! Calendar event types, shaped like the Google Calendar v3 resources.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Start or end of an event: a timed instant or an all-day date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    Timed {
        #[serde(rename = "dateTime")]
        date_time: DateTime<FixedOffset>,
        #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
    },
    AllDay {
        date: NaiveDate,
    },
}

impl EventTime {
    /// A timed value carrying the zone name.
    pub fn timed(date_time: DateTime<FixedOffset>, time_zone: Option<String>) -> Self {
        Self::Timed { date_time, time_zone }
    }

    /// A timed value in the given zone.
    pub fn in_zone(date_time: DateTime<Tz>) -> Self {
        Self::Timed {
            time_zone: Some(date_time.timezone().name().to_string()),
            date_time: date_time.fixed_offset(),
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self::AllDay { date }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay { .. })
    }

    /// The instant this value denotes. All-day dates are midnight in `tz`.
    pub fn instant(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            Self::Timed { date_time, .. } => date_time.with_timezone(&Utc),
            Self::AllDay { date } => local_midnight(*date, tz),
        }
    }

    /// Calendar date of this value as seen in `tz`.
    pub fn date_in(&self, tz: Tz) -> NaiveDate {
        match self {
            Self::Timed { date_time, .. } => date_time.with_timezone(&tz).date_naive(),
            Self::AllDay { date } => *date,
        }
    }

    /// Local wall-clock time in `tz`, if timed.
    pub fn time_in(&self, tz: Tz) -> Option<NaiveTime> {
        match self {
            Self::Timed { date_time, .. } => Some(date_time.with_timezone(&tz).time()),
            Self::AllDay { .. } => None,
        }
    }

    /// The zone name carried by a timed value.
    pub fn time_zone(&self) -> Option<&str> {
        match self {
            Self::Timed { time_zone, .. } => time_zone.as_deref(),
            Self::AllDay { .. } => None,
        }
    }

    /// Ordering key: timed values by instant, all-day dates at UTC midnight.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.instant(Tz::UTC)
    }
}

/// Midnight of `date` in `tz`, falling back to UTC across DST gaps.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// An event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            response_status: None,
        }
    }
}

/// A calendar event as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    /// RRULE/EXDATE lines; only set on series masters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    /// Parent series id for recurring instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CalendarEvent {
    /// Title for display, never empty.
    pub fn title(&self) -> &str {
        if self.summary.trim().is_empty() {
            "(no title)"
        } else {
            &self.summary
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    pub fn is_recurring_instance(&self) -> bool {
        self.recurring_event_id.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// `[start, end)` as instants in `tz`.
    pub fn window(&self, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start.instant(tz), self.end.instant(tz))
    }
}

/// Body for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recurrence: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
}

/// A busy interval from a free/busy query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// An entry of the user's calendar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
}

/// OR-merge several result sets by event id and sort by start.
pub fn merge_by_id(result_sets: Vec<Vec<CalendarEvent>>) -> Vec<CalendarEvent> {
    let mut merged: Vec<CalendarEvent> = Vec::new();
    for event in result_sets.into_iter().flatten() {
        match merged.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event,
            None => merged.push(event),
        }
    }
    merged.sort_by_key(|e| e.start.sort_key());
    merged
}
