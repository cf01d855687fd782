//! In-memory calendar provider.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::RwLock;

use crate::error::{CalendarError, Result};
use crate::provider::{CalendarProvider, PRIMARY_CALENDAR};
use crate::types::{merge_by_id, BusyInterval, CalendarEvent, CalendarInfo, NewEvent};

#[derive(Debug, Clone)]
struct Stored {
    calendar_id: String,
    event: CalendarEvent,
}

/// A provider that keeps events in memory.
///
/// Recurrence is not expanded; callers insert instances explicitly. All-day
/// dates are interpreted in UTC.
#[derive(Debug)]
pub struct InMemoryCalendar {
    events: RwLock<Vec<Stored>>,
    calendars: Vec<CalendarInfo>,
    next_id: AtomicU64,
    failing: AtomicBool,
    failing_ids: RwLock<HashSet<String>>,
}

impl Default for InMemoryCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            calendars: vec![CalendarInfo {
                id: PRIMARY_CALENDAR.to_string(),
                summary: "Primary".to_string(),
                primary: true,
            }],
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            failing_ids: RwLock::new(HashSet::new()),
        }
    }

    /// Add a secondary calendar to the calendar list.
    pub fn with_calendar(mut self, id: impl Into<String>, summary: impl Into<String>) -> Self {
        self.calendars.push(CalendarInfo {
            id: id.into(),
            summary: summary.into(),
            primary: false,
        });
        self
    }

    /// Insert an event into the primary calendar. An empty id is assigned one.
    pub async fn insert(&self, event: CalendarEvent) -> CalendarEvent {
        self.insert_into(PRIMARY_CALENDAR, event).await
    }

    pub async fn insert_into(&self, calendar_id: &str, mut event: CalendarEvent) -> CalendarEvent {
        if event.id.is_empty() {
            event.id = self.allocate_id();
        }
        self.events.write().await.push(Stored {
            calendar_id: calendar_id.to_string(),
            event: event.clone(),
        });
        event
    }

    /// Make every call fail with a provider error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make calls touching one event id fail.
    pub async fn fail_event(&self, event_id: impl Into<String>) {
        self.failing_ids.write().await.insert(event_id.into());
    }

    /// Snapshot of all stored events.
    pub async fn all_events(&self) -> Vec<CalendarEvent> {
        self.events.read().await.iter().map(|s| s.event.clone()).collect()
    }

    fn allocate_id(&self) -> String {
        format!("evt{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn check_failing(&self, event_id: Option<&str>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CalendarError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        if let Some(id) = event_id {
            if self.failing_ids.read().await.contains(id) {
                return Err(CalendarError::Api {
                    status: 500,
                    message: format!("failed on {}", id),
                });
            }
        }
        Ok(())
    }
}

fn overlaps(event: &CalendarEvent, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> bool {
    let (start, end) = event.window(Tz::UTC);
    start < time_max && time_min < end
}

fn matches_term(event: &CalendarEvent, term: &str) -> bool {
    event.summary.to_lowercase().contains(&term.to_lowercase())
}

#[async_trait]
impl CalendarProvider for InMemoryCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        search_terms: &[String],
    ) -> Result<Vec<CalendarEvent>> {
        self.check_failing(None).await?;

        let in_window: Vec<CalendarEvent> = self
            .events
            .read()
            .await
            .iter()
            .filter(|s| s.calendar_id == calendar_id)
            .filter(|s| !s.event.is_cancelled())
            .filter(|s| overlaps(&s.event, time_min, time_max))
            .map(|s| s.event.clone())
            .collect();

        let terms: Vec<&str> = search_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        if terms.is_empty() {
            return Ok(merge_by_id(vec![in_window]));
        }

        let result_sets = terms
            .iter()
            .map(|term| {
                in_window
                    .iter()
                    .filter(|e| matches_term(e, term))
                    .cloned()
                    .collect()
            })
            .collect();
        Ok(merge_by_id(result_sets))
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<CalendarEvent> {
        self.check_failing(Some(event_id)).await?;
        self.events
            .read()
            .await
            .iter()
            .find(|s| s.calendar_id == calendar_id && s.event.id == event_id)
            .map(|s| s.event.clone())
            .ok_or_else(|| CalendarError::NotFound(event_id.to_string()))
    }

    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<CalendarEvent> {
        self.check_failing(None).await?;
        if event.recurrence.iter().any(|r| !r.starts_with("RRULE:") && !r.starts_with("EXDATE")) {
            return Err(CalendarError::Api {
                status: 400,
                message: "Invalid recurrence rule".to_string(),
            });
        }
        let id = self.allocate_id();
        let created = CalendarEvent {
            html_link: Some(format!("https://calendar.example.com/event?eid={}", id)),
            id,
            summary: event.summary.clone(),
            start: event.start.clone(),
            end: event.end.clone(),
            recurrence: event.recurrence.clone(),
            recurring_event_id: None,
            attendees: event.attendees.clone(),
            status: Some("confirmed".to_string()),
        };
        Ok(self.insert_into(calendar_id, created).await)
    }

    async fn update_event(&self, calendar_id: &str, event_id: &str, event: &CalendarEvent) -> Result<CalendarEvent> {
        self.check_failing(Some(event_id)).await?;
        let mut events = self.events.write().await;
        let stored = events
            .iter_mut()
            .find(|s| s.calendar_id == calendar_id && s.event.id == event_id)
            .ok_or_else(|| CalendarError::NotFound(event_id.to_string()))?;

        let mut updated = event.clone();
        updated.id = event_id.to_string();
        stored.event = updated.clone();
        Ok(updated)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        self.check_failing(Some(event_id)).await?;
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|s| !(s.calendar_id == calendar_id && s.event.id == event_id));
        if events.len() == before {
            return Err(CalendarError::NotFound(event_id.to_string()));
        }
        Ok(())
    }

    async fn free_busy(
        &self,
        calendar_ids: &[String],
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>> {
        self.check_failing(None).await?;
        let mut busy: Vec<BusyInterval> = self
            .events
            .read()
            .await
            .iter()
            .filter(|s| calendar_ids.iter().any(|id| *id == s.calendar_id))
            .filter(|s| !s.event.is_all_day() && overlaps(&s.event, time_min, time_max))
            .map(|s| {
                let (start, end) = s.event.window(Tz::UTC);
                BusyInterval {
                    start: start.max(time_min).fixed_offset(),
                    end: end.min(time_max).fixed_offset(),
                }
            })
            .collect();
        busy.sort_by_key(|b| b.start);
        Ok(busy)
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        self.check_failing(None).await?;
        Ok(self.calendars.clone())
    }
}
