//! The Calendar Provider capability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{BusyInterval, CalendarEvent, CalendarInfo, NewEvent};

/// Calendar id used when none is given.
pub const PRIMARY_CALENDAR: &str = "primary";

/// Access to one user's calendars.
///
/// Listing expands recurring series into single instances. With several
/// search terms the results are OR-merged by id and sorted by start.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events overlapping `[time_min, time_max)`.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        search_terms: &[String],
    ) -> Result<Vec<CalendarEvent>>;

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<CalendarEvent>;

    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<CalendarEvent>;

    /// Replace an event with `event`.
    async fn update_event(&self, calendar_id: &str, event_id: &str, event: &CalendarEvent) -> Result<CalendarEvent>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()>;

    /// Busy intervals across calendars, sorted by start.
    async fn free_busy(
        &self,
        calendar_ids: &[String],
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>>;

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>>;
}
