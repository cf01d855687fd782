//! Calendar Provider capability for the calendar assistant.
//!
//! - [`CalendarProvider`] - list/get/create/update/delete events, free/busy, calendar list
//! - [`GoogleCalendarClient`] - Google Calendar API v3 over reqwest
//! - [`InMemoryCalendar`] - In-process provider for tests and local runs
//! - [`CalendarConnector`] - Resolves a user's provider, refreshing OAuth tokens

mod config;
mod connector;
mod error;
mod google;
mod memory;
mod provider;
mod types;

pub use config::GoogleConfig;
pub use connector::{CalendarConnector, GoogleConnector, StaticConnector};
pub use error::{CalendarError, Result};
pub use google::{GoogleCalendarClient, RetryPolicy};
pub use memory::InMemoryCalendar;
pub use provider::{CalendarProvider, PRIMARY_CALENDAR};
pub use types::{
    local_midnight, merge_by_id, Attendee, BusyInterval, CalendarEvent, CalendarInfo, EventTime, NewEvent,
};
