//! Per-action resolution.
//!
//! Each extracted [`Action`] has one [`ActionHandler`] that turns its
//! parameters into a draft awaiting confirmation, an immediate reply, or a
//! clarification. Handlers are looked up through a [`HandlerRegistry`].

mod calendars;
mod create;
mod delete;
mod free_slots;
mod list;
mod update;

pub use calendars::ListCalendarsHandler;
pub use create::CreateHandler;
pub use delete::DeleteHandler;
pub use free_slots::FreeSlotsHandler;
pub use list::ListHandler;
pub use update::UpdateHandler;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use calendar::{CalendarError, CalendarProvider, PRIMARY_CALENDAR};
use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::extractor::{Action, ExtractedParams};
use crate::pending::PendingAction;
use crate::temporal::{parse_datetime, resolve_date};

/// Days searched ahead when a request names no date.
pub const DEFAULT_SEARCH_DAYS: i64 = 30;

/// Everything a handler may use besides the parameters.
pub struct ActionContext<'a> {
    pub provider: &'a dyn CalendarProvider,
    /// The user's raw message.
    pub text: &'a str,
    pub now: DateTime<Tz>,
}

impl ActionContext<'_> {
    pub fn tz(&self) -> Tz {
        self.now.timezone()
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Resolve a date parameter: a date token or the date part of a date-time.
    pub fn date(&self, value: Option<&str>) -> Option<NaiveDate> {
        let value = value?;
        resolve_date(value, self.today())
            .or_else(|| parse_datetime(value, self.tz()).map(|dt| dt.with_timezone(&self.tz()).date_naive()))
    }

    /// The explicit date's day, otherwise today through the search horizon.
    pub fn search_range(&self, date: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
        match date {
            Some(d) => (d, d),
            None => (self.today(), self.today() + Duration::days(DEFAULT_SEARCH_DAYS)),
        }
    }
}

/// Calendar a request targets.
pub fn calendar_id(params: &ExtractedParams) -> String {
    params.calendar_id.clone().unwrap_or_else(|| PRIMARY_CALENDAR.to_string())
}

/// Result of resolving one action.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A mutation drafted for confirmation, with the text presenting it.
    Draft { action: PendingAction, text: String },
    /// A finished read-only answer, or an explanation why nothing was drafted.
    Reply(String),
    /// A question for information still needed.
    Clarification(String),
    /// The calendar provider failed.
    Failed(String),
    /// The user must (re)connect a calendar account.
    NeedsConnection,
}

impl Resolution {
    /// Map a provider error: connection problems are distinct from failures.
    pub fn from_provider_error(error: &CalendarError, apology: &str) -> Self {
        if error.needs_connection() {
            debug!(error = %error, "HANDLER_NEEDS_CONNECTION");
            Self::NeedsConnection
        } else {
            warn!(error = %error, "HANDLER_PROVIDER_FAILED");
            Self::Failed(apology.to_string())
        }
    }
}

/// Resolves one kind of extracted action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action this handler resolves.
    fn action(&self) -> Action;

    async fn resolve(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution;
}

/// Handlers by action.
pub struct HandlerRegistry {
    handlers: HashMap<Action, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with every built-in handler.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(CreateHandler);
        registry.register(ListHandler);
        registry.register(DeleteHandler);
        registry.register(UpdateHandler);
        registry.register(FreeSlotsHandler);
        registry.register(ListCalendarsHandler);
        registry
    }

    /// Register a handler, replacing any for the same action.
    pub fn register<H: ActionHandler + 'static>(&mut self, handler: H) {
        debug!(action = handler.action().as_str(), "Registering action handler");
        self.handlers.insert(handler.action(), Arc::new(handler));
    }

    pub fn get(&self, action: Action) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(&action)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use calendar::{CalendarEvent, EventTime};
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::Tz;

    /// Monday 2024-01-01 08:00 UTC.
    pub fn now() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    pub fn event(summary: &str, day: u32, hour: u32) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap();
        CalendarEvent {
            id: String::new(),
            summary: summary.to_string(),
            start: EventTime::timed(start.fixed_offset(), Some("UTC".to_string())),
            end: EventTime::timed((start + chrono::Duration::hours(1)).fixed_offset(), Some("UTC".to_string())),
            recurrence: vec![],
            recurring_event_id: None,
            html_link: None,
            attendees: vec![],
            status: None,
        }
    }
}
