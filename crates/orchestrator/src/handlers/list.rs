//! list_events: resolve the range, list, render the schedule.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, info};

use super::{calendar_id, ActionContext, ActionHandler, Resolution};
use crate::extractor::{Action, ExtractedParams};
use crate::formatting::{day_label, range_header, schedule};
use crate::temporal::{day_span, extract_date_from_text};

/// Model ranges further than this from today are treated as clock drift.
pub const MAX_RANGE_DRIFT_DAYS: i64 = 90;

const LIST_FAILED: &str = "Sorry, I couldn't list your events at this time.";

pub struct ListHandler;

/// Monday to Sunday of the week `offset` weeks from the one containing `today`.
pub fn week_of(today: NaiveDate, offset: i64) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64) + Duration::weeks(offset);
    (monday, monday + Duration::days(6))
}

fn week_phrase(text: &str) -> Option<i64> {
    if text.contains("next week") {
        Some(1)
    } else if text.contains("last week") || text.contains("previous week") {
        Some(-1)
    } else if text.contains("this week") {
        Some(0)
    } else {
        None
    }
}

/// The inclusive local date range a list request covers.
pub fn list_range(ctx: &ActionContext<'_>, params: &ExtractedParams) -> (NaiveDate, NaiveDate) {
    let today = ctx.today();
    let lower = ctx.text.to_lowercase();

    if let Some(offset) = week_phrase(&lower) {
        return week_of(today, offset);
    }

    let start = ctx.date(params.start_date.as_deref().or(params.date.as_deref()));
    let end = ctx.date(params.end_date.as_deref());
    match start {
        Some(s) if (s - today).num_days().abs() > MAX_RANGE_DRIFT_DAYS && (lower.contains("week") || lower.contains("schedule")) => {
            debug!(start = %s, "LIST_RANGE_SNAPPED_TO_WEEK");
            week_of(today, 0)
        }
        Some(s) => (s, end.filter(|e| *e >= s).unwrap_or(s)),
        None => match extract_date_from_text(ctx.text, today) {
            Some(d) => (d, d),
            None => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
            ),
        },
    }
}

#[async_trait]
impl ActionHandler for ListHandler {
    fn action(&self) -> Action {
        Action::ListEvents
    }

    async fn resolve(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution {
        let (from, to) = list_range(ctx, params);
        let (time_min, time_max) = day_span(from, to, ctx.tz());

        let events = match ctx
            .provider
            .list_events(&calendar_id(params), time_min, time_max, &params.queries)
            .await
        {
            Ok(events) => events,
            Err(e) => return Resolution::from_provider_error(&e, LIST_FAILED),
        };
        let events: Vec<_> = events.into_iter().filter(|e| !e.is_cancelled()).collect();
        info!(from = %from, to = %to, count = events.len(), "LIST_EVENTS");

        if events.is_empty() {
            return Resolution::Reply(if from == to {
                format!("You have no events on {}.", day_label(from))
            } else {
                format!("You have no events between {} and {}.", day_label(from), day_label(to))
            });
        }

        Resolution::Reply(format!(
            "{}\n\n{}",
            range_header(from, to, ctx.today(), &params.queries),
            schedule(&events, ctx.tz(), ctx.today())
        ))
    }
}
