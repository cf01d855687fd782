//! find_free_slots: free/busy over a date range.

use async_trait::async_trait;
use calendar::BusyInterval;
use chrono_tz::Tz;
use tracing::info;

use super::{calendar_id, ActionContext, ActionHandler, Resolution};
use crate::extractor::{Action, ExtractedParams};
use crate::formatting::time_label;
use crate::temporal::{day_span, extract_date_from_text};

/// Busy periods spelled out in a reply.
pub const MAX_BUSY_LINES: usize = 3;

const NO_DATE: &str =
    "Please share a date (e.g. 2025-10-23) or a start and end date so I can check availability.";
const FREE: &str = "Your calendars are completely free between those dates!";
const CHECK_FAILED: &str = "Sorry, I couldn't check availability at this time.";

pub struct FreeSlotsHandler;

fn busy_line(busy: &BusyInterval, tz: Tz) -> String {
    let start = busy.start.with_timezone(&tz);
    let end = busy.end.with_timezone(&tz);
    format!("- {} {} – {}", start.format("%a %b %-d"), time_label(&start), time_label(&end))
}

#[async_trait]
impl ActionHandler for FreeSlotsHandler {
    fn action(&self) -> Action {
        Action::FindFreeSlots
    }

    async fn resolve(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution {
        let from = ctx
            .date(params.start_date.as_deref().or(params.date.as_deref()))
            .or_else(|| extract_date_from_text(ctx.text, ctx.today()));
        let Some(from) = from else {
            return Resolution::Clarification(NO_DATE.to_string());
        };
        let to = ctx.date(params.end_date.as_deref()).filter(|d| *d >= from).unwrap_or(from);
        let (time_min, time_max) = day_span(from, to, ctx.tz());

        let busy = match ctx.provider.free_busy(&[calendar_id(params)], time_min, time_max).await {
            Ok(busy) => busy,
            Err(e) => return Resolution::from_provider_error(&e, CHECK_FAILED),
        };
        info!(from = %from, to = %to, busy = busy.len(), "FREE_BUSY_CHECKED");

        if busy.is_empty() {
            return Resolution::Reply(FREE.to_string());
        }
        let mut lines = vec![format!("I found {} busy periods.", busy.len())];
        lines.extend(busy.iter().take(MAX_BUSY_LINES).map(|b| busy_line(b, ctx.tz())));
        Resolution::Reply(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{event, now};
    use calendar::InMemoryCalendar;
    use serde_json::json;

    #[tokio::test]
    async fn test_free_day() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "am I free tomorrow?",
            now: now(),
        };
        let params = ExtractedParams::default();
        assert_eq!(FreeSlotsHandler.resolve(&ctx, &params).await, Resolution::Reply(FREE.to_string()));
    }

    #[tokio::test]
    async fn test_busy_periods_are_capped() {
        let calendar = InMemoryCalendar::new();
        for hour in [9, 11, 13, 15] {
            calendar.insert(event("Busy", 2, hour)).await;
        }
        let ctx = ActionContext {
            provider: &calendar,
            text: "when am I busy",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"date": "2024-01-02"}));
        match FreeSlotsHandler.resolve(&ctx, &params).await {
            Resolution::Reply(text) => {
                let lines: Vec<&str> = text.lines().collect();
                assert_eq!(lines[0], "I found 4 busy periods.");
                assert_eq!(lines.len(), 1 + MAX_BUSY_LINES);
                assert_eq!(lines[1], "- Tue Jan 2 9:00 AM – 10:00 AM");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_date_asks_for_one() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "am I free?",
            now: now(),
        };
        assert_eq!(
            FreeSlotsHandler.resolve(&ctx, &ExtractedParams::default()).await,
            Resolution::Clarification(NO_DATE.to_string())
        );
    }
}
