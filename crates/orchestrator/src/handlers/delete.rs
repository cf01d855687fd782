//! delete_event: match one event (or every event in a range) and draft a deletion.

use async_trait::async_trait;
use calendar::CalendarEvent;
use chrono::NaiveDate;
use tracing::info;

use super::{calendar_id, ActionContext, ActionHandler, Resolution};
use crate::extractor::{Action, ExtractedParams};
use crate::formatting::{candidate_list, day_label};
use crate::matcher::{outcome, parse_filter_time, select, series_outcome, series_target, MatchOutcome, MatchQuery};
use crate::pending::{BulkDeleteDraft, DeleteDraft, PendingAction};
use crate::temporal::day_span;

const FIND_FAILED: &str = "Sorry, I couldn't look up your events at this time.";
const BAD_TIME: &str = "I couldn't filter by the specific time provided. Please try checking the time format (e.g., '2pm' or '14:00').";
const SERIES_FAILED: &str =
    "I couldn't retrieve the series master for this event. Please try deleting a single instance instead.";

pub struct DeleteHandler;

fn range_label(from: NaiveDate, to: NaiveDate) -> String {
    if from == to {
        day_label(from)
    } else {
        format!("{} through {}", day_label(from), day_label(to))
    }
}

impl DeleteHandler {
    async fn resolve_bulk(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution {
        let from = ctx
            .date(params.start_date.as_deref().or(params.date.as_deref()))
            .unwrap_or_else(|| ctx.today());
        let to = ctx.date(params.end_date.as_deref()).filter(|d| *d >= from).unwrap_or(from);
        let label = range_label(from, to);
        let (time_min, time_max) = day_span(from, to, ctx.tz());
        let calendar_id = calendar_id(params);

        let events = match ctx.provider.list_events(&calendar_id, time_min, time_max, &[]).await {
            Ok(events) => events,
            Err(e) => return Resolution::from_provider_error(&e, FIND_FAILED),
        };
        let query = MatchQuery {
            title: params.summary.clone(),
            ..Default::default()
        };
        let matches = select(events, &query, ctx.tz());
        if matches.is_empty() {
            return Resolution::Reply(format!("I couldn't find any events on {}.", label));
        }

        info!(count = matches.len(), range = %label, "DELETE_BULK_DRAFTED");
        let text = format!(
            "I found {} events on {}. Are you sure you want to delete ALL of them?",
            matches.len(),
            label
        );
        Resolution::Draft {
            action: PendingAction::DeleteBulk(BulkDeleteDraft {
                calendar_id,
                event_ids: matches.into_iter().map(|e| e.id).collect(),
                label,
            }),
            text,
        }
    }

    fn draft_single(calendar_id: String, event: CalendarEvent, is_series: bool) -> Resolution {
        let summary = event.title().to_string();
        let text = if is_series {
            format!("Are you sure you want to delete the entire '{}' series?", summary)
        } else {
            format!("Are you sure you want to delete '{}'?", summary)
        };
        info!(event_id = %event.id, series = is_series, "DELETE_DRAFTED");
        Resolution::Draft {
            action: PendingAction::Delete(DeleteDraft {
                calendar_id,
                event_id: event.id,
                summary,
                start: event.start,
                end: event.end,
                is_series,
            }),
            text,
        }
    }
}

#[async_trait]
impl ActionHandler for DeleteHandler {
    fn action(&self) -> Action {
        Action::DeleteEvent
    }

    async fn resolve(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution {
        if params.delete_all {
            return self.resolve_bulk(ctx, params).await;
        }

        let time = match params.start.as_deref() {
            Some(raw) => match parse_filter_time(raw, ctx.tz()) {
                Some(t) => Some(t),
                None => return Resolution::Reply(BAD_TIME.to_string()),
            },
            None => None,
        };

        let date = ctx.date(params.date.as_deref());
        let (from, to) = ctx.search_range(date);
        let (time_min, time_max) = day_span(from, to, ctx.tz());
        let calendar_id = calendar_id(params);
        let terms: Vec<String> = params.summary.iter().cloned().collect();

        let events = match ctx.provider.list_events(&calendar_id, time_min, time_max, &terms).await {
            Ok(events) => events,
            Err(e) => return Resolution::from_provider_error(&e, FIND_FAILED),
        };
        let query = MatchQuery {
            title: params.summary.clone(),
            time,
            match_index: params.match_index,
        };
        let what = params.summary.as_deref().unwrap_or("your request");

        let matches = select(events, &query, ctx.tz());
        let matched = if params.update_series {
            series_outcome(matches)
        } else {
            outcome(matches)
        };
        match matched {
            MatchOutcome::NotFound => Resolution::Reply(match date {
                Some(d) => format!("I couldn't find any event matching '{}' on {}.", what, day_label(d)),
                None => format!("I couldn't find any event matching '{}' in the next 30 days.", what),
            }),
            MatchOutcome::Multiple(candidates) => Resolution::Reply(format!(
                "I found {} events matching '{}'. Which one would you like to delete?\n\n{}",
                candidates.len(),
                what,
                candidate_list(&candidates, ctx.tz())
            )),
            MatchOutcome::Single(event) if params.update_series && event.is_recurring_instance() => {
                match series_target(ctx.provider, &calendar_id, event).await {
                    Ok(master) => Self::draft_single(calendar_id, master, true),
                    Err(e) if e.needs_connection() => Resolution::NeedsConnection,
                    Err(_) => Resolution::Reply(SERIES_FAILED.to_string()),
                }
            }
            MatchOutcome::Single(event) => {
                let is_series = params.update_series && !event.recurrence.is_empty();
                Self::draft_single(calendar_id, event, is_series)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{event, now};
    use calendar::InMemoryCalendar;
    use serde_json::json;

    #[tokio::test]
    async fn test_three_matches_list_candidates_without_deleting() {
        let calendar = InMemoryCalendar::new();
        for hour in [9, 11, 15] {
            calendar.insert(event("Sync", 2, hour)).await;
        }
        let ctx = ActionContext {
            provider: &calendar,
            text: "delete the sync tomorrow",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "sync", "date": "tomorrow"}));
        match DeleteHandler.resolve(&ctx, &params).await {
            Resolution::Reply(text) => {
                assert!(text.starts_with("I found 3 events matching 'sync'."), "{}", text);
                assert!(text.contains("1. Sync (9:00 AM on Jan 02)"));
                assert!(text.contains("3. Sync (3:00 PM on Jan 02)"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(calendar.all_events().await.len(), 3);
    }

    #[tokio::test]
    async fn test_ordinal_drafts_that_event() {
        let calendar = InMemoryCalendar::new();
        for hour in [15, 9, 11] {
            calendar.insert(event("Sync", 2, hour)).await;
        }
        let ctx = ActionContext {
            provider: &calendar,
            text: "delete the second one",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "sync", "date": "2024-01-02", "match_index": 2}));
        match DeleteHandler.resolve(&ctx, &params).await {
            Resolution::Draft {
                action: PendingAction::Delete(draft),
                text,
            } => {
                assert_eq!(draft.start.time_in(chrono_tz::Tz::UTC).map(|t| t.to_string()), Some("11:00:00".to_string()));
                assert_eq!(text, "Are you sure you want to delete 'Sync'?");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bulk_delete_counts_events() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("A", 2, 9)).await;
        calendar.insert(event("B", 2, 13)).await;
        calendar.insert(event("Other day", 3, 9)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "clear my calendar tomorrow",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"date": "tomorrow", "delete_all": true}));
        match DeleteHandler.resolve(&ctx, &params).await {
            Resolution::Draft {
                action: PendingAction::DeleteBulk(draft),
                text,
            } => {
                assert_eq!(draft.event_ids.len(), 2);
                assert_eq!(
                    text,
                    "I found 2 events on Tuesday, January 2. Are you sure you want to delete ALL of them?"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_found_names_the_day() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "delete dentist tomorrow",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "dentist", "date": "tomorrow"}));
        assert_eq!(
            DeleteHandler.resolve(&ctx, &params).await,
            Resolution::Reply("I couldn't find any event matching 'dentist' on Tuesday, January 2.".to_string())
        );
    }

    #[tokio::test]
    async fn test_bad_time_filter_is_reported() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "delete the meeting at teatime",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "meeting", "start": "teatime"}));
        assert_eq!(
            DeleteHandler.resolve(&ctx, &params).await,
            Resolution::Reply(BAD_TIME.to_string())
        );
    }

    #[tokio::test]
    async fn test_series_delete_targets_master() {
        let calendar = InMemoryCalendar::new();
        let mut master = event("Standup", 1, 9);
        master.id = "series1".to_string();
        master.recurrence = vec!["RRULE:FREQ=DAILY".to_string()];
        calendar.insert(master).await;
        let mut instance = event("Standup", 2, 9);
        instance.id = "series1_20240102".to_string();
        instance.recurring_event_id = Some("series1".to_string());
        calendar.insert(instance).await;

        let ctx = ActionContext {
            provider: &calendar,
            text: "delete all standups tomorrow, the whole series",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "standup", "date": "tomorrow", "delete_series": true}));
        match DeleteHandler.resolve(&ctx, &params).await {
            Resolution::Draft {
                action: PendingAction::Delete(draft),
                text,
            } => {
                assert_eq!(draft.event_id, "series1");
                assert!(draft.is_series);
                assert_eq!(text, "Are you sure you want to delete the entire 'Standup' series?");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_series_delete_with_many_instances_targets_master() {
        use calendar::EventTime;
        use chrono::{TimeZone, Utc};

        let calendar = InMemoryCalendar::new();
        let mut master = event("Standup", 1, 9);
        master.id = "series1".to_string();
        master.recurrence = vec!["RRULE:FREQ=DAILY".to_string()];
        let first = Utc.with_ymd_and_hms(2023, 12, 1, 9, 0, 0).unwrap();
        master.start = EventTime::timed(first.fixed_offset(), Some("UTC".to_string()));
        master.end = EventTime::timed((first + chrono::Duration::hours(1)).fixed_offset(), Some("UTC".to_string()));
        calendar.insert(master).await;
        for day in [2, 3, 4] {
            let mut instance = event("Standup", day, 9);
            instance.id = format!("series1_202401{:02}", day);
            instance.recurring_event_id = Some("series1".to_string());
            calendar.insert(instance).await;
        }

        let ctx = ActionContext {
            provider: &calendar,
            text: "delete the standup series",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "standup", "delete_series": true}));
        match DeleteHandler.resolve(&ctx, &params).await {
            Resolution::Draft {
                action: PendingAction::Delete(draft),
                text,
            } => {
                assert_eq!(draft.event_id, "series1");
                assert!(draft.is_series);
                assert_eq!(text, "Are you sure you want to delete the entire 'Standup' series?");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
