//! update_event: match the event, apply the requested changes, draft.

use async_trait::async_trait;
use calendar::{CalendarEvent, EventTime};
use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::{info, warn};

use super::{calendar_id, ActionContext, ActionHandler, Resolution};
use crate::conflict::check_window;
use crate::extractor::{Action, EventUpdates, ExtractedParams};
use crate::formatting::{candidate_list, day_label};
use crate::matcher::{outcome, parse_filter_time, select, series_outcome, series_target, MatchOutcome, MatchQuery};
use crate::pending::{EventSnapshot, PendingAction, UpdateDraft};
use crate::temporal::{day_span, localize, parse_datetime, parse_time_only, DEFAULT_DURATION_MINUTES};

const FIND_FAILED: &str = "Sorry, I couldn't look up your events at this time.";
const NO_UPDATES: &str =
    "I couldn't determine what you'd like to update. Please specify what changes you want to make.";
const BAD_START: &str =
    "I couldn't understand the start time format provided. Please try using a format like '14:00' or '2pm'.";
const BAD_END: &str =
    "I couldn't understand the end time format provided. Please try using a format like '15:00' or '3pm'.";
const BAD_DATE: &str = "I couldn't understand the new date provided. Please try a date like '2024-01-15' or 'tomorrow'.";
const ALL_DAY_END: &str = "Please include a start time as well when giving an all-day event an end time.";
const SERIES_FAILED: &str =
    "I couldn't retrieve the series master for this event. Please try updating a single instance instead.";

pub struct UpdateHandler;

/// An event's times while changes are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Span {
    AllDay { start: NaiveDate, end: NaiveDate },
    Timed { start: DateTime<Tz>, end: DateTime<Tz> },
}

impl Span {
    fn of(event: &CalendarEvent, tz: Tz) -> Self {
        match (&event.start, &event.end) {
            (EventTime::AllDay { date: start }, EventTime::AllDay { date: end }) => Self::AllDay {
                start: *start,
                end: *end,
            },
            _ => Self::Timed {
                start: event.start.instant(tz).with_timezone(&tz),
                end: event.end.instant(tz).with_timezone(&tz),
            },
        }
    }

    fn into_times(self) -> (EventTime, EventTime) {
        match self {
            Self::AllDay { start, end } => (EventTime::all_day(start), EventTime::all_day(end)),
            Self::Timed { start, end } => (EventTime::in_zone(start), EventTime::in_zone(end)),
        }
    }
}

/// Apply requested date, start and end changes.
///
/// Date changes keep time of day and length. Start changes keep length; an
/// all-day event given a start becomes a one-hour timed event. End changes
/// move the end only, to the next day when it would not follow the start.
fn apply_times(span: Span, updates: &EventUpdates, ctx: &ActionContext<'_>) -> Result<Span, &'static str> {
    let tz = ctx.tz();
    let mut span = span;

    if let Some(raw) = updates.date.as_deref() {
        let date = ctx.date(Some(raw)).ok_or(BAD_DATE)?;
        span = match span {
            Span::AllDay { start, end } => Span::AllDay {
                start: date,
                end: date + (end - start).max(Duration::days(1)),
            },
            Span::Timed { start, end } => {
                let moved = localize(tz, date.and_time(start.time())).ok_or(BAD_DATE)?;
                Span::Timed {
                    start: moved,
                    end: moved + (end - start),
                }
            }
        };
    }

    if let Some(raw) = updates.start.as_deref() {
        let (day, length) = match span {
            Span::AllDay { start, .. } => (start, Duration::minutes(DEFAULT_DURATION_MINUTES)),
            Span::Timed { start, end } => (start.date_naive(), end - start),
        };
        let start = match parse_time_only(raw) {
            Some(t) => localize(tz, day.and_time(t)).ok_or(BAD_START)?,
            None => parse_datetime(raw, tz).ok_or(BAD_START)?.with_timezone(&tz),
        };
        span = Span::Timed {
            start,
            end: start + length,
        };
    }

    if let Some(raw) = updates.end.as_deref() {
        let Span::Timed { start, .. } = span else {
            return Err(ALL_DAY_END);
        };
        let mut end = match parse_time_only(raw) {
            Some(t) => localize(tz, start.date_naive().and_time(t)).ok_or(BAD_END)?,
            None => parse_datetime(raw, tz).ok_or(BAD_END)?.with_timezone(&tz),
        };
        if end <= start {
            end = localize(tz, (end.date_naive() + Duration::days(1)).and_time(end.time())).ok_or(BAD_END)?;
        }
        span = Span::Timed { start, end };
    }

    Ok(span)
}

/// Keep the provider's representation when an instant did not move.
fn unchanged_or(new: EventTime, old: &EventTime, tz: Tz) -> EventTime {
    if new.is_all_day() == old.is_all_day() && new.instant(tz) == old.instant(tz) {
        old.clone()
    } else {
        new
    }
}

impl UpdateHandler {
    async fn draft(
        &self,
        ctx: &ActionContext<'_>,
        calendar_id: String,
        target: CalendarEvent,
        updates: &EventUpdates,
        is_series: bool,
    ) -> Resolution {
        let tz = ctx.tz();
        let original = EventSnapshot {
            summary: target.title().to_string(),
            start: target.start.clone(),
            end: target.end.clone(),
        };

        let times_change = updates.date.is_some() || updates.start.is_some() || updates.end.is_some();
        let (start, end, span) = if times_change {
            match apply_times(Span::of(&target, tz), updates, ctx) {
                Ok(span) => {
                    let (start, end) = span.into_times();
                    (unchanged_or(start, &target.start, tz), unchanged_or(end, &target.end, tz), Some(span))
                }
                Err(message) => return Resolution::Reply(message.to_string()),
            }
        } else {
            (target.start.clone(), target.end.clone(), None)
        };

        let updated = EventSnapshot {
            summary: updates.summary.clone().unwrap_or_else(|| original.summary.clone()),
            start,
            end,
        };
        if updated == original {
            return Resolution::Reply(format!(
                "I found '{}', but I'm not sure what changes you'd like to make.",
                original.summary
            ));
        }

        let mut draft = UpdateDraft {
            calendar_id,
            event_id: target.id.clone(),
            original,
            updated,
            has_conflict: false,
            conflicts: Vec::new(),
            is_series_update: is_series,
        };

        if let (Some(Span::Timed { start, end }), false) = (span, is_series) {
            match check_window(ctx.provider, &draft.calendar_id, start, end, Some(&target.id), false).await {
                Ok(report) => {
                    draft.has_conflict = report.has_conflict();
                    draft.conflicts = report.conflicts;
                }
                Err(e) if e.needs_connection() => return Resolution::NeedsConnection,
                Err(e) => warn!(error = %e, "UPDATE_CONFLICT_CHECK_FAILED"),
            }
        }

        let summary = &draft.original.summary;
        let text = match draft.change_description(tz) {
            None => format!("I found '{}', but I'm not sure what changes you'd like to make.", summary),
            Some(changes) if draft.is_series_update => {
                format!("I found the recurring '{}' series. Update the {} for ALL instances?", summary, changes)
            }
            Some(changes) if draft.has_conflict => format!(
                "⚠️ I found '{}' and can update the {}, but you have a conflict at that time. Do you want to proceed?",
                summary, changes
            ),
            Some(changes) => format!("I found '{}'. Update the {}?", summary, changes),
        };
        info!(
            event_id = %draft.event_id,
            series = draft.is_series_update,
            conflict = draft.has_conflict,
            "UPDATE_DRAFTED"
        );
        Resolution::Draft {
            action: PendingAction::Update(draft),
            text,
        }
    }
}

#[async_trait]
impl ActionHandler for UpdateHandler {
    fn action(&self) -> Action {
        Action::UpdateEvent
    }

    async fn resolve(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution {
        if params.updates.is_empty() {
            return Resolution::Reply(NO_UPDATES.to_string());
        }

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
            time: params.start.as_deref().and_then(|s| parse_filter_time(s, ctx.tz())),
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
                None => format!("I couldn't find any event matching '{}'.", what),
            }),
            MatchOutcome::Multiple(candidates) => Resolution::Reply(format!(
                "I found {} events matching '{}'. Which one would you like to update?\n\n{}",
                candidates.len(),
                what,
                candidate_list(&candidates, ctx.tz())
            )),
            MatchOutcome::Single(event) if params.update_series && event.is_recurring_instance() => {
                match series_target(ctx.provider, &calendar_id, event).await {
                    Ok(master) => self.draft(ctx, calendar_id, master, &params.updates, true).await,
                    Err(e) if e.needs_connection() => Resolution::NeedsConnection,
                    Err(_) => Resolution::Reply(SERIES_FAILED.to_string()),
                }
            }
            MatchOutcome::Single(event) => {
                let is_series = params.update_series && !event.recurrence.is_empty();
                self.draft(ctx, calendar_id, event, &params.updates, is_series).await
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

    fn update_draft(resolution: Resolution) -> (UpdateDraft, String) {
        match resolution {
            Resolution::Draft {
                action: PendingAction::Update(draft),
                text,
            } => (draft, text),
            other => panic!("expected update draft, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_title_and_time_change() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("Sync", 5, 10)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "rename friday's sync to Review and move it to 3pm",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({
            "summary": "sync",
            "date": "2024-01-05",
            "updates": {"summary": "Review", "start": "3pm"}
        }));
        let (draft, text) = update_draft(UpdateHandler.resolve(&ctx, &params).await);
        assert_eq!(
            text,
            "I found 'Sync'. Update the title to 'Review' and time to 3:00 PM on Friday, January 5?"
        );
        assert_eq!(draft.updated.end.instant(Tz::UTC).to_rfc3339(), "2024-01-05T16:00:00+00:00");
    }

    #[tokio::test]
    async fn test_date_change_keeps_time_and_length() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("Dentist", 2, 9)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "move the dentist to friday",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "dentist", "updates": {"date": "2024-01-05"}}));
        let (draft, _) = update_draft(UpdateHandler.resolve(&ctx, &params).await);
        assert_eq!(draft.updated.start.instant(Tz::UTC).to_rfc3339(), "2024-01-05T09:00:00+00:00");
        assert_eq!(draft.updated.end.instant(Tz::UTC).to_rfc3339(), "2024-01-05T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_conflict_excludes_the_event_itself() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("Sync", 2, 10)).await;
        calendar.insert(event("Lunch", 2, 12)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "move sync to noon",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "sync", "date": "tomorrow", "updates": {"start": "noon"}}));
        let (draft, text) = update_draft(UpdateHandler.resolve(&ctx, &params).await);
        assert!(draft.has_conflict);
        assert_eq!(draft.conflicts.len(), 1);
        assert_eq!(draft.conflicts[0].summary, "Lunch");
        assert!(text.starts_with("⚠️ I found 'Sync' and can update the time to 12:00 PM"), "{}", text);

        let params = ExtractedParams::from_value(&json!({"summary": "sync", "date": "tomorrow", "updates": {"start": "10:30"}}));
        let (draft, _) = update_draft(UpdateHandler.resolve(&ctx, &params).await);
        assert!(!draft.has_conflict);
    }

    #[tokio::test]
    async fn test_end_before_start_moves_to_next_day() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("Party", 2, 22)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "party ends at 1am",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "party", "date": "tomorrow", "updates": {"end": "1am"}}));
        let (draft, _) = update_draft(UpdateHandler.resolve(&ctx, &params).await);
        assert_eq!(draft.updated.end.instant(Tz::UTC).to_rfc3339(), "2024-01-03T01:00:00+00:00");
        assert_eq!(draft.updated.start, draft.original.start);
    }

    #[tokio::test]
    async fn test_empty_updates_and_bad_times() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("Sync", 2, 10)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "change the sync",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({"summary": "sync"}));
        assert_eq!(UpdateHandler.resolve(&ctx, &params).await, Resolution::Reply(NO_UPDATES.to_string()));

        let params = ExtractedParams::from_value(&json!({"summary": "sync", "updates": {"start": "whenever"}}));
        assert_eq!(UpdateHandler.resolve(&ctx, &params).await, Resolution::Reply(BAD_START.to_string()));
    }

    #[tokio::test]
    async fn test_missing_series_master_is_reported() {
        let calendar = InMemoryCalendar::new();
        let mut instance = event("Standup", 2, 9);
        instance.recurring_event_id = Some("gone".to_string());
        calendar.insert(instance).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "move all standups to 10am",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({
            "summary": "standup",
            "update_series": true,
            "updates": {"start": "10am"}
        }));
        assert_eq!(UpdateHandler.resolve(&ctx, &params).await, Resolution::Reply(SERIES_FAILED.to_string()));
    }

    #[tokio::test]
    async fn test_series_update_with_many_instances_targets_master() {
        let calendar = InMemoryCalendar::new();
        let mut master = event("Standup", 1, 9);
        master.id = "series1".to_string();
        master.recurrence = vec!["RRULE:FREQ=DAILY".to_string()];
        calendar.insert(master).await;
        for day in [2, 3, 4] {
            let mut instance = event("Standup", day, 9);
            instance.id = format!("series1_202401{:02}", day);
            instance.recurring_event_id = Some("series1".to_string());
            calendar.insert(instance).await;
        }
        let ctx = ActionContext {
            provider: &calendar,
            text: "move all standups to 10am",
            now: now(),
        };
        let params = ExtractedParams::from_value(&json!({
            "summary": "standup",
            "update_series": true,
            "updates": {"start": "10am"}
        }));
        let (draft, text) = update_draft(UpdateHandler.resolve(&ctx, &params).await);
        assert_eq!(draft.event_id, "series1");
        assert!(draft.is_series_update);
        assert!(text.starts_with("I found the recurring 'Standup' series."), "{}", text);
    }
}
