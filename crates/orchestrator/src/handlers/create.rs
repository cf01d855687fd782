//! create_event: resolve the window, check conflicts, draft.

use async_trait::async_trait;
use calendar::EventTime;
use chrono_tz::Tz;
use tracing::{info, warn};

use super::{calendar_id, ActionContext, ActionHandler, Resolution};
use crate::clarification::build_missing_fields_message;
use crate::conflict::{check_window, ConflictReport, Slot};
use crate::extractor::{Action, ExtractedParams};
use crate::formatting::{day_label, time_label};
use crate::pending::{CreateDraft, PendingAction};
use crate::temporal::{resolve_recurrence, resolve_window, WindowRequest};

pub struct CreateHandler;

fn slot_label(slot: &Slot, tz: Tz) -> String {
    time_label(&slot.start.with_timezone(&tz))
}

/// `A`, `A or B`, `A, B or C`
fn join_or(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

fn draft_text(draft: &CreateDraft, report: &ConflictReport, tz: Tz) -> String {
    if !report.has_conflict() {
        let (start, end) = match (&draft.start, &draft.end) {
            (EventTime::Timed { date_time: s, .. }, EventTime::Timed { date_time: e, .. }) => {
                (s.with_timezone(&tz), e.with_timezone(&tz))
            }
            _ => return format!("I've drafted '{}'. You are free at this time.", draft.summary),
        };
        return format!(
            "I've drafted '{}' for {} from {} to {}. You are free at this time.",
            draft.summary,
            day_label(start.date_naive()),
            time_label(&start),
            time_label(&end)
        );
    }

    let names: Vec<&str> = report.conflicts.iter().map(|c| c.summary.as_str()).collect();
    let names = names.join("', '");
    if report.alternatives.is_empty() {
        format!(
            "⚠️ '{}' conflicts with '{}' at that time. Try a different time?",
            draft.summary, names
        )
    } else {
        let slots: Vec<String> = report.alternatives.iter().map(|s| slot_label(s, tz)).collect();
        format!(
            "⚠️ '{}' conflicts with '{}'. You're free at {} instead.",
            draft.summary,
            names,
            join_or(&slots)
        )
    }
}

#[async_trait]
impl ActionHandler for CreateHandler {
    fn action(&self) -> Action {
        Action::CreateEvent
    }

    async fn resolve(&self, ctx: &ActionContext<'_>, params: &ExtractedParams) -> Resolution {
        let Some(summary) = params.summary.clone() else {
            return Resolution::Clarification(build_missing_fields_message(
                &params.present,
                &["summary".to_string()],
                "",
            ));
        };

        let request = WindowRequest {
            text: ctx.text,
            date: params.date.as_deref(),
            start: params.start.as_deref(),
            end: params.end.as_deref(),
            duration: params.duration.as_deref(),
        };
        let window = match resolve_window(&request, ctx.now) {
            Ok(window) => window,
            Err(e) => {
                info!(error = ?e, "CREATE_WINDOW_UNRESOLVED");
                return Resolution::Reply(e.to_string());
            }
        };

        let calendar_id = calendar_id(params);
        let recurrence = resolve_recurrence(params.recurrence.as_deref(), ctx.text, ctx.today());

        let report = match check_window(ctx.provider, &calendar_id, window.start, window.end, None, true).await {
            Ok(report) => report,
            Err(e) if e.needs_connection() => return Resolution::NeedsConnection,
            Err(e) => {
                warn!(error = %e, "CREATE_CONFLICT_CHECK_FAILED");
                ConflictReport::default()
            }
        };

        let draft = CreateDraft {
            calendar_id,
            summary,
            start: EventTime::in_zone(window.start),
            end: EventTime::in_zone(window.end),
            attendees: params.attendees.clone(),
            recurrence,
            has_conflict: report.has_conflict(),
            conflicts: report.conflicts.clone(),
            alternatives: report.alternatives.clone(),
        };
        let text = draft_text(&draft, &report, ctx.tz());
        info!(
            summary = %draft.summary,
            start = %window.start,
            conflict = draft.has_conflict,
            recurring = !draft.recurrence.is_empty(),
            "CREATE_DRAFTED"
        );
        Resolution::Draft {
            action: PendingAction::Create(draft),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{event, now};
    use calendar::InMemoryCalendar;
    use serde_json::json;

    fn params(value: serde_json::Value) -> ExtractedParams {
        ExtractedParams::from_value(&value)
    }

    fn draft(resolution: Resolution) -> (CreateDraft, String) {
        match resolution {
            Resolution::Draft {
                action: PendingAction::Create(draft),
                text,
            } => (draft, text),
            other => panic!("expected create draft, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_team_sync_tomorrow_is_drafted() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "Schedule team sync tomorrow 2-3pm",
            now: now(),
        };
        let p = params(json!({"summary": "Team sync", "date": "2024-01-02", "start": "14:00", "end": "15:00"}));
        let (draft, text) = draft(CreateHandler.resolve(&ctx, &p).await);

        assert_eq!(draft.start.instant(Tz::UTC).to_rfc3339(), "2024-01-02T14:00:00+00:00");
        assert_eq!(draft.end.instant(Tz::UTC).to_rfc3339(), "2024-01-02T15:00:00+00:00");
        assert!(!draft.has_conflict);
        assert!(draft.recurrence.is_empty());
        assert_eq!(
            text,
            "I've drafted 'Team sync' for Tuesday, January 2 from 2:00 PM to 3:00 PM. You are free at this time."
        );
        assert!(calendar.all_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_offers_alternatives() {
        let calendar = InMemoryCalendar::new();
        calendar.insert(event("Standup", 2, 14)).await;
        let ctx = ActionContext {
            provider: &calendar,
            text: "book a review tomorrow at 2pm",
            now: now(),
        };
        let p = params(json!({"summary": "Review", "date": "tomorrow", "start": "2pm", "duration": "60"}));
        let (draft, text) = draft(CreateHandler.resolve(&ctx, &p).await);

        assert!(draft.has_conflict);
        assert_eq!(draft.alternatives.len(), 3);
        assert_eq!(
            text,
            "⚠️ 'Review' conflicts with 'Standup'. You're free at 9:00 AM, 9:30 AM or 10:00 AM instead."
        );
    }

    #[tokio::test]
    async fn test_unparseable_start_names_format() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "lunch tomorrow at lunchtime",
            now: now(),
        };
        let p = params(json!({"summary": "Lunch", "date": "tomorrow", "start": "lunchtime"}));
        match CreateHandler.resolve(&ctx, &p).await {
            Resolution::Reply(text) => assert!(text.contains("'2pm'"), "{}", text),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recurrence_needs_a_cue() {
        let calendar = InMemoryCalendar::new();
        let ctx = ActionContext {
            provider: &calendar,
            text: "gym every monday at 7am",
            now: now(),
        };
        let p = params(json!({"summary": "Gym", "date": "2024-01-01", "start": "07:00", "duration": "60"}));
        let (draft, _) = draft(CreateHandler.resolve(&ctx, &p).await);
        assert_eq!(draft.recurrence.len(), 1);
        assert!(draft.recurrence[0].contains("FREQ=WEEKLY"));
    }

    #[test]
    fn test_join_or() {
        let items: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_or(&items[..1]), "a");
        assert_eq!(join_or(&items[..2]), "a or b");
        assert_eq!(join_or(&items), "a, b or c");
    }
}
