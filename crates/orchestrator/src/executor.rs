//! Execution of confirmed drafts against the calendar provider.

use calendar::{Attendee, CalendarError, CalendarProvider, EventTime, NewEvent};
use chrono_tz::Tz;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::command::ResponseType;
use crate::formatting::{day_label, time_label};
use crate::pending::{BulkDeleteDraft, CreateDraft, DeleteDraft, PendingAction, UpdateDraft};

/// Text when a confirmation needs a calendar connection.
pub const CONFIRM_NEEDS_CONNECTION: &str = "Please connect your Google account to confirm this event.";

const CREATE_FAILED: &str = "Sorry, I failed to create the event. Please try again.";
const INVALID_RECURRENCE: &str =
    "Sorry, the recurrence pattern was invalid. Please try again with a simpler repetition (e.g., 'every Monday').";
const DELETE_FAILED: &str = "Sorry, I failed to delete the event. Please try again.";
const UPDATE_FAILED: &str = "Sorry, I failed to update the event. Please try again.";

/// The terminal message of an executed (or failed) draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub response_type: ResponseType,
    /// `message_type` of the stored agent message.
    pub message_type: &'static str,
    pub text: String,
    pub content: Value,
}

impl Outcome {
    fn success(response_type: ResponseType, message_type: &'static str, text: String, content: Value) -> Self {
        Self {
            response_type,
            message_type,
            text,
            content,
        }
    }

    fn failure(error: &CalendarError, text: &str) -> Self {
        if error.needs_connection() {
            return Self {
                response_type: ResponseType::NeedsConnection,
                message_type: "text",
                text: CONFIRM_NEEDS_CONNECTION.to_string(),
                content: json!({"needs_connection": true}),
            };
        }
        Self {
            response_type: ResponseType::Text,
            message_type: "text",
            text: text.to_string(),
            content: Value::Null,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(
            self.response_type,
            ResponseType::EventSuccess | ResponseType::EventUpdated | ResponseType::EventDeleted
        )
    }
}

fn when(start: &EventTime, end: &EventTime, tz: Tz) -> String {
    match (start, end) {
        (EventTime::Timed { date_time: s, .. }, EventTime::Timed { date_time: e, .. }) => {
            let (s, e) = (s.with_timezone(&tz), e.with_timezone(&tz));
            format!(
                "on {} from {} to {}",
                day_label(s.date_naive()),
                time_label(&s),
                time_label(&e)
            )
        }
        _ => format!("on {}", day_label(start.date_in(tz))),
    }
}

async fn create(provider: &dyn CalendarProvider, draft: &CreateDraft, tz: Tz) -> Outcome {
    let body = NewEvent {
        summary: draft.summary.clone(),
        start: draft.start.clone(),
        end: draft.end.clone(),
        recurrence: draft.recurrence.clone(),
        attendees: draft.attendees.iter().map(Attendee::new).collect(),
    };
    match provider.create_event(&draft.calendar_id, &body).await {
        Ok(event) => {
            info!(event_id = %event.id, summary = %draft.summary, "EVENT_CREATED");
            Outcome::success(
                ResponseType::EventSuccess,
                "event_success",
                format!("I created '{}' {}.", draft.summary, when(&draft.start, &draft.end, tz)),
                json!({
                    "event_title": draft.summary,
                    "event_link": event.html_link,
                    "event_id": event.id,
                }),
            )
        }
        Err(e) if e.is_invalid_recurrence() => {
            warn!(error = %e, recurrence = ?draft.recurrence, "EVENT_CREATE_BAD_RECURRENCE");
            Outcome::failure(&e, INVALID_RECURRENCE)
        }
        Err(e) => {
            error!(error = %e, summary = %draft.summary, "EVENT_CREATE_FAILED");
            Outcome::failure(&e, CREATE_FAILED)
        }
    }
}

async fn delete(provider: &dyn CalendarProvider, draft: &DeleteDraft) -> Outcome {
    match provider.delete_event(&draft.calendar_id, &draft.event_id).await {
        Ok(()) => {
            info!(event_id = %draft.event_id, series = draft.is_series, "EVENT_DELETED");
            Outcome::success(
                ResponseType::EventDeleted,
                "event_deleted",
                "The event has been removed from your calendar.".to_string(),
                json!({"event_id": draft.event_id, "summary": draft.summary}),
            )
        }
        Err(e) => {
            error!(error = %e, event_id = %draft.event_id, "EVENT_DELETE_FAILED");
            Outcome::failure(&e, DELETE_FAILED)
        }
    }
}

/// Each id is deleted independently; the reply counts what was removed.
async fn delete_bulk(provider: &dyn CalendarProvider, draft: &BulkDeleteDraft) -> Outcome {
    let mut deleted = Vec::new();
    let mut last_error = None;
    for id in &draft.event_ids {
        match provider.delete_event(&draft.calendar_id, id).await {
            Ok(()) => deleted.push(id.clone()),
            Err(e) => {
                warn!(error = %e, event_id = %id, "EVENT_BULK_DELETE_ITEM_FAILED");
                last_error = Some(e);
            }
        }
    }
    info!(deleted = deleted.len(), requested = draft.event_ids.len(), "EVENTS_BULK_DELETED");

    match (deleted.len(), last_error) {
        (0, Some(e)) => Outcome::failure(&e, DELETE_FAILED),
        (n, _) => Outcome::success(
            ResponseType::EventDeleted,
            "event_deleted",
            format!("{} events have been removed from your calendar.", n),
            json!({
                "deleted": deleted,
                "failed": draft.event_ids.len() - n,
            }),
        ),
    }
}

/// Fetch the current event so fields the draft does not carry (recurrence,
/// attendees) survive the replace.
async fn update(provider: &dyn CalendarProvider, draft: &UpdateDraft, tz: Tz) -> Outcome {
    let mut event = match provider.get_event(&draft.calendar_id, &draft.event_id).await {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, event_id = %draft.event_id, "EVENT_UPDATE_FETCH_FAILED");
            return Outcome::failure(&e, UPDATE_FAILED);
        }
    };
    event.summary = draft.updated.summary.clone();
    event.start = draft.updated.start.clone();
    event.end = draft.updated.end.clone();

    match provider.update_event(&draft.calendar_id, &draft.event_id, &event).await {
        Ok(saved) => {
            info!(event_id = %saved.id, series = draft.is_series_update, "EVENT_UPDATED");
            let text = match draft.change_description(tz) {
                Some(changes) => format!("✓ Updated '{}', changed {}.", draft.original.summary, changes),
                None => format!("✓ Updated '{}'.", draft.original.summary),
            };
            Outcome::success(
                ResponseType::EventUpdated,
                "event_updated",
                text,
                json!({
                    "event_id": saved.id,
                    "original": draft.original,
                    "updated": draft.updated,
                }),
            )
        }
        Err(e) => {
            error!(error = %e, event_id = %draft.event_id, "EVENT_UPDATE_FAILED");
            Outcome::failure(&e, UPDATE_FAILED)
        }
    }
}

/// Execute a confirmed draft. Provider failures become apologetic outcomes.
pub async fn execute(provider: &dyn CalendarProvider, action: &PendingAction, tz: Tz) -> Outcome {
    match action {
        PendingAction::Create(draft) => create(provider, draft, tz).await,
        PendingAction::Delete(draft) => delete(provider, draft).await,
        PendingAction::DeleteBulk(draft) => delete_bulk(provider, draft).await,
        PendingAction::Update(draft) => update(provider, draft, tz).await,
    }
}
