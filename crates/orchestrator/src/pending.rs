//! Drafted actions awaiting confirmation.
//!
//! A conversation holds at most one [`PendingAction`]. It carries everything
//! needed to execute or cancel the action without another model call.

use calendar::EventTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::command::ResponseType;
use crate::conflict::{ConflictSummary, Slot};
use crate::formatting::start_change;

/// A drafted create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraft {
    pub calendar_id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub recurrence: Vec<String>,
    #[serde(default)]
    pub has_conflict: bool,
    #[serde(default)]
    pub conflicts: Vec<ConflictSummary>,
    #[serde(default)]
    pub alternatives: Vec<Slot>,
}

/// A drafted single delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDraft {
    pub calendar_id: String,
    pub event_id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub is_series: bool,
}

/// A drafted delete of every event in a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteDraft {
    pub calendar_id: String,
    pub event_ids: Vec<String>,
    /// The range as shown to the user.
    pub label: String,
}

/// Title and times of an event before or after an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
}

/// A drafted update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDraft {
    pub calendar_id: String,
    pub event_id: String,
    pub original: EventSnapshot,
    pub updated: EventSnapshot,
    #[serde(default)]
    pub has_conflict: bool,
    #[serde(default)]
    pub conflicts: Vec<ConflictSummary>,
    #[serde(default)]
    pub is_series_update: bool,
}

impl UpdateDraft {
    /// What changes, e.g. `title to 'Review' and time to 3:00 PM on Friday, January 5`.
    pub fn change_description(&self, tz: Tz) -> Option<String> {
        let mut changes = Vec::new();
        if self.updated.summary != self.original.summary {
            changes.push(format!("title to '{}'", self.updated.summary));
        }
        if self.updated.start != self.original.start {
            changes.push(start_change(&self.updated.start, tz));
        } else if self.updated.end != self.original.end {
            changes.push(match &self.updated.end {
                EventTime::Timed { date_time, .. } => {
                    format!("end time to {}", crate::formatting::time_label(&date_time.with_timezone(&tz)))
                }
                EventTime::AllDay { .. } => "end date".to_string(),
            });
        }
        if changes.is_empty() {
            None
        } else {
            Some(changes.join(" and "))
        }
    }
}

/// Which kind of action a draft holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Delete,
    DeleteBulk,
    Update,
}

/// The single pending action of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    Create(CreateDraft),
    Delete(DeleteDraft),
    DeleteBulk(BulkDeleteDraft),
    Update(UpdateDraft),
}

impl PendingAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create(_) => ActionKind::Create,
            Self::Delete(_) => ActionKind::Delete,
            Self::DeleteBulk(_) => ActionKind::DeleteBulk,
            Self::Update(_) => ActionKind::Update,
        }
    }

    /// `message_type` of the message displaying the draft.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Create(_) => "event_preview",
            Self::Delete(_) | Self::DeleteBulk(_) => "event_deletion_confirmation",
            Self::Update(_) => "event_update_confirmation",
        }
    }

    /// Response type returned with the draft.
    pub fn response_type(&self) -> ResponseType {
        match self {
            Self::Create(_) => ResponseType::EventConfirmationRequest,
            Self::Delete(_) | Self::DeleteBulk(_) => ResponseType::EventDeletionConfirmation,
            Self::Update(_) => ResponseType::EventUpdateConfirmation,
        }
    }

    /// Whether a free-text yes or no may resolve this draft.
    pub fn accepts_text_reply(&self) -> bool {
        matches!(self, Self::Delete(_) | Self::DeleteBulk(_))
    }

    /// Acknowledgement appended when the draft is cancelled.
    pub fn cancel_text(&self) -> String {
        match self {
            Self::Create(d) => format!("Okay, I've discarded the draft for '{}'.", d.summary),
            Self::Delete(d) => format!("Okay, I've cancelled the deletion of '{}'.", d.summary),
            Self::DeleteBulk(d) => format!("Okay, I've cancelled the deletion of {} events.", d.event_ids.len()),
            Self::Update(d) => format!("Okay, I've cancelled the update to '{}'.", d.original.summary),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn timed(h: u32) -> EventTime {
        EventTime::timed(Utc.with_ymd_and_hms(2024, 1, 5, h, 0, 0).unwrap().fixed_offset(), Some("UTC".to_string()))
    }

    fn update(summary: &str, start: u32) -> UpdateDraft {
        UpdateDraft {
            calendar_id: "primary".to_string(),
            event_id: "evt1".to_string(),
            original: EventSnapshot {
                summary: "Sync".to_string(),
                start: timed(10),
                end: timed(11),
            },
            updated: EventSnapshot {
                summary: summary.to_string(),
                start: timed(start),
                end: timed(start + 1),
            },
            has_conflict: false,
            conflicts: vec![],
            is_series_update: false,
        }
    }

    #[test]
    fn test_tagged_json_survives_storage() {
        let action = PendingAction::Delete(DeleteDraft {
            calendar_id: "primary".to_string(),
            event_id: "evt1".to_string(),
            summary: "Dentist".to_string(),
            start: timed(9),
            end: timed(10),
            is_series: false,
        });
        let raw = action.to_json().unwrap();
        assert!(raw.contains(r#""kind":"delete""#));
        assert_eq!(PendingAction::from_json(&raw).unwrap(), action);
        assert_eq!(action.message_type(), "event_deletion_confirmation");
        assert!(action.accepts_text_reply());
    }

    #[test]
    fn test_change_description() {
        assert_eq!(
            update("Review", 15).change_description(Tz::UTC).as_deref(),
            Some("title to 'Review' and time to 3:00 PM on Friday, January 5")
        );
        assert_eq!(update("Sync", 10).change_description(Tz::UTC), None);
    }

    #[test]
    fn test_create_is_not_text_confirmable() {
        let action = PendingAction::Create(CreateDraft {
            calendar_id: "primary".to_string(),
            summary: "Lunch".to_string(),
            start: timed(12),
            end: timed(13),
            attendees: vec![],
            recurrence: vec![],
            has_conflict: false,
            conflicts: vec![],
            alternatives: vec![],
        });
        assert!(!action.accepts_text_reply());
        assert_eq!(action.response_type(), ResponseType::EventConfirmationRequest);
        assert_eq!(action.cancel_text(), "Okay, I've discarded the draft for 'Lunch'.");
    }
}
