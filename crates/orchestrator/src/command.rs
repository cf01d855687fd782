//! The command surface: one request in, one typed response out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pending::ActionKind;

/// Kind of a command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Text,
    NeedsConnection,
    CalendarActionRequest,
    EventConfirmationRequest,
    EventDeletionConfirmation,
    EventUpdateConfirmation,
    EventSuccess,
    EventUpdated,
    EventDeleted,
}

/// What the caller decided about the pending draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationAction {
    /// Execute a create draft.
    Create,
    /// Execute a delete draft.
    Delete,
    /// Execute a bulk delete draft.
    DeleteBulk,
    /// Execute an update draft.
    Update,
    /// Discard the draft.
    Cancel,
}

impl ConfirmationAction {
    /// The draft kind this confirmation executes; `None` for a cancel.
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            Self::Create => Some(ActionKind::Create),
            Self::Delete => Some(ActionKind::Delete),
            Self::DeleteBulk => Some(ActionKind::DeleteBulk),
            Self::Update => Some(ActionKind::Update),
            Self::Cancel => None,
        }
    }
}

/// A confirmation sent by the caller for the conversation's pending draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPayload {
    pub action: ConfirmationAction,
}

/// An inbound command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Authenticated user issuing the command.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    pub conversation_id: Option<String>,
    /// IANA zone of the client; UTC when absent or invalid.
    pub client_timezone: Option<String>,
    pub confirmation: Option<ConfirmationPayload>,
    /// Message id of the draft being confirmed.
    pub pending_message_id: Option<i64>,
}

impl CommandRequest {
    /// A plain text command.
    pub fn text(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.client_timezone = Some(tz.into());
        self
    }

    pub fn confirm(mut self, action: ConfirmationAction, pending_message_id: Option<i64>) -> Self {
        self.confirmation = Some(ConfirmationPayload { action });
        self.pending_message_id = pending_message_id;
        self
    }
}

/// The response to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub response_text: String,
    pub structured_content: Value,
    pub conversation_id: String,
    pub conversation_title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_type_wire_names() {
        assert_eq!(
            serde_json::to_value(ResponseType::EventDeletionConfirmation).unwrap(),
            json!("event_deletion_confirmation")
        );
        assert_eq!(serde_json::to_value(ResponseType::NeedsConnection).unwrap(), json!("needs_connection"));
    }

    #[test]
    fn test_request_parses_confirmation() {
        let request: CommandRequest = serde_json::from_value(json!({
            "text": "",
            "conversation_id": "c1",
            "confirmation": {"action": "delete_bulk"},
            "pending_message_id": 7
        }))
        .unwrap();
        let payload = request.confirmation.unwrap();
        assert_eq!(payload.action.kind(), Some(ActionKind::DeleteBulk));
        assert_eq!(request.pending_message_id, Some(7));
    }
}
