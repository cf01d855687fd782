//! Database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user of the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Opaque user id.
    pub id: String,
    /// Display name used in greetings.
    pub name: String,
    /// Email address for the email channel.
    pub email: Option<String>,
}

/// Default title for a conversation before one is generated.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Maximum stored title length in characters.
pub const MAX_TITLE_LENGTH: usize = 120;

/// A conversation between a user and the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Serialized pending action awaiting confirmation, if any.
    pub pending_action: Option<String>,
    /// Message that displays the pending action.
    pub pending_message_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender: Sender,
    pub text: String,
    /// `text` or one of the structured payload kinds.
    pub message_type: String,
    /// JSON payload for structured messages.
    pub content: Option<String>,
    pub created_at: String,
}

/// A message to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: Sender,
    pub text: String,
    pub message_type: String,
    pub content: Option<String>,
}

impl NewMessage {
    /// A plain text message.
    pub fn text(conversation_id: impl Into<String>, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender,
            text: text.into(),
            message_type: "text".to_string(),
            content: None,
        }
    }

    /// Attach a structured payload.
    pub fn with_content(mut self, message_type: impl Into<String>, content: Option<String>) -> Self {
        self.message_type = message_type.into();
        self.content = content;
        self
    }
}

/// Per-user notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NotificationPreference {
    pub user_id: String,
    pub whatsapp_enabled: bool,
    /// E.164 number, with or without the leading `+`.
    pub whatsapp_number: Option<String>,
    pub email_enabled: bool,
    /// Minutes before an event at which a reminder becomes eligible.
    pub reminder_lead_time: i64,
    pub morning_briefing_enabled: bool,
    /// Local time of day, `HH:MM`.
    pub morning_briefing_time: String,
    /// IANA timezone name.
    pub user_timezone: String,
}

impl NotificationPreference {
    /// Defaults for a user with no stored row.
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            whatsapp_enabled: false,
            whatsapp_number: None,
            email_enabled: true,
            reminder_lead_time: 30,
            morning_briefing_enabled: true,
            morning_briefing_time: "08:00".to_string(),
            user_timezone: "UTC".to_string(),
        }
    }

    /// Whether any reminder channel is enabled.
    pub fn any_channel_enabled(&self) -> bool {
        self.whatsapp_enabled || self.email_enabled
    }
}

/// A notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Email => "email",
        }
    }
}

/// Outcome recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Snoozed,
}

/// One notification attempt in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SentNotification {
    pub id: i64,
    pub user_id: String,
    /// Calendar provider event id.
    pub event_id: String,
    pub channel: Channel,
    pub status: NotificationStatus,
    pub timestamp: DateTime<Utc>,
    /// Transport message id (Twilio SID), used to resolve replies.
    pub provider_message_id: Option<String>,
}

/// Stored OAuth credentials for a user's calendar.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CalendarCredential {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A leadership lease row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Lease {
    pub name: String,
    pub holder: String,
    /// Unix seconds.
    pub expires_at: i64,
}
