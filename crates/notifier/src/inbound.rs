//! Commands users send back over WhatsApp.

use chrono::{DateTime, Utc};
use database::{notification_preference, sent_notification, Database};
use tracing::{info, warn};
use whatsapp::{InboundCommand, InboundMessage};

use crate::error::NotifierError;

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// WhatsApp notifications were turned off.
    Disabled,
    /// A reminder was snoozed; `None` when nothing had been sent yet.
    Snoozed { event_id: Option<String> },
    /// The body was not a command.
    Ignored,
    /// No preference row matches the sender.
    UnknownSender,
}

impl InboundOutcome {
    /// Plain-text acknowledgement for the webhook response.
    pub fn reply_text(&self) -> &'static str {
        match self {
            InboundOutcome::Disabled => "Disabled",
            InboundOutcome::Snoozed { .. } => "Snoozed",
            InboundOutcome::Ignored => "OK",
            InboundOutcome::UnknownSender => "User not found",
        }
    }
}

/// Apply an inbound `OFF` or `SNOOZE`.
///
/// A snooze targets the event of the reminder being replied to when the
/// transport reports one, and the user's latest sent reminder otherwise.
pub async fn handle_inbound(
    db: &Database,
    message: &InboundMessage,
    now: DateTime<Utc>,
) -> Result<InboundOutcome, NotifierError> {
    let pool = db.pool();
    let number = message.sender_number();
    let Some(pref) = notification_preference::find_by_whatsapp_number(pool, number).await? else {
        warn!(from = %number, "WHATSAPP_REPLY_UNKNOWN_SENDER");
        return Ok(InboundOutcome::UnknownSender);
    };

    match message.command() {
        InboundCommand::Off => {
            notification_preference::disable_whatsapp(pool, &pref.user_id).await?;
            info!(user_id = %pref.user_id, "WHATSAPP_DISABLED_BY_REPLY");
            Ok(InboundOutcome::Disabled)
        }
        InboundCommand::Snooze => {
            if let Some(sid) = message.replied_to.as_deref() {
                if let Some(event_id) = sent_notification::event_for_message(pool, &pref.user_id, sid).await? {
                    if sent_notification::snooze_latest_sent_for_event(pool, &pref.user_id, &event_id, now).await? {
                        info!(user_id = %pref.user_id, event_id = %event_id, "REMINDER_SNOOZED");
                        return Ok(InboundOutcome::Snoozed {
                            event_id: Some(event_id),
                        });
                    }
                }
            }
            let event_id = sent_notification::snooze_latest_sent(pool, &pref.user_id, now).await?;
            info!(user_id = %pref.user_id, event_id = ?event_id, "REMINDER_SNOOZED");
            Ok(InboundOutcome::Snoozed { event_id })
        }
        InboundCommand::Unknown => Ok(InboundOutcome::Ignored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use database::{user, Channel, NotificationPreference, NotificationStatus, User};

    fn inbound(body: &str, replied_to: Option<&str>) -> InboundMessage {
        InboundMessage {
            from: "whatsapp:+15551234567".to_string(),
            body: body.to_string(),
            replied_to: replied_to.map(str::to_string),
        }
    }

    async fn setup() -> Database {
        let db = Database::in_memory().await.unwrap();
        user::create_user(
            db.pool(),
            &User {
                id: "u1".to_string(),
                name: "Ana".to_string(),
                email: None,
            },
        )
        .await
        .unwrap();
        let mut pref = NotificationPreference::defaults_for("u1");
        pref.whatsapp_enabled = true;
        // Stored without the plus; the sender arrives with it.
        pref.whatsapp_number = Some("15551234567".to_string());
        notification_preference::upsert_preference(db.pool(), &pref).await.unwrap();
        db
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_off_disables_whatsapp() {
        let db = setup().await;
        let outcome = handle_inbound(&db, &inbound(" off ", None), now()).await.unwrap();
        assert_eq!(outcome, InboundOutcome::Disabled);
        let pref = notification_preference::get_or_default(db.pool(), "u1").await.unwrap();
        assert!(!pref.whatsapp_enabled);
    }

    #[tokio::test]
    async fn test_snooze_rewrites_latest_sent_row() {
        let db = setup().await;
        let pool = db.pool();
        let earlier = now() - chrono::Duration::minutes(20);
        sent_notification::record(pool, "u1", "a", Channel::Whatsapp, NotificationStatus::Sent, earlier).await.unwrap();
        sent_notification::record(pool, "u1", "b", Channel::Whatsapp, NotificationStatus::Sent, earlier).await.unwrap();

        let outcome = handle_inbound(&db, &inbound("SNOOZE", None), now()).await.unwrap();
        assert_eq!(outcome, InboundOutcome::Snoozed { event_id: Some("b".to_string()) });
        assert_eq!(sent_notification::latest_snooze(pool, "u1", "b", Channel::Whatsapp).await.unwrap(), Some(now()));
        assert!(sent_notification::has_sent(pool, "u1", "a", Channel::Whatsapp).await.unwrap());
    }

    #[tokio::test]
    async fn test_snooze_reply_targets_that_event() {
        let db = setup().await;
        let pool = db.pool();
        let earlier = now() - chrono::Duration::minutes(20);
        sent_notification::record_with_message_id(pool, "u1", "a", Channel::Whatsapp, NotificationStatus::Sent, earlier, Some("SM1"))
            .await
            .unwrap();
        sent_notification::record_with_message_id(pool, "u1", "b", Channel::Whatsapp, NotificationStatus::Sent, earlier, Some("SM2"))
            .await
            .unwrap();

        let outcome = handle_inbound(&db, &inbound("snooze", Some("SM1")), now()).await.unwrap();
        assert_eq!(outcome, InboundOutcome::Snoozed { event_id: Some("a".to_string()) });
        assert!(sent_notification::has_sent(pool, "u1", "b", Channel::Whatsapp).await.unwrap());
        assert!(!sent_notification::has_sent(pool, "u1", "a", Channel::Whatsapp).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_body_and_sender() {
        let db = setup().await;
        assert_eq!(handle_inbound(&db, &inbound("thanks!", None), now()).await.unwrap(), InboundOutcome::Ignored);

        let stranger = InboundMessage {
            from: "whatsapp:+4420000000".to_string(),
            body: "OFF".to_string(),
            replied_to: None,
        };
        let outcome = handle_inbound(&db, &stranger, now()).await.unwrap();
        assert_eq!(outcome, InboundOutcome::UnknownSender);
        assert_eq!(outcome.reply_text(), "User not found");
    }
}
