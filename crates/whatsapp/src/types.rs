//! Message types for the WhatsApp transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Address a phone number on the WhatsApp channel.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, number)
    }
}

/// Strip the channel prefix from an address.
pub fn strip_whatsapp_prefix(address: &str) -> &str {
    let address = address.trim();
    address.strip_prefix(WHATSAPP_PREFIX).unwrap_or(address)
}

/// An outbound message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Approved Content API template with positional variables.
    Template {
        content_sid: String,
        variables: BTreeMap<String, String>,
    },
    /// Free-form text, only deliverable inside a 24h session.
    Text { body: String },
}

impl OutboundMessage {
    /// Build a text message.
    pub fn text(body: impl Into<String>) -> Self {
        OutboundMessage::Text { body: body.into() }
    }

    /// Form fields for the Messages resource, excluding `To`/`From`.
    pub(crate) fn form_fields(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        match self {
            OutboundMessage::Template {
                content_sid,
                variables,
            } => Ok(vec![
                ("ContentSid", content_sid.clone()),
                ("ContentVariables", serde_json::to_string(variables)?),
            ]),
            OutboundMessage::Text { body } => Ok(vec![("Body", body.clone())]),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendResult {
    /// Twilio message SID.
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Twilio error body.
#[derive(Debug, Deserialize)]
pub(crate) struct TwilioErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// An inbound webhook delivery (form-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    /// SID of the message this one replies to, when the user used "reply".
    #[serde(rename = "OriginalRepliedMessageSid", default)]
    pub replied_to: Option<String>,
}

impl InboundMessage {
    /// Sender phone number without the channel prefix.
    pub fn sender_number(&self) -> &str {
        strip_whatsapp_prefix(&self.from)
    }

    /// Parse the body as a command.
    pub fn command(&self) -> InboundCommand {
        InboundCommand::parse(&self.body)
    }
}

/// Commands a user can send back on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    /// Disable WhatsApp notifications.
    Off,
    /// Suppress the last reminder for ten minutes.
    Snooze,
    /// Anything else.
    Unknown,
}

impl InboundCommand {
    pub fn parse(body: &str) -> Self {
        let body = body.trim().to_uppercase();
        if body == "OFF" {
            InboundCommand::Off
        } else if body.starts_with("SNOOZE") {
            InboundCommand::Snooze
        } else {
            InboundCommand::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whatsapp_address() {
        assert_eq!(whatsapp_address("+15551234567"), "whatsapp:+15551234567");
        assert_eq!(whatsapp_address("whatsapp:+15551234567"), "whatsapp:+15551234567");
        assert_eq!(strip_whatsapp_prefix("whatsapp:+15551234567"), "+15551234567");
        assert_eq!(strip_whatsapp_prefix("+15551234567"), "+15551234567");
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(InboundCommand::parse(" off "), InboundCommand::Off);
        assert_eq!(InboundCommand::parse("SNOOZE"), InboundCommand::Snooze);
        assert_eq!(InboundCommand::parse("snooze 10"), InboundCommand::Snooze);
        assert_eq!(InboundCommand::parse("offline"), InboundCommand::Unknown);
        assert_eq!(InboundCommand::parse(""), InboundCommand::Unknown);
    }

    #[test]
    fn test_template_form_fields() {
        let mut variables = BTreeMap::new();
        variables.insert("1".to_string(), "Standup at 9".to_string());
        variables.insert("2".to_string(), "Event Reminder".to_string());
        let message = OutboundMessage::Template {
            content_sid: "HX1".to_string(),
            variables,
        };

        let fields = message.form_fields().unwrap();
        assert_eq!(fields[0], ("ContentSid", "HX1".to_string()));
        assert_eq!(
            fields[1],
            ("ContentVariables", r#"{"1":"Standup at 9","2":"Event Reminder"}"#.to_string())
        );
        assert_eq!(
            OutboundMessage::text("hi").form_fields().unwrap(),
            vec![("Body", "hi".to_string())]
        );
    }

    #[test]
    fn test_inbound_deserializes_webhook_fields() {
        let json = r#"{"From":"whatsapp:+15551234567","Body":"Snooze","OriginalRepliedMessageSid":"SM1"}"#;
        let inbound: InboundMessage = serde_json::from_str(json).unwrap();
        assert_eq!(inbound.sender_number(), "+15551234567");
        assert_eq!(inbound.command(), InboundCommand::Snooze);
        assert_eq!(inbound.replied_to.as_deref(), Some("SM1"));
    }
}
