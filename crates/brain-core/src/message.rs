//! Chat message and completion request types.

use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Default temperature when a caller does not pick one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default output budget when a caller does not pick one.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// A completion request: ordered messages plus generation settings.
///
/// Messages are oldest-first; the last one is normally the user's turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation turns, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Optional system instruction.
    pub system: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Model override for this call only.
    pub model: Option<String>,
}

impl CompletionRequest {
    /// Create a request from a list of messages with default settings.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            model: None,
        }
    }

    /// Create a request holding a single user prompt.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(text)])
    }

    /// Set the system instruction.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the output budget.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the model for this request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Text of the last user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::prompt("hello")
            .system("be brief")
            .temperature(0.0)
            .max_tokens(20)
            .model("small");

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 20);
        assert_eq!(request.model.as_deref(), Some("small"));
    }

    #[test]
    fn test_last_user_text() {
        let request = CompletionRequest::new(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
            ChatMessage::assistant("trailing"),
        ]);
        assert_eq!(request.last_user_text(), Some("second"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
