//! Conversational replies and conversation titles.

use std::sync::Arc;

use brain_core::{ChatMessage, CompletionRequest, LanguageModel};
use tracing::{debug, warn};

/// Prior turns sent with a general chat reply.
pub const CHAT_HISTORY_TURNS: usize = 4;

/// Characters of the first message kept in a fallback title.
pub const FALLBACK_TITLE_CHARS: usize = 40;

/// Reply used when the model cannot answer.
pub const CHAT_FALLBACK: &str = "Sorry, I'm having trouble processing that request right now.";

const CHAT_SYSTEM_PROMPT: &str = "You are a friendly, concise assistant inside a calendar app. \
Answer general questions briefly. If the user wants to manage their calendar, tell them what you can do: \
create, list, update or delete events, find free time and list calendars.";

/// General chat and title generation over the language model.
pub struct ChatResponder {
    model: Arc<dyn LanguageModel>,
}

impl ChatResponder {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// A short title for a conversation opened with `text`.
    pub async fn title(&self, text: &str) -> String {
        let request = CompletionRequest::prompt(format!(
            "Generate a very short and concise title (max 5 words) for a chat based on the user message: '{}'. Only provide the title text.",
            text
        ))
        .temperature(0.1)
        .max_tokens(20);

        match self.model.complete(request).await {
            Ok(raw) => {
                let title = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string();
                if title.is_empty() {
                    fallback_title(text)
                } else {
                    debug!(title = %title, "CONVERSATION_TITLED");
                    title
                }
            }
            Err(e) => {
                warn!(error = %e, "CONVERSATION_TITLE_FAILED");
                fallback_title(text)
            }
        }
    }

    /// Answer a non-calendar message.
    pub async fn reply(&self, text: &str, history: &[ChatMessage]) -> String {
        let skip = history.len().saturating_sub(CHAT_HISTORY_TURNS);
        let mut messages: Vec<ChatMessage> = history[skip..].to_vec();
        messages.push(ChatMessage::user(text));
        let request = CompletionRequest::new(messages)
            .system(CHAT_SYSTEM_PROMPT)
            .temperature(0.7)
            .max_tokens(400);

        match self.model.complete(request).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => CHAT_FALLBACK.to_string(),
            Err(e) => {
                warn!(error = %e, "GENERAL_CHAT_FAILED");
                CHAT_FALLBACK.to_string()
            }
        }
    }
}

/// First characters of the message followed by `...`.
pub fn fallback_title(text: &str) -> String {
    let head: String = text.trim().chars().take(FALLBACK_TITLE_CHARS).collect();
    format!("{}...", head)
}
