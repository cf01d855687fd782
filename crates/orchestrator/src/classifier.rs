//! Intent classification: calendar request or general chat.

use std::sync::Arc;

use brain_core::{hash_prompt, load_prompt, ChatMessage, CompletionRequest, LanguageModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default path for the intent prompt file.
pub const DEFAULT_INTENT_PROMPT_FILE: &str = "INTENT_PROMPT.md";

/// Number of prior turns sent with the message.
pub const INTENT_HISTORY_TURNS: usize = 4;

/// Default intent prompt (fallback if no file or env override).
pub const DEFAULT_INTENT_PROMPT: &str = r#"You are a calendar assistant's intent classifier.

Analyze the user's message and classify it as EITHER:
- "calendar" - if the user wants to create, view, edit, delete, or manage calendar events/schedules
- "general_chat" - for greetings, questions about capabilities, off-topic conversation, or unclear requests

Calendar intent examples:
- "Schedule a meeting tomorrow at 2pm"
- "What's on my calendar next week?"
- "Cancel my 3pm appointment"
- "Find free time on Thursday"
- "The one at 10am" (Context: answering "Which event?")
- "Yes, delete it" (Context: confirming deletion)

General chat examples:
- "Hello!" / "Hi there"
- "What can you do?"
- "Thanks!" / "That's helpful"

Reply with ONLY the single word: "calendar" or "general_chat""#;

/// The two accepted intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Calendar,
    GeneralChat,
}

impl Intent {
    /// Parse a model answer. Anything but the two literals is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_matches('"').to_lowercase().as_str() {
            "calendar" => Some(Self::Calendar),
            "general_chat" => Some(Self::GeneralChat),
            _ => None,
        }
    }
}

/// Stateless classifier over the language model.
pub struct Classifier {
    model: Arc<dyn LanguageModel>,
    prompt: String,
    model_override: Option<String>,
}

impl Classifier {
    /// Create a classifier, loading its prompt from env, file or the default.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let prompt = load_prompt(
            "INTENT_SYSTEM_PROMPT",
            "INTENT_PROMPT_FILE",
            DEFAULT_INTENT_PROMPT_FILE,
            DEFAULT_INTENT_PROMPT,
        );
        info!("Intent prompt fingerprint: {}", hash_prompt(&prompt));
        Self {
            model,
            prompt,
            model_override: None,
        }
    }

    /// Use a specific model name for classification calls.
    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    /// Build the request: prior turns (oldest first) then the prompt and message.
    pub fn build_request(&self, text: &str, history: &[ChatMessage]) -> CompletionRequest {
        let skip = history.len().saturating_sub(INTENT_HISTORY_TURNS);
        let mut messages: Vec<ChatMessage> = history[skip..]
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .cloned()
            .collect();
        messages.push(ChatMessage::user(format!("{}\n\nUser message: {}", self.prompt, text)));

        let request = CompletionRequest::new(messages).temperature(0.0).max_tokens(10);
        match &self.model_override {
            Some(name) => request.model(name.clone()),
            None => request,
        }
    }

    /// Classify a message. Never fails: anything unexpected is general chat.
    pub async fn classify(&self, text: &str, history: &[ChatMessage]) -> Intent {
        let request = self.build_request(text, history);
        match self.model.complete(request).await {
            Ok(raw) => match Intent::parse(&raw) {
                Some(intent) => {
                    info!(intent = ?intent, "INTENT_CLASSIFIED");
                    intent
                }
                None => {
                    warn!(raw = %raw, "INTENT_UNRECOGNIZED");
                    Intent::GeneralChat
                }
            },
            Err(e) if e.is_unavailable() => {
                debug!(error = %e, "INTENT_MODEL_UNAVAILABLE");
                Intent::GeneralChat
            }
            Err(e) => {
                warn!(error = %e, "INTENT_MODEL_ERROR");
                Intent::GeneralChat
            }
        }
    }
}
