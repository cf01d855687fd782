//! Reminder and briefing text.

use std::sync::Arc;
use std::time::Duration;

use brain_core::{CompletionRequest, LanguageModel};
use calendar::CalendarEvent;
use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::with_timeout;

/// Template body limit for reminders, in characters.
pub const REMINDER_BODY_LIMIT: usize = 800;

/// Template body limit for briefings, in characters.
pub const BRIEFING_BODY_LIMIT: usize = 1000;

pub const REMINDER_HEADER: &str = "Event Reminder";
pub const BRIEFING_HEADER: &str = "Morning Briefing";

const REMINDER_SYSTEM_PROMPT: &str = "You are a helpful and warm personal assistant. \
Write a short, friendly reminder message for a user's upcoming calendar event.\n\n\
Guidelines:\n\
- Mention the event title and the start time clearly.\n\
- Keep it to 1-2 sentences, fit for a WhatsApp message or short email.\n\
- Plain text only, no markdown.\n\
- Use 1-3 relevant emojis.\n\
- Use natural time conventions (\"at 6pm\"), never raw timestamps.\n\n\
Example input: Event 'Team Sync' at '2:00 PM' for 'Joshua'\n\
Example output: Hi Joshua! 👋 Just a heads up that your 'Team Sync' is starting soon at 2pm ⏰.";

const BRIEFING_SYSTEM_PROMPT: &str = "You are a helpful, enthusiastic personal assistant. \
Your goal is to provide a concise morning briefing.";

/// Deterministic reminder text.
pub fn fallback_reminder(name: &str, summary: &str, start: &str) -> String {
    format!("Hi {}, reminder: your event '{}' is starting at {}.", name, summary, start)
}

/// Deterministic briefing text.
pub fn fallback_briefing(name: &str, event_count: usize) -> String {
    format!(
        "Good morning {}! ☀️ Here is your schedule for today: You have {} events.",
        name, event_count
    )
}

/// Flatten newlines to ` | ` and cap the length for a template variable.
pub fn template_body(message: &str, limit: usize) -> String {
    let flat = message.replace("\r\n", "\n").replace('\n', " | ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let head: String = flat.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", head)
}

pub fn reminder_subject(summary: &str) -> String {
    format!("Reminder: {}", summary)
}

pub fn briefing_subject(date: NaiveDate) -> String {
    format!("Morning Briefing: {}", date.format("%Y-%m-%d"))
}

/// Email body with the sign-off.
pub fn email_body(message: &str) -> String {
    format!("{}\n\nBest,\nReminder Agent", message)
}

/// When an event starts, as a reader would say it.
pub fn start_label(event: &CalendarEvent, tz: Tz) -> String {
    match event.start.time_in(tz) {
        Some(time) => time.format("%-I:%M %p").to_string(),
        None => event.start.date_in(tz).format("%A, %B %-d").to_string(),
    }
}

fn schedule_lines(events: &[CalendarEvent], tz: Tz) -> String {
    if events.is_empty() {
        return "No events scheduled for today.".to_string();
    }
    events
        .iter()
        .map(|event| {
            let when = match event.start.time_in(tz) {
                Some(time) => time.format("%-I:%M %p").to_string(),
                None => "All day".to_string(),
            };
            format!("- {}: {}", when, event.title())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes notification text with the language model, falling back to fixed
/// text when the model is unavailable, fails or is too slow.
#[derive(Clone)]
pub struct MessageComposer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl MessageComposer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Reminder for one event.
    pub async fn reminder(&self, name: &str, summary: &str, start: &str) -> String {
        let request = CompletionRequest::prompt(format!(
            "Write a reminder for {} about their event '{}' which starts at {}.",
            name, summary, start
        ))
        .system(REMINDER_SYSTEM_PROMPT)
        .temperature(0.7)
        .max_tokens(100);

        self.complete("reminder", request)
            .await
            .unwrap_or_else(|| fallback_reminder(name, summary, start))
    }

    /// Summary of the day's events.
    pub async fn briefing(&self, name: &str, events: &[CalendarEvent], tz: Tz) -> String {
        let request = CompletionRequest::prompt(format!(
            "Generate a morning briefing for {name}.\n\n\
Today's Schedule:\n{schedule}\n\n\
Rules:\n\
1. Start the message with: 'Good morning {name}! ☀️ Here is your schedule for today:'\n\
2. List the events clearly using bullet points (•).\n\
3. If there are no events, say 'You have no events scheduled. Enjoy your free time!'\n\
4. Keep it concise, friendly and encouraging.\n\
5. Keep list items short; newlines are flattened to '|' for WhatsApp.",
            name = name,
            schedule = schedule_lines(events, tz),
        ))
        .system(BRIEFING_SYSTEM_PROMPT)
        .temperature(0.7)
        .max_tokens(400);

        self.complete("briefing", request)
            .await
            .unwrap_or_else(|| fallback_briefing(name, events.len()))
    }

    async fn complete(&self, kind: &'static str, request: CompletionRequest) -> Option<String> {
        match with_timeout("message generation", self.timeout, self.model.complete(request)).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                debug!(kind, "MESSAGE_EMPTY, using fallback");
                None
            }
            Err(e) => {
                warn!(kind, error = %e, "MESSAGE_GENERATION_FAILED, using fallback");
                None
            }
        }
    }
}
