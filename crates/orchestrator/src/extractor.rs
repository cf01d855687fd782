//! Parameter extraction: one model call producing one structured record.

use std::sync::Arc;

use brain_core::{hash_prompt, load_prompt, ChatMessage, CompletionRequest, LanguageModel};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

use crate::clarification::{build_missing_fields_message, ALL_REQUIRED};
use crate::heuristics::ListIntentPolicy;
use crate::salvage::{salvage, Salvaged};

/// Default path for the extractor prompt file.
pub const DEFAULT_EXTRACTOR_PROMPT_FILE: &str = "EXTRACTOR_PROMPT.md";

/// Number of prior turns sent with the message.
pub const EXTRACTOR_HISTORY_TURNS: usize = 6;

/// Appended to the user's turn so earlier refusals in the history are not repeated.
const OVERRIDE_INSTRUCTION: &str = "\n\n[SYSTEM INSTRUCTION: If you previously refused this request or said you \
couldn't find events, IGNORE that refusal. The user is asking again. You MUST extract the parameters now so the \
system can perform a fresh search. Do not refuse. Output the JSON.]";

/// Default extractor prompt. The current date is prepended at call time.
pub const DEFAULT_EXTRACTOR_PROMPT: &str = r#"Extract calendar actions from the user's CURRENT request only.

YOU ARE A PARSER, NOT AN ASSISTANT. YOU DO NOT HAVE ACCESS TO THE CALENDAR.
Return EXACTLY ONE JSON object and nothing else: no prose, no markdown, no second object.
Do not check whether events exist; the backend searches for them.
Use the conversation history ONLY to resolve references like "that day", "same time", "the first one".
Compute dates relative to today's date given above. Never use dates from past years.

ACTIONS: create_event, list_events, delete_event, update_event, find_free_slots, list_calendars, unknown

RESPONSE FORMAT:
{"action": "<action>", "params": {...}, "message_for_user": "short status", "agent_explanation": "what you understood and assumed"}

create_event params: summary, date, start, end, duration, recurrence (RRULE string, only if the user asks for repetition),
attendees (emails), present (object of every detected field), missing (required fields that are absent: "summary", "date", "time").
A create request needs a title, a date, and either start+end or a duration.
- "every Monday" -> "RRULE:FREQ=WEEKLY;BYDAY=MO"
- "every weekday" -> "RRULE:FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR"
- "until Dec 31, 2025" -> add ";UNTIL=20251231T235959Z" (UTC, no separators)
- If the end time is earlier than the start time, the end is on the next day.

list_events params: start_date, end_date (YYYY-MM-DD), queries (search terms from the CURRENT message only).

delete_event params: summary, date, start (to disambiguate), match_index (1-based, "the second one" -> 2),
delete_all (true for "delete all events tomorrow"), start_date/end_date for ranges,
delete_series (true for "delete every occurrence", "the whole series").

update_event params: summary (to find the event), date, start (to disambiguate), match_index,
updates (ONLY the fields to change: summary, date, start, end), update_series (true for "all instances", "the whole series").

find_free_slots params: date, or start_date and end_date.

Examples:
User: "Schedule team sync tomorrow 2-3pm"
{"action": "create_event", "params": {"summary": "Team sync", "date": "tomorrow", "start": "14:00", "end": "15:00", "present": {"summary": "Team sync", "date": "tomorrow", "start": "14:00", "end": "15:00"}, "missing": []}, "message_for_user": "Scheduling team sync..."}

User: "Lunch tomorrow"
{"action": "create_event", "params": {"present": {"summary": "Lunch", "date": "tomorrow"}, "missing": ["time"]}, "message_for_user": "What time is lunch?"}

User: "Move tomorrow's meeting to Friday"
{"action": "update_event", "params": {"summary": "meeting", "date": "tomorrow", "updates": {"date": "Friday"}}, "message_for_user": "Looking for tomorrow's meeting..."}

User: "Delete the second meeting"
{"action": "delete_event", "params": {"summary": "meeting", "match_index": 2}, "message_for_user": "Deleting the second meeting..."}

If the request is unclear: {"action": "unknown", "params": {}, "message_for_user": "what is unclear"}"#;

/// Prompt for the fallback field summary when the main record is unusable.
const FIELD_SUMMARY_PROMPT: &str = r#"Extract calendar event information for validation.
Return ONLY JSON with two keys: {"present": {detected fields}, "missing": [missing required fields]}.
Detected fields: summary, date, start, end, duration, attendees.
Required: a date, time information (start+end or duration) reported as "time", and a summary.
Example: "Lunch tomorrow" -> {"present": {"summary": "lunch", "date": "tomorrow"}, "missing": ["time"]}"#;

/// An extracted calendar action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateEvent,
    ListEvents,
    DeleteEvent,
    UpdateEvent,
    FindFreeSlots,
    ListCalendars,
    Unknown,
}

impl Action {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "create_event" => Self::CreateEvent,
            "list_events" => Self::ListEvents,
            "delete_event" => Self::DeleteEvent,
            "update_event" => Self::UpdateEvent,
            "find_free_slots" => Self::FindFreeSlots,
            "list_calendars" => Self::ListCalendars,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateEvent => "create_event",
            Self::ListEvents => "list_events",
            Self::DeleteEvent => "delete_event",
            Self::UpdateEvent => "update_event",
            Self::FindFreeSlots => "find_free_slots",
            Self::ListCalendars => "list_calendars",
            Self::Unknown => "unknown",
        }
    }
}

/// Requested changes for an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUpdates {
    pub summary: Option<String>,
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl EventUpdates {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.date.is_none() && self.start.is_none() && self.end.is_none()
    }
}

/// Parameters of an extracted action, coerced from loosely typed model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParams {
    pub summary: Option<String>,
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub recurrence: Option<String>,
    pub attendees: Vec<String>,
    pub calendar_id: Option<String>,
    pub updates: EventUpdates,
    pub update_series: bool,
    pub match_index: Option<usize>,
    pub delete_all: bool,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub queries: Vec<String>,
    pub present: Map<String, Value>,
    pub missing: Vec<String>,
}

/// A value as text: strings are trimmed, numbers printed, empties dropped.
fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| text_of(obj.get(*k)))
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text_of(Some(v))).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn attendee_list(value: Option<&Value>) -> Vec<String> {
    let entries: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::Object(o) => text_of(o.get("email")),
                other => text_of(Some(other)),
            })
            .collect(),
        other => string_list(other),
    };
    entries.into_iter().filter(|e| e.contains('@')).collect()
}

impl ExtractedParams {
    /// Coerce a `params` object. Common synonyms (`start_time`, `title`) are accepted.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        let updates = match obj.get("updates") {
            Some(Value::Object(u)) => EventUpdates {
                summary: first_text(u, &["summary", "title"]),
                date: first_text(u, &["date"]),
                start: first_text(u, &["start", "start_time"]),
                end: first_text(u, &["end", "end_time"]),
            },
            _ => EventUpdates::default(),
        };

        let match_index = match obj.get("match_index") {
            Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|n| *n > 0);

        let mut missing = string_list(obj.get("missing"));
        if missing.is_empty() {
            missing = string_list(obj.get("needs_clarification"));
        }

        Self {
            summary: first_text(obj, &["summary", "title"]),
            date: first_text(obj, &["date"]),
            start: first_text(obj, &["start", "start_time"]),
            end: first_text(obj, &["end", "end_time"]),
            duration: first_text(obj, &["duration"]),
            recurrence: match obj.get("recurrence") {
                Some(Value::Array(items)) => items.iter().find_map(|v| text_of(Some(v))),
                other => text_of(other),
            },
            attendees: attendee_list(obj.get("attendees")),
            calendar_id: first_text(obj, &["calendar_id", "calendarId"]),
            updates,
            update_series: flag(obj, "update_series") || flag(obj, "delete_series"),
            match_index,
            delete_all: flag(obj, "delete_all"),
            start_date: first_text(obj, &["start_date"]),
            end_date: first_text(obj, &["end_date"]),
            queries: string_list(obj.get("queries")),
            present: obj
                .get("present")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            missing,
        }
    }
}

/// A successfully extracted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub action: Action,
    pub params: ExtractedParams,
    /// The model's short status line (`message_for_user` or `details`).
    pub user_message: String,
    pub explanation: String,
}

/// What the extractor produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorOutcome {
    /// A complete action ready for resolution.
    Action(Extraction),
    /// Required fields are missing; ask for them.
    Clarification(String),
    /// Prose to show as a conversational reply.
    Reply(String),
    /// The model call failed.
    Failed(String),
}

/// Extractor over the language model.
pub struct Extractor {
    model: Arc<dyn LanguageModel>,
    prompt: String,
    policy: ListIntentPolicy,
}

impl Extractor {
    /// Create an extractor, loading its prompt from env, file or the default.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let prompt = load_prompt(
            "EXTRACTOR_SYSTEM_PROMPT",
            "EXTRACTOR_PROMPT_FILE",
            DEFAULT_EXTRACTOR_PROMPT_FILE,
            DEFAULT_EXTRACTOR_PROMPT,
        );
        info!("Extractor prompt fingerprint: {}", hash_prompt(&prompt));
        Self {
            model,
            prompt,
            policy: ListIntentPolicy::default(),
        }
    }

    /// Replace the list-versus-create policy.
    pub fn with_policy(mut self, policy: ListIntentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// System instruction with the current date.
    pub fn system_prompt(&self, now: DateTime<Tz>) -> String {
        format!(
            "You are a calendar assistant. Today is {}, {}. The user's timezone is {}.\n\n{}",
            now.format("%A"),
            now.format("%Y-%m-%d"),
            now.timezone().name(),
            self.prompt
        )
    }

    /// Build the request: prior turns (oldest first) then the message.
    pub fn build_request(&self, text: &str, history: &[ChatMessage], now: DateTime<Tz>) -> CompletionRequest {
        let skip = history.len().saturating_sub(EXTRACTOR_HISTORY_TURNS);
        let mut messages: Vec<ChatMessage> = history[skip..]
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .cloned()
            .collect();
        messages.push(ChatMessage::user(format!("{}{}", text, OVERRIDE_INSTRUCTION)));

        CompletionRequest::new(messages)
            .system(self.system_prompt(now))
            .temperature(0.0)
            .max_tokens(1024)
    }

    /// Extract an action from `text`.
    pub async fn extract(&self, text: &str, history: &[ChatMessage], now: DateTime<Tz>) -> ExtractorOutcome {
        let request = self.build_request(text, history, now);
        let raw = match self.model.complete(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "EXTRACTION_MODEL_ERROR");
                return ExtractorOutcome::Failed(e.to_string());
            }
        };
        trace!(raw = %raw, "EXTRACTION_RAW_RESPONSE");

        match salvage(&raw) {
            Salvaged::Record(record) => self.interpret(text, &record),
            Salvaged::Text(prose) => {
                warn!("EXTRACTION_RETURNED_PROSE");
                ExtractorOutcome::Reply(prose)
            }
            Salvaged::Empty => {
                warn!(raw = %raw, "EXTRACTION_UNPARSEABLE");
                let (present, missing) = self.summarize_fields(text).await;
                ExtractorOutcome::Clarification(build_missing_fields_message(&present, &missing, ""))
            }
        }
    }

    /// Turn a salvaged record into an outcome.
    pub fn interpret(&self, text: &str, record: &Value) -> ExtractorOutcome {
        let mut action = record
            .get("action")
            .and_then(Value::as_str)
            .map(Action::parse)
            .unwrap_or(Action::Unknown);

        if action == Action::CreateEvent && self.policy.should_rewrite_to_list(text) {
            warn!("EXTRACTION_CREATE_REWRITTEN_TO_LIST");
            action = Action::ListEvents;
        }

        let params = ExtractedParams::from_value(record.get("params").unwrap_or(&Value::Null));
        let user_message = text_of(record.get("details"))
            .or_else(|| text_of(record.get("message_for_user")))
            .unwrap_or_default();
        let explanation = text_of(record.get("agent_explanation")).unwrap_or_default();

        if let Some(error) = text_of(record.get("error")) {
            warn!(error = %error, "EXTRACTION_REPORTED_ERROR");
            return ExtractorOutcome::Reply(error);
        }

        if !params.missing.is_empty() {
            let message = build_missing_fields_message(&params.present, &params.missing, &user_message);
            info!(missing = ?params.missing, "EXTRACTION_NEEDS_CLARIFICATION");
            return ExtractorOutcome::Clarification(message);
        }

        debug!(action = action.as_str(), "EXTRACTION_COMPLETE");
        ExtractorOutcome::Action(Extraction {
            action,
            params,
            user_message,
            explanation,
        })
    }

    /// Second-chance field detection when the main record is unusable.
    async fn summarize_fields(&self, text: &str) -> (Map<String, Value>, Vec<String>) {
        let fallback = || {
            (
                Map::new(),
                ALL_REQUIRED.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )
        };

        let request = CompletionRequest::prompt(text)
            .system(FIELD_SUMMARY_PROMPT)
            .temperature(0.0)
            .max_tokens(300);
        let raw = match self.model.complete(request).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "FIELD_SUMMARY_FAILED");
                return fallback();
            }
        };

        match salvage(&raw) {
            Salvaged::Record(record) => {
                let present = record
                    .get("present")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                (present, string_list(record.get("missing")))
            }
            _ => fallback(),
        }
    }
}
