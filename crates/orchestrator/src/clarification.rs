//! Clarification questions for requests with missing fields.

use serde_json::{Map, Value};

const DEFAULT_ASKS: &[&str] = &["date", "start time and end time (or duration)", "title/subject"];

/// Fields missing when nothing could be understood.
pub const ALL_REQUIRED: &[&str] = &["date", "time", "summary"];

fn label(field: &str) -> &str {
    match field {
        "date" => "date",
        "time" => "start time and end time (or duration)",
        "start" => "start time",
        "end" => "end time",
        "duration" => "duration",
        "summary" => "title/subject",
        other => other,
    }
}

fn present_text(present: &Map<String, Value>, key: &str) -> Option<String> {
    match present.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) if !items.is_empty() => Some(String::new()),
        Value::Bool(true) => Some(String::new()),
        _ => None,
    }
}

/// Compose a clarification naming what was understood and what is still needed.
///
/// Missing fields are deduplicated after labelling; two or fewer are joined
/// with "and", more become a bulleted list.
pub fn build_missing_fields_message(present: &Map<String, Value>, missing: &[String], details: &str) -> String {
    let mut understood = Vec::new();
    if let Some(summary) = present_text(present, "summary") {
        understood.push(format!("title '{}'", summary));
    }
    if let Some(date) = present_text(present, "date") {
        understood.push(format!("on {}", date));
    }
    let start = present_text(present, "start");
    match (&start, present_text(present, "end"), present_text(present, "duration")) {
        (Some(s), Some(e), _) => understood.push(format!("from {} to {}", s, e)),
        (_, _, Some(d)) if start.is_some() || present_text(present, "date").is_some() => {
            understood.push(format!("for {}", d))
        }
        _ => {}
    }
    if present_text(present, "attendees").is_some() {
        understood.push("with attendees".to_string());
    }

    let understood_text = if understood.is_empty() {
        "I can schedule that.".to_string()
    } else {
        format!("Got it, {}.", understood.join(" "))
    };

    let mut asks: Vec<&str> = Vec::new();
    for field in missing {
        let l = label(field.trim());
        if !l.is_empty() && !asks.contains(&l) {
            asks.push(l);
        }
    }
    if asks.is_empty() {
        asks = DEFAULT_ASKS.to_vec();
    }

    let ask = if asks.len() <= 2 {
        format!("Please share {}.", asks.join(" and "))
    } else {
        format!("Please share:\n- {}", asks.join("\n- "))
    };

    let mut message = String::new();
    if !details.trim().is_empty() {
        message.push_str(details.trim());
        message.push('\n');
    }
    message.push_str(&understood_text);
    message.push(' ');
    message.push_str(&ask);
    message.push_str(" Attendees' emails are optional.");
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lunch_tomorrow() {
        let present = map(json!({"summary": "Lunch", "date": "tomorrow"}));
        let message = build_missing_fields_message(&present, &["time".to_string()], "");
        assert_eq!(
            message,
            "Got it, title 'Lunch' on tomorrow. Please share start time and end time (or duration). \
             Attendees' emails are optional."
        );
    }

    #[test]
    fn test_two_asks_joined_with_and() {
        let present = map(json!({"start": "14:00", "end": "15:00"}));
        let missing = vec!["date".to_string(), "summary".to_string()];
        let message = build_missing_fields_message(&present, &missing, "");
        assert!(message.starts_with("Got it, from 14:00 to 15:00."));
        assert!(message.contains("Please share date and title/subject."));
    }

    #[test]
    fn test_three_asks_bulleted_and_deduplicated() {
        let missing: Vec<String> = ["summary", "date", "time", "time", "date"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let message = build_missing_fields_message(&Map::new(), &missing, "");
        assert_eq!(
            message,
            "I can schedule that. Please share:\n- title/subject\n- date\n- start time and end time (or duration) \
             Attendees' emails are optional."
        );
    }

    #[test]
    fn test_duration_and_attendees() {
        let present = map(json!({"date": "friday", "duration": "30 minutes", "attendees": ["a@b.com"]}));
        let message = build_missing_fields_message(&present, &["start".to_string()], "");
        assert!(message.starts_with("Got it, on friday for 30 minutes with attendees."));
        assert!(message.contains("Please share start time."));
    }

    #[test]
    fn test_empty_missing_uses_defaults_and_details_prefix() {
        let message = build_missing_fields_message(&Map::new(), &[], "Which day works?");
        assert!(message.starts_with("Which day works?\nI can schedule that. Please share:\n- date"));
    }
}
