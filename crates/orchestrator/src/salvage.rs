//! Recovery of structured records from free model output.
//!
//! Models occasionally emit several JSON objects back to back or wrap one
//! in prose. Scanning and selection are separate steps: [`scan_records`]
//! yields every top-level object that parses, and [`select_record`] picks
//! one of them.

use serde_json::Value;

/// Actions that make a record preferable to an `unknown` one.
pub const ACTIONABLE: &[&str] = &[
    "create_event",
    "list_events",
    "delete_event",
    "update_event",
    "find_free_slots",
    "list_calendars",
];

/// Outcome of salvaging a raw model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Salvaged {
    /// A structured record.
    Record(Value),
    /// Prose that should be shown to the user as-is.
    Text(String),
    /// Nothing usable.
    Empty,
}

/// Byte spans of balanced top-level `{...}` groups.
///
/// Braces inside string literals are ignored. An unterminated group at the
/// end of the input is dropped.
pub fn scan_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' if depth > 0 => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push((s, i + 1));
                    }
                }
            }
            _ => {}
        }
    }

    spans
}

/// Every top-level JSON object in `text` that parses, in order.
pub fn scan_records(text: &str) -> Vec<Value> {
    scan_spans(text)
        .into_iter()
        .filter_map(|(s, e)| serde_json::from_str::<Value>(&text[s..e]).ok())
        .filter(Value::is_object)
        .collect()
}

fn action_of(record: &Value) -> Option<&str> {
    record.get("action").and_then(Value::as_str)
}

/// Pick one record: the first actionable one, else the last.
pub fn select_record(records: Vec<Value>) -> Option<Value> {
    if records.len() > 1 {
        if let Some(pos) = records
            .iter()
            .position(|r| action_of(r).is_some_and(|a| ACTIONABLE.contains(&a)))
        {
            return records.into_iter().nth(pos);
        }
    }
    records.into_iter().last()
}

/// Salvage a model response.
pub fn salvage(raw: &str) -> Salvaged {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Salvaged::Empty;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Salvaged::Record(value);
        }
    }

    if let Some(record) = select_record(scan_records(trimmed)) {
        return Salvaged::Record(record);
    }

    if trimmed.starts_with('{') {
        Salvaged::Empty
    } else {
        Salvaged::Text(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_spans_ignores_braces_in_strings() {
        let text = r#"{"a": "x { y"} trailing {"b": 1}"#;
        let spans = scan_spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].0..spans[0].1], r#"{"a": "x { y"}"#);
        assert_eq!(&text[spans[1].0..spans[1].1], r#"{"b": 1}"#);
    }

    #[test]
    fn test_scan_records_skips_broken_spans() {
        let text = r#"{"action": "unknown"}{not json}{"action": "list_events"}"#;
        let records = scan_records(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["action"], "list_events");
    }

    #[test]
    fn test_unterminated_span_is_dropped() {
        assert!(scan_records(r#"{"action": "create_event", "params": {"#).is_empty());
    }

    #[test]
    fn test_select_prefers_first_actionable() {
        let records = vec![
            json!({"action": "unknown"}),
            json!({"action": "create_event", "params": {"summary": "a"}}),
            json!({"action": "delete_event"}),
        ];
        let selected = select_record(records).unwrap();
        assert_eq!(selected["action"], "create_event");
    }

    #[test]
    fn test_select_falls_back_to_last() {
        let records = vec![
            json!({"action": "unknown", "n": 1}),
            json!({"action": "unknown", "n": 2}),
        ];
        assert_eq!(select_record(records).unwrap()["n"], 2);
        assert!(select_record(Vec::new()).is_none());
    }

    #[test]
    fn test_select_single_record_even_if_unknown() {
        let records = vec![json!({"action": "unknown"})];
        assert_eq!(select_record(records).unwrap()["action"], "unknown");
    }

    #[test]
    fn test_salvage_whole_record() {
        let raw = r#"  {"action": "list_events", "params": {}}  "#;
        assert!(matches!(salvage(raw), Salvaged::Record(v) if v["action"] == "list_events"));
    }

    #[test]
    fn test_salvage_concatenated_records() {
        let raw = r#"{"action":"unknown","params":{}}
{"action":"create_event","params":{"summary":"Team sync"}}"#;
        match salvage(raw) {
            Salvaged::Record(v) => assert_eq!(v["params"]["summary"], "Team sync"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_salvage_record_wrapped_in_prose() {
        let raw = r#"Sure! Here it is: {"action": "delete_event", "params": {"summary": "dentist"}} Hope that helps."#;
        assert!(matches!(salvage(raw), Salvaged::Record(v) if v["action"] == "delete_event"));
    }

    #[test]
    fn test_salvage_prose_is_text() {
        let raw = "I apologize, but I do not see that event.";
        assert_eq!(salvage(raw), Salvaged::Text(raw.to_string()));
    }

    #[test]
    fn test_salvage_broken_json_is_empty() {
        assert_eq!(salvage(r#"{"action": "create_event", "#), Salvaged::Empty);
        assert_eq!(salvage("   "), Salvaged::Empty);
    }
}
