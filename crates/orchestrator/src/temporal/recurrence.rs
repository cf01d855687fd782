//! Recurrence rules (RFC 5545 `RRULE`) from free text and model output.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::parse::resolve_date;

static UNTIL_DASHED: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"UNTIL=(\d{4})-(\d{2})-(\d{2})(?:T(\d{2}):?(\d{2}):?(\d{2})Z?)?").ok()
});

static UNTIL_COMPACT_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"UNTIL=(\d{8})(;|$)").ok());

static REPETITION_CUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:every|each|daily|weekly|biweekly|monthly|yearly|annually|weekdays|recurring|repeat(?:s|ing)?)\b").ok()
});

static EVERY_WEEKDAYS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:every|each)\s+((?:(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?(?:\s*,\s*|\s+and\s+|\s+)?)+)")
        .ok()
});

static UNTIL_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\buntil\s+([a-z0-9 ,\-]+?)(?:\s*$|[.;!?])").ok());

const DAY_CODES: &[(&str, &str)] = &[
    ("monday", "MO"),
    ("tuesday", "TU"),
    ("wednesday", "WE"),
    ("thursday", "TH"),
    ("friday", "FR"),
    ("saturday", "SA"),
    ("sunday", "SU"),
];

/// Whether the text explicitly asks for repetition.
pub fn has_repetition_cue(text: &str) -> bool {
    let lower = text.to_lowercase();
    REPETITION_CUE.as_ref().is_some_and(|re| re.is_match(&lower))
}

/// Normalize a model-supplied rule.
///
/// Adds the `RRULE:` prefix when missing and rewrites `UNTIL` to a compact
/// UTC timestamp (`UNTIL=20251231T235959Z`).
pub fn sanitize_rule(rule: &str) -> String {
    let trimmed = rule.trim();
    let mut out = if trimmed.contains(':') && !trimmed.to_uppercase().starts_with("FREQ") {
        trimmed.to_string()
    } else {
        format!("RRULE:{}", trimmed)
    };

    if let Some(re) = UNTIL_DASHED.as_ref() {
        out = re
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                let time = match (caps.get(4), caps.get(5), caps.get(6)) {
                    (Some(h), Some(m), Some(s)) => format!("{}{}{}", h.as_str(), m.as_str(), s.as_str()),
                    _ => "235959".to_string(),
                };
                format!("UNTIL={}{}{}T{}Z", &caps[1], &caps[2], &caps[3], time)
            })
            .into_owned();
    }
    if let Some(re) = UNTIL_COMPACT_DATE.as_ref() {
        out = re.replace_all(&out, "UNTIL=${1}T235959Z${2}").into_owned();
    }
    out
}

fn until_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = UNTIL_TEXT.as_ref()?.captures(text)?;
    let raw = caps.get(1)?.as_str().trim().replace(',', "");
    if let Some(date) = resolve_date(&raw, today) {
        return Some(date);
    }
    for fmt in ["%B %d %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, fmt) {
            return Some(date);
        }
    }
    None
}

/// Derive a rule from free text. Returns `None` without a repetition cue.
pub fn rule_from_text(text: &str, today: NaiveDate) -> Option<String> {
    let lower = text.to_lowercase();
    if !has_repetition_cue(&lower) {
        return None;
    }

    let base = if lower.contains("every weekday") || lower.contains("on weekdays") || lower.contains("each weekday") {
        "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR".to_string()
    } else if let Some(days) = EVERY_WEEKDAYS
        .as_ref()
        .and_then(|re| re.captures(&lower))
        .and_then(|c| c.get(1))
    {
        let codes: Vec<&str> = DAY_CODES
            .iter()
            .filter(|(name, _)| days.as_str().contains(name))
            .map(|(_, code)| *code)
            .collect();
        format!("FREQ=WEEKLY;BYDAY={}", codes.join(","))
    } else if lower.contains("daily") || lower.contains("every day") || lower.contains("each day") {
        "FREQ=DAILY".to_string()
    } else if lower.contains("biweekly") || lower.contains("every other week") || lower.contains("every two weeks") {
        "FREQ=WEEKLY;INTERVAL=2".to_string()
    } else if lower.contains("weekly") || lower.contains("every week") {
        "FREQ=WEEKLY".to_string()
    } else if lower.contains("monthly") || lower.contains("every month") {
        "FREQ=MONTHLY".to_string()
    } else if lower.contains("yearly") || lower.contains("annually") || lower.contains("every year") {
        "FREQ=YEARLY".to_string()
    } else {
        return None;
    };

    let rule = match until_date(&lower, today) {
        Some(until) => format!("RRULE:{};UNTIL={}T235959Z", base, until.format("%Y%m%d")),
        None => format!("RRULE:{}", base),
    };
    Some(rule)
}

/// Final recurrence lines for a create request.
///
/// The model's rule is kept (sanitized) only when the text asks for
/// repetition; otherwise a rule is derived from the text, if any.
pub fn resolve_recurrence(model_rule: Option<&str>, text: &str, today: NaiveDate) -> Vec<String> {
    if !has_repetition_cue(text) {
        return Vec::new();
    }
    match model_rule.map(str::trim).filter(|r| !r.is_empty()) {
        Some(rule) => vec![sanitize_rule(rule)],
        None => rule_from_text(text, today).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_sanitize_until_date() {
        assert_eq!(
            sanitize_rule("RRULE:FREQ=DAILY;UNTIL=2025-12-31"),
            "RRULE:FREQ=DAILY;UNTIL=20251231T235959Z"
        );
        assert_eq!(
            sanitize_rule("RRULE:FREQ=WEEKLY;UNTIL=2025-12-31T10:00:00Z;BYDAY=MO"),
            "RRULE:FREQ=WEEKLY;UNTIL=20251231T100000Z;BYDAY=MO"
        );
        assert_eq!(
            sanitize_rule("FREQ=DAILY;UNTIL=20251231"),
            "RRULE:FREQ=DAILY;UNTIL=20251231T235959Z"
        );
        assert_eq!(sanitize_rule("RRULE:FREQ=DAILY"), "RRULE:FREQ=DAILY");
    }

    #[test]
    fn test_no_cue_no_rule() {
        assert!(rule_from_text("Lunch on Monday", today()).is_none());
        assert!(resolve_recurrence(Some("RRULE:FREQ=WEEKLY"), "Lunch on Monday", today()).is_empty());
    }

    #[test]
    fn test_rules_from_text() {
        assert_eq!(
            rule_from_text("standup every weekday at 9", today()).as_deref(),
            Some("RRULE:FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR")
        );
        assert_eq!(
            rule_from_text("yoga every Monday and Wednesday", today()).as_deref(),
            Some("RRULE:FREQ=WEEKLY;BYDAY=MO,WE")
        );
        assert_eq!(rule_from_text("daily review", today()).as_deref(), Some("RRULE:FREQ=DAILY"));
        assert_eq!(rule_from_text("weekly 1:1", today()).as_deref(), Some("RRULE:FREQ=WEEKLY"));
    }

    #[test]
    fn test_until_is_compact() {
        assert_eq!(
            rule_from_text("gym daily until 2024-03-01", today()).as_deref(),
            Some("RRULE:FREQ=DAILY;UNTIL=20240301T235959Z")
        );
        assert_eq!(
            rule_from_text("gym every day until December 31, 2024", today()).as_deref(),
            Some("RRULE:FREQ=DAILY;UNTIL=20241231T235959Z")
        );
    }

    #[test]
    fn test_model_rule_kept_with_cue() {
        assert_eq!(
            resolve_recurrence(Some("FREQ=WEEKLY;BYDAY=MO;UNTIL=2024-06-30"), "every monday", today()),
            vec!["RRULE:FREQ=WEEKLY;BYDAY=MO;UNTIL=20240630T235959Z".to_string()]
        );
    }
}
