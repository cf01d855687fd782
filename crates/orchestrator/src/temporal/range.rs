//! Start/end inference from raw request text.

use std::sync::LazyLock;

use regex::Regex;

use super::parse::{has_meridiem, parse_time_only};

const TIME: &str = r"(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)";

static ISO_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").ok());

static BY_TO: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"\bby\s+{TIME}\s+to\s+{TIME}\b")).ok());

static FROM_TO: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"\bfrom\s+{TIME}\s*(?:to|-|until|till)\s*{TIME}\b")).ok());

static SIMPLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(&format!(r"\b{TIME}\s*(?:\bto\b|-)\s*{TIME}\b")).ok());

static BY_ALONE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(&format!(r"\bby\s+{TIME}\b")).ok());

static AT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(&format!(r"\bat\s+{TIME}\b")).ok());

const DURATION_CUES: &[&str] = &["last for", "lasting", "duration"];

/// Which text pattern produced a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePattern {
    ByTo,
    FromTo,
    Simple,
    ByStart,
    ByEnd,
    At,
}

/// Start/end time tokens found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeHint {
    pub start: Option<String>,
    pub end: Option<String>,
    pub pattern: RangePattern,
}

fn captures2(re: &LazyLock<Option<Regex>>, text: &str) -> Option<(String, String)> {
    let caps = re.as_ref()?.captures(text)?;
    Some((
        caps.get(1)?.as_str().trim().to_string(),
        caps.get(2)?.as_str().trim().to_string(),
    ))
}

fn capture1<'t>(re: &LazyLock<Option<Regex>>, text: &'t str) -> Option<regex::Match<'t>> {
    re.as_ref()?.captures(text)?.get(1)
}

/// Copy the end's am/pm onto a bare start (`2-3pm` reads as `2pm-3pm`).
///
/// If that would put the start after the end, the other half of the day
/// is used instead (`11-1pm` reads as `11am-1pm`).
fn share_meridiem(start: String, end: &str) -> String {
    if has_meridiem(&start) || !has_meridiem(end) {
        return start;
    }
    let end_lower = end.to_lowercase();
    let (same, other) = if end_lower.contains('p') { ("pm", "am") } else { ("am", "pm") };

    let candidate = format!("{}{}", start, same);
    match (parse_time_only(&candidate), parse_time_only(end)) {
        (Some(s), Some(e)) if s <= e => candidate,
        (Some(_), Some(_)) => format!("{}{}", start, other),
        _ => start,
    }
}

fn range(pattern: RangePattern, (start, end): (String, String)) -> RangeHint {
    let start = share_meridiem(start, &end);
    RangeHint {
        start: Some(start),
        end: Some(end),
        pattern,
    }
}

/// Whether the text mentions how long something lasts.
pub fn has_duration_cue(text: &str) -> bool {
    let lower = text.to_lowercase();
    DURATION_CUES.iter().any(|cue| lower.contains(cue))
}

/// Explicit two-sided ranges: `by A to B`, `from A to B`, `A to B` / `A-B`.
pub fn infer_explicit_range(text: &str) -> Option<RangeHint> {
    let lower = text.to_lowercase();
    let cleaned = match ISO_DATE.as_ref() {
        Some(re) => re.replace_all(&lower, " ").into_owned(),
        None => lower,
    };

    if let Some(pair) = captures2(&BY_TO, &cleaned) {
        return Some(range(RangePattern::ByTo, pair));
    }
    if let Some(pair) = captures2(&FROM_TO, &cleaned) {
        return Some(range(RangePattern::FromTo, pair));
    }
    captures2(&SIMPLE, &cleaned).map(|pair| range(RangePattern::Simple, pair))
}

/// `by A`: a start when a duration is known or mentioned, otherwise an end.
///
/// Skipped when the word `to` follows within 30 characters.
pub fn infer_by(text: &str, has_duration: bool) -> Option<RangeHint> {
    let lower = text.to_lowercase();
    let m = capture1(&BY_ALONE, &lower)?;
    let tail: String = lower[m.end()..].chars().take(30).collect();
    if tail
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "to")
    {
        return None;
    }

    let token = m.as_str().trim().to_string();
    if has_duration || has_duration_cue(&lower) {
        Some(RangeHint {
            start: Some(token),
            end: None,
            pattern: RangePattern::ByStart,
        })
    } else {
        Some(RangeHint {
            start: None,
            end: Some(token),
            pattern: RangePattern::ByEnd,
        })
    }
}

/// `at A`: a start.
pub fn infer_at(text: &str) -> Option<RangeHint> {
    let lower = text.to_lowercase();
    capture1(&AT, &lower).map(|m| RangeHint {
        start: Some(m.as_str().trim().to_string()),
        end: None,
        pattern: RangePattern::At,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(hint: &RangeHint) -> (Option<&str>, Option<&str>) {
        (hint.start.as_deref(), hint.end.as_deref())
    }

    #[test]
    fn test_by_to_wins_over_simple() {
        let hint = infer_explicit_range("block focus time by 9am to 11am").unwrap();
        assert_eq!(hint.pattern, RangePattern::ByTo);
        assert_eq!(pair(&hint), (Some("9am"), Some("11am")));
    }

    #[test]
    fn test_from_to() {
        let hint = infer_explicit_range("Dentist from 3pm to 4:30pm tomorrow").unwrap();
        assert_eq!(hint.pattern, RangePattern::FromTo);
        assert_eq!(pair(&hint), (Some("3pm"), Some("4:30pm")));
    }

    #[test]
    fn test_simple_hyphen_shares_meridiem() {
        let hint = infer_explicit_range("Schedule team sync tomorrow 2-3pm").unwrap();
        assert_eq!(hint.pattern, RangePattern::Simple);
        assert_eq!(pair(&hint), (Some("2pm"), Some("3pm")));

        let hint = infer_explicit_range("workshop 11-1pm").unwrap();
        assert_eq!(pair(&hint), (Some("11am"), Some("1pm")));
    }

    #[test]
    fn test_iso_dates_are_not_ranges() {
        assert!(infer_explicit_range("review on 2024-01-02").is_none());
        let hint = infer_explicit_range("review on 2024-01-02 10:00 to 11:00").unwrap();
        assert_eq!(pair(&hint), (Some("10:00"), Some("11:00")));
    }

    #[test]
    fn test_by_alone_is_deadline_without_duration() {
        let hint = infer_by("finish the report by 5pm", false).unwrap();
        assert_eq!(hint.pattern, RangePattern::ByEnd);
        assert_eq!(pair(&hint), (None, Some("5pm")));
    }

    #[test]
    fn test_by_alone_is_start_with_duration() {
        let hint = infer_by("start yoga by 7am lasting 45 minutes", false).unwrap();
        assert_eq!(hint.pattern, RangePattern::ByStart);
        assert_eq!(pair(&hint), (Some("7am"), None));

        let hint = infer_by("gym by 6pm", true).unwrap();
        assert_eq!(hint.pattern, RangePattern::ByStart);
    }

    #[test]
    fn test_by_followed_by_to_is_skipped() {
        assert!(infer_by("by 9 I want to leave", false).is_none());
        assert!(infer_by("submit taxes by 5pm tomorrow", false).is_some());
    }

    #[test]
    fn test_at() {
        let hint = infer_at("Lunch with Sam at 12:30pm").unwrap();
        assert_eq!(pair(&hint), (Some("12:30pm"), None));
        assert!(infer_at("lunch at the cafe").is_none());
    }
}
