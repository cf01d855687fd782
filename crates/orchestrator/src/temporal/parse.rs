//! Token parsers for dates, times and durations.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use regex::Regex;

static TIME_ONLY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?$").ok());

static DURATION_HM: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^(\d+):(\d{2})$").ok());

static DURATION_UNITS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*(hours|hour|hrs|hr|h|minutes|minute|mins|min|m)$").ok()
});

static WEEKDAY_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").ok()
});

static ISO_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").ok());

/// Parse a weekday name.
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Resolve a date token relative to `today`.
///
/// Accepts ISO dates, `today`, `tomorrow`, a bare weekday (nearest
/// occurrence, today included) and `next <weekday>` (at least seven days out).
pub fn resolve_date(value: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = value.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Some(date);
    }

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }

    let parts: Vec<&str> = s.split_whitespace().collect();
    let (is_next, target) = match parts.as_slice() {
        ["next", day] => (true, parse_weekday(day)?),
        [day] => (false, parse_weekday(day)?),
        _ => return None,
    };

    let mut delta = (target.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    if is_next && delta < 7 {
        delta += 7;
    }
    Some(today + Duration::days(delta))
}

/// Parse a time of day: `9`, `9am`, `9:30 pm`, `14:00`, `noon`, `midnight`.
pub fn parse_time_only(value: &str) -> Option<NaiveTime> {
    let s = value.trim().to_lowercase();
    match s.as_str() {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }

    let caps = TIME_ONLY.as_ref()?.captures(&s)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;

    if let Some(meridiem) = caps.get(3) {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.as_str().starts_with('p');
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Whether a time token carries an explicit am/pm marker.
pub fn has_meridiem(value: &str) -> bool {
    let s = value.trim().to_lowercase();
    s.ends_with("am") || s.ends_with("pm") || s.ends_with("a.m.") || s.ends_with("p.m.")
}

/// Parse a duration: bare minutes, `H:MM`, `N hours`, `N minutes`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let s = value.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if let Ok(minutes) = s.parse::<f64>() {
        return minutes_to_duration(minutes);
    }

    if let Some(caps) = DURATION_HM.as_ref().and_then(|re| re.captures(&s)) {
        let hours: i64 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: i64 = caps.get(2)?.as_str().parse().ok()?;
        return Some(Duration::minutes(hours * 60 + minutes)).filter(|d| *d > Duration::zero());
    }

    let caps = DURATION_UNITS.as_ref()?.captures(&s)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2)?.as_str() {
        "hours" | "hour" | "hrs" | "hr" | "h" => minutes_to_duration(amount * 60.0),
        _ => minutes_to_duration(amount),
    }
}

fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }
    Some(Duration::minutes(minutes.trunc() as i64)).filter(|d| *d > Duration::zero())
}

/// A full date-time value from the extractor.
///
/// Values with an offset keep it; naive values are taken to be local to `tz`.
/// Plain dates and bare times are not date-times.
pub fn parse_datetime(value: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let s = value.trim().replace(' ', "T");
    if !s.contains('T') {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
            return localize(tz, naive).map(|dt| dt.fixed_offset());
        }
    }
    None
}

/// Attach `tz` to a wall-clock time. Times inside a DST gap move forward an hour.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// The first date reference in free text.
///
/// `today`, `tomorrow`, `[next] <weekday>` and ISO dates are considered; the
/// one appearing earliest in the text wins.
pub fn extract_date_from_text(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = text.to_lowercase();
    let mut found: Vec<(usize, &str)> = ["today", "tomorrow"]
        .into_iter()
        .filter_map(|token| s.find(token).map(|at| (at, token)))
        .collect();
    for re in [WEEKDAY_TOKEN.as_ref(), ISO_DATE.as_ref()].into_iter().flatten() {
        if let Some(m) = re.find(&s) {
            found.push((m.start(), m.as_str()));
        }
    }

    found.sort_by_key(|(at, _)| *at);
    found.into_iter().find_map(|(_, token)| resolve_date(token, today))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        // 2024-01-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_iso_date_is_fixed_point() {
        for iso in ["2024-01-01", "2023-12-31", "2024-02-29", "2031-07-15"] {
            let resolved = resolve_date(iso, monday()).unwrap();
            assert_eq!(resolved.format("%Y-%m-%d").to_string(), iso);
        }
        assert!(resolve_date("2023-02-30", monday()).is_none());
    }

    #[test]
    fn test_relative_dates() {
        let today = monday();
        assert_eq!(resolve_date("today", today), Some(today));
        assert_eq!(resolve_date("Tomorrow", today), Some(today + Duration::days(1)));
        assert!(resolve_date("someday", today).is_none());
        assert!(resolve_date("", today).is_none());
    }

    #[test]
    fn test_bare_weekday_includes_today() {
        let today = monday();
        assert_eq!(resolve_date("monday", today), Some(today));
        assert_eq!(resolve_date("wednesday", today), Some(today + Duration::days(2)));
        assert_eq!(resolve_date("sunday", today), Some(today + Duration::days(6)));
    }

    #[test]
    fn test_next_weekday_is_at_least_a_week_out() {
        let today = monday();
        assert_eq!(resolve_date("next monday", today), Some(today + Duration::days(7)));
        assert_eq!(resolve_date("next wednesday", today), Some(today + Duration::days(9)));
        assert_eq!(resolve_date("next sunday", today), Some(today + Duration::days(13)));
    }

    #[test]
    fn test_parse_time_only() {
        assert_eq!(parse_time_only("9am"), Some(hm(9, 0)));
        assert_eq!(parse_time_only("9:30 pm"), Some(hm(21, 30)));
        assert_eq!(parse_time_only("12am"), Some(hm(0, 0)));
        assert_eq!(parse_time_only("12pm"), Some(hm(12, 0)));
        assert_eq!(parse_time_only("14:00"), Some(hm(14, 0)));
        assert_eq!(parse_time_only("noon"), Some(hm(12, 0)));
        assert_eq!(parse_time_only("Midnight"), Some(hm(0, 0)));
        assert_eq!(parse_time_only("7"), Some(hm(7, 0)));
    }

    #[test]
    fn test_parse_time_only_rejects_garbage() {
        assert!(parse_time_only("25:00").is_none());
        assert!(parse_time_only("13pm").is_none());
        assert!(parse_time_only("9:75").is_none());
        assert!(parse_time_only("soon").is_none());
        assert!(parse_time_only("").is_none());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45"), Some(Duration::minutes(45)));
        assert_eq!(parse_duration("90.0"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("1:30"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("2 hours"), Some(Duration::minutes(120)));
        assert_eq!(parse_duration("1.5 hours"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("1 hr"), Some(Duration::minutes(60)));
        assert_eq!(parse_duration("30 mins"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
        assert!(parse_duration("a while").is_none());
        assert!(parse_duration("0").is_none());
        assert!(parse_duration("-5").is_none());
    }

    #[test]
    fn test_parse_datetime() {
        let tz: Tz = "America/New_York".parse().unwrap();

        let with_offset = parse_datetime("2024-01-02T14:00:00+02:00", tz).unwrap();
        assert_eq!(with_offset.offset().local_minus_utc(), 2 * 3600);

        let naive = parse_datetime("2024-01-02 14:00", tz).unwrap();
        assert_eq!(naive.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(naive.time(), hm(14, 0));

        assert!(parse_datetime("2024-01-02", tz).is_none());
        assert!(parse_datetime("14:00", tz).is_none());
    }

    #[test]
    fn test_localize_dst_gap_moves_forward() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let naive = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(2, 30, 0).unwrap();
        let dt = localize(tz, naive).unwrap();
        assert_eq!(dt.time(), hm(3, 30));
    }

    #[test]
    fn test_extract_date_from_text() {
        let today = monday();
        assert_eq!(
            extract_date_from_text("Lunch tomorrow at noon", today),
            Some(today + Duration::days(1))
        );
        assert_eq!(
            extract_date_from_text("sync next Friday at 3", today),
            Some(today + Duration::days(11))
        );
        assert_eq!(
            extract_date_from_text("dinner on thursday", today),
            Some(today + Duration::days(3))
        );
        assert_eq!(
            extract_date_from_text("review on 2024-03-04", today),
            NaiveDate::from_ymd_opt(2024, 3, 4)
        );
        assert!(extract_date_from_text("call mom", today).is_none());
        assert_eq!(
            extract_date_from_text("move it from tomorrow to today", today),
            Some(today + Duration::days(1))
        );
        assert_eq!(
            extract_date_from_text("friday or maybe today", today),
            Some(today + Duration::days(4))
        );
    }
}
