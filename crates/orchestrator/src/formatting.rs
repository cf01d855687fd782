//! Display formatting for event times, lists and candidate menus.

use std::collections::BTreeMap;

use calendar::{CalendarEvent, EventTime};
use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;

/// Maximum candidates shown in a disambiguation list.
pub const MAX_CANDIDATES: usize = 5;

/// `2:00 PM`
pub fn time_label(dt: &DateTime<Tz>) -> String {
    dt.format("%-I:%M %p").to_string()
}

/// `Friday, January 5`
pub fn day_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}

/// `Jan 05`
pub fn short_date(date: NaiveDate) -> String {
    date.format("%b %d").to_string()
}

/// Local start of an event value, if timed.
pub fn local(time: &EventTime, tz: Tz) -> Option<DateTime<Tz>> {
    match time {
        EventTime::Timed { date_time, .. } => Some(date_time.with_timezone(&tz)),
        EventTime::AllDay { .. } => None,
    }
}

/// `2:00 PM – 3:00 PM`, or `All day`.
pub fn event_time_range(event: &CalendarEvent, tz: Tz) -> String {
    match (local(&event.start, tz), local(&event.end, tz)) {
        (Some(start), Some(end)) => format!("{} – {}", time_label(&start), time_label(&end)),
        (Some(start), None) => time_label(&start),
        _ => "All day".to_string(),
    }
}

/// `• Title — 2:00 PM – 3:00 PM`
pub fn event_line(event: &CalendarEvent, tz: Tz) -> String {
    format!("• {} — {}", event.title(), event_time_range(event, tz))
}

/// Numbered candidate lines: `1. Title (2:00 PM on Jan 05)`, at most five.
pub fn candidate_list(events: &[CalendarEvent], tz: Tz) -> String {
    events
        .iter()
        .take(MAX_CANDIDATES)
        .enumerate()
        .map(|(i, event)| match local(&event.start, tz) {
            Some(start) => format!(
                "{}. {} ({} on {})",
                i + 1,
                event.title(),
                time_label(&start),
                short_date(start.date_naive())
            ),
            None => format!("{}. {}", i + 1, event.title()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `time to 3:00 PM on Friday, January 5` or `date to Friday, January 5`.
pub fn start_change(time: &EventTime, tz: Tz) -> String {
    match time {
        EventTime::Timed { date_time, .. } => {
            let local = date_time.with_timezone(&tz);
            format!("time to {} on {}", time_label(&local), day_label(local.date_naive()))
        }
        EventTime::AllDay { date } => format!("date to {}", day_label(*date)),
    }
}

fn month_span(from: NaiveDate, to: NaiveDate) -> String {
    if from.year() == to.year() && from.month() == to.month() {
        format!("{} {}-{}, {}", from.format("%B"), from.day(), to.day(), from.year())
    } else {
        format!("{} - {}", from.format("%B %-d"), to.format("%B %-d, %Y"))
    }
}

fn search_label(queries: &[String]) -> Option<String> {
    let mut terms: Vec<String> = queries.iter().map(|q| q.trim().to_string()).filter(|q| !q.is_empty()).collect();
    let first = terms.first_mut()?;
    let mut chars = first.chars();
    if let Some(c) = chars.next() {
        *first = c.to_uppercase().chain(chars).collect();
    }
    Some(match terms.len() {
        1 => terms.remove(0),
        2 => format!("{} and {}", terms[0], terms[1]),
        n => format!("{}, and {}", terms[..n - 1].join(", "), terms[n - 1]),
    })
}

/// Header for a listed range, sized to its span.
pub fn range_header(from: NaiveDate, to: NaiveDate, today: NaiveDate, queries: &[String]) -> String {
    let span = (to - from).num_days() + 1;
    let body = match search_label(queries) {
        Some(terms) => match span {
            1 if from == today => format!("{} today", terms),
            1 => format!("{} on {}", terms, from.format("%A, %B %-d, %Y")),
            2..=7 => format!("{} - {}", terms, month_span(from, to)),
            8..=31 => format!("{} in {}", terms, from.format("%B %Y")),
            _ => format!("{} in {}", terms, from.year()),
        },
        None => match span {
            1 if from == today => "Today's Schedule".to_string(),
            1 => format!("Schedule for {}", from.format("%A, %B %-d, %Y")),
            2..=7 => format!("Your Weekly Schedule - {}", month_span(from, to)),
            8..=31 => format!("Your Schedule for {}", from.format("%B %Y")),
            _ => format!("Your Schedule for {}", from.year()),
        },
    };
    format!("📅 {}", body)
}

/// Events grouped by local day, days in order, `(Today)` marked.
pub fn schedule(events: &[CalendarEvent], tz: Tz, today: NaiveDate) -> String {
    let mut by_day: BTreeMap<NaiveDate, Vec<&CalendarEvent>> = BTreeMap::new();
    for event in events {
        by_day.entry(event.start.date_in(tz)).or_default().push(event);
    }

    let mut blocks = Vec::with_capacity(by_day.len());
    for (day, day_events) in by_day {
        let mut lines = Vec::with_capacity(day_events.len() + 1);
        let mut header = day_label(day);
        if day == today {
            header.push_str(" (Today)");
        }
        lines.push(header);
        lines.extend(day_events.iter().map(|e| event_line(e, tz)));
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n\n")
}
