//! Deterministic date and time resolution against a reference "now".

mod parse;
mod range;
mod recurrence;
mod window;

pub use parse::{
    extract_date_from_text, localize, parse_datetime, parse_duration, parse_time_only, parse_weekday, resolve_date,
};
pub use range::{has_duration_cue, infer_at, infer_by, infer_explicit_range, RangeHint, RangePattern};
pub use recurrence::{has_repetition_cue, resolve_recurrence, rule_from_text, sanitize_rule};
pub use window::{resolve_window, ResolvedWindow, TemporalError, WindowRequest, DEFAULT_DURATION_MINUTES};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// `[start of from, start of the day after to)` in `tz`, as instants.
pub fn day_span(from: NaiveDate, to: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        calendar::local_midnight(from, tz),
        calendar::local_midnight(to + Duration::days(1), tz),
    )
}
