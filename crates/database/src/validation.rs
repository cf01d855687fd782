//! Input validation for user settings.

use std::fmt;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::models::NotificationPreference;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid email format.
    InvalidEmail(String),
    /// Lead time outside the accepted range.
    LeadTimeOutOfRange { min: i64, max: i64, actual: i64 },
    /// Briefing time not in `HH:MM` form.
    InvalidTime(String),
    /// Unknown IANA timezone.
    InvalidTimezone(String),
    /// WhatsApp number not in E.164 form.
    InvalidPhoneNumber(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            ValidationError::LeadTimeOutOfRange { min, max, actual } => {
                write!(f, "Reminder lead time must be between {} and {} minutes (got {})", min, max, actual)
            }
            ValidationError::InvalidTime(value) => write!(f, "Invalid time '{}', expected HH:MM", value),
            ValidationError::InvalidTimezone(value) => write!(f, "Unknown timezone '{}'", value),
            ValidationError::InvalidPhoneNumber(value) => {
                write!(f, "Invalid WhatsApp number '{}', expected E.164 like +15551234567", value)
            }
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Accepted reminder lead time range, in minutes.
pub const MIN_LEAD_TIME: i64 = 1;
pub const MAX_LEAD_TIME: i64 = 1440;

/// Validate an email address (basic format check).
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Empty("email".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ValidationError::InvalidEmail(
            "must contain exactly one @ symbol".to_string(),
        ));
    }

    let (local, domain) = (parts[0], parts[1]);

    if local.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "missing local part (before @)".to_string(),
        ));
    }

    if domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::InvalidEmail(
            "domain must contain at least one dot".to_string(),
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(ValidationError::InvalidEmail(
            "malformed domain".to_string(),
        ));
    }

    Ok(())
}

/// Validate a reminder lead time in minutes.
pub fn validate_lead_time(minutes: i64) -> Result<(), ValidationError> {
    if !(MIN_LEAD_TIME..=MAX_LEAD_TIME).contains(&minutes) {
        return Err(ValidationError::LeadTimeOutOfRange {
            min: MIN_LEAD_TIME,
            max: MAX_LEAD_TIME,
            actual: minutes,
        });
    }
    Ok(())
}

/// Validate an `HH:MM` time of day.
pub fn validate_briefing_time(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    let well_formed = value.len() == 5 && value.as_bytes()[2] == b':';
    if !well_formed || NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        return Err(ValidationError::InvalidTime(value.to_string()));
    }
    Ok(())
}

/// Validate an IANA timezone name.
pub fn validate_timezone(value: &str) -> Result<(), ValidationError> {
    value
        .trim()
        .parse::<Tz>()
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidTimezone(value.to_string()))
}

/// Validate an E.164 phone number. The leading `+` is optional.
pub fn validate_whatsapp_number(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty("WhatsApp number".to_string()));
    }

    let digits = value.strip_prefix('+').unwrap_or(value);
    let valid = (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');

    if !valid {
        return Err(ValidationError::InvalidPhoneNumber(value.to_string()));
    }
    Ok(())
}

/// Validate every field of a preference record.
pub fn validate_preference(pref: &NotificationPreference) -> Result<(), ValidationError> {
    validate_lead_time(pref.reminder_lead_time)?;
    validate_briefing_time(&pref.morning_briefing_time)?;
    validate_timezone(&pref.user_timezone)?;
    match pref.whatsapp_number.as_deref() {
        Some(number) => validate_whatsapp_number(number)?,
        None if pref.whatsapp_enabled => {
            return Err(ValidationError::Empty("WhatsApp number".to_string()))
        }
        None => {}
    }
    Ok(())
}
