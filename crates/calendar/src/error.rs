//! Calendar error types.

use thiserror::Error;

/// Errors from the calendar provider and connector.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The user has no stored calendar credentials.
    #[error("calendar not connected")]
    NotConnected,

    /// Token expired or revoked and cannot be refreshed.
    #[error("token expired or revoked")]
    AuthExpired,

    /// Token refresh failed for a reason other than revocation.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database: {0}")]
    Database(#[from] database::DatabaseError),

    #[error("request timed out")]
    Timeout,
}

impl CalendarError {
    /// Whether the fix is reconnecting rather than retrying.
    pub fn needs_connection(&self) -> bool {
        matches!(self, Self::NotConnected | Self::AuthExpired)
    }

    /// Whether the provider rejected a recurrence rule.
    pub fn is_invalid_recurrence(&self) -> bool {
        match self {
            Self::Api { status, message } => *status == 400 && message.to_lowercase().contains("recurrence"),
            _ => false,
        }
    }
}

/// Result type for calendar operations.
pub type Result<T> = std::result::Result<T, CalendarError>;
