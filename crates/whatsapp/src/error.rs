//! Error types for the WhatsApp transport.

use thiserror::Error;

/// Errors that can occur when talking to Twilio.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Twilio rejected the request.
    #[error("Twilio error {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Message sending failed.
    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl WhatsAppError {
    /// Whether Twilio throttled the request.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, WhatsAppError::Api { status: 429, .. })
    }
}
