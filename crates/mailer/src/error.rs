use thiserror::Error;

/// Errors that can occur when delivering email.
#[derive(Debug, Error)]
pub enum MailError {
    /// HTTP request to the email API failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Email API rejected the request.
    #[error("Email API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Email API rate limit hit.
    #[error("Email API rate limit exceeded")]
    RateLimited,

    /// Failed to build SMTP transport
    #[error("SMTP transport error: {0}")]
    Transport(String),

    /// Failed to send email
    #[error("Failed to send email: {0}")]
    Send(String),

    /// Failed to build email message
    #[error("Failed to build email: {0}")]
    BuildEmail(String),

    /// Invalid email address
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing required environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// No transport is configured.
    #[error("No email transport configured")]
    NotConfigured,
}
