//! Error types for language model calls.

use thiserror::Error;

/// Errors that can occur when calling a language model.
#[derive(Debug, Error)]
pub enum BrainError {
    /// The capability is disabled or temporarily unavailable.
    #[error("language model unavailable: {0}")]
    Unavailable(String),

    /// The model is misconfigured (missing key, bad URL, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not reach the provider.
    #[error("network error: {0}")]
    Network(String),

    /// The provider rejected the request or returned garbage.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// The provider answered with no text.
    #[error("empty response")]
    EmptyResponse,

    /// A timeout occurred while waiting for the provider.
    #[error("request timed out")]
    Timeout,
}

impl BrainError {
    /// Whether this error means the capability is absent rather than failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
