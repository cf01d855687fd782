//! Error types for notification delivery.

use std::future::Future;
use std::time::Duration;

use brain_core::BrainError;
use calendar::CalendarError;
use database::DatabaseError;
use mailer::MailError;
use thiserror::Error;
use whatsapp::WhatsAppError;

/// Errors raised while sending notifications.
///
/// The loops never propagate these; they are logged and recorded as
/// `failed` ledger rows where a ledger row applies.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("brain error: {0}")]
    Brain(#[from] BrainError),

    #[error("calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("whatsapp error: {0}")]
    WhatsApp(#[from] WhatsAppError),

    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    /// The channel has no transport configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// An external call exceeded the per-call timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },
}

/// Run `fut`, failing with [`NotifierError::Timeout`] after `after`.
pub async fn with_timeout<T, E, F>(operation: &'static str, after: Duration, fut: F) -> Result<T, NotifierError>
where
    F: Future<Output = Result<T, E>>,
    NotifierError: From<E>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(NotifierError::from),
        Err(_) => Err(NotifierError::Timeout { operation, after }),
    }
}
