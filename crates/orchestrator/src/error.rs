//! Error types for pipeline operations.

use brain_core::BrainError;
use calendar::CalendarError;
use database::DatabaseError;
use thiserror::Error;

/// Errors that can occur while resolving a command.
///
/// Calendar and model failures are normally converted into user-facing
/// replies at the call site; these variants cover what cannot be.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Persistence failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Calendar provider failed.
    #[error("calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Language model failed.
    #[error("brain error: {0}")]
    Brain(#[from] BrainError),

    /// A stored or submitted payload could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A confirmation did not match the conversation's pending action.
    #[error("invalid confirmation: {0}")]
    InvalidConfirmation(String),

    /// The conversation belongs to someone else or does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}
