//! The LanguageModel trait definition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BrainError;
use crate::message::CompletionRequest;

/// A text completion capability.
///
/// Implementations range from HTTP clients to scripted test doubles.
/// This trait is object-safe and can be used with `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete the request and return the model's free text.
    ///
    /// Returns [`BrainError::Unavailable`] when the capability is disabled.
    async fn complete(&self, request: CompletionRequest) -> Result<String, BrainError>;

    /// Get a human-readable name for this implementation.
    fn name(&self) -> &str;

    /// Whether the capability is configured at all.
    ///
    /// Default implementation always returns true.
    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BrainError> {
        (**self).complete(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
