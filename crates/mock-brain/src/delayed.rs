//! Delayed model - wraps another model with artificial delay.

use std::time::Duration;

use brain_core::{async_trait, BrainError, CompletionRequest, LanguageModel};
use tokio::time::sleep;

/// A model that wraps another model and adds artificial delay.
///
/// Useful for testing timeout handling and simulating provider latency.
pub struct DelayedModel<M: LanguageModel> {
    inner: M,
    delay: Duration,
}

impl<M: LanguageModel> DelayedModel<M> {
    /// Create a new DelayedModel wrapping the given model with the specified delay.
    pub fn new(inner: M, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a model with a delay in milliseconds.
    pub fn with_millis(inner: M, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for DelayedModel<M> {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BrainError> {
        sleep(self.delay).await;
        self.inner.complete(request).await
    }

    fn name(&self) -> &str {
        "DelayedModel"
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedModel;
    use std::time::Instant;

    #[tokio::test]
    async fn test_delayed_model() {
        let model = DelayedModel::with_millis(ScriptedModel::new(["late"]), 50);

        let start = Instant::now();
        let reply = model.complete(CompletionRequest::prompt("x")).await.unwrap();

        assert_eq!(reply, "late");
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(model.name(), "DelayedModel");
    }
}
