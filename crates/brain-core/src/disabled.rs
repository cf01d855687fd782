//! A language model that is never available.

use async_trait::async_trait;

use crate::error::BrainError;
use crate::message::CompletionRequest;
use crate::trait_def::LanguageModel;

/// Stand-in used when no model is configured.
///
/// Every call returns [`BrainError::Unavailable`], so callers fall back to
/// their deterministic behavior.
#[derive(Debug, Clone, Default)]
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, BrainError> {
        Err(BrainError::Unavailable("no language model configured".to_string()))
    }

    fn name(&self) -> &str {
        "DisabledModel"
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_model_is_unavailable() {
        let model = DisabledModel;
        let err = model
            .complete(CompletionRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(!model.is_available());
    }
}
