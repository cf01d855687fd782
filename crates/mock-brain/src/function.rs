//! Closure-backed model.

use brain_core::{async_trait, BrainError, CompletionRequest, LanguageModel};

type Responder = dyn Fn(&CompletionRequest) -> Result<String, BrainError> + Send + Sync;

/// A model whose answer is computed by a closure.
///
/// Useful when several components share one model and each call must be
/// answered based on its system prompt rather than call order.
pub struct FnModel {
    responder: Box<Responder>,
}

impl FnModel {
    /// Create a model from a responder closure.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, BrainError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
        }
    }
}

#[async_trait]
impl LanguageModel for FnModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BrainError> {
        (self.responder)(&request)
    }

    fn name(&self) -> &str {
        "FnModel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_on_system_prompt() {
        let model = FnModel::new(|request| match request.system.as_deref() {
            Some(s) if s.contains("classify") => Ok("calendar".to_string()),
            _ => Ok("other".to_string()),
        });

        let classified = model
            .complete(CompletionRequest::prompt("x").system("classify this"))
            .await
            .unwrap();
        let other = model.complete(CompletionRequest::prompt("x")).await.unwrap();

        assert_eq!(classified, "calendar");
        assert_eq!(other, "other");
    }
}
