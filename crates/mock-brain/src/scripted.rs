//! Scripted model - replays queued replies.

use std::collections::VecDeque;

use brain_core::{async_trait, BrainError, CompletionRequest, LanguageModel};
use tokio::sync::Mutex;

/// A model that pops one queued reply per call.
///
/// Once the queue is drained every call returns `BrainError::Unavailable`.
/// Every request is recorded for later inspection.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, BrainError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    /// Create a model that answers with the given replies in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another reply.
    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(reply.into()));
    }

    /// Queue an error.
    pub async fn push_error(&self, error: BrainError) {
        self.replies.lock().await.push_back(Err(error));
    }

    /// All requests received so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of calls made so far.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BrainError> {
        self.requests.lock().await.push(request);
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(BrainError::Unavailable("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "ScriptedModel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order() {
        let model = ScriptedModel::new(["one", "two"]);

        let first = model.complete(CompletionRequest::prompt("a")).await.unwrap();
        let second = model.complete(CompletionRequest::prompt("b")).await.unwrap();

        assert_eq!(first, "one");
        assert_eq!(second, "two");
        assert_eq!(model.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_unavailable() {
        let model = ScriptedModel::default();
        let err = model
            .complete(CompletionRequest::prompt("a"))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_records_requests() {
        let model = ScriptedModel::new(["ok"]);
        model
            .complete(CompletionRequest::prompt("hello").system("sys"))
            .await
            .unwrap();

        let requests = model.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system.as_deref(), Some("sys"));
        assert_eq!(requests[0].last_user_text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_queued_error() {
        let model = ScriptedModel::default();
        model.push_error(BrainError::Timeout).await;
        model.push_reply("after").await;

        assert!(matches!(
            model.complete(CompletionRequest::prompt("a")).await,
            Err(BrainError::Timeout)
        ));
        assert_eq!(
            model.complete(CompletionRequest::prompt("b")).await.unwrap(),
            "after"
        );
    }
}
