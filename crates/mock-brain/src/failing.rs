//! Failing model - always returns an error.

use brain_core::{async_trait, BrainError, CompletionRequest, LanguageModel};

/// Which error a [`FailingModel`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Network,
    Timeout,
}

/// A model that fails every call.
#[derive(Debug, Clone)]
pub struct FailingModel {
    kind: FailureKind,
}

impl FailingModel {
    /// Fail with a network error.
    pub fn network() -> Self {
        Self {
            kind: FailureKind::Network,
        }
    }

    /// Fail with a timeout.
    pub fn timeout() -> Self {
        Self {
            kind: FailureKind::Timeout,
        }
    }

    /// Fail as if disabled.
    pub fn unavailable() -> Self {
        Self {
            kind: FailureKind::Unavailable,
        }
    }
}

#[async_trait]
impl LanguageModel for FailingModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, BrainError> {
        Err(match self.kind {
            FailureKind::Unavailable => BrainError::Unavailable("failing model".to_string()),
            FailureKind::Network => BrainError::Network("connection refused".to_string()),
            FailureKind::Timeout => BrainError::Timeout,
        })
    }

    fn name(&self) -> &str {
        "FailingModel"
    }
}
