//! ClaudeBrain implementation using the Anthropic Messages API.

use brain_core::{async_trait, BrainError, CompletionRequest, LanguageModel, Role};
use reqwest::Client;
use tracing::{debug, warn};

use crate::api_types::{ApiError, ApiMessage, MessagesRequest, MessagesResponse};
use crate::config::ClaudeBrainConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A language model backed by the Anthropic Messages API.
///
/// Each call is bounded by the configured timeout. A timeout surfaces as
/// [`BrainError::Timeout`] so callers can take their fallback path.
pub struct ClaudeBrain {
    client: Client,
    config: ClaudeBrainConfig,
}

impl ClaudeBrain {
    /// Create a new ClaudeBrain with the given configuration.
    pub fn new(config: ClaudeBrainConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a ClaudeBrain from environment variables.
    ///
    /// See [`ClaudeBrainConfig::from_env`] for required environment variables.
    pub fn from_env() -> Result<Self, BrainError> {
        Self::new(ClaudeBrainConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClaudeBrainConfig {
        &self.config
    }

    fn build_request(&self, request: CompletionRequest) -> MessagesRequest {
        let messages = request
            .messages
            .into_iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: m.content,
            })
            .collect();

        MessagesRequest {
            model: request.model.unwrap_or_else(|| self.config.model.clone()),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages,
        }
    }
}

#[async_trait]
impl LanguageModel for ClaudeBrain {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BrainError> {
        let url = format!("{}/v1/messages", self.config.api_url.trim_end_matches('/'));
        let body = self.build_request(request);

        debug!(model = %body.model, messages = body.messages.len(), "CLAUDE_REQUEST");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrainError::Timeout
                } else {
                    BrainError::Network(format!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            // Try to parse as API error
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
                return Err(BrainError::ProcessingFailed(format!(
                    "API error ({}): {}",
                    status.as_u16(),
                    api_error.error.message
                )));
            }

            return Err(BrainError::ProcessingFailed(format!(
                "API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let completion: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BrainError::ProcessingFailed(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &completion.usage {
            debug!(
                input = usage.input_tokens,
                output = usage.output_tokens,
                "CLAUDE_USAGE"
            );
        }

        let text = completion.text();
        if text.trim().is_empty() {
            warn!(id = %completion.id, "CLAUDE_EMPTY_RESPONSE");
            return Err(BrainError::EmptyResponse);
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "ClaudeBrain"
    }
}
