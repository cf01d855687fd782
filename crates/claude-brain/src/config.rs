//! Configuration for ClaudeBrain.

use std::env;
use std::time::Duration;

use brain_core::BrainError;
use secrecy::{ExposeSecret, SecretString};

/// Configuration for ClaudeBrain.
#[derive(Debug, Clone)]
pub struct ClaudeBrainConfig {
    /// Messages API base URL.
    pub api_url: String,

    /// API key for authentication.
    api_key: SecretString,

    /// Default model name.
    pub model: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClaudeBrainConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com".to_string(),
            api_key: SecretString::from(String::new()),
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClaudeBrainConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `CLAUDE_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `CLAUDE_API_URL` - API URL (default: https://api.anthropic.com)
    /// - `CLAUDE_MODEL` - Model name (default: claude-3-5-haiku-latest)
    /// - `CLAUDE_TIMEOUT_SECS` - Request timeout (default: 30)
    pub fn from_env() -> Result<Self, BrainError> {
        let api_key = env::var("CLAUDE_API_KEY")
            .map_err(|_| BrainError::Configuration("CLAUDE_API_KEY not set".to_string()))?;

        if api_key.trim().is_empty() {
            return Err(BrainError::Configuration("CLAUDE_API_KEY is empty".to_string()));
        }

        let defaults = Self::default();

        let api_url = env::var("CLAUDE_API_URL").unwrap_or(defaults.api_url);
        let model = env::var("CLAUDE_MODEL").unwrap_or(defaults.model);
        let timeout = env::var("CLAUDE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            api_url,
            api_key: SecretString::from(api_key),
            model,
            timeout,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> ClaudeBrainConfigBuilder {
        ClaudeBrainConfigBuilder::default()
    }

    /// Get the API key (exposes the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Builder for ClaudeBrainConfig.
#[derive(Debug, Default)]
pub struct ClaudeBrainConfigBuilder {
    config: ClaudeBrainConfig,
}

impl ClaudeBrainConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = SecretString::from(key.into());
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClaudeBrainConfig {
        self.config
    }
}
