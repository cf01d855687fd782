//! Google OAuth and API configuration.

use std::env;

use secrecy::{ExposeSecret, SecretString};

/// Default Calendar API base URL.
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Configuration for talking to Google Calendar.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    client_secret: SecretString,
    pub token_uri: String,
    pub api_url: String,
}

impl GoogleConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - OAuth client (default: empty, refresh disabled)
    /// - `GOOGLE_TOKEN_URI` - Token endpoint (default: https://oauth2.googleapis.com/token)
    /// - `GOOGLE_CALENDAR_API_URL` - API base (default: https://www.googleapis.com/calendar/v3)
    pub fn from_env() -> Self {
        Self {
            client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: SecretString::from(env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default()),
            token_uri: env::var("GOOGLE_TOKEN_URI").unwrap_or_else(|_| DEFAULT_TOKEN_URI.to_string()),
            api_url: env::var("GOOGLE_CALENDAR_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = uri.into();
        self
    }

    pub(crate) fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}
