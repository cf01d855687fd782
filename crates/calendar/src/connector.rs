//! Resolves a user's calendar provider from stored credentials.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use database::{credential, CalendarCredential, Database};
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::GoogleConfig;
use crate::error::{CalendarError, Result};
use crate::google::GoogleCalendarClient;
use crate::provider::CalendarProvider;

/// Produces a provider for a user.
///
/// Fails with [`CalendarError::NotConnected`] or [`CalendarError::AuthExpired`]
/// when the user has to reconnect.
#[async_trait]
pub trait CalendarConnector: Send + Sync {
    async fn connect(&self, user_id: &str) -> Result<Arc<dyn CalendarProvider>>;
}

/// Seconds of slack before expiry at which a token is refreshed.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Connector backed by the credentials table and Google OAuth.
pub struct GoogleConnector {
    db: Database,
    config: GoogleConfig,
    client: Client,
    refresh_lock: Mutex<()>,
}

impl GoogleConnector {
    pub fn new(db: Database, config: GoogleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CalendarError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            db,
            config,
            client,
            refresh_lock: Mutex::new(()),
        })
    }

    fn is_expired(credential: &CalendarCredential) -> bool {
        match credential.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    async fn refresh(&self, credential: &CalendarCredential) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = credential.refresh_token.as_deref().ok_or(CalendarError::AuthExpired)?;

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.client.post(&self.config.token_uri).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(map_refresh_error(status.as_u16(), &body));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600));
        credential::update_access_token(self.db.pool(), &credential.user_id, &token.access_token, Some(expires_at))
            .await?;

        info!(user_id = %credential.user_id, "CALENDAR_TOKEN_REFRESHED");
        Ok(token.access_token)
    }
}

fn map_refresh_error(status: u16, body: &str) -> CalendarError {
    let lowered = body.to_lowercase();
    if (status == 400 || status == 401)
        && (lowered.contains("invalid_grant") || lowered.contains("token has been expired"))
    {
        return CalendarError::AuthExpired;
    }
    CalendarError::RefreshFailed(format!("HTTP {}: {}", status, body))
}

#[async_trait]
impl CalendarConnector for GoogleConnector {
    async fn connect(&self, user_id: &str) -> Result<Arc<dyn CalendarProvider>> {
        let credential = credential::get_credential(self.db.pool(), user_id)
            .await?
            .ok_or(CalendarError::NotConnected)?;

        let access_token = if Self::is_expired(&credential) {
            match self.refresh(&credential).await {
                Ok(token) => token,
                Err(e) => {
                    warn!(user_id, error = %e, "CALENDAR_REFRESH_FAILED");
                    return Err(e);
                }
            }
        } else {
            credential.access_token
        };

        Ok(Arc::new(GoogleCalendarClient::new(
            self.client.clone(),
            self.config.api_url.clone(),
            SecretString::from(access_token),
        )))
    }
}

/// Connector with a fixed provider per user.
#[derive(Default)]
pub struct StaticConnector {
    providers: RwLock<HashMap<String, Arc<dyn CalendarProvider>>>,
    expired: RwLock<HashMap<String, bool>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a user.
    pub async fn insert(&self, user_id: impl Into<String>, provider: Arc<dyn CalendarProvider>) {
        self.providers.write().await.insert(user_id.into(), provider);
    }

    /// Simulate expired credentials for a user.
    pub async fn expire(&self, user_id: impl Into<String>) {
        self.expired.write().await.insert(user_id.into(), true);
    }
}

#[async_trait]
impl CalendarConnector for StaticConnector {
    async fn connect(&self, user_id: &str) -> Result<Arc<dyn CalendarProvider>> {
        if self.expired.read().await.get(user_id).copied().unwrap_or(false) {
            return Err(CalendarError::AuthExpired);
        }
        self.providers
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or(CalendarError::NotConnected)
    }
}
