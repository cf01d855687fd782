use std::sync::Arc;

use database::Database;
use orchestrator::Orchestrator;
use secrecy::{ExposeSecret, SecretString};
use whatsapp::{validate_signature, SignatureValidation};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub orchestrator: Arc<Orchestrator>,
    pub api_token: Option<String>,
    /// Present when inbound webhooks must carry a valid Twilio signature.
    pub webhook: Option<Arc<WebhookAuth>>,
}

impl AppState {
    pub fn new(db: Database, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            db,
            orchestrator,
            api_token: None,
            webhook: None,
        }
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    pub fn with_webhook_auth(mut self, auth: Option<WebhookAuth>) -> Self {
        self.webhook = auth.map(Arc::new);
        self
    }
}

/// Twilio signing key and the URL Twilio signs against.
pub struct WebhookAuth {
    auth_token: SecretString,
    url: String,
}

impl WebhookAuth {
    pub fn new(auth_token: SecretString, url: impl Into<String>) -> Self {
        Self {
            auth_token,
            url: url.into(),
        }
    }

    pub fn verify(&self, signature: Option<&str>, params: &[(String, String)]) -> SignatureValidation {
        validate_signature(
            self.auth_token.expose_secret(),
            signature,
            &self.url,
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }
}
