//! Twilio Messages API client.

use std::time::Duration;

use reqwest::Client;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::config::TwilioConfig;
use crate::error::WhatsAppError;
use crate::types::{whatsapp_address, OutboundMessage, SendResult, TwilioErrorBody};

/// Client for sending WhatsApp messages through Twilio.
#[derive(Clone)]
pub struct TwilioClient {
    http: Client,
    config: TwilioConfig,
}

impl TwilioClient {
    /// Build a client with a 30 second request timeout.
    pub fn new(config: TwilioConfig) -> Result<Self, WhatsAppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(WhatsAppError::Http)?;
        Ok(Self { http, config })
    }

    /// Build from environment variables.
    pub fn from_env() -> Result<Self, WhatsAppError> {
        Self::new(TwilioConfig::from_env()?)
    }

    pub fn config(&self) -> &TwilioConfig {
        &self.config
    }

    /// Send one message to a phone number.
    pub async fn send(&self, to: &str, message: &OutboundMessage) -> Result<SendResult, WhatsAppError> {
        let mut form = vec![
            ("To", whatsapp_address(to)),
            ("From", whatsapp_address(&self.config.from_number)),
        ];
        form.extend(message.form_fields()?);

        debug!("Twilio send to {}", to);
        let response = self
            .http
            .post(self.config.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let result: SendResult = response.json().await?;
            info!(sid = %result.sid, "WHATSAPP_SENT");
            return Ok(result);
        }

        let text = response.text().await.unwrap_or_default();
        let body: Option<TwilioErrorBody> = serde_json::from_str(&text).ok();
        let (code, message) = match body {
            Some(body) => (body.code, body.message.unwrap_or(text)),
            None => (None, text),
        };
        Err(WhatsAppError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    /// Send a plain-text message.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendResult, WhatsAppError> {
        self.send(to, &OutboundMessage::text(body)).await
    }

    /// Send using the configured template, falling back to plain text.
    ///
    /// `body` fills the template's body variable and is also the fallback text.
    pub async fn send_preferred(
        &self,
        to: &str,
        header: &str,
        body: &str,
        fallback_text: &str,
    ) -> Result<SendResult, WhatsAppError> {
        if let Some(content_sid) = &self.config.template_sid {
            let message = template_message(&self.config, content_sid, header, body);
            match self.send(to, &message).await {
                Ok(result) => return Ok(result),
                Err(e) => warn!(error = %e, "WHATSAPP_TEMPLATE_FAILED, falling back to text"),
            }
        }
        self.send_text(to, fallback_text).await
    }
}

/// Build the template message for a header/body pair.
pub fn template_message(config: &TwilioConfig, content_sid: &str, header: &str, body: &str) -> OutboundMessage {
    let mut variables = std::collections::BTreeMap::new();
    variables.insert(config.body_variable.clone(), body.to_string());
    variables.insert(config.header_variable.clone(), header.to_string());
    OutboundMessage::Template {
        content_sid: content_sid.to_string(),
        variables,
    }
}
