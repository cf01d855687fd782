//! ZeptoMail transactional email API.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};

use crate::{Email, EmailTransport, MailError};

/// Default ZeptoMail send endpoint.
pub const DEFAULT_API_URL: &str = "https://api.zeptomail.com/v1.1/email";

/// ZeptoMail account settings.
#[derive(Debug, Clone)]
pub struct ZeptoMailConfig {
    api_token: SecretString,
    pub from_email: String,
    pub from_name: String,
    pub api_url: String,
}

impl ZeptoMailConfig {
    pub fn new(api_token: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            api_token: SecretString::from(api_token.into()),
            from_email: from_email.into(),
            from_name: "Reminder Agent".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `ZEPTOMAIL_API_TOKEN` - Send-mail token, sent verbatim in `Authorization`
    /// - `ZEPTOMAIL_FROM_EMAIL` - Verified sender address
    ///
    /// Optional:
    /// - `ZEPTOMAIL_FROM_NAME` - Default: Reminder Agent
    /// - `ZEPTOMAIL_API_URL` - Default: the v1.1 email endpoint
    pub fn from_env() -> Result<Self, MailError> {
        let api_token = required("ZEPTOMAIL_API_TOKEN")?;
        let from_email = required("ZEPTOMAIL_FROM_EMAIL")?;
        let mut config = Self::new(api_token, from_email);
        config.from_name = env::var("ZEPTOMAIL_FROM_NAME").unwrap_or_else(|_| "Reminder Agent".to_string());
        config.api_url = env::var("ZEPTOMAIL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

pub(crate) fn required(name: &str) -> Result<String, MailError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MailError::MissingEnvVar(name.to_string()))
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    from: Sender<'a>,
    to: Vec<Recipient<'a>>,
    subject: &'a str,
    textbody: &'a str,
}

#[derive(Debug, Serialize)]
struct Sender<'a> {
    address: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    email_address: Address<'a>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    address: &'a str,
}

/// Sends email through the ZeptoMail HTTPS API.
pub struct ZeptoMailTransport {
    http: Client,
    config: ZeptoMailConfig,
}

impl ZeptoMailTransport {
    pub fn new(config: ZeptoMailConfig) -> Result<Self, MailError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, config })
    }

    fn payload<'a>(&'a self, email: &'a Email) -> Payload<'a> {
        Payload {
            from: Sender {
                address: &self.config.from_email,
                name: &self.config.from_name,
            },
            to: vec![Recipient {
                email_address: Address { address: &email.to },
            }],
            subject: &email.subject,
            textbody: &email.body,
        }
    }
}

#[async_trait]
impl EmailTransport for ZeptoMailTransport {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header("Accept", "application/json")
            .header("Authorization", self.config.api_token.expose_secret())
            .json(&self.payload(email))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                info!(to = %email.to, subject = %email.subject, "ZEPTOMAIL_SENT");
                Ok(())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(to = %email.to, "ZeptoMail rate limit hit");
                Err(MailError::RateLimited)
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(MailError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    fn name(&self) -> &str {
        "zeptomail"
    }
}
