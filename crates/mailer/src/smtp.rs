//! SMTP delivery via lettre.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use crate::zeptomail::required;
use crate::{Email, EmailTransport, MailError};

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP host
    pub host: String,
    /// SMTP port (default: 587)
    pub port: u16,
    pub username: String,
    password: SecretString,
    /// Sender address (default: the username)
    pub from_address: String,
    /// Connection timeout (default: 10s)
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            host: host.into(),
            port,
            from_address: username.clone(),
            username,
            password: SecretString::from(password.into()),
            timeout: Duration::from_secs(10),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required: `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`.
    /// Optional: `SMTP_PORT` (default 587), `SMTP_FROM_EMAIL` (default the username).
    pub fn from_env() -> Result<Self, MailError> {
        let host = required("SMTP_HOST")?;
        let port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|e| MailError::Config(format!("Invalid SMTP_PORT: {}", e)))?;
        let username = required("SMTP_USERNAME")?;
        let password = required("SMTP_PASSWORD")?;

        let mut config = Self::new(host, port, username, password);
        if let Ok(from) = env::var("SMTP_FROM_EMAIL") {
            config.from_address = from;
        }
        Ok(config)
    }

    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }
}

/// Sends email over a pooled STARTTLS SMTP connection.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.username.clone(), config.password.expose_secret().to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(config.timeout))
            .build();

        info!(host = %config.host, port = config.port, "Created SMTP transport");

        Ok(Self {
            transport,
            from_address: config.from_address,
        })
    }

    fn build_message(&self, email: &Email) -> Result<Message, MailError> {
        build_message(&self.from_address, email)
    }
}

pub(crate) fn build_message(from_address: &str, email: &Email) -> Result<Message, MailError> {
    let from = from_address
        .parse()
        .map_err(|_| MailError::InvalidAddress(from_address.to_string()))?;
    let to = email
        .to
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.to.clone()))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| MailError::BuildEmail(e.to_string()))
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        info!(to = %email.to, "SMTP_SENT");
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
