//! Configuration for the Twilio WhatsApp transport.

use std::env;

use secrecy::SecretString;

use crate::error::WhatsAppError;

/// Default Twilio REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.twilio.com";

/// Twilio account and sender settings.
///
/// Environment variables:
/// - `TWILIO_ACCOUNT_SID` (required)
/// - `TWILIO_AUTH_TOKEN` (required)
/// - `TWILIO_WHATSAPP_NUMBER` (required, sender number)
/// - `TWILIO_WHATSAPP_TEMPLATE_SID` (optional Content API template)
/// - `TWILIO_WHATSAPP_TEMPLATE_VARIABLE_BODY` (default `1`)
/// - `TWILIO_WHATSAPP_TEMPLATE_VARIABLE_HEADER` (default `2`)
/// - `TWILIO_API_URL` (default `https://api.twilio.com`)
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub(crate) auth_token: SecretString,
    pub from_number: String,
    pub template_sid: Option<String>,
    pub body_variable: String,
    pub header_variable: String,
    pub api_url: String,
}

impl TwilioConfig {
    /// Create a configuration without a template.
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: SecretString,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token,
            from_number: from_number.into(),
            template_sid: None,
            body_variable: "1".to_string(),
            header_variable: "2".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WhatsAppError> {
        let account_sid = required("TWILIO_ACCOUNT_SID")?;
        let auth_token = SecretString::from(required("TWILIO_AUTH_TOKEN")?);
        let from_number = required("TWILIO_WHATSAPP_NUMBER")?;

        let mut config = Self::new(account_sid, auth_token, from_number);
        config.template_sid = env::var("TWILIO_WHATSAPP_TEMPLATE_SID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        config.body_variable =
            env::var("TWILIO_WHATSAPP_TEMPLATE_VARIABLE_BODY").unwrap_or_else(|_| "1".to_string());
        config.header_variable =
            env::var("TWILIO_WHATSAPP_TEMPLATE_VARIABLE_HEADER").unwrap_or_else(|_| "2".to_string());
        config.api_url = env::var("TWILIO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Ok(config)
    }

    /// Use a Content API template for outbound sends.
    pub fn with_template(mut self, template_sid: impl Into<String>) -> Self {
        self.template_sid = Some(template_sid.into());
        self
    }

    /// Auth token, used to validate webhook signatures.
    pub fn auth_token(&self) -> &SecretString {
        &self.auth_token
    }

    /// Point the client at a different endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// The Messages resource URL for this account.
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

fn required(name: &str) -> Result<String, WhatsAppError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WhatsAppError::Config(format!("{} not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_WHATSAPP_NUMBER",
        "TWILIO_WHATSAPP_TEMPLATE_SID",
        "TWILIO_WHATSAPP_TEMPLATE_VARIABLE_BODY",
        "TWILIO_API_URL",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_from_env_requires_credentials() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("TWILIO_ACCOUNT_SID", "AC123");

        let err = TwilioConfig::from_env().unwrap_err();
        assert!(matches!(err, WhatsAppError::Config(msg) if msg.contains("TWILIO_AUTH_TOKEN")));
        clear();
    }

    #[test]
    fn test_from_env_reads_template_settings() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("TWILIO_ACCOUNT_SID", "AC123");
        env::set_var("TWILIO_AUTH_TOKEN", "secret");
        env::set_var("TWILIO_WHATSAPP_NUMBER", "+14155238886");
        env::set_var("TWILIO_WHATSAPP_TEMPLATE_SID", "HX999");
        env::set_var("TWILIO_WHATSAPP_TEMPLATE_VARIABLE_BODY", "body");

        let config = TwilioConfig::from_env().unwrap();
        assert_eq!(config.template_sid.as_deref(), Some("HX999"));
        assert_eq!(config.body_variable, "body");
        assert_eq!(config.header_variable, "2");
        assert_eq!(
            config.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        clear();
    }

    #[test]
    fn test_blank_template_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("TWILIO_ACCOUNT_SID", "AC123");
        env::set_var("TWILIO_AUTH_TOKEN", "secret");
        env::set_var("TWILIO_WHATSAPP_NUMBER", "+14155238886");
        env::set_var("TWILIO_WHATSAPP_TEMPLATE_SID", "  ");

        assert!(TwilioConfig::from_env().unwrap().template_sid.is_none());
        clear();
    }
}
