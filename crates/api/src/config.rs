//! Server configuration.

use std::env;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8787";

/// Default SQLite URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:calendar_assistant.db?mode=rwc";

/// HTTP server settings.
///
/// Environment variables:
/// - `API_ADDR` - Listen address (default: 127.0.0.1:8787)
/// - `SQLITE_PATH` - Database URL (default: sqlite:calendar_assistant.db?mode=rwc)
/// - `API_TOKEN` - Bearer token required on `/v1` routes (optional)
/// - `TWILIO_WEBHOOK_URL` - Public URL Twilio posts to; enables signature checks (optional)
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub addr: String,
    pub database_url: String,
    pub api_token: Option<String>,
    pub webhook_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_token: None,
            webhook_url: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            addr: env::var("API_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            database_url: env::var("SQLITE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            api_token: non_empty_var("API_TOKEN"),
            webhook_url: non_empty_var("TWILIO_WEBHOOK_URL"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        let vars = ["API_ADDR", "SQLITE_PATH", "API_TOKEN", "TWILIO_WEBHOOK_URL"];
        for var in vars {
            env::remove_var(var);
        }

        let config = ApiConfig::from_env();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.api_token.is_none());

        env::set_var("API_ADDR", "0.0.0.0:9000");
        env::set_var("API_TOKEN", "  ");
        env::set_var("TWILIO_WEBHOOK_URL", "https://example.com/webhooks/whatsapp");
        let config = ApiConfig::from_env();
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert!(config.api_token.is_none());
        assert_eq!(config.webhook_url.as_deref(), Some("https://example.com/webhooks/whatsapp"));

        for var in vars {
            env::remove_var(var);
        }
    }
}
