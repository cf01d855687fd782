//! Notifier configuration.

use std::env;
use std::time::Duration;

/// Default seconds between poll ticks.
pub const DEFAULT_POLL_SECS: u64 = 60;

/// Default number of users processed at once within a tick.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-call timeout for calendar, model and transport calls.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Default lifetime of a leadership lease.
pub const DEFAULT_LEASE_SECS: u64 = 180;

/// Background loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Time between poll ticks.
    pub poll_interval: Duration,

    /// Users processed concurrently within one tick.
    pub concurrency: usize,

    /// Upper bound for any single external call.
    pub call_timeout: Duration,

    /// How long a lease stays valid without renewal.
    pub lease_ttl: Duration,

    /// Identity of this process when holding leases.
    pub instance_id: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            lease_ttl: Duration::from_secs(DEFAULT_LEASE_SECS),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl NotifierConfig {
    /// Read configuration from the environment.
    ///
    /// - `NOTIFIER_POLL_SECS` - seconds between ticks (default: 60)
    /// - `NOTIFIER_CONCURRENCY` - users processed at once (default: 4)
    /// - `NOTIFIER_CALL_TIMEOUT_SECS` - per-call timeout (default: 30)
    /// - `NOTIFIER_LEASE_SECS` - lease lifetime (default: 180)
    /// - `NOTIFIER_INSTANCE_ID` - lease holder name (default: random UUID)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: secs_var("NOTIFIER_POLL_SECS").unwrap_or(defaults.poll_interval),
            concurrency: env::var("NOTIFIER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.concurrency),
            call_timeout: secs_var("NOTIFIER_CALL_TIMEOUT_SECS").unwrap_or(defaults.call_timeout),
            lease_ttl: secs_var("NOTIFIER_LEASE_SECS").unwrap_or(defaults.lease_ttl),
            instance_id: env::var("NOTIFIER_INSTANCE_ID")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.instance_id),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }
}

fn secs_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        fn clear() {
            for name in [
                "NOTIFIER_POLL_SECS",
                "NOTIFIER_CONCURRENCY",
                "NOTIFIER_CALL_TIMEOUT_SECS",
                "NOTIFIER_LEASE_SECS",
                "NOTIFIER_INSTANCE_ID",
            ] {
                env::remove_var(name);
            }
        }

        clear();
        let config = NotifierConfig::from_env();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.lease_ttl, Duration::from_secs(180));
        assert!(!config.instance_id.is_empty());

        env::set_var("NOTIFIER_POLL_SECS", "15");
        env::set_var("NOTIFIER_CONCURRENCY", "0");
        env::set_var("NOTIFIER_INSTANCE_ID", "worker-a");
        let config = NotifierConfig::from_env();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.instance_id, "worker-a");

        clear();
    }
}
