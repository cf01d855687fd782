//! Pipeline configuration.

use std::env;

/// Messages loaded as history for each command.
pub const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Model used for intent classification; the client default when `None`.
    pub intent_model: Option<String>,

    /// Prior messages loaded per command.
    pub history_limit: i64,

    /// Whether read-phrased create requests are rewritten to listings.
    pub list_rewrite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            intent_model: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            list_rewrite: true,
        }
    }
}

impl PipelineConfig {
    /// Read configuration from the environment.
    ///
    /// - `CLAUDE_INTENT_MODEL` - model for intent classification
    /// - `PIPELINE_HISTORY_LIMIT` - prior messages per command (default: 10)
    /// - `PIPELINE_LIST_REWRITE` - `false` disables the list-versus-create rewrite
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            intent_model: env::var("CLAUDE_INTENT_MODEL").ok().filter(|m| !m.trim().is_empty()),
            history_limit: env::var("PIPELINE_HISTORY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.history_limit),
            list_rewrite: env::var("PIPELINE_LIST_REWRITE")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(defaults.list_rewrite),
        }
    }

    pub fn with_intent_model(mut self, model: impl Into<String>) -> Self {
        self.intent_model = Some(model.into());
        self
    }

    pub fn with_list_rewrite(mut self, enabled: bool) -> Self {
        self.list_rewrite = enabled;
        self
    }
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
            env::remove_var("CLAUDE_INTENT_MODEL");
            env::remove_var("PIPELINE_HISTORY_LIMIT");
            env::remove_var("PIPELINE_LIST_REWRITE");
        }

        clear();
        assert_eq!(PipelineConfig::from_env(), PipelineConfig::default());

        env::set_var("CLAUDE_INTENT_MODEL", "claude-small");
        env::set_var("PIPELINE_HISTORY_LIMIT", "4");
        env::set_var("PIPELINE_LIST_REWRITE", "FALSE");
        let config = PipelineConfig::from_env();
        assert_eq!(config.intent_model.as_deref(), Some("claude-small"));
        assert_eq!(config.history_limit, 4);
        assert!(!config.list_rewrite);

        env::set_var("PIPELINE_HISTORY_LIMIT", "0");
        assert_eq!(PipelineConfig::from_env().history_limit, DEFAULT_HISTORY_LIMIT);

        clear();
    }
}
