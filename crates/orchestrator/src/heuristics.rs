//! Guard that corrects `create_event` extractions on read-only phrasing.

use std::sync::LazyLock;

use regex::Regex;

static LIST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bwhat.*(?:events?|meetings?|scheduled?)\b",
        r"\bshow.*(?:events?|calendar|schedule)\b",
        r"\blist.*(?:events?|meetings?)\b",
        r"\bcheck.*(?:calendar|schedule)\b",
        r"\b(?:what's|whats).*(?:on|in).*(?:calendar|schedule)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static CREATE_VERBS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(?:create|schedule|book|add|make|set up|arrange)\b").ok());

/// Tunable list-versus-create policy.
///
/// A create verb anywhere in the text always wins, so mixed phrasing such as
/// "show me what I can schedule" stays a create request.
#[derive(Debug, Clone)]
pub struct ListIntentPolicy {
    enabled: bool,
}

impl Default for ListIntentPolicy {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ListIntentPolicy {
    /// A policy that never rewrites.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Whether `text` reads as a request to view events.
    pub fn looks_like_list(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        LIST_PATTERNS.iter().any(|re| re.is_match(&lower))
    }

    /// Whether `text` contains a create verb.
    pub fn has_create_verb(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        CREATE_VERBS.as_ref().is_some_and(|re| re.is_match(&lower))
    }

    /// Whether an extracted `create_event` should become `list_events`.
    pub fn should_rewrite_to_list(&self, text: &str) -> bool {
        self.enabled && self.looks_like_list(text) && !self.has_create_verb(text)
    }
}
