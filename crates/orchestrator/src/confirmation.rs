//! Free-text confirmation replies.

const AFFIRMATIVE: &[&str] = &["yes", "y", "sure", "ok", "okay", "confirm", "please do", "go ahead"];
const NEGATIVE: &[&str] = &["no", "n", "cancel", "stop", "don't", "do not"];

/// A yes or no typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Affirmative,
    Negative,
}

/// Classify a whole message as a yes or no. Anything else is `None`.
pub fn parse_reply(text: &str) -> Option<Reply> {
    let normalized = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    if AFFIRMATIVE.contains(&normalized.as_str()) {
        Some(Reply::Affirmative)
    } else if NEGATIVE.contains(&normalized.as_str()) {
        Some(Reply::Negative)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonyms() {
        for yes in ["yes", "Y", " okay ", "Go ahead", "please do", "Sure!"] {
            assert_eq!(parse_reply(yes), Some(Reply::Affirmative), "{}", yes);
        }
        for no in ["no", "N", "cancel", "Don't", "do not."] {
            assert_eq!(parse_reply(no), Some(Reply::Negative), "{}", no);
        }
    }

    #[test]
    fn test_sentences_are_not_replies() {
        assert_eq!(parse_reply("yes, and also move lunch"), None);
        assert_eq!(parse_reply("no idea"), None);
        assert_eq!(parse_reply(""), None);
    }
}
