//! Prompt helpers for loading, hashing and tracking prompt versions.

use std::env;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::info;

/// Compute a stable SHA-256 fingerprint for a prompt string.
pub fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Load a prompt file, returning None if not found or empty.
pub fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

/// Resolve a system prompt.
///
/// Priority:
/// 1. `inline_var` env var (if set)
/// 2. Contents of the file named by `file_var` (or `default_file`)
/// 3. `embedded` default
pub fn load_prompt(inline_var: &str, file_var: &str, default_file: &str, embedded: &str) -> String {
    if let Ok(prompt) = env::var(inline_var) {
        info!("Using prompt from {} env var", inline_var);
        return prompt;
    }

    let prompt_file = env::var(file_var).unwrap_or_else(|_| default_file.to_string());
    if let Some(prompt) = load_prompt_file(&prompt_file) {
        info!("Loaded prompt from {}", prompt_file);
        return prompt;
    }

    embedded.to_string()
}
