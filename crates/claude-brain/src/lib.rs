//! Anthropic Messages API backed language model.
//!
//! # Usage
//!
//! ```rust,no_run
//! use claude_brain::{ClaudeBrain, CompletionRequest, LanguageModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = ClaudeBrain::from_env()?;
//!     let text = brain.complete(CompletionRequest::prompt("Hello")).await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

mod api_types;
mod brain;
mod config;

pub use brain::ClaudeBrain;
pub use config::{ClaudeBrainConfig, ClaudeBrainConfigBuilder};

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, BrainError, ChatMessage, CompletionRequest, LanguageModel};
