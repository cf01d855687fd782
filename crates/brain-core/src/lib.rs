//! Core trait and types for language model implementations.
//!
//! This crate provides the shared interface every language model backend
//! of the calendar assistant implements. It defines:
//!
//! - [`LanguageModel`] - The trait that all model implementations must implement
//! - [`ChatMessage`] / [`CompletionRequest`] - Input types for a completion
//! - [`BrainError`] - Error types, including the `Unavailable` sentinel
//! - [`DisabledModel`] - A model that is never available
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, BrainError, CompletionRequest, LanguageModel};
//!
//! struct Constant;
//!
//! #[async_trait]
//! impl LanguageModel for Constant {
//!     async fn complete(&self, _request: CompletionRequest) -> Result<String, BrainError> {
//!         Ok("calendar".to_string())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Constant"
//!     }
//! }
//! ```

mod disabled;
mod error;
mod message;
mod prompt;
mod trait_def;

pub use disabled::DisabledModel;
pub use error::BrainError;
pub use message::{ChatMessage, CompletionRequest, Role};
pub use prompt::{hash_prompt, load_prompt, load_prompt_file};
pub use trait_def::LanguageModel;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
