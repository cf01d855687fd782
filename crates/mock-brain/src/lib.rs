//! Mock language models for testing.
//!
//! This crate provides test doubles for the `LanguageModel` trait:
//! - `ScriptedModel` - Returns queued replies in order and records requests
//! - `FnModel` - Answers through a closure, handy for routing on the prompt
//! - `FailingModel` - Always fails with a chosen error
//! - `DelayedModel` - Wraps another model with artificial delay
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{CompletionRequest, LanguageModel, ScriptedModel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let model = ScriptedModel::new(["calendar"]);
//!     let reply = model.complete(CompletionRequest::prompt("hi")).await.unwrap();
//!     assert_eq!(reply, "calendar");
//! }
//! ```

mod delayed;
mod failing;
mod function;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, BrainError, ChatMessage, CompletionRequest, LanguageModel};

pub use delayed::DelayedModel;
pub use failing::FailingModel;
pub use function::FnModel;
pub use scripted::ScriptedModel;
