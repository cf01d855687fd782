//! Action resolution pipeline for the calendar assistant.
//!
//! This crate provides the [`Orchestrator`] type, which turns a user's
//! message into a calendar action, drafts any mutation for confirmation and
//! executes it once the user agrees.
//!
//! # Architecture
//!
//! ```text
//! CommandRequest (from the api crate)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Resolve conversation, take its lock                     │
//! │         ↓                                                   │
//! │  2. Confirmation payload or typed yes/no?                   │
//! │     • yes → execute the pending action                      │
//! │         ↓                                                   │
//! │  3. Classify intent (calendar / general chat)               │
//! │         ↓                                                   │
//! │  4. Extract action + parameters (with salvage)              │
//! │         ↓                                                   │
//! │  5. Resolve dates, match events, check conflicts            │
//! │         ↓                                                   │
//! │  6. Reply, or store a draft as the pending action           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orchestrator::{CommandRequest, Orchestrator};
//!
//! let orchestrator = Orchestrator::from_env(db, model, connector);
//! let response = orchestrator
//!     .handle(CommandRequest::text("user-1", "Schedule team sync tomorrow 2-3pm"))
//!     .await?;
//! println!("{}", response.response_text);
//! ```

pub mod chat;
pub mod clarification;
pub mod classifier;
pub mod command;
pub mod config;
pub mod confirmation;
pub mod conflict;
mod error;
pub mod executor;
pub mod extractor;
pub mod formatting;
pub mod handlers;
pub mod heuristics;
mod locks;
pub mod matcher;
mod orchestrator;
pub mod pending;
pub mod salvage;
pub mod temporal;

// Public exports
pub use chat::ChatResponder;
pub use classifier::{Classifier, Intent};
pub use command::{CommandRequest, CommandResponse, ConfirmationAction, ConfirmationPayload, ResponseType};
pub use config::PipelineConfig;
pub use error::OrchestratorError;
pub use extractor::{Action, ExtractedParams, Extraction, Extractor, ExtractorOutcome};
pub use handlers::{ActionContext, ActionHandler, HandlerRegistry, Resolution};
pub use locks::ConversationLocks;
pub use orchestrator::{
    resolve_timezone, Orchestrator, ALREADY_HANDLED_TEXT, EXTRACTION_FAILED_TEXT, NEEDS_CONNECTION_TEXT,
};
pub use pending::{ActionKind, PendingAction};
