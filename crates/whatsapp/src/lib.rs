//! WhatsApp transport backed by Twilio.
//!
//! Sends template (Content API) and plain-text messages and parses the
//! inbound webhook form.

pub mod client;
pub mod config;
pub mod error;
pub mod signature;
pub mod types;

pub use client::{template_message, TwilioClient};
pub use config::TwilioConfig;
pub use error::WhatsAppError;
pub use signature::{compute_signature, validate_signature, SignatureValidation};
pub use types::{
    strip_whatsapp_prefix, whatsapp_address, InboundCommand, InboundMessage, OutboundMessage, SendResult,
};
