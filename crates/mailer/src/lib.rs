//! Email delivery for notifications.
//!
//! [`Mailer`] sends through ZeptoMail's HTTPS API when configured and
//! falls back to SMTP (lettre) when ZeptoMail is missing or fails.

mod error;
mod mailer;
pub mod smtp;
mod transport;
mod types;
pub mod zeptomail;

pub use error::MailError;
pub use mailer::Mailer;
pub use smtp::{SmtpConfig, SmtpTransport};
pub use transport::{EmailTransport, RecordingTransport};
pub use types::Email;
pub use zeptomail::{ZeptoMailConfig, ZeptoMailTransport};
