//! Notification dispatch for the calendar assistant.
//!
//! Two background jobs run on a fixed poll interval, each only while this
//! process holds its leadership lease:
//!
//! - [`ReminderDispatcher`] sends one reminder per (event, channel) within
//!   the user's lead time, deduplicated through the ledger, capped at three
//!   failures and suppressed for ten minutes after a snooze.
//! - [`BriefingScheduler`] sends a daily summary within five minutes after
//!   the user's local briefing time, at most once per local day.
//!
//! [`handle_inbound`] applies the `OFF` and `SNOOZE` replies received on the
//! WhatsApp webhook.

pub mod briefing;
pub mod channel;
pub mod config;
pub mod dispatch;
mod error;
pub mod inbound;
pub mod lease;
pub mod messages;
pub mod scheduler;

pub use briefing::{BriefingOutcome, BriefingScheduler};
pub use channel::{Delivery, RecordingWhatsApp, WhatsAppNotice, WhatsAppSender};
pub use config::NotifierConfig;
pub use dispatch::{DispatchReport, ReminderDispatcher, SkipReason};
pub use error::{with_timeout, NotifierError};
pub use inbound::{handle_inbound, InboundOutcome};
pub use lease::{HeldLease, Leadership};
pub use messages::MessageComposer;
pub use scheduler::{spawn_pollers, PollJob, Poller};
