//! Email transport trait and a recording implementation.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::{Email, MailError};

/// A way of delivering an [`Email`].
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver one email.
    async fn send(&self, email: &Email) -> Result<(), MailError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Transport that stores emails in memory instead of sending them.
#[derive(Default)]
pub struct RecordingTransport {
    name: String,
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Emails delivered so far.
    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Send(format!("{} is failing", self.name)));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
