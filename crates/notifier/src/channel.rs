//! Delivery channels: WhatsApp and email.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailer::{Email, Mailer};
use tokio::sync::Mutex;
use tracing::debug;
use whatsapp::TwilioClient;

use crate::error::{with_timeout, NotifierError};

/// One WhatsApp notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppNotice {
    /// Template header variable.
    pub header: &'static str,
    /// Template body variable, flattened and truncated.
    pub body: String,
    /// Plain text sent when the template cannot be used.
    pub text: String,
}

/// Sends WhatsApp notifications.
#[async_trait]
pub trait WhatsAppSender: Send + Sync {
    /// Deliver a notice; returns the transport's message id.
    async fn send_notice(&self, to: &str, notice: &WhatsAppNotice) -> Result<String, NotifierError>;
}

#[async_trait]
impl WhatsAppSender for TwilioClient {
    async fn send_notice(&self, to: &str, notice: &WhatsAppNotice) -> Result<String, NotifierError> {
        let result = self
            .send_preferred(to, notice.header, &notice.body, &notice.text)
            .await?;
        Ok(result.sid)
    }
}

/// Sender that keeps notices in memory.
#[derive(Default)]
pub struct RecordingWhatsApp {
    sent: Mutex<Vec<(String, WhatsAppNotice)>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingWhatsApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Notices delivered so far, with their recipients.
    pub async fn sent(&self) -> Vec<(String, WhatsAppNotice)> {
        self.sent.lock().await.clone()
    }

    /// Sends attempted, including failures.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WhatsAppSender for RecordingWhatsApp {
    async fn send_notice(&self, to: &str, notice: &WhatsAppNotice) -> Result<String, NotifierError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifierError::NotConfigured("recording whatsapp"));
        }
        self.sent.lock().await.push((to.to_string(), notice.clone()));
        Ok(format!("SM{}", attempt))
    }
}

/// Both channels, each call bounded by a timeout.
#[derive(Clone)]
pub struct Delivery {
    whatsapp: Option<Arc<dyn WhatsAppSender>>,
    mailer: Mailer,
    timeout: Duration,
}

impl Delivery {
    pub fn new(whatsapp: Option<Arc<dyn WhatsAppSender>>, mailer: Mailer, timeout: Duration) -> Self {
        Self {
            whatsapp,
            mailer,
            timeout,
        }
    }

    /// Send a WhatsApp notice; returns the message id.
    pub async fn whatsapp(&self, to: &str, notice: &WhatsAppNotice) -> Result<String, NotifierError> {
        let sender = self.whatsapp.as_ref().ok_or(NotifierError::NotConfigured("whatsapp"))?;
        debug!(to = %to, header = notice.header, "Sending WhatsApp notice");
        with_timeout("whatsapp send", self.timeout, sender.send_notice(to, notice)).await
    }

    /// Send an email through the primary/secondary transports.
    pub async fn email(&self, email: &Email) -> Result<(), NotifierError> {
        debug!(to = %email.to, subject = %email.subject, "Sending email");
        with_timeout("email send", self.timeout, self.mailer.send(email)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailer::RecordingTransport;

    fn notice() -> WhatsAppNotice {
        WhatsAppNotice {
            header: "Event Reminder",
            body: "Standup at 9".to_string(),
            text: "Standup at 9".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_whatsapp_transport() {
        let delivery = Delivery::new(None, Mailer::default(), Duration::from_secs(1));
        assert!(matches!(
            delivery.whatsapp("+15551234567", &notice()).await,
            Err(NotifierError::NotConfigured("whatsapp"))
        ));
    }

    #[tokio::test]
    async fn test_delivers_on_both_channels() {
        let whatsapp = Arc::new(RecordingWhatsApp::new());
        let transport = Arc::new(RecordingTransport::new("primary"));
        let delivery = Delivery::new(
            Some(whatsapp.clone()),
            Mailer::new(Some(transport.clone()), None),
            Duration::from_secs(1),
        );

        let sid = delivery.whatsapp("+15551234567", &notice()).await.unwrap();
        assert_eq!(sid, "SM1");
        delivery
            .email(&Email::new("ana@example.com", "Reminder: Standup", "body"))
            .await
            .unwrap();

        assert_eq!(whatsapp.sent().await[0].0, "+15551234567");
        assert_eq!(transport.sent().await.len(), 1);
    }
}
