//! Primary/secondary email delivery.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::smtp::{SmtpConfig, SmtpTransport};
use crate::zeptomail::{ZeptoMailConfig, ZeptoMailTransport};
use crate::{Email, EmailTransport, MailError};

/// Delivers through a primary transport, falling back to a secondary one.
#[derive(Clone, Default)]
pub struct Mailer {
    primary: Option<Arc<dyn EmailTransport>>,
    secondary: Option<Arc<dyn EmailTransport>>,
}

impl Mailer {
    pub fn new(
        primary: Option<Arc<dyn EmailTransport>>,
        secondary: Option<Arc<dyn EmailTransport>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// ZeptoMail as primary and SMTP as secondary, each only if configured.
    pub fn from_env() -> Self {
        let primary = match ZeptoMailConfig::from_env().and_then(ZeptoMailTransport::new) {
            Ok(t) => Some(Arc::new(t) as Arc<dyn EmailTransport>),
            Err(e) => {
                debug!(error = %e, "ZeptoMail not configured");
                None
            }
        };
        let secondary = match SmtpConfig::from_env().and_then(SmtpTransport::new) {
            Ok(t) => Some(Arc::new(t) as Arc<dyn EmailTransport>),
            Err(e) => {
                debug!(error = %e, "SMTP not configured");
                None
            }
        };
        Self { primary, secondary }
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// Send, trying the secondary transport when the primary is missing or fails.
    pub async fn send(&self, email: &Email) -> Result<(), MailError> {
        if let Some(primary) = &self.primary {
            match primary.send(email).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(transport = primary.name(), to = %email.to, error = %e, "EMAIL_PRIMARY_FAILED");
                    if self.secondary.is_none() {
                        return Err(e);
                    }
                }
            }
        }

        match &self.secondary {
            Some(secondary) => secondary.send(email).await,
            None => Err(MailError::NotConfigured),
        }
    }
}
