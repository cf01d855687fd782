//! Morning briefings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calendar::{local_midnight, CalendarConnector, CalendarEvent, PRIMARY_CALENDAR};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use database::{cache, notification_preference, user, Database, NotificationPreference, User};
use futures::stream::{self, StreamExt};
use mailer::Email;
use tracing::{debug, info, warn};

use crate::channel::{Delivery, WhatsAppNotice};
use crate::config::NotifierConfig;
use crate::dispatch::{still_leading, user_timezone};
use crate::error::{with_timeout, NotifierError};
use crate::lease::HeldLease;
use crate::messages::{briefing_subject, email_body, template_body, MessageComposer, BRIEFING_BODY_LIMIT, BRIEFING_HEADER};
use crate::scheduler::PollJob;

/// Minutes after the configured time during which a briefing may fire.
pub const FIRE_WINDOW_MINUTES: i64 = 5;

/// Lifetime of the sent marker.
pub const SENT_MARKER_SECS: i64 = 86_400;

/// Cache key marking a user's briefing as sent for a local date.
pub fn cache_key(user_id: &str, date: NaiveDate) -> String {
    format!("morning_briefing_{}_{}", user_id, date.format("%Y-%m-%d"))
}

const MINUTES_PER_DAY: i64 = 24 * 60;

/// The local date to brief for, when `now` falls in the firing window.
///
/// The window may run past midnight; the date is always the day the
/// configured time fell on.
pub fn due_date(pref: &NotificationPreference, now: DateTime<Utc>) -> Option<NaiveDate> {
    let target = NaiveTime::parse_from_str(pref.morning_briefing_time.trim(), "%H:%M").ok()?;
    let local = now.with_timezone(&user_timezone(pref));
    let current_minutes = i64::from(local.hour() * 60 + local.minute());
    let target_minutes = i64::from(target.hour() * 60 + target.minute());
    let diff = (current_minutes - target_minutes).rem_euclid(MINUTES_PER_DAY);
    (diff < FIRE_WINDOW_MINUTES).then(|| (local - chrono::Duration::minutes(diff)).date_naive())
}

/// What happened to one user's briefing in a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefingOutcome {
    NotDue,
    AlreadySent,
    NoChannel,
    Sent,
    Failed,
    /// Another instance took over the loop.
    LeaseLost,
}

/// Sends daily briefings.
pub struct BriefingScheduler {
    db: Database,
    connector: Arc<dyn CalendarConnector>,
    composer: MessageComposer,
    delivery: Delivery,
    concurrency: usize,
    call_timeout: Duration,
}

impl BriefingScheduler {
    pub fn new(
        db: Database,
        connector: Arc<dyn CalendarConnector>,
        composer: MessageComposer,
        delivery: Delivery,
        config: &NotifierConfig,
    ) -> Self {
        Self {
            db,
            connector,
            composer,
            delivery,
            concurrency: config.concurrency.max(1),
            call_timeout: config.call_timeout,
        }
    }

    /// Evaluate every user with briefings enabled.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Vec<(String, BriefingOutcome)> {
        self.run(now, None).await
    }

    /// Like [`run_once`](Self::run_once), renewing `lease` before each user
    /// and before delivery.
    pub async fn run_leased(&self, now: DateTime<Utc>, lease: &HeldLease<'_>) -> Vec<(String, BriefingOutcome)> {
        self.run(now, Some(lease)).await
    }

    async fn run(&self, now: DateTime<Utc>, lease: Option<&HeldLease<'_>>) -> Vec<(String, BriefingOutcome)> {
        match cache::purge_expired(self.db.pool(), now.timestamp()).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "BRIEFING_MARKERS_PURGED"),
            Err(e) => warn!(error = %e, "BRIEFING_MARKER_PURGE_FAILED"),
        }
        let prefs = match notification_preference::list_briefing_enabled(self.db.pool()).await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "BRIEFING_TICK_FAILED");
                return Vec::new();
            }
        };

        stream::iter(prefs)
            .map(|pref| async move {
                let outcome = if still_leading(lease).await {
                    self.process_user(&pref, now, lease).await
                } else {
                    BriefingOutcome::LeaseLost
                };
                (pref.user_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn process_user(
        &self,
        pref: &NotificationPreference,
        now: DateTime<Utc>,
        lease: Option<&HeldLease<'_>>,
    ) -> BriefingOutcome {
        let Some(date) = due_date(pref, now) else {
            return BriefingOutcome::NotDue;
        };
        let key = cache_key(&pref.user_id, date);
        match cache::get(self.db.pool(), &key, now.timestamp()).await {
            Ok(Some(_)) => {
                debug!(user_id = %pref.user_id, date = %date, "BRIEFING_ALREADY_SENT");
                return BriefingOutcome::AlreadySent;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(user_id = %pref.user_id, error = %e, "BRIEFING_MARKER_READ_FAILED");
                return BriefingOutcome::Failed;
            }
        }

        let user = match user::get_user(self.db.pool(), &pref.user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %pref.user_id, error = %e, "BRIEFING_USER_LOOKUP_FAILED");
                return BriefingOutcome::Failed;
            }
        };
        let wants_whatsapp = pref.whatsapp_enabled && pref.whatsapp_number.is_some();
        let wants_email = pref.email_enabled && user.email.is_some();
        if !wants_whatsapp && !wants_email {
            debug!(user_id = %pref.user_id, "BRIEFING_NO_CHANNEL");
            return BriefingOutcome::NoChannel;
        }

        let events = match self.day_events(pref, date).await {
            Ok(events) => events,
            Err(e) => {
                warn!(user_id = %pref.user_id, error = %e, "BRIEFING_EVENTS_FAILED");
                return BriefingOutcome::Failed;
            }
        };
        let message = self.composer.briefing(&user.name, &events, user_timezone(pref)).await;
        if !still_leading(lease).await {
            return BriefingOutcome::LeaseLost;
        }

        let delivered = self.deliver(pref, &user, date, &message, wants_whatsapp, wants_email).await;
        if delivered == 0 {
            warn!(user_id = %pref.user_id, date = %date, "BRIEFING_FAILED");
            return BriefingOutcome::Failed;
        }

        if let Err(e) = cache::set(self.db.pool(), &key, "sent", now.timestamp() + SENT_MARKER_SECS).await {
            warn!(user_id = %pref.user_id, error = %e, "BRIEFING_MARKER_WRITE_FAILED");
        }
        info!(user_id = %pref.user_id, date = %date, events = events.len(), channels = delivered, "BRIEFING_SENT");
        BriefingOutcome::Sent
    }

    async fn day_events(&self, pref: &NotificationPreference, date: NaiveDate) -> Result<Vec<CalendarEvent>, NotifierError> {
        let tz = user_timezone(pref);
        let start = local_midnight(date, tz);
        let end = date.succ_opt().map(|next| local_midnight(next, tz)).unwrap_or(start + chrono::Duration::days(1));
        let provider = with_timeout("calendar connect", self.call_timeout, self.connector.connect(&pref.user_id)).await?;
        let mut events = with_timeout(
            "calendar list",
            self.call_timeout,
            provider.list_events(PRIMARY_CALENDAR, start, end, &[]),
        )
        .await?;
        events.retain(|e| !e.is_cancelled());
        events.sort_by_key(|e| e.start.sort_key());
        Ok(events)
    }

    /// Send on each wanted channel; returns how many succeeded.
    async fn deliver(
        &self,
        pref: &NotificationPreference,
        user: &User,
        date: NaiveDate,
        message: &str,
        wants_whatsapp: bool,
        wants_email: bool,
    ) -> usize {
        let mut delivered = 0;
        if wants_whatsapp {
            let notice = WhatsAppNotice {
                header: BRIEFING_HEADER,
                body: template_body(message, BRIEFING_BODY_LIMIT),
                text: message.to_string(),
            };
            let to = pref.whatsapp_number.as_deref().unwrap_or_default();
            match self.delivery.whatsapp(to, &notice).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!(user_id = %pref.user_id, error = %e, "BRIEFING_WHATSAPP_FAILED"),
            }
        }
        if wants_email {
            let to = user.email.as_deref().unwrap_or_default();
            let email = Email::new(to, briefing_subject(date), email_body(message));
            match self.delivery.email(&email).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(user_id = %pref.user_id, error = %e, "BRIEFING_EMAIL_FAILED"),
            }
        }
        delivered
    }
}

#[async_trait]
impl PollJob for BriefingScheduler {
    fn name(&self) -> &'static str {
        "morning_briefing"
    }

    async fn tick(&self, now: DateTime<Utc>, lease: &HeldLease<'_>) {
        self.run_leased(now, lease).await;
    }
}
