//! Event reminders.
//!
//! Each tick lists every opted-in user's events starting within their lead
//! time and sends at most one reminder per (event, channel), recording every
//! attempt in the append-only ledger.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calendar::{CalendarConnector, CalendarEvent, PRIMARY_CALENDAR};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use database::{notification_preference, sent_notification, user, Channel, Database, NotificationPreference, NotificationStatus, User};
use futures::stream::{self, StreamExt};
use mailer::Email;
use tracing::{debug, info, warn};

use crate::channel::{Delivery, WhatsAppNotice};
use crate::config::NotifierConfig;
use crate::error::{with_timeout, NotifierError};
use crate::lease::HeldLease;
use crate::messages::{email_body, reminder_subject, start_label, template_body, MessageComposer, REMINDER_BODY_LIMIT, REMINDER_HEADER};
use crate::scheduler::PollJob;

/// Failed attempts after which an (event, channel) pair is given up.
pub const MAX_FAILURES: i64 = 3;

/// How long a snooze suppresses WhatsApp reminders for an event.
pub const SNOOZE_MINUTES: i64 = 10;

/// Why a channel was not attempted for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySent,
    TooManyFailures,
    Snoozed,
}

/// Counts for one tick or one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub users: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl AddAssign for DispatchReport {
    fn add_assign(&mut self, other: Self) {
        self.users += other.users;
        self.sent += other.sent;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// The user's zone, or UTC when unset or unknown.
pub fn user_timezone(pref: &NotificationPreference) -> Tz {
    pref.user_timezone.trim().parse().unwrap_or(Tz::UTC)
}

/// Renew the tick's lease, if any; true when work may continue.
pub(crate) async fn still_leading(lease: Option<&HeldLease<'_>>) -> bool {
    match lease {
        Some(lease) => lease.renew().await,
        None => true,
    }
}

/// Sends event reminders.
pub struct ReminderDispatcher {
    db: Database,
    connector: Arc<dyn CalendarConnector>,
    composer: MessageComposer,
    delivery: Delivery,
    concurrency: usize,
    call_timeout: Duration,
}

impl ReminderDispatcher {
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

    /// Process every user with a channel enabled.
    ///
    /// Users run concurrently up to the configured bound; one user's events
    /// and channels run in order.
    pub async fn run_once(&self, now: DateTime<Utc>) -> DispatchReport {
        self.run(now, None).await
    }

    /// Like [`run_once`](Self::run_once), renewing `lease` before each user
    /// and each event. Nothing more is sent once the lease is lost.
    pub async fn run_leased(&self, now: DateTime<Utc>, lease: &HeldLease<'_>) -> DispatchReport {
        self.run(now, Some(lease)).await
    }

    async fn run(&self, now: DateTime<Utc>, lease: Option<&HeldLease<'_>>) -> DispatchReport {
        let prefs = match notification_preference::list_with_channel_enabled(self.db.pool()).await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "REMINDER_TICK_FAILED");
                return DispatchReport::default();
            }
        };

        let reports: Vec<DispatchReport> = stream::iter(prefs)
            .map(|pref| self.process_user(pref, now, lease))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut total = DispatchReport::default();
        for report in reports {
            total += report;
        }
        if total.sent > 0 || total.failed > 0 {
            info!(
                users = total.users,
                sent = total.sent,
                failed = total.failed,
                skipped = total.skipped,
                "REMINDER_TICK"
            );
        }
        total
    }

    async fn process_user(
        &self,
        pref: NotificationPreference,
        now: DateTime<Utc>,
        lease: Option<&HeldLease<'_>>,
    ) -> DispatchReport {
        if !still_leading(lease).await {
            return DispatchReport::default();
        }
        let mut report = DispatchReport {
            users: 1,
            ..Default::default()
        };
        let user = match user::get_user(self.db.pool(), &pref.user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %pref.user_id, error = %e, "REMINDER_USER_LOOKUP_FAILED");
                return report;
            }
        };

        let events = match self.upcoming_events(&pref, now).await {
            Ok(events) => events,
            Err(NotifierError::Calendar(e)) if e.needs_connection() => {
                debug!(user_id = %pref.user_id, "REMINDERS_SKIPPED_NOT_CONNECTED");
                return report;
            }
            Err(e) => {
                warn!(user_id = %pref.user_id, error = %e, "REMINDER_EVENTS_FAILED");
                return report;
            }
        };

        let tz = user_timezone(&pref);
        for event in events.iter().filter(|e| !e.is_cancelled() && !e.id.is_empty()) {
            if !still_leading(lease).await {
                debug!(user_id = %pref.user_id, "REMINDERS_STOPPED_LEASE_LOST");
                break;
            }
            report += self.process_event(&pref, &user, event, tz, now).await;
        }
        report
    }

    async fn upcoming_events(&self, pref: &NotificationPreference, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>, NotifierError> {
        let provider = with_timeout("calendar connect", self.call_timeout, self.connector.connect(&pref.user_id)).await?;
        let lookahead = now + chrono::Duration::minutes(pref.reminder_lead_time.max(0));
        with_timeout(
            "calendar list",
            self.call_timeout,
            provider.list_events(PRIMARY_CALENDAR, now, lookahead, &[]),
        )
        .await
    }

    /// Channels to attempt for one event, with a skip count for the rest.
    async fn eligible_channels(
        &self,
        pref: &NotificationPreference,
        user: &User,
        event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Channel>, usize), NotifierError> {
        let mut channels = Vec::new();
        let mut skipped = 0;
        if pref.whatsapp_enabled && pref.whatsapp_number.is_some() {
            match self.skip_reason(&pref.user_id, event_id, Channel::Whatsapp, now).await? {
                Some(reason) => {
                    info!(user_id = %pref.user_id, event_id, channel = "whatsapp", reason = ?reason, "REMINDER_SKIPPED");
                    skipped += 1;
                }
                None => channels.push(Channel::Whatsapp),
            }
        }
        if pref.email_enabled && user.email.is_some() {
            match self.skip_reason(&pref.user_id, event_id, Channel::Email, now).await? {
                Some(reason) => {
                    info!(user_id = %pref.user_id, event_id, channel = "email", reason = ?reason, "REMINDER_SKIPPED");
                    skipped += 1;
                }
                None => channels.push(Channel::Email),
            }
        }
        Ok((channels, skipped))
    }

    /// Whether a channel must not be attempted for this event now.
    pub async fn skip_reason(
        &self,
        user_id: &str,
        event_id: &str,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Option<SkipReason>, NotifierError> {
        let pool = self.db.pool();
        if sent_notification::has_sent(pool, user_id, event_id, channel).await? {
            return Ok(Some(SkipReason::AlreadySent));
        }
        if sent_notification::failure_count(pool, user_id, event_id, channel).await? >= MAX_FAILURES {
            return Ok(Some(SkipReason::TooManyFailures));
        }
        if channel == Channel::Whatsapp {
            if let Some(snoozed_at) = sent_notification::latest_snooze(pool, user_id, event_id, channel).await? {
                if now < snoozed_at + chrono::Duration::minutes(SNOOZE_MINUTES) {
                    return Ok(Some(SkipReason::Snoozed));
                }
            }
        }
        Ok(None)
    }

    async fn process_event(
        &self,
        pref: &NotificationPreference,
        user: &User,
        event: &CalendarEvent,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let (channels, skipped) = match self.eligible_channels(pref, user, &event.id, now).await {
            Ok(result) => result,
            Err(e) => {
                warn!(user_id = %pref.user_id, event_id = %event.id, error = %e, "REMINDER_LEDGER_READ_FAILED");
                return report;
            }
        };
        report.skipped += skipped;
        if channels.is_empty() {
            return report;
        }

        let message = self
            .composer
            .reminder(&user.name, event.title(), &start_label(event, tz))
            .await;

        for channel in channels {
            let outcome = match channel {
                Channel::Whatsapp => {
                    let notice = WhatsAppNotice {
                        header: REMINDER_HEADER,
                        body: template_body(&message, REMINDER_BODY_LIMIT),
                        text: message.clone(),
                    };
                    let to = pref.whatsapp_number.as_deref().unwrap_or_default();
                    self.delivery.whatsapp(to, &notice).await.map(Some)
                }
                Channel::Email => {
                    let to = user.email.as_deref().unwrap_or_default();
                    let email = Email::new(to, reminder_subject(event.title()), email_body(&message));
                    self.delivery.email(&email).await.map(|()| None)
                }
            };

            let (status, message_id) = match outcome {
                Ok(message_id) => {
                    info!(user_id = %pref.user_id, event_id = %event.id, channel = channel.as_str(), "REMINDER_SENT");
                    report.sent += 1;
                    (NotificationStatus::Sent, message_id)
                }
                Err(e) => {
                    warn!(user_id = %pref.user_id, event_id = %event.id, channel = channel.as_str(), error = %e, "REMINDER_FAILED");
                    report.failed += 1;
                    (NotificationStatus::Failed, None)
                }
            };

            if let Err(e) = sent_notification::record_with_message_id(
                self.db.pool(),
                &pref.user_id,
                &event.id,
                channel,
                status,
                now,
                message_id.as_deref(),
            )
            .await
            {
                warn!(user_id = %pref.user_id, event_id = %event.id, error = %e, "REMINDER_LEDGER_WRITE_FAILED");
            }
        }
        report
    }
}

#[async_trait]
impl PollJob for ReminderDispatcher {
    fn name(&self) -> &'static str {
        "reminder_dispatch"
    }

    async fn tick(&self, now: DateTime<Utc>, lease: &HeldLease<'_>) {
        self.run_leased(now, lease).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingWhatsApp;
    use calendar::{EventTime, InMemoryCalendar, StaticConnector};
    use chrono::TimeZone;
    use mailer::{Mailer, RecordingTransport};
    use mock_brain::FailingModel;

    struct Fixture {
        db: Database,
        calendar: Arc<InMemoryCalendar>,
        whatsapp: Arc<RecordingWhatsApp>,
        email: Arc<RecordingTransport>,
        dispatcher: ReminderDispatcher,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 8, 50, 0).unwrap()
    }

    fn standup() -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        CalendarEvent {
            id: "standup".to_string(),
            summary: "Standup".to_string(),
            start: EventTime::timed(start.fixed_offset(), None),
            end: EventTime::timed((start + chrono::Duration::minutes(15)).fixed_offset(), None),
            recurrence: vec![],
            recurring_event_id: None,
            html_link: None,
            attendees: vec![],
            status: None,
        }
    }

    async fn fixture(whatsapp_enabled: bool, email_enabled: bool) -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let pool = db.pool();
        user::create_user(
            pool,
            &User {
                id: "u1".to_string(),
                name: "Ana".to_string(),
                email: Some("ana@example.com".to_string()),
            },
        )
        .await
        .unwrap();
        let mut pref = NotificationPreference::defaults_for("u1");
        pref.whatsapp_enabled = whatsapp_enabled;
        pref.whatsapp_number = Some("+15551234567".to_string());
        pref.email_enabled = email_enabled;
        notification_preference::upsert_preference(pool, &pref).await.unwrap();

        let calendar = Arc::new(InMemoryCalendar::new());
        calendar.insert(standup()).await;
        let connector = StaticConnector::new();
        connector.insert("u1", calendar.clone()).await;

        let whatsapp = Arc::new(RecordingWhatsApp::new());
        let email = Arc::new(RecordingTransport::new("primary"));
        let config = NotifierConfig::default();
        let delivery = Delivery::new(
            Some(whatsapp.clone()),
            Mailer::new(Some(email.clone()), None),
            config.call_timeout,
        );
        let composer = MessageComposer::new(Arc::new(FailingModel::unavailable()), config.call_timeout);
        let dispatcher = ReminderDispatcher::new(db.clone(), Arc::new(connector), composer, delivery, &config);

        Fixture {
            db,
            calendar,
            whatsapp,
            email,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_reminder_sent_once_per_channel() {
        let f = fixture(true, true).await;

        let first = f.dispatcher.run_once(now()).await;
        assert_eq!(first.sent, 2);
        let second = f.dispatcher.run_once(now() + chrono::Duration::minutes(1)).await;
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped, 2);

        let sent = f.whatsapp.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.header, "Event Reminder");
        assert_eq!(sent[0].1.text, "Hi Ana, reminder: your event 'Standup' is starting at 9:00 AM.");

        let emails = f.email.sent().await;
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "Reminder: Standup");
        assert!(emails[0].body.ends_with("\n\nBest,\nReminder Agent"));

        let ledger = sent_notification::list_for_user(f.db.pool(), "u1").await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.iter().all(|row| row.status == NotificationStatus::Sent));
        let whatsapp_row = ledger.iter().find(|r| r.channel == Channel::Whatsapp).unwrap();
        assert_eq!(whatsapp_row.provider_message_id.as_deref(), Some("SM1"));
    }

    #[tokio::test]
    async fn test_events_outside_lead_time_are_ignored() {
        let f = fixture(true, false).await;
        let report = f.dispatcher.run_once(now() - chrono::Duration::hours(2)).await;
        assert_eq!(report.sent, 0);
        assert_eq!(f.whatsapp.attempts(), 0);
    }

    #[tokio::test]
    async fn test_three_failures_stop_retries() {
        let f = fixture(true, false).await;
        f.whatsapp.set_failing(true);

        for minute in 0..3 {
            let report = f.dispatcher.run_once(now() + chrono::Duration::minutes(minute)).await;
            assert_eq!(report.failed, 1);
        }
        let fourth = f.dispatcher.run_once(now() + chrono::Duration::minutes(3)).await;
        assert_eq!(fourth.failed, 0);
        assert_eq!(fourth.skipped, 1);
        assert_eq!(f.whatsapp.attempts(), 3);

        let reason = f
            .dispatcher
            .skip_reason("u1", "standup", Channel::Whatsapp, now())
            .await
            .unwrap();
        assert_eq!(reason, Some(SkipReason::TooManyFailures));
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let f = fixture(true, true).await;
        f.whatsapp.set_failing(true);

        let report = f.dispatcher.run_once(now()).await;
        assert_eq!((report.sent, report.failed), (1, 1));

        f.whatsapp.set_failing(false);
        let retry = f.dispatcher.run_once(now() + chrono::Duration::minutes(1)).await;
        assert_eq!((retry.sent, retry.skipped), (1, 1));
        assert_eq!(f.email.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_snooze_suppresses_for_ten_minutes() {
        let f = fixture(true, false).await;
        f.dispatcher.run_once(now()).await;
        let snoozed_at = now() + chrono::Duration::minutes(1);
        sent_notification::snooze_latest_sent(f.db.pool(), "u1", snoozed_at).await.unwrap();

        let during = f.dispatcher.run_once(snoozed_at + chrono::Duration::minutes(5)).await;
        assert_eq!(during.skipped, 1);
        assert_eq!(f.whatsapp.attempts(), 1);

        let after = f.dispatcher.run_once(snoozed_at + chrono::Duration::minutes(SNOOZE_MINUTES)).await;
        assert_eq!(after.sent, 1);
        assert_eq!(f.whatsapp.attempts(), 2);
    }

    #[tokio::test]
    async fn test_calendar_failure_does_not_abort_tick() {
        let f = fixture(true, true).await;
        f.calendar.set_failing(true);
        let report = f.dispatcher.run_once(now()).await;
        assert_eq!(report, DispatchReport { users: 1, ..Default::default() });
        assert!(sent_notification::list_for_user(f.db.pool(), "u1").await.unwrap().is_empty());
    }

    /// Delivers, then lets another instance take the lease.
    struct TakeoverWhatsApp {
        db: Database,
        sends: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl crate::channel::WhatsAppSender for TakeoverWhatsApp {
        async fn send_notice(&self, _to: &str, _notice: &WhatsAppNotice) -> Result<String, NotifierError> {
            let n = self.sends.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            crate::lease::Leadership::new(self.db.clone(), "reminder_dispatch", "b", Duration::from_secs(180))
                .acquire(now() + chrono::Duration::minutes(10))
                .await;
            Ok(format!("SM{}", n))
        }
    }

    #[tokio::test]
    async fn test_lease_lost_mid_tick_stops_sending() {
        let db = Database::in_memory().await.unwrap();
        let connector = StaticConnector::new();
        for id in ["u1", "u2"] {
            user::create_user(
                db.pool(),
                &User {
                    id: id.to_string(),
                    name: id.to_string(),
                    email: None,
                },
            )
            .await
            .unwrap();
            let mut pref = NotificationPreference::defaults_for(id);
            pref.whatsapp_enabled = true;
            pref.whatsapp_number = Some(format!("+1555000000{}", &id[1..]));
            notification_preference::upsert_preference(db.pool(), &pref).await.unwrap();
            let calendar = Arc::new(InMemoryCalendar::new());
            calendar.insert(standup()).await;
            connector.insert(id, calendar).await;
        }

        let whatsapp = Arc::new(TakeoverWhatsApp {
            db: db.clone(),
            sends: Default::default(),
        });
        let config = NotifierConfig::default().with_concurrency(1);
        let delivery = Delivery::new(Some(whatsapp.clone()), Mailer::new(None, None), config.call_timeout);
        let composer = MessageComposer::new(Arc::new(FailingModel::unavailable()), config.call_timeout);
        let dispatcher = ReminderDispatcher::new(db.clone(), Arc::new(connector), composer, delivery, &config);

        let leadership = crate::lease::Leadership::new(db.clone(), "reminder_dispatch", "a", Duration::from_secs(180));
        assert!(leadership.acquire(now()).await);
        let lease = HeldLease::new(&leadership, now());
        let report = dispatcher.run_leased(now(), &lease).await;

        assert_eq!(report.sent, 1);
        assert!(lease.is_lost());
        assert_eq!(whatsapp.sends.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(sent_notification::list_for_user(db.pool(), "u2").await.unwrap().is_empty());
    }
}
