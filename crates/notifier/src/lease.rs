//! Leadership for singleton loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use database::{lease, Database};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A named lease held by one process at a time.
///
/// Every tick renews it; another process can take over only after it
/// expires.
#[derive(Clone)]
pub struct Leadership {
    db: Database,
    name: String,
    holder: String,
    ttl: Duration,
}

impl Leadership {
    pub fn new(db: Database, name: impl Into<String>, holder: impl Into<String>, ttl: Duration) -> Self {
        Self {
            db,
            name: name.into(),
            holder: holder.into(),
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire or renew the lease. Database errors count as not leading.
    pub async fn acquire(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX / 2);
        match lease::try_acquire(self.db.pool(), &self.name, &self.holder, now.timestamp(), ttl).await {
            Ok(true) => {
                debug!(lease = %self.name, holder = %self.holder, "LEASE_HELD");
                true
            }
            Ok(false) => {
                debug!(lease = %self.name, holder = %self.holder, "LEASE_HELD_ELSEWHERE");
                false
            }
            Err(e) => {
                warn!(lease = %self.name, error = %e, "LEASE_ACQUIRE_FAILED");
                false
            }
        }
    }

    /// Give the lease up so another process can take over at once.
    pub async fn release(&self) {
        match lease::release(self.db.pool(), &self.name, &self.holder).await {
            Ok(true) => info!(lease = %self.name, holder = %self.holder, "LEASE_RELEASED"),
            Ok(false) => {}
            Err(e) => warn!(lease = %self.name, error = %e, "LEASE_RELEASE_FAILED"),
        }
    }
}

/// The lease as seen from inside one tick.
///
/// Jobs renew it between units of work and stop once it is gone. Renewal
/// times are the tick's start plus the time elapsed since.
pub struct HeldLease<'a> {
    leadership: &'a Leadership,
    started_at: DateTime<Utc>,
    clock: Instant,
    lost: AtomicBool,
}

impl<'a> HeldLease<'a> {
    pub fn new(leadership: &'a Leadership, started_at: DateTime<Utc>) -> Self {
        Self {
            leadership,
            started_at,
            clock: Instant::now(),
            lost: AtomicBool::new(false),
        }
    }

    /// Renew the lease. Once lost it stays lost for the rest of the tick.
    pub async fn renew(&self) -> bool {
        if self.lost.load(Ordering::SeqCst) {
            return false;
        }
        let elapsed = chrono::Duration::from_std(self.clock.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        if self.leadership.acquire(self.started_at + elapsed).await {
            return true;
        }
        if !self.lost.swap(true, Ordering::SeqCst) {
            warn!(lease = %self.leadership.name, holder = %self.leadership.holder, "LEASE_LOST_MID_TICK");
        }
        false
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_single_holder_until_expiry() {
        let db = Database::in_memory().await.unwrap();
        let ttl = Duration::from_secs(180);
        let a = Leadership::new(db.clone(), "reminder_dispatch", "a", ttl);
        let b = Leadership::new(db.clone(), "reminder_dispatch", "b", ttl);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();

        assert!(a.acquire(t0).await);
        assert!(!b.acquire(t0 + chrono::Duration::seconds(60)).await);
        assert!(a.acquire(t0 + chrono::Duration::seconds(60)).await);
        assert!(b.acquire(t0 + chrono::Duration::seconds(241)).await);
        assert!(!a.acquire(t0 + chrono::Duration::seconds(242)).await);
    }

    #[tokio::test]
    async fn test_release_hands_over() {
        let db = Database::in_memory().await.unwrap();
        let ttl = Duration::from_secs(180);
        let a = Leadership::new(db.clone(), "morning_briefing", "a", ttl);
        let b = Leadership::new(db.clone(), "morning_briefing", "b", ttl);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();

        assert!(a.acquire(t0).await);
        a.release().await;
        assert!(b.acquire(t0).await);
    }

    #[tokio::test]
    async fn test_held_lease_stays_lost() {
        let db = Database::in_memory().await.unwrap();
        let ttl = Duration::from_secs(180);
        let a = Leadership::new(db.clone(), "reminder_dispatch", "a", ttl);
        let b = Leadership::new(db.clone(), "reminder_dispatch", "b", ttl);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();

        assert!(a.acquire(t0).await);
        let held = HeldLease::new(&a, t0);
        assert!(held.renew().await);

        assert!(b.acquire(t0 + chrono::Duration::seconds(600)).await);
        assert!(!held.renew().await);
        assert!(held.is_lost());
        b.release().await;
        assert!(!held.renew().await);
    }
}
