//! Background poll loops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::NotifierConfig;
use crate::lease::{HeldLease, Leadership};

/// Work run on every tick while the lease is held.
#[async_trait]
pub trait PollJob: Send + Sync {
    /// Lease name; one holder per name process-wide.
    fn name(&self) -> &'static str;

    /// Run once. Must not fail: errors are logged by the job.
    ///
    /// Long ticks renew `lease` between units of work and stop when it is
    /// lost.
    async fn tick(&self, now: DateTime<Utc>, lease: &HeldLease<'_>);
}

/// Runs a job on a fixed interval, only while holding its lease.
pub struct Poller {
    job: Arc<dyn PollJob>,
    leadership: Leadership,
    poll_interval: Duration,
}

impl Poller {
    pub fn new(job: Arc<dyn PollJob>, leadership: Leadership, poll_interval: Duration) -> Self {
        Self {
            job,
            leadership,
            poll_interval,
        }
    }

    /// One tick: renew the lease and run the job if it is held.
    ///
    /// Returns whether the lease was still held when the job finished.
    pub async fn tick_once(&self, now: DateTime<Utc>) -> bool {
        if !self.leadership.acquire(now).await {
            debug!(job = self.job.name(), "POLL_SKIPPED_NOT_LEADER");
            return false;
        }
        let lease = HeldLease::new(&self.leadership, now);
        self.job.tick(now, &lease).await;
        !lease.is_lost()
    }

    /// Poll forever.
    pub async fn run(self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(job = self.job.name(), interval = ?self.poll_interval, "Starting poller");

        loop {
            ticker.tick().await;
            self.tick_once(Utc::now()).await;
        }
    }

    /// Run on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Spawn one leased poller per job.
pub fn spawn_pollers(db: &database::Database, jobs: Vec<Arc<dyn PollJob>>, config: &NotifierConfig) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|job| {
            let leadership = Leadership::new(db.clone(), job.name(), config.instance_id.clone(), config.lease_ttl);
            Poller::new(job, leadership, config.poll_interval).spawn()
        })
        .collect()
}
