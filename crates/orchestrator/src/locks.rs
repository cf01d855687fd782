//! Per-conversation serialization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per conversation id.
///
/// Commands for the same conversation run one at a time; different
/// conversations never wait on each other.
#[derive(Debug, Default, Clone)]
pub struct ConversationLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`.
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
