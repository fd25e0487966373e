//! Per-competition async mutexes.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use wodsmith_core::CompetitionId;

/// Map of competition ids to async mutexes.
///
/// Serializes division ownership changes of one competition within a
/// process. Other processes are fenced by the conditional repoint.
#[derive(Debug, Default)]
pub struct CompetitionLocks {
    locks: DashMap<CompetitionId, Arc<Mutex<()>>>,
}

impl CompetitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock of one competition until the guard drops.
    pub async fn acquire(&self, competition_id: CompetitionId) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(competition_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
