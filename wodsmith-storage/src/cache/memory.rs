//! Process-local tiers: the memory tier and an in-memory edge store.
//!
//! Both use `tokio::time::Instant`, so expiry follows the runtime clock and
//! can be driven with paused time in tests.

use super::entry::CacheEntry;
use super::traits::{EdgeError, EdgeStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Slot<T> {
    entry: CacheEntry<T>,
    expires_at: Instant,
}

/// TTL-bounded map of cache entries owned by one process.
#[derive(Debug)]
pub struct MemoryTier<T> {
    entries: DashMap<String, Slot<T>>,
    ttl: Duration,
}

impl<T: Clone> MemoryTier<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry. Expired entries are removed on access.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|slot| {
            if slot.expires_at > now {
                Some(slot.entry.clone())
            } else {
                None
            }
        })?;
        if hit.is_none() {
            self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        }
        hit
    }

    pub fn insert(&self, entry: CacheEntry<T>) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .insert(entry.key.clone(), Slot { entry, expires_at });
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

/// TTL-honouring [`EdgeStore`] kept in process memory.
///
/// Suitable for single-node deployments and tests. Supports prefix deletes.
#[derive(Debug, Default)]
pub struct InMemoryEdgeStore {
    values: DashMap<String, (Vec<u8>, Instant)>,
}

impl InMemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.values.iter().filter(|v| v.value().1 > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.values.get(key).is_some_and(|v| v.value().1 > now)
    }
}

#[async_trait]
impl EdgeStore for InMemoryEdgeStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EdgeError> {
        let now = Instant::now();
        let value = self
            .values
            .get(key)
            .and_then(|v| (v.value().1 > now).then(|| v.value().0.clone()));
        if value.is_none() {
            self.values.remove_if(key, |_, v| v.1 <= now);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), EdgeError> {
        self.values
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), EdgeError> {
        self.values.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, EdgeError> {
        let before = self.values.len();
        self.values.retain(|k, _| !k.starts_with(prefix));
        Ok(before.saturating_sub(self.values.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::TtlClass;

    #[tokio::test(start_paused = true)]
    async fn test_memory_tier_expires_after_ttl() {
        let tier = MemoryTier::new(Duration::from_secs(300));
        tier.insert(CacheEntry::new("k", 7u32, TtlClass::Memory));
        assert_eq!(tier.get("k").map(|e| e.payload), Some(7));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(tier.get("k").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(tier.get("k").is_none());
        assert!(tier.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let tier = MemoryTier::new(Duration::from_secs(10));
        tier.insert(CacheEntry::new("a", 1u8, TtlClass::Memory));
        tokio::time::advance(Duration::from_secs(11)).await;
        tier.insert(CacheEntry::new("b", 2u8, TtlClass::Memory));
        assert_eq!(tier.purge_expired(), 1);
        assert_eq!(tier.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_store_honours_ttl() {
        let store = InMemoryEdgeStore::new();
        store
            .put("scaling:group:1", vec![1], Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(store.get("scaling:group:1").await.unwrap(), Some(vec![1]));

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(store.get("scaling:group:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_edge_store_delete_prefix() {
        let store = InMemoryEdgeStore::new();
        let ttl = Duration::from_secs(60);
        store.put("scaling:group:1", vec![1], ttl).await.unwrap();
        store.put("scaling:group:2", vec![2], ttl).await.unwrap();
        store.put("sessions:abc", vec![3], ttl).await.unwrap();

        assert_eq!(store.delete_prefix("scaling:").await.unwrap(), 2);
        assert!(store.contains_key("sessions:abc"));
        assert_eq!(store.len(), 1);
    }
}
