//! Two-tier read-through cache for scaling groups.
//!
//! Lookup order is memory, then edge, then the repository. An edge hit
//! repopulates memory; a full miss writes both tiers. The global default
//! group is pinned in memory and refreshed once its refresh interval has
//! elapsed.
//!
//! The edge tier is best effort. Its failures are logged and degrade to
//! misses; only repository errors on a full miss reach the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::RwLock;
use tokio::time::Instant;
use wodsmith_core::{GroupId, ScalingConfig, ScalingGroup, Timestamp, WodsmithResult};

use super::entry::{
    decode_entry, encode_entry, CacheEntry, CacheRead, CacheSource, CachedGroup, TtlClass,
};
use super::key::CacheKey;
use super::memory::MemoryTier;
use super::traits::{CacheStats, EdgeError, EdgeStore};
use crate::ScalingRepository;

#[derive(Debug, Clone)]
struct PinnedDefault {
    value: Option<CachedGroup>,
    written_at: Timestamp,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    edge_hits: AtomicU64,
    pinned_hits: AtomicU64,
    misses: AtomicU64,
    edge_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.memory_hits,
            &self.edge_hits,
            &self.pinned_hits,
            &self.misses,
            &self.edge_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Memory + edge cache of scaling groups with their levels.
///
/// Construct one per process and inject it wherever groups are read.
pub struct TieredCache {
    repo: Arc<dyn ScalingRepository>,
    edge: Arc<dyn EdgeStore>,
    memory: MemoryTier<CachedGroup>,
    pinned: RwLock<Option<PinnedDefault>>,
    /// Edge keys written by this process, for stores without prefix deletes.
    written_keys: DashSet<String>,
    /// Bumped by `invalidate_group`; a load that saw an older value is not stored.
    generations: DashMap<GroupId, u64>,
    /// Bumped by `invalidate_all`.
    epoch: AtomicU64,
    counters: Counters,
    config: ScalingConfig,
}

impl TieredCache {
    pub fn new(
        repo: Arc<dyn ScalingRepository>,
        edge: Arc<dyn EdgeStore>,
        config: ScalingConfig,
    ) -> Self {
        Self {
            repo,
            edge,
            memory: MemoryTier::new(config.memory_ttl),
            pinned: RwLock::new(None),
            written_keys: DashSet::new(),
            generations: DashMap::new(),
            epoch: AtomicU64::new(0),
            counters: Counters::default(),
            config,
        }
    }

    pub fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Validate the configuration and pin the global default.
    pub async fn init(&self) -> WodsmithResult<()> {
        self.config.validate()?;
        self.refresh_global_default().await?;
        tracing::info!(
            namespace = %self.config.edge_namespace,
            memory_ttl_secs = self.config.memory_ttl.as_secs(),
            edge_ttl_secs = self.config.edge_ttl.as_secs(),
            "Scaling cache initialized"
        );
        Ok(())
    }

    /// Drop every entry and reset statistics.
    pub async fn clear(&self) {
        self.invalidate_all().await;
        self.counters.reset();
    }

    /// Snapshot of hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            edge_hits: self.counters.edge_hits.load(Ordering::Relaxed),
            pinned_hits: self.counters.pinned_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            edge_errors: self.counters.edge_errors.load(Ordering::Relaxed),
            memory_entries: self.memory.len() as u64,
        }
    }

    fn group_key(&self, group_id: GroupId) -> CacheKey {
        CacheKey::group(&self.config.edge_namespace, group_id)
    }

    fn generation(&self, group_id: GroupId) -> (u64, u64) {
        let group = self.generations.get(&group_id).map_or(0, |g| *g);
        (self.epoch.load(Ordering::SeqCst), group)
    }

    /// Read a group with its levels, `None` when the repository has no such group.
    pub async fn get_group(&self, group_id: GroupId) -> WodsmithResult<Option<CachedGroup>> {
        Ok(self.read_group(group_id).await?.map(CacheRead::into_value))
    }

    /// Like [`get_group`](Self::get_group), reporting which tier served the read.
    pub async fn read_group(
        &self,
        group_id: GroupId,
    ) -> WodsmithResult<Option<CacheRead<CachedGroup>>> {
        let key = self.group_key(group_id).encode();

        if let Some(entry) = self.memory.get(&key) {
            Counters::bump(&self.counters.memory_hits);
            tracing::debug!(key = %key, "Scaling cache memory hit");
            return Ok(Some(CacheRead::from_cache(
                entry.payload,
                CacheSource::Memory,
                entry.written_at,
            )));
        }

        if let Some(entry) = self.edge_lookup(&key).await {
            Counters::bump(&self.counters.edge_hits);
            tracing::debug!(key = %key, "Scaling cache edge hit");
            let read =
                CacheRead::from_cache(entry.payload.clone(), CacheSource::Edge, entry.written_at);
            self.memory.insert(CacheEntry {
                ttl_class: TtlClass::Memory,
                ..entry
            });
            return Ok(Some(read));
        }

        Counters::bump(&self.counters.misses);
        tracing::debug!(key = %key, "Scaling cache miss");
        let generation = self.generation(group_id);
        let Some(group) = self.load_group(group_id).await? else {
            return Ok(None);
        };

        // An invalidation during the load means the rows may predate a write.
        if self.generation(group_id) != generation {
            tracing::debug!(key = %key, "Group invalidated during load, not caching");
            return Ok(Some(CacheRead::from_repository(group)));
        }
        self.store(&key, group.clone()).await;
        if self.generation(group_id) != generation {
            self.evict(&key).await;
        }
        Ok(Some(CacheRead::from_repository(group)))
    }

    /// The system-wide default group, served from the pinned entry while it
    /// is younger than the refresh interval.
    ///
    /// A failed refresh keeps serving the previously pinned value.
    pub async fn get_global_default(&self) -> WodsmithResult<Option<CachedGroup>> {
        {
            let pinned = self.pinned.read().await;
            if let Some(pinned) = pinned.as_ref() {
                if pinned.fetched_at.elapsed() < self.config.global_default_refresh {
                    Counters::bump(&self.counters.pinned_hits);
                    return Ok(pinned.value.clone());
                }
            }
        }

        match self.refresh_global_default().await {
            Ok(value) => Ok(value),
            Err(e) => {
                let pinned = self.pinned.read().await;
                match pinned.as_ref() {
                    Some(stale) => {
                        tracing::warn!(
                            error = %e,
                            written_at = %stale.written_at,
                            "Global default refresh failed, serving pinned copy"
                        );
                        Counters::bump(&self.counters.pinned_hits);
                        Ok(stale.value.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn refresh_global_default(&self) -> WodsmithResult<Option<CachedGroup>> {
        Counters::bump(&self.counters.misses);
        let value = match self.repo.group_global_default().await? {
            Some(group) => Some(self.with_levels(group).await?),
            None => None,
        };
        let entry = CacheEntry::new(
            CacheKey::global_default(&self.config.edge_namespace).encode(),
            value.clone(),
            TtlClass::Pinned,
        );
        *self.pinned.write().await = Some(PinnedDefault {
            value: entry.payload,
            written_at: entry.written_at,
            fetched_at: Instant::now(),
        });
        tracing::debug!(
            group_id = ?value.as_ref().map(|g| g.group.group_id),
            "Pinned global default refreshed"
        );
        Ok(value)
    }

    /// Drop one group from both tiers (and the pinned slot if it holds it).
    pub async fn invalidate_group(&self, group_id: GroupId) {
        *self.generations.entry(group_id).or_insert(0) += 1;
        let key = self.group_key(group_id).encode();

        {
            let mut pinned = self.pinned.write().await;
            let holds_group = pinned
                .as_ref()
                .and_then(|p| p.value.as_ref())
                .is_some_and(|g| g.group.group_id == group_id);
            if holds_group {
                *pinned = None;
            }
        }

        self.evict(&key).await;
        tracing::debug!(key = %key, "Scaling cache entry invalidated");
    }

    async fn evict(&self, key: &str) {
        self.memory.remove(key);
        self.written_keys.remove(key);
        if let Err(e) = self.edge.delete(key).await {
            self.edge_failed(key, "delete", &e);
        }
    }

    /// Drop the pinned global default so the next read refetches it.
    pub async fn invalidate_global_default(&self) {
        *self.pinned.write().await = None;
    }

    /// Drop everything this cache holds, locally and in the edge namespace.
    pub async fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.generations.clear();
        self.memory.clear();
        *self.pinned.write().await = None;

        let prefix = CacheKey::namespace_prefix(&self.config.edge_namespace);
        match self.edge.delete_prefix(&prefix).await {
            Ok(deleted) => {
                self.written_keys.clear();
                tracing::debug!(prefix = %prefix, deleted, "Edge namespace cleared");
            }
            Err(e) => {
                if !matches!(e, EdgeError::Unsupported(_)) {
                    self.edge_failed(&prefix, "delete_prefix", &e);
                }
                let keys: Vec<String> =
                    self.written_keys.iter().map(|k| k.key().clone()).collect();
                for key in keys {
                    if let Err(e) = self.edge.delete(&key).await {
                        self.edge_failed(&key, "delete", &e);
                    }
                    self.written_keys.remove(&key);
                }
            }
        }
    }

    async fn edge_lookup(&self, key: &str) -> Option<CacheEntry<CachedGroup>> {
        match self.edge.get(key).await {
            Ok(Some(bytes)) => match decode_entry::<CachedGroup>(key, &bytes) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    self.edge_failed(key, "decode", &e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.edge_failed(key, "get", &e);
                None
            }
        }
    }

    async fn store(&self, key: &str, group: CachedGroup) {
        let entry = CacheEntry::new(key, group, TtlClass::Edge);
        match encode_entry(&entry) {
            Ok(bytes) => match self.edge.put(key, bytes, self.config.edge_ttl).await {
                Ok(()) => {
                    self.written_keys.insert(key.to_string());
                }
                Err(e) => self.edge_failed(key, "put", &e),
            },
            Err(e) => self.edge_failed(key, "encode", &e),
        }
        self.memory.insert(CacheEntry {
            ttl_class: TtlClass::Memory,
            ..entry
        });
    }

    fn edge_failed(&self, key: &str, operation: &'static str, error: &EdgeError) {
        Counters::bump(&self.counters.edge_errors);
        tracing::warn!(key = %key, operation, error = %error, "Edge cache operation failed");
    }

    async fn load_group(&self, group_id: GroupId) -> WodsmithResult<Option<CachedGroup>> {
        match self.repo.group_get(group_id).await? {
            Some(group) => Ok(Some(self.with_levels(group).await?)),
            None => Ok(None),
        }
    }

    async fn with_levels(&self, group: ScalingGroup) -> WodsmithResult<CachedGroup> {
        let levels = self.repo.level_list_by_group(group.group_id).await?;
        Ok(CachedGroup { group, levels })
    }
}
