//! Tiered cache for scaling groups.
//!
//! Two tiers sit in front of the repository:
//!
//! - a process-local [`MemoryTier`] with a short TTL,
//! - a shared [`EdgeStore`] with a longer TTL.
//!
//! The global default group is pinned in memory and refreshed on an
//! interval. Edge failures never reach callers; they are logged and counted
//! in [`CacheStats`].
//!
//! # Example
//!
//! ```ignore
//! let cache = TieredCache::new(repo, Arc::new(InMemoryEdgeStore::new()), config);
//! cache.init().await?;
//!
//! let group = cache.get_group(group_id).await?;
//! cache.invalidate_group(group_id).await;
//! ```

pub mod entry;
pub mod key;
pub mod lmdb_backend;
pub mod memory;
pub mod tiered;
pub mod traits;

pub use entry::{CacheEntry, CacheRead, CacheSource, CachedGroup, TtlClass};
pub use key::CacheKey;
pub use lmdb_backend::{LmdbEdgeError, LmdbEdgeStore};
pub use memory::{InMemoryEdgeStore, MemoryTier};
pub use tiered::TieredCache;
pub use traits::{CacheStats, EdgeError, EdgeStore};
