//! Edge store seam and cache statistics.

use async_trait::async_trait;
use std::time::Duration;

/// Errors raised by edge store backends.
///
/// These never leave the cache: [`TieredCache`](super::TieredCache) logs
/// them and treats the operation as a miss.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EdgeError {
    /// The backend could not be reached or refused the request.
    #[error("Edge store unavailable: {0}")]
    Unavailable(String),

    /// Backend transaction failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The backend does not implement the requested operation.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Distributed key-value store behind the second cache tier.
///
/// Values are opaque bytes with a per-key TTL. Implementations must be
/// safe to share across tasks.
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Get a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EdgeError>;

    /// Store a value that expires after `ttl`.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), EdgeError>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), EdgeError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    ///
    /// Stores without prefix scans keep the default, which reports
    /// [`EdgeError::Unsupported`].
    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, EdgeError> {
        Err(EdgeError::Unsupported("delete_prefix"))
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served by the memory tier.
    pub memory_hits: u64,
    /// Reads served by the edge tier.
    pub edge_hits: u64,
    /// Reads served by the pinned global default.
    pub pinned_hits: u64,
    /// Reads that fell through to the repository.
    pub misses: u64,
    /// Edge operations that failed and were degraded to misses or skipped.
    pub edge_errors: u64,
    /// Entries currently held in the memory tier.
    pub memory_entries: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.edge_hits + self.pinned_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            memory_hits: 60,
            edge_hits: 20,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
