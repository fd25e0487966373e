//! Cache entries, TTL classes and the edge wire format.

use super::traits::EdgeError;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use wodsmith_core::{ScalingConfig, ScalingGroup, ScalingLevel, Timestamp};

/// Lifetime class of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TtlClass {
    /// Process-local entry, short TTL.
    Memory,
    /// Entry in the shared edge store, longer TTL.
    Edge,
    /// Kept until explicitly refreshed or invalidated.
    Pinned,
}

impl TtlClass {
    /// TTL configured for this class; `None` for pinned entries.
    pub fn ttl(&self, config: &ScalingConfig) -> Option<Duration> {
        match self {
            TtlClass::Memory => Some(config.memory_ttl),
            TtlClass::Edge => Some(config.edge_ttl),
            TtlClass::Pinned => None,
        }
    }
}

/// A cached payload with its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub written_at: Timestamp,
    pub ttl_class: TtlClass,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, payload: T, ttl_class: TtlClass) -> Self {
        Self {
            key: key.into(),
            payload,
            written_at: Utc::now(),
            ttl_class,
        }
    }
}

/// A scaling group with its levels ordered by position, as cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedGroup {
    pub group: ScalingGroup,
    pub levels: Vec<ScalingLevel>,
}

/// Where a cache read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Memory,
    Edge,
    Pinned,
    Repository,
}

/// Result of a cache read, carrying where it came from and when it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRead<T> {
    value: T,
    source: CacheSource,
    written_at: Timestamp,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, source: CacheSource, written_at: Timestamp) -> Self {
        Self {
            value,
            source,
            written_at,
        }
    }

    pub fn from_repository(value: T) -> Self {
        Self {
            value,
            source: CacheSource::Repository,
            written_at: Utc::now(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn source(&self) -> CacheSource {
        self.source
    }

    pub fn written_at(&self) -> Timestamp {
        self.written_at
    }

    /// Whether the repository was consulted for this read.
    pub fn was_miss(&self) -> bool {
        self.source == CacheSource::Repository
    }
}

/// Length of the write-time header on edge values.
const HEADER_LEN: usize = 8;

/// Encode an entry for the edge store.
///
/// Format: `[written_at millis: 8 bytes LE][json payload]`
pub fn encode_entry<T: Serialize>(entry: &CacheEntry<T>) -> Result<Vec<u8>, EdgeError> {
    let payload =
        serde_json::to_vec(&entry.payload).map_err(|e| EdgeError::Serialization(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&entry.written_at.timestamp_millis().to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode an edge value written by [`encode_entry`].
pub fn decode_entry<T: DeserializeOwned>(
    key: &str,
    bytes: &[u8],
) -> Result<CacheEntry<T>, EdgeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EdgeError::Deserialization(format!(
            "value too short: {} bytes",
            bytes.len()
        )));
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&bytes[..HEADER_LEN]);
    let written_at = DateTime::from_timestamp_millis(i64::from_le_bytes(header))
        .ok_or_else(|| EdgeError::Deserialization("invalid write timestamp".to_string()))?;
    let payload = serde_json::from_slice(&bytes[HEADER_LEN..])
        .map_err(|e| EdgeError::Deserialization(e.to_string()))?;

    Ok(CacheEntry {
        key: key.to_string(),
        payload,
        written_at,
        ttl_class: TtlClass::Edge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_class_durations() {
        let config = ScalingConfig::default();
        assert_eq!(TtlClass::Memory.ttl(&config), Some(Duration::from_secs(300)));
        assert_eq!(TtlClass::Edge.ttl(&config), Some(Duration::from_secs(3600)));
        assert_eq!(TtlClass::Pinned.ttl(&config), None);
    }

    #[test]
    fn test_decode_keeps_write_time() {
        let entry = CacheEntry::new("scaling:group:x", vec![1u32, 2, 3], TtlClass::Edge);
        let bytes = encode_entry(&entry).unwrap();
        let decoded: CacheEntry<Vec<u32>> = decode_entry(&entry.key, &bytes).unwrap();
        assert_eq!(decoded.payload, vec![1, 2, 3]);
        assert_eq!(
            decoded.written_at.timestamp_millis(),
            entry.written_at.timestamp_millis()
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_entry::<Vec<u32>>("k", &[1, 2]).is_err());
        let mut bytes = 0i64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"not json");
        assert!(matches!(
            decode_entry::<Vec<u32>>("k", &bytes),
            Err(EdgeError::Deserialization(_))
        ));
    }
}
