//! LMDB-backed edge store.
//!
//! Uses the heed crate (Rust bindings for LMDB) as a persistent, memory-mapped
//! stand-in for the distributed edge KV on single-host deployments.
//!
//! # Value Format
//!
//! `[expires_at millis: 8 bytes LE][value]`. Expired values read as absent
//! until they are overwritten or deleted.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. Reads use read transactions, writes and
//! prefix deletes use write transactions.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{EdgeError, EdgeStore};

/// Length of the expiry header.
const EXPIRY_LEN: usize = 8;

/// Error type for opening the LMDB environment.
#[derive(Debug, thiserror::Error)]
pub enum LmdbEdgeError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbEdgeError> for wodsmith_core::WodsmithError {
    fn from(e: LmdbEdgeError) -> Self {
        wodsmith_core::WodsmithError::Storage(wodsmith_core::StorageError::Backend {
            reason: e.to_string(),
        })
    }
}

fn txn_error(e: heed::Error) -> EdgeError {
    EdgeError::Transaction(e.to_string())
}

/// LMDB-backed [`EdgeStore`] with per-key expiry.
///
/// # Example
///
/// ```ignore
/// let store = LmdbEdgeStore::new("/var/cache/wodsmith", 64)?;
/// let cache = TieredCache::new(repo, Arc::new(store), ScalingConfig::default());
/// ```
pub struct LmdbEdgeStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbEdgeStore {
    /// Open (or create) a store under `path` with a map of `max_size_mb` megabytes.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbEdgeError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbEdgeError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbEdgeError::Transaction(e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbEdgeError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbEdgeError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Number of stored keys, expired ones included.
    pub fn len(&self) -> Result<u64, EdgeError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        self.db.len(&rtxn).map_err(txn_error)
    }

    pub fn is_empty(&self) -> Result<bool, EdgeError> {
        Ok(self.len()? == 0)
    }

    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, EdgeError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let mut keys = Vec::new();
        for result in self.db.iter(&rtxn).map_err(txn_error)? {
            let (key, _) = result.map_err(txn_error)?;
            if key.starts_with(prefix) {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }
}

fn split_expiry(bytes: &[u8]) -> Result<(i64, &[u8]), EdgeError> {
    if bytes.len() < EXPIRY_LEN {
        return Err(EdgeError::Deserialization(format!(
            "value too short: {} bytes",
            bytes.len()
        )));
    }
    let mut header = [0u8; EXPIRY_LEN];
    header.copy_from_slice(&bytes[..EXPIRY_LEN]);
    Ok((i64::from_le_bytes(header), &bytes[EXPIRY_LEN..]))
}

#[async_trait]
impl EdgeStore for LmdbEdgeStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EdgeError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let Some(bytes) = self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)? else {
            return Ok(None);
        };
        let (expires_at, value) = split_expiry(bytes)?;
        if expires_at <= Utc::now().timestamp_millis() {
            return Ok(None);
        }
        Ok(Some(value.to_vec()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), EdgeError> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_millis);

        let mut full = Vec::with_capacity(EXPIRY_LEN + value.len());
        full.extend_from_slice(&expires_at.to_le_bytes());
        full.extend_from_slice(&value);

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &full)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    async fn delete(&self, key: &str) -> Result<(), EdgeError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, EdgeError> {
        let keys = self.collect_keys_with_prefix(prefix.as_bytes())?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let mut deleted = 0u64;
        for key in &keys {
            if self.db.delete(&mut wtxn, key).map_err(txn_error)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_error)?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbEdgeStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbEdgeStore::new(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _temp_dir) = create_test_store();
        store
            .put("scaling:group:a", b"payload".to_vec(), Duration::from_secs(60))
            .await
            .expect("put should succeed");

        let value = store.get("scaling:group:a").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_value_reads_as_absent() {
        let (store, _temp_dir) = create_test_store();
        store
            .put("scaling:group:a", vec![1], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.get("scaling:group:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp_dir) = create_test_store();
        store
            .put("k", vec![1], Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // Absent keys delete cleanly.
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_prefix_leaves_other_namespaces() {
        let (store, _temp_dir) = create_test_store();
        let ttl = Duration::from_secs(60);
        store.put("scaling:group:a", vec![1], ttl).await.unwrap();
        store.put("scaling:global_default", vec![2], ttl).await.unwrap();
        store.put("sessions:x", vec![3], ttl).await.unwrap();

        assert_eq!(store.delete_prefix("scaling:").await.unwrap(), 2);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get("sessions:x").await.unwrap().is_some());
    }
}
