//! Blob Store - Server-Side Storage for the Database Backend
//!
//! The Database backend only ever needs to store, fetch, and delete an opaque
//! blob by identifier. Purging old blobs is maintenance work owned by the
//! caller, never part of a request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use waystack_core::{NavError, NavResult};

/// Identifier-keyed blob storage.
///
/// Implementations must tolerate concurrent independent reads and writes;
/// no operation coordinates across identifiers.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store `bytes` under a fresh `id`.
    async fn put(&self, id: &str, bytes: &[u8]) -> NavResult<()>;

    /// Fetch the blob, or `NavError::NotFound` if unknown or purged.
    async fn get(&self, id: &str) -> NavResult<Vec<u8>>;

    /// Delete the blob. Returns whether it existed.
    async fn delete(&self, id: &str) -> NavResult<bool>;

    /// Delete every blob created before `cutoff`. Returns the number removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> NavResult<u64>;
}

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// Process-local store. Suitable for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Sum of stored blob sizes.
    pub fn total_bytes(&self) -> usize {
        self.blobs.read().values().map(|b| b.bytes.len()).sum()
    }

    fn put_at(&self, id: &str, bytes: &[u8], created_at: DateTime<Utc>) -> NavResult<()> {
        let mut blobs = self.blobs.write();
        if blobs.contains_key(id) {
            return Err(NavError::Store(format!("identifier collision on {id}")));
        }
        blobs.insert(
            id.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                created_at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> NavResult<()> {
        self.put_at(id, bytes, Utc::now())
    }

    async fn get(&self, id: &str) -> NavResult<Vec<u8>> {
        self.blobs
            .read()
            .get(id)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| NavError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> NavResult<bool> {
        Ok(self.blobs.write().remove(id).is_some())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> NavResult<u64> {
        let mut blobs = self.blobs.write();
        let before = blobs.len();
        blobs.retain(|_, b| b.created_at >= cutoff);
        Ok((before - blobs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryBlobStore::new();
        store.put("a1", b"blob").await.unwrap();

        assert_eq!(store.get("a1").await.unwrap(), b"blob");
        assert!(store.delete("a1").await.unwrap());
        assert!(!store.delete("a1").await.unwrap());
        assert!(matches!(store.get("a1").await, Err(NavError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_collision_is_store_error() {
        let store = MemoryBlobStore::new();
        store.put("dup", b"one").await.unwrap();
        assert!(matches!(
            store.put("dup", b"two").await,
            Err(NavError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let store = MemoryBlobStore::new();
        let now = Utc::now();
        store.put_at("old", b"x", now - Duration::hours(2)).unwrap();
        store.put_at("new", b"yy", now).unwrap();

        let removed = store
            .purge_older_than(now - Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 2);
    }
}
