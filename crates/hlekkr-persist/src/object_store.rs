//! Object store contract for binary media
//!
//! The pipeline never streams whole objects through a worker; it reads head
//! metadata, ranged byte windows (frame extraction, header probing), and
//! copies objects into quarantine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::Range;

use crate::backend::StorageError;

/// Head metadata for a stored object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadMetadata {
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
    pub server_side_encryption: Option<String>,
}

/// Object store operations the pipeline requires
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    async fn head(&self, bucket: &str, key: &str) -> Result<HeadMetadata, StorageError>;

    /// Ranged read; the range is clamped to the object length.
    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: Range<u64>,
    ) -> Result<Vec<u8>, StorageError>;

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), StorageError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

#[derive(Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: Option<String>,
    etag: String,
    last_modified: DateTime<Utc>,
}

/// In-memory object store (for testing)
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: tokio::sync::RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let etag = hlekkr_core::Hash::digest(&body).to_hex();
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
                etag,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<HeadMetadata, StorageError> {
        let objects = self.objects.read().await;
        let obj = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{key}")))?;
        Ok(HeadMetadata {
            size: obj.body.len() as u64,
            content_type: obj.content_type.clone(),
            etag: Some(obj.etag.clone()),
            last_modified: Some(obj.last_modified),
            storage_class: Some("STANDARD".to_string()),
            server_side_encryption: Some("AES256".to_string()),
        })
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: Range<u64>,
    ) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.read().await;
        let obj = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{key}")))?;
        let len = obj.body.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.min(len) as usize;
        Ok(obj.body[start..end].to_vec())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        let obj = objects
            .get(&(src_bucket.to_string(), src_key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{src_bucket}/{src_key}")))?;
        objects.insert((dst_bucket.to_string(), dst_key.to_string()), obj);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_head_range() {
        let store = MemoryObjectStore::new();
        store
            .put("media", "a.png", vec![1, 2, 3, 4, 5], Some("image/png"))
            .await
            .unwrap();

        let head = store.head("media", "a.png").await.unwrap();
        assert_eq!(head.size, 5);
        assert_eq!(head.content_type.as_deref(), Some("image/png"));
        assert!(head.etag.is_some());

        let bytes = store.get_range("media", "a.png", 1..3).await.unwrap();
        assert_eq!(bytes, vec![2, 3]);

        // Out-of-bounds range is clamped, not an error
        let bytes = store.get_range("media", "a.png", 3..100).await.unwrap();
        assert_eq!(bytes, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_copy_then_delete_quarantine_flow() {
        let store = MemoryObjectStore::new();
        store
            .put("media", "uploads/x.mp4", vec![9; 16], None)
            .await
            .unwrap();

        store
            .copy("media", "uploads/x.mp4", "media", "quarantine/m1/x.mp4")
            .await
            .unwrap();
        store.delete("media", "uploads/x.mp4").await.unwrap();

        assert!(store.head("media", "uploads/x.mp4").await.is_err());
        let head = store.head("media", "quarantine/m1/x.mp4").await.unwrap();
        assert_eq!(head.size, 16);
    }
}
