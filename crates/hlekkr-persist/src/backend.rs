//! Document store backend trait and error types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conditional write failed: {0}")]
    ConditionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for hlekkr_core::PipelineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::ConditionFailed(msg) => Self::Conflict(msg),
            other => Self::StoreError(other.to_string()),
        }
    }
}

/// Generic document store backend (object safe).
///
/// Coordination between workers happens through [`compare_and_swap`]; there
/// is no shared in-process mutable state between pipeline components.
///
/// [`compare_and_swap`]: DocumentBackend::compare_and_swap
#[async_trait]
pub trait DocumentBackend: Send + Sync + Debug {
    /// Backend name (for logs)
    fn name(&self) -> &str;

    /// Check if backend is healthy
    async fn is_healthy(&self) -> bool;

    /// Store a JSON value with a key, optionally expiring at `expires_at`
    async fn put_value(
        &self,
        key: &str,
        value: serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    /// Get a JSON value by key
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Atomically replace the value at `key` only if the current value equals
    /// `expected` (`None` = key must be absent). Returns `ConditionFailed`
    /// when the precondition does not hold.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<serde_json::Value>,
        new: serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Delete a value by key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// List all keys with prefix, in lexicographic order
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Extension trait for typed access
#[async_trait]
pub trait DocumentExt {
    async fn put<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError>;

    async fn put_with_ttl<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;

    /// Typed compare-and-swap; `expected = None` means create-if-absent.
    async fn cas<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        expected: Option<&T>,
        new: &T,
    ) -> Result<(), StorageError>;
}

#[async_trait]
impl<S: DocumentBackend + ?Sized> DocumentExt for S {
    async fn put<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let json =
            serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.put_value(key, json, None).await
    }

    async fn put_with_ttl<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let json =
            serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.put_value(key, json, Some(expires_at)).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_value(key).await? {
            Some(json) => {
                let value = serde_json::from_value(json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn cas<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        expected: Option<&T>,
        new: &T,
    ) -> Result<(), StorageError> {
        let expected_json = expected
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let new_json =
            serde_json::to_value(new).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.compare_and_swap(key, expected_json, new_json).await
    }
}

struct Entry {
    value: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory document backend (for testing)
#[derive(Default)]
pub struct MemoryBackend {
    data: tokio::sync::RwLock<std::collections::BTreeMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn put_value(
        &self,
        key: &str,
        value: serde_json::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|e| !e.expired(Utc::now()))
            .map(|e| e.value.clone()))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<serde_json::Value>,
        new: serde_json::Value,
    ) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        let current = data
            .get(key)
            .filter(|e| !e.expired(Utc::now()))
            .map(|e| &e.value);
        if current != expected.as_ref() {
            return Err(StorageError::ConditionFailed(format!(
                "stale value at {key}"
            )));
        }
        let expires_at = data.get(key).and_then(|e| e.expires_at);
        data.insert(
            key.to_string(),
            Entry {
                value: new,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.write().await.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let now = Utc::now();
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| !e.expired(now))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
