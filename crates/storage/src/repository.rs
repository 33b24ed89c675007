use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use study_core::StorageKey;
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage quota exceeded ({limit} bytes)")]
    QuotaExceeded { limit: usize },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable string-to-string store, keyed by derived storage keys.
///
/// This is the only shared mutable resource in the application. Writes to
/// different keys are independent: there is no transaction spanning keys.
#[async_trait]
pub trait KeyValueRepository: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the backend is full, or other storage errors.
    async fn set(&self, key: &StorageKey, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError>;

    /// List keys starting with `prefix`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<StorageKey>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// An optional byte quota (keys + values) mimics the capacity limit of
/// browser-style local storage.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    entries: Arc<Mutex<BTreeMap<StorageKey, String>>>,
    quota_bytes: Option<usize>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }

    /// Whether nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

fn used_bytes(entries: &BTreeMap<StorageKey, String>) -> usize {
    entries
        .iter()
        .map(|(key, value)| key.as_str().len() + value.len())
        .sum()
}

#[async_trait]
impl KeyValueRepository for InMemoryRepository {
    async fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &StorageKey, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(limit) = self.quota_bytes {
            let replaced = guard
                .get(key)
                .map_or(0, |old| key.as_str().len() + old.len());
            let projected = used_bytes(&guard) - replaced + key.as_str().len() + value.len();
            if projected > limit {
                return Err(StorageError::QuotaExceeded { limit });
            }
        }
        guard.insert(key.clone(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<StorageKey>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .keys()
            .filter(|key| key.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Holds the key-value backend behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> StorageKey {
        StorageKey::raw(raw)
    }

    #[tokio::test]
    async fn set_get_remove() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.get(&key("a")).await.unwrap(), None);

        repo.set(&key("a"), "1").await.unwrap();
        repo.set(&key("a"), "2").await.unwrap();
        assert_eq!(repo.get(&key("a")).await.unwrap().as_deref(), Some("2"));

        repo.remove(&key("a")).await.unwrap();
        repo.remove(&key("a")).await.unwrap();
        assert!(repo.is_empty().unwrap());
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes_and_keeps_old_value() {
        let repo = InMemoryRepository::with_quota(10);
        repo.set(&key("k"), "12345").await.unwrap();

        let err = repo.set(&key("k"), "1234567890").await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 10 }));
        assert_eq!(repo.get(&key("k")).await.unwrap().as_deref(), Some("12345"));

        // Replacing in place only counts the new size.
        repo.set(&key("k"), "123456789").await.unwrap();
    }

    #[tokio::test]
    async fn prefix_listing_is_sorted() {
        let repo = InMemoryRepository::new();
        for raw in ["app-state-b-guest", "other", "app-state-a-guest"] {
            repo.set(&key(raw), "{}").await.unwrap();
        }
        let keys = repo.keys_with_prefix("app-state-").await.unwrap();
        assert_eq!(keys, vec![key("app-state-a-guest"), key("app-state-b-guest")]);
    }
}
