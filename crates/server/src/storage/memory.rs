//! In-memory content store for tests, with failure injection.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use printdrop_core::{StorageKey, StoreCode};

use super::{ContentStore, FileMetadata, StorageError, next_key_timestamp};

#[derive(Debug, Default)]
struct Inner {
    blobs: HashMap<StorageKey, Bytes>,
    /// Puts that may still succeed before every further put fails.
    puts_before_failure: Option<usize>,
    fail_gets: bool,
    fail_deletes: bool,
}

/// Content store kept in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Let `n` more puts succeed, then fail every put after that.
    pub fn fail_puts_after(&self, n: usize) {
        self.lock().puts_before_failure = Some(n);
    }

    /// Make every get fail (or succeed again).
    pub fn fail_gets(&self, fail: bool) {
        self.lock().fail_gets = fail;
    }

    /// Make every delete fail (or succeed again).
    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// Remove a blob behind the service's back.
    pub fn remove(&self, key: &StorageKey) -> Option<Bytes> {
        self.lock().blobs.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.lock().blobs.contains_key(key)
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(
        &self,
        namespace: &StoreCode,
        display_name: &str,
        bytes: Bytes,
        _metadata: &FileMetadata,
    ) -> Result<StorageKey, StorageError> {
        let mut inner = self.lock();
        if let Some(remaining) = inner.puts_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StorageError::Backend("injected put failure".to_string()));
            }
            *remaining -= 1;
        }

        let key = StorageKey::generate(namespace, display_name, next_key_timestamp());
        if inner.blobs.contains_key(&key) {
            return Err(StorageError::KeyCollision(key));
        }
        inner.blobs.insert(key.clone(), bytes);
        Ok(key)
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        let inner = self.lock();
        if inner.fail_gets {
            return Err(StorageError::Backend("injected get failure".to_string()));
        }
        inner
            .blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_deletes {
            return Err(StorageError::Backend("injected delete failure".to_string()));
        }
        inner.blobs.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn metadata() -> FileMetadata {
        FileMetadata {
            original_name: "a.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1,
        }
    }

    #[tokio::test]
    async fn test_injected_put_failure() {
        let store = MemoryStore::new();
        let shop = StoreCode::parse("SHOP1").unwrap();
        store.fail_puts_after(1);

        assert!(store.put(&shop, "a.pdf", Bytes::from_static(b"1"), &metadata()).await.is_ok());
        assert!(matches!(
            store.put(&shop, "b.pdf", Bytes::from_static(b"2"), &metadata()).await,
            Err(StorageError::Backend(_))
        ));
        assert_eq!(store.len(), 1);
    }
}
