//! Content store: where uploaded file bytes live.
//!
//! Orders only hold [`StorageKey`]s. The bytes behind a key are kept by one
//! [`ContentStore`] backend, selected at startup:
//!
//! - [`FilesystemStore`] - one file per key under a root directory
//! - [`DatabaseBlobStore`] - rows in the `file_blobs` table
//! - `MemoryStore` - a `HashMap`, for tests (`testkit` feature)
//!
//! Every backend is wrapped in a [`BoundedStore`] so that no storage call can
//! hang a request past the configured deadline.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;

use printdrop_core::{StorageKey, StorageKeyError, StoreCode};

use crate::config::{StorageBackend, StorageConfig};
use crate::db::LazyPool;

pub mod database;
pub mod filesystem;
#[cfg(any(test, feature = "testkit"))]
pub mod memory;

pub use database::DatabaseBlobStore;
pub use filesystem::FilesystemStore;
#[cfg(any(test, feature = "testkit"))]
pub use memory::MemoryStore;

/// Errors that can occur in a content store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No bytes are stored under the key.
    #[error("no stored content for key {0}")]
    NotFound(StorageKey),

    /// A write found its key already taken.
    #[error("storage key already in use: {0}")]
    KeyCollision(StorageKey),

    /// The backend did not answer in time.
    #[error("storage {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A key read back from an order is malformed.
    #[error("invalid storage key: {0}")]
    InvalidKey(#[from] StorageKeyError),

    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database failure.
    #[error("storage database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Descriptive data stored alongside the bytes where the backend supports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A key/value blob store for uploaded files.
///
/// Keys are generated by [`ContentStore::put`]; a write never overwrites an
/// existing key.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Store `bytes` under a fresh key derived from `namespace` and
    /// `display_name`.
    ///
    /// Returns `StorageError::KeyCollision` if the derived key is already in
    /// use; calling again produces a new key.
    async fn put(
        &self,
        namespace: &StoreCode,
        display_name: &str,
        bytes: Bytes,
        metadata: &FileMetadata,
    ) -> Result<StorageKey, StorageError>;

    /// Read back the bytes stored under `key`.
    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;
}

static LAST_KEY_NANOS: AtomicI64 = AtomicI64::new(0);

/// Timestamp for a new key: wall-clock nanoseconds, bumped so that no two
/// calls in this process return the same value.
pub(crate) fn next_key_timestamp() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut last = LAST_KEY_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_KEY_NANOS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Applies a deadline to every call on the wrapped store.
pub struct BoundedStore {
    inner: Arc<dyn ContentStore>,
    timeout: Duration,
}

impl BoundedStore {
    #[must_use]
    pub fn new(inner: Arc<dyn ContentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StorageError>> + Send,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout {
                operation,
                after: self.timeout,
            })?
    }
}

#[async_trait]
impl ContentStore for BoundedStore {
    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn put(
        &self,
        namespace: &StoreCode,
        display_name: &str,
        bytes: Bytes,
        metadata: &FileMetadata,
    ) -> Result<StorageKey, StorageError> {
        self.bounded(
            "put",
            self.inner.put(namespace, display_name, bytes, metadata),
        )
        .await
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.bounded("delete", self.inner.delete(key)).await
    }
}

/// Build the configured backend, wrapped with the configured deadline.
///
/// # Errors
///
/// Returns `StorageError::Io` if the filesystem root cannot be created.
pub async fn from_config(
    config: &StorageConfig,
    pool: Arc<LazyPool>,
) -> Result<Arc<dyn ContentStore>, StorageError> {
    let inner: Arc<dyn ContentStore> = match &config.backend {
        StorageBackend::Filesystem { root } => {
            tracing::debug!(root = %root.display(), "Opening filesystem content store");
            Arc::new(FilesystemStore::open(root).await?)
        }
        StorageBackend::Database => Arc::new(DatabaseBlobStore::new(pool)),
    };
    tracing::info!(backend = inner.backend(), timeout = ?config.timeout, "Content store ready");
    Ok(Arc::new(BoundedStore::new(inner, config.timeout)))
}
