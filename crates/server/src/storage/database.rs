//! Database content store: file bytes in the `file_blobs` table.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use printdrop_core::{StorageKey, StoreCode};

use super::{ContentStore, FileMetadata, StorageError, next_key_timestamp};
use crate::db::{LazyPool, RepositoryError};

/// Content store backed by `PostgreSQL` `bytea` rows.
pub struct DatabaseBlobStore {
    pool: Arc<LazyPool>,
}

impl DatabaseBlobStore {
    #[must_use]
    pub const fn new(pool: Arc<LazyPool>) -> Self {
        Self { pool }
    }

    async fn pool(&self) -> Result<&sqlx::PgPool, StorageError> {
        self.pool.get().await.map_err(|e| match e {
            RepositoryError::Database(e) => StorageError::Database(e),
            other => StorageError::Backend(other.to_string()),
        })
    }
}

#[async_trait]
impl ContentStore for DatabaseBlobStore {
    fn backend(&self) -> &'static str {
        "database"
    }

    async fn put(
        &self,
        namespace: &StoreCode,
        display_name: &str,
        bytes: Bytes,
        metadata: &FileMetadata,
    ) -> Result<StorageKey, StorageError> {
        let key = StorageKey::generate(namespace, display_name, next_key_timestamp());
        let size = i64::try_from(metadata.size_bytes).unwrap_or(i64::MAX);

        let inserted = sqlx::query(
            r"
            INSERT INTO file_blobs (key, store_id, original_name, mime_type, size_bytes, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO NOTHING
            ",
        )
        .bind(key.as_str())
        .bind(namespace)
        .bind(&metadata.original_name)
        .bind(&metadata.mime_type)
        .bind(size)
        .bind(bytes.as_ref())
        .execute(self.pool().await?)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StorageError::KeyCollision(key));
        }
        Ok(key)
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        let content: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT content FROM file_blobs WHERE key = $1")
                .bind(key.as_str())
                .fetch_optional(self.pool().await?)
                .await?;

        content
            .map(Bytes::from)
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM file_blobs WHERE key = $1")
            .bind(key.as_str())
            .execute(self.pool().await?)
            .await?;
        Ok(())
    }
}
