//! `PostgreSQL` store repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use printdrop_core::{Email, StoreCode, StoreRecordId, StoreStatus};

use super::{LazyPool, RepositoryError, StoreRepository, map_store_conflict};
use crate::models::{NewStore, Store};

const STORE_COLUMNS: &str = "id, store_id, store_name, owner_name, email, password_hash, \
                             address, phone, status, created_at";

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: Uuid,
    store_id: Option<String>,
    store_name: String,
    owner_name: String,
    email: String,
    password_hash: String,
    address: String,
    phone: String,
    status: StoreStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(r: StoreRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let store_code = r
            .store_id
            .as_deref()
            .map(StoreCode::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid store ID in database: {e}"))
            })?;

        Ok(Self {
            id: StoreRecordId::new(r.id),
            store_code,
            store_name: r.store_name,
            owner_name: r.owner_name,
            email,
            password_hash: r.password_hash,
            address: r.address,
            phone: r.phone,
            status: r.status,
            created_at: r.created_at,
        })
    }
}

/// Store repository backed by the `stores` table.
pub struct PgStoreRepository {
    pool: Arc<LazyPool>,
}

impl PgStoreRepository {
    #[must_use]
    pub const fn new(pool: Arc<LazyPool>) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Store>, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(pool)
        .await?;

        row.map(Store::try_from).transpose()
    }
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn get_by_code(&self, code: &StoreCode) -> Result<Option<Store>, RepositoryError> {
        self.fetch_one_by("store_id", code.as_str()).await
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<Store>, RepositoryError> {
        self.fetch_one_by("email", email.as_str()).await
    }

    async fn code_exists(&self, code: &StoreCode) -> Result<bool, RepositoryError> {
        let pool = self.pool.get().await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stores WHERE store_id = $1)")
                .bind(code)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, store: NewStore) -> Result<Store, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: StoreRow = sqlx::query_as(&format!(
            r"
            INSERT INTO stores (id, store_id, store_name, owner_name, email, password_hash,
                                address, phone, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9)
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(StoreRecordId::generate())
        .bind(&store.store_code)
        .bind(&store.store_name)
        .bind(&store.owner_name)
        .bind(store.email.as_str())
        .bind(&store.password_hash)
        .bind(&store.address)
        .bind(&store.phone)
        .bind(store.created_at)
        .fetch_one(pool)
        .await
        .map_err(map_store_conflict)?;

        Store::try_from(row)
    }

    async fn assign_code(
        &self,
        id: StoreRecordId,
        code: &StoreCode,
    ) -> Result<Store, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            r"
            UPDATE stores SET store_id = $2
            WHERE id = $1 AND store_id IS NULL
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(pool)
        .await
        .map_err(map_store_conflict)?;

        row.map(Store::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_status(
        &self,
        code: &StoreCode,
        status: StoreStatus,
    ) -> Result<Store, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            "UPDATE stores SET status = $2 WHERE store_id = $1 RETURNING {STORE_COLUMNS}"
        ))
        .bind(code)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        row.map(Store::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }
}
