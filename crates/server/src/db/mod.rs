//! Persistence for stores and print orders.
//!
//! # Database: `printdrop`
//!
//! ## Tables
//!
//! - `stores` - Registered print shops and their credentials
//! - `print_orders` - Ephemeral upload batches (files kept as `jsonb`)
//! - `file_blobs` - File bytes, when the database content backend is selected
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p printdrop-cli -- migrate
//! ```
//!
//! Repositories are traits so the services can run against the in-memory
//! implementations in [`memory`] (behind the `testkit` feature).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::OnceCell;

use printdrop_core::{Email, OrderId, OrderStatus, StoreCode, StoreRecordId, StoreStatus};

use crate::models::{NewOrder, NewStore, PrintOrder, Store};

#[cfg(any(test, feature = "testkit"))]
pub mod memory;
pub mod orders;
pub mod stores;

pub use orders::PgOrderRepository;
pub use stores::PgStoreRepository;

/// Attempts made to open the pool before giving up.
const CONNECT_ATTEMPTS: u32 = 2;

/// How long one attempt may wait for a connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between attempts, multiplied by the attempt number.
const CONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// Hard ceiling on opening the pool, retries included.
pub const CONNECT_BUDGET: Duration = Duration::from_secs(8);

/// Conflict field reported when an email is already registered.
pub const CONFLICT_EMAIL: &str = "email";

/// Conflict field reported when a store code is already taken.
pub const CONFLICT_STORE_CODE: &str = "store_id";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data integrity error: {0}")]
    DataCorruption(String),

    /// Requested record was not found.
    #[error("record not found")]
    NotFound,

    /// Unique constraint violation. Carries the conflicting field.
    #[error("conflict: {0} already exists")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether this is a uniqueness conflict on `field`.
    #[must_use]
    pub fn is_conflict_on(&self, field: &str) -> bool {
        matches!(self, Self::Conflict(f) if f == field)
    }
}

/// Create a `PostgreSQL` connection pool, retrying transient connect failures
/// with linear backoff. The whole call is bounded by [`CONNECT_BUDGET`].
///
/// # Errors
///
/// Returns the last `sqlx::Error` if every attempt fails, or
/// `sqlx::Error::PoolTimedOut` once the budget is spent.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    let connect = async {
        let mut attempt = 1;
        loop {
            let result = PgPoolOptions::new()
                .max_connections(10)
                .min_connections(1)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(database_url.expose_secret())
                .await;

            match result {
                Ok(pool) => return Ok(pool),
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "Database connection failed, retrying");
                    tokio::time::sleep(CONNECT_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    };

    tokio::time::timeout(CONNECT_BUDGET, connect)
        .await
        .unwrap_or_else(|_| {
            tracing::error!(budget = ?CONNECT_BUDGET, "Database connection budget exhausted");
            Err(sqlx::Error::PoolTimedOut)
        })
}

/// A connection pool that is opened on first use.
///
/// Concurrent first callers share a single connection attempt. A failed
/// attempt leaves the cell empty so the next caller tries again.
pub struct LazyPool {
    database_url: SecretString,
    pool: OnceCell<PgPool>,
}

impl LazyPool {
    #[must_use]
    pub fn new(database_url: SecretString) -> Self {
        Self {
            database_url,
            pool: OnceCell::new(),
        }
    }

    /// Wrap an already-open pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            database_url: SecretString::from(String::new()),
            pool: OnceCell::new_with(Some(pool)),
        }
    }

    /// Get the pool, connecting if this is the first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the connection cannot be established.
    pub async fn get(&self) -> Result<&PgPool, RepositoryError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = create_pool(&self.database_url).await?;
                tracing::info!("Database pool created");
                Ok::<_, sqlx::Error>(pool)
            })
            .await
            .map_err(RepositoryError::Database)
    }
}

/// Persistence for store accounts.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Look up a store by its public code.
    async fn get_by_code(&self, code: &StoreCode) -> Result<Option<Store>, RepositoryError>;

    /// Look up a store by login email.
    async fn get_by_email(&self, email: &Email) -> Result<Option<Store>, RepositoryError>;

    /// Whether any store already uses `code`.
    async fn code_exists(&self, code: &StoreCode) -> Result<bool, RepositoryError>;

    /// Insert a store.
    ///
    /// Returns `RepositoryError::Conflict` with [`CONFLICT_EMAIL`] or
    /// [`CONFLICT_STORE_CODE`] when a unique field is taken.
    async fn create(&self, store: NewStore) -> Result<Store, RepositoryError>;

    /// Give a code to a store that has none. Codes never change once set, so
    /// this returns `RepositoryError::NotFound` if the store is missing or
    /// already has a code.
    async fn assign_code(
        &self,
        id: StoreRecordId,
        code: &StoreCode,
    ) -> Result<Store, RepositoryError>;

    /// Activate or deactivate a store.
    async fn set_status(
        &self,
        code: &StoreCode,
        status: StoreStatus,
    ) -> Result<Store, RepositoryError>;
}

/// Persistence for print orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Check that the backing database is reachable.
    async fn health_check(&self) -> Result<(), RepositoryError>;

    /// Insert an order in `pending` status.
    async fn create(&self, order: NewOrder) -> Result<PrintOrder, RepositoryError>;

    /// Fetch an order regardless of owner or age.
    async fn get(&self, id: OrderId) -> Result<Option<PrintOrder>, RepositoryError>;

    /// Orders of `store` in an active status created strictly after
    /// `created_after`, newest first.
    async fn list_active(
        &self,
        store: &StoreCode,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<PrintOrder>, RepositoryError>;

    /// Atomically move an order owned by `store` from one of `from` to `to`,
    /// provided it was created after `created_after`.
    ///
    /// Returns `None` when no order matched every condition.
    async fn transition(
        &self,
        id: OrderId,
        store: &StoreCode,
        from: &[OrderStatus],
        to: OrderStatus,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<PrintOrder>, RepositoryError>;

    /// Delete every order created at or before `cutoff` and return them.
    async fn delete_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PrintOrder>, RepositoryError>;
}

/// Map a unique violation on the `stores` table to the conflicting field.
pub(crate) fn map_store_conflict(err: sqlx::Error) -> RepositoryError {
    let field = match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            match db_err.constraint() {
                Some("stores_email_key") => CONFLICT_EMAIL,
                _ => CONFLICT_STORE_CODE,
            }
        }
        _ => return RepositoryError::Database(err),
    };
    RepositoryError::Conflict(field.to_string())
}
