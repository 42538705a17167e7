//! `PostgreSQL` print order repository.
//!
//! Every mutation is a single statement so that concurrent status updates and
//! reaper sweeps are serialized by row locks rather than by application code.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use printdrop_core::{FileRef, OrderId, OrderStatus, StoreCode};

use super::{LazyPool, OrderRepository, RepositoryError};
use crate::models::{NewOrder, PrintOrder};

const ORDER_COLUMNS: &str =
    "id, store_id, customer_name, customer_phone, files, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    store_id: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    files: Json<Vec<FileRef>>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for PrintOrder {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let store_code = StoreCode::parse(&r.store_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid store ID on order {}: {e}", r.id))
        })?;

        Ok(Self {
            id: OrderId::new(r.id),
            store_code,
            customer_name: r.customer_name,
            customer_phone: r.customer_phone,
            files: r.files.0,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<PrintOrder>, RepositoryError> {
    rows.into_iter().map(PrintOrder::try_from).collect()
}

/// Order repository backed by the `print_orders` table.
pub struct PgOrderRepository {
    pool: Arc<LazyPool>,
}

impl PgOrderRepository {
    #[must_use]
    pub const fn new(pool: Arc<LazyPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        let pool = self.pool.get().await?;
        sqlx::query("SELECT 1").fetch_one(pool).await?;
        Ok(())
    }

    async fn create(&self, order: NewOrder) -> Result<PrintOrder, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO print_orders (id, store_id, customer_name, customer_phone, files,
                                      status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $6)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.id)
        .bind(&order.store_code)
        .bind(order.customer_name.as_deref())
        .bind(order.customer_phone.as_deref())
        .bind(Json(&order.files))
        .bind(order.created_at)
        .fetch_one(pool)
        .await?;

        PrintOrder::try_from(row)
    }

    async fn get(&self, id: OrderId) -> Result<Option<PrintOrder>, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM print_orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(PrintOrder::try_from).transpose()
    }

    async fn list_active(
        &self,
        store: &StoreCode,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<PrintOrder>, RepositoryError> {
        let pool = self.pool.get().await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM print_orders
            WHERE store_id = $1 AND status = ANY($2) AND created_at > $3
            ORDER BY created_at DESC
            "
        ))
        .bind(store)
        .bind(OrderStatus::ACTIVE.to_vec())
        .bind(created_after)
        .fetch_all(pool)
        .await?;

        into_orders(rows)
    }

    async fn transition(
        &self,
        id: OrderId,
        store: &StoreCode,
        from: &[OrderStatus],
        to: OrderStatus,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<PrintOrder>, RepositoryError> {
        let pool = self.pool.get().await?;
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE print_orders SET status = $4, updated_at = $6
            WHERE id = $1 AND store_id = $2 AND status = ANY($3) AND created_at > $5
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store)
        .bind(from.to_vec())
        .bind(to)
        .bind(created_after)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        row.map(PrintOrder::try_from).transpose()
    }

    async fn delete_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PrintOrder>, RepositoryError> {
        let pool = self.pool.get().await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "DELETE FROM print_orders WHERE created_at <= $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        into_orders(rows)
    }
}
