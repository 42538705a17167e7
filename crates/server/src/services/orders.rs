//! Store dashboard: active order listing and status transitions.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use printdrop_core::{OrderAction, OrderId, OrderTtl, StoreCode};

use crate::error::AppError;
use crate::models::{OrderView, PrintOrder};
use crate::services::Backends;
use crate::services::reaper::Reaper;

/// Body of an order status update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub action: OrderAction,
}

/// Listing response.
#[derive(Debug, Clone, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderView>,
}

/// Order operations on behalf of an authenticated store.
pub struct OrderService<'a> {
    backends: &'a Backends,
    ttl: OrderTtl,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(backends: &'a Backends, ttl: OrderTtl) -> Self {
        Self { backends, ttl }
    }

    /// Live orders of `store`, newest first, each with its countdown.
    ///
    /// Sweeps expired orders first. A failed sweep is logged and does not
    /// fail the listing, which filters expired orders on its own.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the store does not exist, or a
    /// repository error if the listing query fails.
    #[instrument(skip(self), fields(store_id = %store))]
    pub async fn list_active(&self, store: &StoreCode) -> Result<OrderList, AppError> {
        let now = self.backends.clock.now();
        if let Err(e) = Reaper::new(self.backends, self.ttl).sweep(now).await {
            tracing::warn!(error = %e, "Sweep before listing failed");
        }

        if !self.backends.stores.code_exists(store).await? {
            return Err(AppError::NotFound("Store not found".to_string()));
        }

        let orders = self
            .backends
            .orders
            .list_active(store, self.ttl.cutoff(now))
            .await?;

        Ok(OrderList {
            orders: orders
                .into_iter()
                .map(|order| OrderView::new(order, self.ttl, now))
                .collect(),
        })
    }

    /// Apply a status action to one of `store`'s live orders.
    ///
    /// The update is a single conditional write; when it matches nothing,
    /// the order is read back to say why.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` if the order does not exist or has expired
    /// - `AppError::Forbidden` if it belongs to another store
    /// - `AppError::Conflict` if its current status does not allow the action
    #[instrument(skip(self), fields(store_id = %store, order_id = %order_id, action = ?action))]
    pub async fn apply(
        &self,
        store: &StoreCode,
        order_id: OrderId,
        action: OrderAction,
    ) -> Result<PrintOrder, AppError> {
        let now = self.backends.clock.now();
        let cutoff = self.ttl.cutoff(now);

        let updated = self
            .backends
            .orders
            .transition(
                order_id,
                store,
                action.allowed_from(),
                action.target(),
                cutoff,
                now,
            )
            .await?;

        if let Some(order) = updated {
            tracing::info!(status = %order.status, "Order status updated");
            return Ok(order);
        }

        match self.backends.orders.get(order_id).await? {
            None => Err(AppError::NotFound("Order not found".to_string())),
            Some(order) if order.is_expired(self.ttl, now) => {
                Err(AppError::NotFound("Order not found".to_string()))
            }
            Some(order) if order.store_code != *store => Err(AppError::Forbidden(
                "Order belongs to another store".to_string(),
            )),
            Some(order) => Err(AppError::Conflict(format!(
                "Cannot apply {} to an order that is {}",
                action.target(),
                order.status
            ))),
        }
    }
}
