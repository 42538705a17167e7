//! Print order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use printdrop_core::{FileRef, OrderId, OrderStatus, OrderTtl, StoreCode};

/// A customer's upload batch addressed to one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOrder {
    pub id: OrderId,
    /// Owning store. Never changes after creation.
    #[serde(rename = "storeId")]
    pub store_code: StoreCode,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    /// Ordered list of stored files.
    pub files: Vec<FileRef>,
    pub status: OrderStatus,
    /// TTL origin.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrintOrder {
    /// Whether the order is past its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, ttl: OrderTtl, now: DateTime<Utc>) -> bool {
        ttl.is_expired(self.created_at, now)
    }
}

/// Data required to insert an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub store_code: StoreCode,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub files: Vec<FileRef>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// The order as it looks once stored with its initial status.
    #[must_use]
    pub fn into_order(self) -> PrintOrder {
        PrintOrder {
            id: self.id,
            store_code: self.store_code,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            files: self.files,
            status: OrderStatus::Pending,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// An order as shown on the store dashboard, with its countdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: PrintOrder,
    /// Whole seconds until the order expires.
    pub time_remaining: u64,
}

impl OrderView {
    #[must_use]
    pub fn new(order: PrintOrder, ttl: OrderTtl, now: DateTime<Utc>) -> Self {
        let time_remaining = ttl.time_remaining(order.created_at, now);
        Self {
            order,
            time_remaining,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_view_wire_shape() {
        let created_at = Utc::now();
        let order = NewOrder {
            id: OrderId::generate(),
            store_code: StoreCode::parse("SHOP1").unwrap(),
            customer_name: Some("Ada".to_string()),
            customer_phone: None,
            files: Vec::new(),
            created_at,
        }
        .into_order();

        let view = OrderView::new(order, OrderTtl::from_secs(300), created_at);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["storeId"], "SHOP1");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["customerName"], "Ada");
        assert_eq!(json["timeRemaining"], 300);
        assert!(json["files"].as_array().unwrap().is_empty());
    }
}
