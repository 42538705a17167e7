//! Status enums and the print order state machine.
//!
//! ```text
//!             print              completed
//!   pending ─────────▶ processing ─────────▶ completed
//!      │                    │
//!      │ cancelled          │ cancelled
//!      └────────────────────┴──────────────▶ cancelled
//! ```
//!
//! Terminal states never delete an order; removal is left to the reaper once
//! the order's TTL has elapsed.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a print order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Uploaded and waiting for the store.
    #[default]
    Pending,
    /// The store has started printing.
    Processing,
    /// Printed and handed over.
    Completed,
    /// Dropped by the store.
    Cancelled,
}

impl OrderStatus {
    /// Statuses that appear in a store's active order listing.
    pub const ACTIVE: [Self; 2] = [Self::Pending, Self::Processing];

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the order is still actionable by the store.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Completed | Self::Cancelled)
        )
    }

    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store-initiated request to move an order through its lifecycle.
///
/// Parsed from the `action` field of an order update. `print` is the
/// dashboard's name for starting work on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum OrderAction {
    /// Start printing: `pending → processing`.
    Print,
    /// Finish: `processing → completed`.
    Complete,
    /// Abandon: `pending | processing → cancelled`.
    Cancel,
}

impl OrderAction {
    /// Status the order ends up in when the action succeeds.
    #[must_use]
    pub const fn target(self) -> OrderStatus {
        match self {
            Self::Print => OrderStatus::Processing,
            Self::Complete => OrderStatus::Completed,
            Self::Cancel => OrderStatus::Cancelled,
        }
    }

    /// Statuses from which this action is legal.
    #[must_use]
    pub const fn allowed_from(self) -> &'static [OrderStatus] {
        match self {
            Self::Print => &[OrderStatus::Pending],
            Self::Complete => &[OrderStatus::Processing],
            Self::Cancel => &[OrderStatus::Pending, OrderStatus::Processing],
        }
    }

    /// Whether the action may be applied to an order in `current`.
    #[must_use]
    pub fn applies_to(self, current: OrderStatus) -> bool {
        self.allowed_from().contains(&current)
    }
}

impl std::str::FromStr for OrderAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "print" | "processing" => Ok(Self::Print),
            "complete" | "completed" => Ok(Self::Complete),
            "cancel" | "cancelled" => Ok(Self::Cancel),
            other => Err(format!("invalid order action: {other}")),
        }
    }
}

impl TryFrom<String> for OrderAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whether a store can receive uploads and log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    #[default]
    Active,
    Inactive,
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
        }
    }
}
