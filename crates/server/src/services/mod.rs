//! Business logic, independent of HTTP.
//!
//! Services borrow their collaborators from a [`Backends`] bundle and are
//! built per call, the way route handlers build them from `AppState`.

pub mod auth;
pub mod convert;
pub mod orders;
pub mod print;
pub mod reaper;
pub mod stores;
pub mod upload;

use std::sync::Arc;

use printdrop_core::Clock;

use crate::db::{OrderRepository, StoreRepository};
use crate::storage::ContentStore;

/// Repositories, content store and clock shared by every service.
#[derive(Clone)]
pub struct Backends {
    pub stores: Arc<dyn StoreRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub content: Arc<dyn ContentStore>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    #[must_use]
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        orders: Arc<dyn OrderRepository>,
        content: Arc<dyn ContentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stores,
            orders,
            content,
            clock,
        }
    }

    /// Fresh in-memory repositories and content store on the wall clock.
    #[cfg(any(test, feature = "testkit"))]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(crate::db::memory::MemoryStoreRepository::new()),
            Arc::new(crate::db::memory::MemoryOrderRepository::new()),
            Arc::new(crate::storage::MemoryStore::new()),
            Arc::new(printdrop_core::SystemClock),
        )
    }
}
