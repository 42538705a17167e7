//! In-memory repositories for tests.
//!
//! Each operation runs under one mutex, which gives the same atomicity the
//! single-statement SQL implementations get from `PostgreSQL`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use printdrop_core::{Email, OrderId, OrderStatus, StoreCode, StoreRecordId, StoreStatus};

use super::{
    CONFLICT_EMAIL, CONFLICT_STORE_CODE, OrderRepository, RepositoryError, StoreRepository,
};
use crate::models::{NewOrder, NewStore, PrintOrder, Store};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Store accounts kept in a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryStoreRepository {
    stores: Mutex<Vec<Store>>,
}

impl MemoryStoreRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, bypassing uniqueness checks. Useful for
    /// seeding legacy rows without a store code.
    pub fn insert_raw(&self, store: Store) {
        lock(&self.stores).push(store);
    }
}

#[async_trait]
impl StoreRepository for MemoryStoreRepository {
    async fn get_by_code(&self, code: &StoreCode) -> Result<Option<Store>, RepositoryError> {
        Ok(lock(&self.stores)
            .iter()
            .find(|s| s.store_code.as_ref() == Some(code))
            .cloned())
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<Store>, RepositoryError> {
        Ok(lock(&self.stores).iter().find(|s| s.email == *email).cloned())
    }

    async fn code_exists(&self, code: &StoreCode) -> Result<bool, RepositoryError> {
        Ok(lock(&self.stores)
            .iter()
            .any(|s| s.store_code.as_ref() == Some(code)))
    }

    async fn create(&self, store: NewStore) -> Result<Store, RepositoryError> {
        let mut stores = lock(&self.stores);
        if stores.iter().any(|s| s.email == store.email) {
            return Err(RepositoryError::Conflict(CONFLICT_EMAIL.to_string()));
        }
        if stores
            .iter()
            .any(|s| s.store_code.as_ref() == Some(&store.store_code))
        {
            return Err(RepositoryError::Conflict(CONFLICT_STORE_CODE.to_string()));
        }

        let record = Store {
            id: StoreRecordId::generate(),
            store_code: Some(store.store_code),
            store_name: store.store_name,
            owner_name: store.owner_name,
            email: store.email,
            password_hash: store.password_hash,
            address: store.address,
            phone: store.phone,
            status: StoreStatus::Active,
            created_at: store.created_at,
        };
        stores.push(record.clone());
        Ok(record)
    }

    async fn assign_code(
        &self,
        id: StoreRecordId,
        code: &StoreCode,
    ) -> Result<Store, RepositoryError> {
        let mut stores = lock(&self.stores);
        if stores.iter().any(|s| s.store_code.as_ref() == Some(code)) {
            return Err(RepositoryError::Conflict(CONFLICT_STORE_CODE.to_string()));
        }
        let store = stores
            .iter_mut()
            .find(|s| s.id == id && s.store_code.is_none())
            .ok_or(RepositoryError::NotFound)?;
        store.store_code = Some(code.clone());
        Ok(store.clone())
    }

    async fn set_status(
        &self,
        code: &StoreCode,
        status: StoreStatus,
    ) -> Result<Store, RepositoryError> {
        let mut stores = lock(&self.stores);
        let store = stores
            .iter_mut()
            .find(|s| s.store_code.as_ref() == Some(code))
            .ok_or(RepositoryError::NotFound)?;
        store.status = status;
        Ok(store.clone())
    }
}

/// Print orders kept in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryOrderRepository {
    orders: Mutex<HashMap<OrderId, PrintOrder>>,
}

impl MemoryOrderRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.orders).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn create(&self, order: NewOrder) -> Result<PrintOrder, RepositoryError> {
        let mut orders = lock(&self.orders);
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict("id".to_string()));
        }
        let order = order.into_order();
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<PrintOrder>, RepositoryError> {
        Ok(lock(&self.orders).get(&id).cloned())
    }

    async fn list_active(
        &self,
        store: &StoreCode,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<PrintOrder>, RepositoryError> {
        let mut found: Vec<PrintOrder> = lock(&self.orders)
            .values()
            .filter(|o| {
                o.store_code == *store && o.status.is_active() && o.created_at > created_after
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
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
        let mut orders = lock(&self.orders);
        let Some(order) = orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.store_code != *store
            || !from.contains(&order.status)
            || order.created_at <= created_after
        {
            return Ok(None);
        }
        order.status = to;
        order.updated_at = now;
        Ok(Some(order.clone()))
    }

    async fn delete_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PrintOrder>, RepositoryError> {
        let mut orders = lock(&self.orders);
        let expired: Vec<OrderId> = orders
            .values()
            .filter(|o| o.created_at <= cutoff)
            .map(|o| o.id)
            .collect();
        Ok(expired
            .into_iter()
            .filter_map(|id| orders.remove(&id))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn new_order(store: &str, created_at: DateTime<Utc>) -> NewOrder {
        NewOrder {
            id: OrderId::generate(),
            store_code: StoreCode::parse(store).unwrap(),
            customer_name: None,
            customer_phone: None,
            files: Vec::new(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_transition_requires_every_condition() {
        let repo = MemoryOrderRepository::new();
        let now = Utc::now();
        let order = repo.create(new_order("SHOP1", now)).await.unwrap();
        let shop = StoreCode::parse("SHOP1").unwrap();
        let other = StoreCode::parse("SHOP2").unwrap();
        let cutoff = now - TimeDelta::seconds(300);

        // Wrong store
        assert!(
            repo.transition(order.id, &other, &[OrderStatus::Pending], OrderStatus::Processing, cutoff, now)
                .await
                .unwrap()
                .is_none()
        );
        // Wrong source status
        assert!(
            repo.transition(order.id, &shop, &[OrderStatus::Processing], OrderStatus::Completed, cutoff, now)
                .await
                .unwrap()
                .is_none()
        );
        // Expired
        assert!(
            repo.transition(order.id, &shop, &[OrderStatus::Pending], OrderStatus::Processing, now, now)
                .await
                .unwrap()
                .is_none()
        );

        let updated = repo
            .transition(order.id, &shop, &[OrderStatus::Pending], OrderStatus::Processing, cutoff, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_delete_expired_is_inclusive_of_cutoff() {
        let repo = MemoryOrderRepository::new();
        let now = Utc::now();
        let at_cutoff = repo.create(new_order("SHOP1", now)).await.unwrap();
        let after = repo
            .create(new_order("SHOP1", now + TimeDelta::milliseconds(1)))
            .await
            .unwrap();

        let removed = repo.delete_expired(now).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, at_cutoff.id);
        assert!(repo.get(after.id).await.unwrap().is_some());
        assert!(repo.delete_expired(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_uniqueness() {
        let repo = MemoryStoreRepository::new();
        let store = NewStore {
            store_code: StoreCode::parse("SHOP1").unwrap(),
            store_name: "Shop".to_string(),
            owner_name: "Owner".to_string(),
            email: Email::parse("a@shop.example").unwrap(),
            password_hash: "hash".to_string(),
            address: "addr".to_string(),
            phone: "1".to_string(),
            created_at: Utc::now(),
        };
        repo.create(store.clone()).await.unwrap();

        let err = repo.create(store.clone()).await.unwrap_err();
        assert!(err.is_conflict_on(CONFLICT_EMAIL));

        let mut same_code = store;
        same_code.email = Email::parse("b@shop.example").unwrap();
        let err = repo.create(same_code).await.unwrap_err();
        assert!(err.is_conflict_on(CONFLICT_STORE_CODE));
    }
}
