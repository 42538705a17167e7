//! `PostgreSQL` repositories and the database content store.
//!
//! These tests require a reachable `PostgreSQL` database named by
//! `PRINTDROP_DATABASE_URL` (or `DATABASE_URL`). Migrations are applied on
//! connect.
//!
//! Run with: `cargo test -p printdrop-integration-tests --test postgres -- --ignored`

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use futures::future::join_all;

use printdrop_core::{
    Email, FileKind, FileRef, ManualClock, OrderId, OrderStatus, OrderTtl, PrintSettings,
    StoreCode, StoreStatus,
};
use printdrop_server::config::database_url_from_env;
use printdrop_server::db::{
    CONFLICT_EMAIL, CONFLICT_STORE_CODE, LazyPool, OrderRepository, PgOrderRepository,
    PgStoreRepository, RepositoryError, StoreRepository, create_pool,
};
use printdrop_server::models::{NewOrder, NewStore};
use printdrop_server::services::Backends;
use printdrop_server::services::reaper::Reaper;
use printdrop_server::storage::{ContentStore, DatabaseBlobStore, FileMetadata, StorageError};

async fn connect() -> Arc<LazyPool> {
    let url = database_url_from_env().expect("PRINTDROP_DATABASE_URL or DATABASE_URL is set");
    let pool = create_pool(&url).await.expect("database is reachable");
    sqlx::migrate!("../server/migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    Arc::new(LazyPool::from_pool(pool))
}

/// A store code no other run has used.
fn unique_code() -> StoreCode {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(10)
        .collect();
    StoreCode::parse(&format!("PG{}", suffix.to_ascii_uppercase())).unwrap()
}

fn new_store(code: &StoreCode, email: &str) -> NewStore {
    NewStore {
        store_code: code.clone(),
        store_name: "Pg Print".to_string(),
        owner_name: "Owner".to_string(),
        email: Email::parse(email).unwrap(),
        password_hash: "not-a-real-hash".to_string(),
        address: "1 Main St".to_string(),
        phone: "555-0100".to_string(),
        created_at: Utc::now(),
    }
}

fn new_order(store: &StoreCode, created_at: DateTime<Utc>, files: Vec<FileRef>) -> NewOrder {
    NewOrder {
        id: OrderId::generate(),
        store_code: store.clone(),
        customer_name: Some("Ada".to_string()),
        customer_phone: None,
        files,
        created_at,
    }
}

fn binary_payload() -> Bytes {
    let mut bytes: Vec<u8> = (0..=255u8).rev().collect();
    bytes.extend_from_slice(&[0x00, 0x00, 0xc3, 0x28, b'\\', b'\'']);
    Bytes::from(bytes)
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn blob_store_round_trips_binary_content() {
    let store = DatabaseBlobStore::new(connect().await);
    let shop = unique_code();
    let payload = binary_payload();
    let metadata = FileMetadata {
        original_name: "scan 01.pdf".to_string(),
        mime_type: FileKind::Pdf.mime_type().to_string(),
        size_bytes: payload.len() as u64,
    };

    let key = store
        .put(&shop, "scan 01.pdf", payload.clone(), &metadata)
        .await
        .unwrap();
    assert_eq!(key.namespace(), shop.as_str());
    assert_eq!(store.get(&key).await.unwrap(), payload);

    let again = store
        .put(&shop, "scan 01.pdf", Bytes::new(), &metadata)
        .await
        .unwrap();
    assert_ne!(key, again);
    assert!(store.get(&again).await.unwrap().is_empty());

    store.delete(&key).await.unwrap();
    store.delete(&key).await.unwrap();
    assert!(matches!(
        store.get(&key).await,
        Err(StorageError::NotFound(_))
    ));
    store.delete(&again).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn duplicate_email_and_code_conflict() {
    let stores = PgStoreRepository::new(connect().await);
    let code = unique_code();
    let email = format!("{}@pg.example", code.as_str().to_ascii_lowercase());

    let created = stores.create(new_store(&code, &email)).await.unwrap();
    assert_eq!(created.store_code.as_ref(), Some(&code));
    assert!(stores.code_exists(&code).await.unwrap());

    let same_email = stores
        .create(new_store(&unique_code(), &email))
        .await
        .unwrap_err();
    assert!(same_email.is_conflict_on(CONFLICT_EMAIL), "{same_email}");

    let same_code = stores
        .create(new_store(&code, &format!("other-{email}")))
        .await
        .unwrap_err();
    assert!(same_code.is_conflict_on(CONFLICT_STORE_CODE), "{same_code}");

    let inactive = stores
        .set_status(&code, StoreStatus::Inactive)
        .await
        .unwrap();
    assert!(!inactive.is_active());
    assert!(matches!(
        stores
            .set_status(&unique_code(), StoreStatus::Active)
            .await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn transition_has_one_winner_and_respects_expiry() {
    let orders = PgOrderRepository::new(connect().await);
    let shop = unique_code();
    let ttl = OrderTtl::from_secs(300);
    let now = Utc::now();
    let cutoff = ttl.cutoff(now);

    let live = orders
        .create(new_order(&shop, now, Vec::new()))
        .await
        .unwrap();
    assert_eq!(live.status, OrderStatus::Pending);

    let attempts = join_all((0..6).map(|_| {
        orders.transition(
            live.id,
            &shop,
            &[OrderStatus::Pending],
            OrderStatus::Processing,
            cutoff,
            now,
        )
    }))
    .await;
    let winners: Vec<_> = attempts.into_iter().filter_map(Result::unwrap).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].status, OrderStatus::Processing);

    // Another store cannot move it
    let foreign = orders
        .transition(
            live.id,
            &unique_code(),
            &[OrderStatus::Processing],
            OrderStatus::Completed,
            cutoff,
            now,
        )
        .await
        .unwrap();
    assert!(foreign.is_none());
    assert_eq!(
        orders.get(live.id).await.unwrap().unwrap().status,
        OrderStatus::Processing
    );

    // Exactly at the TTL the order no longer matches
    let stale = orders
        .create(new_order(
            &shop,
            now - TimeDelta::seconds(300),
            Vec::new(),
        ))
        .await
        .unwrap();
    let expired = orders
        .transition(
            stale.id,
            &shop,
            &[OrderStatus::Pending],
            OrderStatus::Cancelled,
            cutoff,
            now,
        )
        .await
        .unwrap();
    assert!(expired.is_none());

    let listed = orders.list_active(&shop, cutoff).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, live.id);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn reaper_sweep_is_idempotent() {
    let pool = connect().await;
    let content = Arc::new(DatabaseBlobStore::new(pool.clone()));
    let orders = Arc::new(PgOrderRepository::new(pool.clone()));
    // An instant no other test writes near
    let now = Utc.with_ymd_and_hms(1990, 1, 1, 10, 0, 0).single().unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let backends = Backends::new(
        Arc::new(PgStoreRepository::new(pool)),
        orders.clone(),
        content.clone(),
        clock,
    );
    let shop = unique_code();
    let ttl = OrderTtl::from_secs(300);

    let mut expired_keys = Vec::new();
    let mut expired_ids = Vec::new();
    for name in ["a.pdf", "b.pdf"] {
        let bytes = Bytes::from_static(b"%PDF-old");
        let metadata = FileMetadata {
            original_name: name.to_string(),
            mime_type: FileKind::Pdf.mime_type().to_string(),
            size_bytes: bytes.len() as u64,
        };
        let key = content.put(&shop, name, bytes, &metadata).await.unwrap();
        let file = FileRef {
            storage_key: key.clone(),
            original_name: name.to_string(),
            size_bytes: metadata.size_bytes,
            mime_type: metadata.mime_type.clone(),
            uploaded_at: now - TimeDelta::hours(1),
            print_settings: PrintSettings::default(),
        };
        let order = orders
            .create(new_order(&shop, now - TimeDelta::hours(1), vec![file]))
            .await
            .unwrap();
        expired_keys.push(key);
        expired_ids.push(order.id);
    }
    let fresh = orders
        .create(new_order(&shop, now - TimeDelta::seconds(60), Vec::new()))
        .await
        .unwrap();

    let reaper = Reaper::new(&backends, ttl);
    let first = reaper.sweep(now).await.unwrap();
    assert!(first.orders_removed >= 2);
    assert_eq!(first.files_failed, 0);
    for id in &expired_ids {
        assert!(orders.get(*id).await.unwrap().is_none());
    }
    for key in &expired_keys {
        assert!(matches!(
            content.get(key).await,
            Err(StorageError::NotFound(_))
        ));
    }
    assert!(orders.get(fresh.id).await.unwrap().is_some());

    let second = reaper.sweep(now).await.unwrap();
    assert!(second.is_empty(), "{second:?}");
    assert!(orders.get(fresh.id).await.unwrap().is_some());

    // Leave nothing behind from this era
    orders.delete_expired(now).await.unwrap();
}
