//! Content store behavior shared by every backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use printdrop_core::StoreCode;
use printdrop_server::storage::{
    BoundedStore, ContentStore, FileMetadata, FilesystemStore, MemoryStore, StorageError,
};

/// Every byte value, plus bytes that are not valid UTF-8 in sequence.
fn binary_payload() -> Bytes {
    let mut bytes: Vec<u8> = (0..=255u8).collect();
    bytes.extend_from_slice(&[0xff, 0xfe, 0x00, 0x00, 0xc3, 0x28, b'\r', b'\n']);
    bytes.extend(std::iter::repeat_n(0u8, 4096));
    Bytes::from(bytes)
}

fn metadata(name: &str, bytes: &Bytes) -> FileMetadata {
    FileMetadata {
        original_name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        size_bytes: bytes.len() as u64,
    }
}

async fn check_round_trip(store: &dyn ContentStore) {
    let shop = StoreCode::parse("SHOP123").unwrap();
    let payload = binary_payload();

    let key = store
        .put(&shop, "scan 01.pdf", payload.clone(), &metadata("scan 01.pdf", &payload))
        .await
        .unwrap();
    assert_eq!(key.namespace(), "SHOP123");
    assert_eq!(store.get(&key).await.unwrap(), payload);

    // Same name again gets its own key
    let empty = Bytes::new();
    let second = store
        .put(&shop, "scan 01.pdf", empty.clone(), &metadata("scan 01.pdf", &empty))
        .await
        .unwrap();
    assert_ne!(key, second);
    assert_eq!(store.get(&second).await.unwrap(), empty);
    assert_eq!(store.get(&key).await.unwrap(), payload);

    store.delete(&key).await.unwrap();
    assert!(matches!(
        store.get(&key).await,
        Err(StorageError::NotFound(_))
    ));
    // Deleting again is fine
    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&second).await.unwrap(), empty);
}

#[tokio::test]
async fn memory_store_round_trip() {
    check_round_trip(&MemoryStore::new()).await;
}

#[tokio::test]
async fn filesystem_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::open(dir.path()).await.unwrap();
    check_round_trip(&store).await;
}

#[tokio::test]
async fn filesystem_keys_stay_inside_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::open(dir.path()).await.unwrap();
    let shop = StoreCode::parse("SHOP123").unwrap();
    let bytes = Bytes::from_static(b"%PDF");

    let key = store
        .put(&shop, "../../etc/passwd", bytes.clone(), &metadata("x", &bytes))
        .await
        .unwrap();

    let path = store.path_for(&key);
    assert!(path.starts_with(dir.path()));
    assert!(!key.file_name().contains('/'));
    assert_eq!(store.get(&key).await.unwrap(), bytes);
}

#[tokio::test]
async fn bounded_store_passes_results_through() {
    let inner = Arc::new(MemoryStore::new());
    let store = BoundedStore::new(inner.clone(), Duration::from_secs(5));
    check_round_trip(&store).await;

    inner.fail_gets(true);
    let shop = StoreCode::parse("SHOP123").unwrap();
    let bytes = Bytes::from_static(b"x");
    let key = store
        .put(&shop, "a.pdf", bytes.clone(), &metadata("a.pdf", &bytes))
        .await
        .unwrap();
    assert!(matches!(
        store.get(&key).await,
        Err(StorageError::Backend(_))
    ));
}
