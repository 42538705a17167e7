//! Print retrieval: an order's files, inline, for the store's print client.
//!
//! Retrieval is tolerant per file. A file that cannot be read (reaped
//! concurrently, storage error, timeout) is logged and left out; the rest of
//! the order is still returned.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use tracing::instrument;

use printdrop_core::{FileKind, FileRef, OrderId, OrderTtl, PrintSettings};

use crate::error::AppError;
use crate::services::Backends;
use crate::services::auth::StoreClaims;
use crate::services::convert::{DocumentConverter, pdf_name};

/// One file ready to print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintFile {
    pub name: String,
    /// MIME type of `content`.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 (standard alphabet) file bytes.
    pub content: String,
    pub print_settings: PrintSettings,
}

/// An order's printable payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: OrderId,
    pub customer_name: Option<String>,
    pub files: Vec<PrintFile>,
}

/// Assembles print jobs for authenticated stores.
pub struct PrintService<'a> {
    backends: &'a Backends,
    ttl: OrderTtl,
    converter: Option<&'a Arc<dyn DocumentConverter>>,
}

impl<'a> PrintService<'a> {
    #[must_use]
    pub const fn new(
        backends: &'a Backends,
        ttl: OrderTtl,
        converter: Option<&'a Arc<dyn DocumentConverter>>,
    ) -> Self {
        Self {
            backends,
            ttl,
            converter,
        }
    }

    /// Load `order_id` for the store in `claims`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order is absent or expired and
    /// `AppError::Forbidden` if it belongs to a different store.
    #[instrument(skip(self, claims), fields(store_id = %claims.store_id, order_id = %order_id))]
    pub async fn retrieve(
        &self,
        claims: &StoreClaims,
        order_id: OrderId,
    ) -> Result<PrintJob, AppError> {
        let now = self.backends.clock.now();
        let order = self
            .backends
            .orders
            .get(order_id)
            .await?
            .filter(|order| !order.is_expired(self.ttl, now))
            .ok_or_else(|| AppError::NotFound("Order not found or expired".to_string()))?;

        if order.store_code != claims.store_id {
            return Err(AppError::Forbidden(
                "Order belongs to another store".to_string(),
            ));
        }

        let reads = join_all(order.files.iter().map(|file| self.read(file))).await;
        let wanted = order.files.len();
        let files: Vec<PrintFile> = reads.into_iter().flatten().collect();

        if files.len() < wanted {
            tracing::warn!(
                missing = wanted - files.len(),
                returned = files.len(),
                "Some order files could not be read"
            );
        }

        Ok(PrintJob {
            id: order.id,
            customer_name: order.customer_name,
            files,
        })
    }

    async fn read(&self, file: &FileRef) -> Option<PrintFile> {
        let bytes = match self.backends.content.get(&file.storage_key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %file.storage_key, error = %e, "Skipping unreadable file");
                return None;
            }
        };

        let (name, mime_type, bytes) = self.normalize(file, bytes).await;
        Some(PrintFile {
            name,
            mime_type,
            content: STANDARD.encode(&bytes),
            print_settings: file.print_settings,
        })
    }

    /// Convert non-print-ready documents to PDF when a converter is set.
    /// A failed conversion keeps the original bytes.
    async fn normalize(&self, file: &FileRef, bytes: Bytes) -> (String, String, Bytes) {
        let original = (file.original_name.clone(), file.mime_type.clone());
        let (Some(converter), Some(kind)) = (self.converter, file.kind()) else {
            return (original.0, original.1, bytes);
        };
        if kind.is_print_ready() {
            return (original.0, original.1, bytes);
        }

        match converter
            .to_pdf(&file.original_name, kind, bytes.clone())
            .await
        {
            Ok(pdf) => {
                tracing::debug!(key = %file.storage_key, converter = converter.name(), "Converted to PDF");
                (
                    pdf_name(&file.original_name),
                    FileKind::Pdf.mime_type().to_string(),
                    pdf,
                )
            }
            Err(e) => {
                tracing::warn!(key = %file.storage_key, error = %e, "Conversion failed, sending original");
                (original.0, original.1, bytes)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use printdrop_core::{Email, ManualClock, StoreCode};

    use super::*;
    use crate::db::memory::{MemoryOrderRepository, MemoryStoreRepository};
    use crate::models::NewOrder;
    use crate::services::convert::ConversionError;
    use crate::storage::{FileMetadata, MemoryStore};

    struct Fixture {
        backends: Backends,
        content: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let content = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let backends = Backends::new(
            Arc::new(MemoryStoreRepository::new()),
            Arc::new(MemoryOrderRepository::new()),
            content.clone(),
            clock.clone(),
        );
        Fixture {
            backends,
            content,
            clock,
        }
    }

    fn claims(code: &str) -> StoreClaims {
        let now = Utc::now();
        StoreClaims {
            store_id: StoreCode::parse(code).unwrap(),
            email: Email::parse("owner@shop.example").unwrap(),
            issued_at: now,
            expires_at: now,
        }
    }

    async fn seed(fx: &Fixture, store: &str, files: &[(&str, FileKind, &[u8])]) -> OrderId {
        let store = StoreCode::parse(store).unwrap();
        let mut refs = Vec::new();
        for (name, kind, bytes) in files {
            let metadata = FileMetadata {
                original_name: (*name).to_string(),
                mime_type: kind.mime_type().to_string(),
                size_bytes: bytes.len() as u64,
            };
            let key = fx
                .backends
                .content
                .put(&store, name, Bytes::copy_from_slice(bytes), &metadata)
                .await
                .unwrap();
            refs.push(FileRef {
                storage_key: key,
                original_name: (*name).to_string(),
                size_bytes: bytes.len() as u64,
                mime_type: kind.mime_type().to_string(),
                uploaded_at: fx.backends.clock.now(),
                print_settings: PrintSettings::default(),
            });
        }
        let order = NewOrder {
            id: OrderId::generate(),
            store_code: store,
            customer_name: Some("Ada".to_string()),
            customer_phone: None,
            files: refs,
            created_at: fx.backends.clock.now(),
        };
        fx.backends.orders.create(order).await.unwrap().id
    }

    struct FakeConverter {
        fail: bool,
    }

    #[async_trait]
    impl DocumentConverter for FakeConverter {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn to_pdf(
            &self,
            _file_name: &str,
            _kind: FileKind,
            _bytes: Bytes,
        ) -> Result<Bytes, ConversionError> {
            if self.fail {
                Err(ConversionError::NoOutput)
            } else {
                Ok(Bytes::from_static(b"%PDF-converted"))
            }
        }
    }

    #[tokio::test]
    async fn test_retrieve_encodes_files() {
        let fx = fixture();
        let payload: &[u8] = &[0, 159, 146, 150, 255];
        let id = seed(&fx, "SHOP1", &[("scan.png", FileKind::Png, payload)]).await;

        let job = PrintService::new(&fx.backends, OrderTtl::default(), None)
            .retrieve(&claims("SHOP1"), id)
            .await
            .unwrap();

        assert_eq!(job.id, id);
        assert_eq!(job.customer_name.as_deref(), Some("Ada"));
        assert_eq!(job.files.len(), 1);
        assert_eq!(job.files[0].name, "scan.png");
        assert_eq!(job.files[0].mime_type, "image/png");
        assert_eq!(STANDARD.decode(&job.files[0].content).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_retrieve_other_store_is_forbidden() {
        let fx = fixture();
        let id = seed(&fx, "SHOP1", &[("a.pdf", FileKind::Pdf, b"%PDF")]).await;

        let err = PrintService::new(&fx.backends, OrderTtl::default(), None)
            .retrieve(&claims("OTHER1"), id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_retrieve_expired_is_not_found() {
        let fx = fixture();
        let ttl = OrderTtl::from_secs(300);
        let id = seed(&fx, "SHOP1", &[("a.pdf", FileKind::Pdf, b"%PDF")]).await;
        fx.clock.advance(Duration::from_secs(300));

        let err = PrintService::new(&fx.backends, ttl, None)
            .retrieve(&claims("SHOP1"), id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_skipped() {
        let fx = fixture();
        let id = seed(
            &fx,
            "SHOP1",
            &[
                ("a.pdf", FileKind::Pdf, b"%PDF-a"),
                ("b.pdf", FileKind::Pdf, b"%PDF-b"),
            ],
        )
        .await;
        let order = fx.backends.orders.get(id).await.unwrap().unwrap();
        fx.content.remove(&order.files[0].storage_key).unwrap();

        let job = PrintService::new(&fx.backends, OrderTtl::default(), None)
            .retrieve(&claims("SHOP1"), id)
            .await
            .unwrap();
        assert_eq!(job.files.len(), 1);
        assert_eq!(job.files[0].name, "b.pdf");
    }

    #[tokio::test]
    async fn test_documents_converted_when_possible() {
        let fx = fixture();
        let id = seed(
            &fx,
            "SHOP1",
            &[
                ("letter.docx", FileKind::Docx, b"PK-docx"),
                ("photo.jpg", FileKind::Jpeg, b"JFIF"),
            ],
        )
        .await;

        let converter: Arc<dyn DocumentConverter> = Arc::new(FakeConverter { fail: false });
        let job = PrintService::new(&fx.backends, OrderTtl::default(), Some(&converter))
            .retrieve(&claims("SHOP1"), id)
            .await
            .unwrap();

        let letter = job.files.iter().find(|f| f.name == "letter.pdf").unwrap();
        assert_eq!(letter.mime_type, "application/pdf");
        assert_eq!(STANDARD.decode(&letter.content).unwrap(), b"%PDF-converted");
        // Print-ready files pass through untouched
        let photo = job.files.iter().find(|f| f.name == "photo.jpg").unwrap();
        assert_eq!(STANDARD.decode(&photo.content).unwrap(), b"JFIF");
    }

    #[tokio::test]
    async fn test_failed_conversion_keeps_original() {
        let fx = fixture();
        let id = seed(&fx, "SHOP1", &[("letter.docx", FileKind::Docx, b"PK-docx")]).await;

        let converter: Arc<dyn DocumentConverter> = Arc::new(FakeConverter { fail: true });
        let job = PrintService::new(&fx.backends, OrderTtl::default(), Some(&converter))
            .retrieve(&claims("SHOP1"), id)
            .await
            .unwrap();

        assert_eq!(job.files[0].name, "letter.docx");
        assert_eq!(job.files[0].mime_type, FileKind::Docx.mime_type());
        assert_eq!(STANDARD.decode(&job.files[0].content).unwrap(), b"PK-docx");
    }
}
