//! Customer upload pipeline.
//!
//! Validation covers every file before anything is written. Writes then
//! happen in order; if one fails, the files already written are deleted
//! (best effort) and no order is created. The order row is inserted last, so
//! a reader never sees an order whose files are still being written.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use printdrop_core::{FileKind, FileRef, OrderId, OrderTtl, PrintSettings, StorageKey, StoreCode};

use crate::error::{AppError, ValidationError};
use crate::models::NewOrder;
use crate::services::Backends;
use crate::storage::{FileMetadata, StorageError};

/// Attempts per file when a generated key is already in use.
const MAX_PUT_ATTEMPTS: u32 = 3;

/// Size, count and type limits applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    /// Per-file limit in bytes.
    pub max_file_size: u64,
    pub max_files: usize,
    /// Accepted formats.
    pub allowed: Vec<FileKind>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_files: 20,
            allowed: FileKind::ALL.to_vec(),
        }
    }
}

impl UploadLimits {
    /// Largest request body worth reading: every file at the limit plus
    /// room for the text fields and multipart framing.
    #[must_use]
    pub fn body_limit(&self) -> usize {
        let files = usize::try_from(self.max_file_size)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.max_files);
        files.saturating_add(1024 * 1024)
    }
}

/// One file part of an upload.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Client-supplied file name.
    pub name: String,
    /// Client-declared MIME type.
    pub declared_type: String,
    /// File contents. Empty when the part was too large to keep.
    pub bytes: Bytes,
    /// Bytes received for the part.
    pub size: u64,
}

impl IncomingFile {
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// A part whose `size` bytes were counted but not kept.
    #[must_use]
    pub fn oversized(name: impl Into<String>, declared_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes: Bytes::new(),
            size,
        }
    }
}

/// A customer's upload as received.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub store_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub files: Vec<IncomingFile>,
}

/// One stored file in the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptFile {
    /// Storage key.
    pub file_name: StorageKey,
    pub original_name: String,
    pub upload_time: DateTime<Utc>,
}

/// What the customer gets back after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub order_id: OrderId,
    /// Seconds until the order expires.
    pub expiration_time: u64,
    pub files: Vec<ReceiptFile>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts customer uploads.
pub struct UploadService<'a> {
    backends: &'a Backends,
    limits: &'a UploadLimits,
    ttl: OrderTtl,
}

impl<'a> UploadService<'a> {
    #[must_use]
    pub const fn new(backends: &'a Backends, limits: &'a UploadLimits, ttl: OrderTtl) -> Self {
        Self {
            backends,
            limits,
            ttl,
        }
    }

    /// Validate, store and record an upload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` variants for bad input, `AppError::NotFound`
    /// for an unknown or inactive store, and a storage or repository error if
    /// persisting fails (in which case nothing is left referenced).
    #[instrument(skip(self, request), fields(store_id = ?request.store_id, files = request.files.len()))]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, AppError> {
        let store_code = self.resolve_store(request.store_id.as_deref()).await?;
        self.validate_files(&request.files)?;

        let files = self.write_files(&store_code, &request.files).await?;

        let created_at = self.backends.clock.now();
        let order = NewOrder {
            id: OrderId::generate(),
            store_code: store_code.clone(),
            customer_name: non_empty(request.customer_name),
            customer_phone: non_empty(request.customer_phone),
            files,
            created_at,
        };
        let keys: Vec<StorageKey> = order.files.iter().map(|f| f.storage_key.clone()).collect();

        let order = match self.backends.orders.create(order).await {
            Ok(order) => order,
            Err(e) => {
                self.discard(&keys).await;
                return Err(e.into());
            }
        };

        tracing::info!(order_id = %order.id, store_id = %store_code, files = order.files.len(), "Order created");

        Ok(UploadReceipt {
            order_id: order.id,
            expiration_time: self.ttl.as_secs(),
            files: order
                .files
                .into_iter()
                .map(|f| ReceiptFile {
                    file_name: f.storage_key,
                    original_name: f.original_name,
                    upload_time: f.uploaded_at,
                })
                .collect(),
        })
    }

    async fn resolve_store(&self, raw: Option<&str>) -> Result<StoreCode, AppError> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("storeId"))?;
        let not_found = || AppError::NotFound("Store not found or inactive".to_string());

        let code = StoreCode::parse(raw).map_err(|_| not_found())?;
        let store = self
            .backends
            .stores
            .get_by_code(&code)
            .await?
            .ok_or_else(not_found)?;
        if !store.is_active() {
            return Err(not_found());
        }
        Ok(code)
    }

    fn validate_files(&self, files: &[IncomingFile]) -> Result<(), ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::NoFiles);
        }
        if files.len() > self.limits.max_files {
            return Err(ValidationError::TooManyFiles {
                count: files.len(),
                max: self.limits.max_files,
            });
        }
        for file in files {
            if file.size > self.limits.max_file_size {
                return Err(ValidationError::PayloadTooLarge {
                    name: file.name.clone(),
                    size: file.size,
                    max: self.limits.max_file_size,
                });
            }
        }
        for file in files {
            let allowed = FileKind::from_mime(&file.declared_type)
                .is_some_and(|kind| self.limits.allowed.contains(&kind));
            if !allowed {
                return Err(ValidationError::UnsupportedType {
                    name: file.name.clone(),
                    declared: file.declared_type.clone(),
                });
            }
        }
        Ok(())
    }

    async fn write_files(
        &self,
        store: &StoreCode,
        files: &[IncomingFile],
    ) -> Result<Vec<FileRef>, AppError> {
        let mut written: Vec<FileRef> = Vec::with_capacity(files.len());

        for file in files {
            match self.put_with_retry(store, file).await {
                Ok(key) => written.push(FileRef {
                    storage_key: key,
                    original_name: file.name.clone(),
                    size_bytes: file.bytes.len() as u64,
                    mime_type: file.declared_type.clone(),
                    uploaded_at: self.backends.clock.now(),
                    print_settings: PrintSettings::default(),
                }),
                Err(e) => {
                    tracing::error!(error = %e, file = %file.name, "Upload write failed");
                    let keys: Vec<StorageKey> =
                        written.into_iter().map(|f| f.storage_key).collect();
                    self.discard(&keys).await;
                    return Err(e.into());
                }
            }
        }
        Ok(written)
    }

    async fn put_with_retry(
        &self,
        store: &StoreCode,
        file: &IncomingFile,
    ) -> Result<StorageKey, StorageError> {
        let metadata = FileMetadata {
            original_name: file.name.clone(),
            mime_type: file.declared_type.clone(),
            size_bytes: file.bytes.len() as u64,
        };

        let mut attempt = 1;
        loop {
            match self
                .backends
                .content
                .put(store, &file.name, file.bytes.clone(), &metadata)
                .await
            {
                Err(StorageError::KeyCollision(key)) if attempt < MAX_PUT_ATTEMPTS => {
                    tracing::debug!(key = %key, attempt, "Storage key collision, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Delete keys written for an upload that will not be recorded.
    async fn discard(&self, keys: &[StorageKey]) {
        for key in keys {
            if let Err(e) = self.backends.content.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to clean up uploaded file");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, len: usize) -> IncomingFile {
        IncomingFile::new(name, mime, Bytes::from(vec![0u8; len]))
    }

    fn limits() -> UploadLimits {
        UploadLimits {
            max_file_size: 100,
            max_files: 2,
            allowed: vec![FileKind::Pdf, FileKind::Png],
        }
    }

    fn check(files: &[IncomingFile]) -> Result<(), ValidationError> {
        let backends = Backends::in_memory();
        let limits = limits();
        UploadService::new(&backends, &limits, OrderTtl::default()).validate_files(files)
    }

    #[test]
    fn test_validation_order() {
        assert_eq!(check(&[]), Err(ValidationError::NoFiles));
        assert!(matches!(
            check(&[
                file("a.pdf", "application/pdf", 1),
                file("b.pdf", "application/pdf", 1),
                file("c.pdf", "application/pdf", 1),
            ]),
            Err(ValidationError::TooManyFiles { count: 3, max: 2 })
        ));
        // Size is checked across all files before type
        assert!(matches!(
            check(&[
                file("a.gif", "image/gif", 1),
                file("b.pdf", "application/pdf", 101),
            ]),
            Err(ValidationError::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            check(&[file("a.docx", FileKind::Docx.mime_type(), 1)]),
            Err(ValidationError::UnsupportedType { .. })
        ));
        assert!(check(&[file("a.pdf", "application/pdf", 100)]).is_ok());
    }

    #[test]
    fn test_counted_size_rejects_truncated_part() {
        let err = check(&[IncomingFile::oversized("big.pdf", "application/pdf", 5000)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::PayloadTooLarge {
                name: "big.pdf".to_string(),
                size: 5000,
                max: 100,
            }
        );
    }

    #[test]
    fn test_body_limit_covers_all_files() {
        let limits = limits();
        assert!(limits.body_limit() >= 200);
        let huge = UploadLimits {
            max_file_size: u64::MAX,
            ..limits
        };
        assert_eq!(huge.body_limit(), usize::MAX);
    }

    #[test]
    fn test_blank_customer_fields_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" Ada ".to_string())), Some("Ada".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
