//! Integration tests for Printdrop.
//!
//! Everything runs in-process: the services and the full router are driven
//! over in-memory repositories, an in-memory (or temporary filesystem)
//! content store and a manual clock. Apart from the ignored `postgres` tests,
//! no database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p printdrop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `lifecycle` - expiry, reaping and the upload-to-print scenarios
//! - `content_store` - byte fidelity and key handling per backend
//! - `http_api` - the router, end to end
//! - `postgres` - the `PostgreSQL` repositories and blob store (`#[ignore]`d;
//!   needs `PRINTDROP_DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use bytes::Bytes;
use chrono::{TimeZone, Utc};

use printdrop_core::{ManualClock, OrderTtl, StoreCode};
use printdrop_server::config::ServerConfig;
use printdrop_server::db::memory::{MemoryOrderRepository, MemoryStoreRepository};
use printdrop_server::error::AppError;
use printdrop_server::services::Backends;
use printdrop_server::services::auth::{AuthService, RegisterStore, StoreSession};
use printdrop_server::services::upload::{
    IncomingFile, UploadLimits, UploadReceipt, UploadRequest, UploadService,
};
use printdrop_server::storage::MemoryStore;
use printdrop_server::{AppState, app};

/// Order lifetime used by the fixtures.
pub const TEST_TTL: OrderTtl = OrderTtl::from_secs(300);

/// In-process backends with handles to their concrete parts.
pub struct TestContext {
    pub state: AppState,
    pub orders: Arc<MemoryOrderRepository>,
    pub content: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Fresh backends with the clock at a fixed instant.
    #[must_use]
    pub fn new() -> Self {
        let content = Arc::new(MemoryStore::new());
        let orders = Arc::new(MemoryOrderRepository::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        ));
        let backends = Backends::new(
            Arc::new(MemoryStoreRepository::new()),
            orders.clone(),
            content.clone(),
            clock.clone(),
        );

        let mut config = ServerConfig::testkit();
        config.order_ttl = TEST_TTL;
        config.upload = UploadLimits {
            max_file_size: 1024,
            ..UploadLimits::default()
        };

        Self {
            state: AppState::new(config, backends, None),
            orders,
            content,
            clock,
        }
    }

    #[must_use]
    pub fn backends(&self) -> &Backends {
        self.state.backends()
    }

    /// The full router over these backends.
    #[must_use]
    pub fn app(&self) -> Router {
        app(self.state.clone())
    }

    /// Move the shared clock forward.
    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    /// Register a store named `name` with login `email` / `secret1`.
    ///
    /// # Errors
    ///
    /// Returns the registration error, if any.
    pub async fn register_store(&self, name: &str, email: &str) -> Result<StoreSession, AppError> {
        let backends = self.backends();
        let form = RegisterStore {
            store_name: name.to_string(),
            owner_name: "Owner".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            address: "1 Main St".to_string(),
            phone: "555-0100".to_string(),
        };
        let session = AuthService::new(
            backends.stores.as_ref(),
            self.state.tokens(),
            backends.clock.as_ref(),
            &self.state.config().base_url,
        )
        .register(form)
        .await?;
        Ok(session)
    }

    /// Upload `files` to `store` through the upload service.
    ///
    /// # Errors
    ///
    /// Returns the upload error, if any.
    pub async fn upload(
        &self,
        store: &StoreCode,
        files: Vec<IncomingFile>,
    ) -> Result<UploadReceipt, AppError> {
        let config = self.state.config();
        UploadService::new(self.backends(), &config.upload, config.order_ttl)
            .upload(UploadRequest {
                store_id: Some(store.to_string()),
                customer_name: Some("Ada".to_string()),
                customer_phone: Some("555-0199".to_string()),
                files,
            })
            .await
    }
}

/// A file part with the given name, MIME type and bytes.
#[must_use]
pub fn file(name: &str, mime: &str, bytes: impl Into<Bytes>) -> IncomingFile {
    IncomingFile::new(name, mime, bytes.into())
}

/// A small PDF-typed file.
#[must_use]
pub fn pdf(name: &str) -> IncomingFile {
    file(name, "application/pdf", Bytes::from_static(b"%PDF-1.7 test"))
}

/// Multipart form builder for upload requests.
pub struct MultipartForm {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            boundary: "printdrop-test-boundary",
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    #[must_use]
    pub fn file(mut self, field: &str, file_name: &str, mime: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// A `POST /api/upload` request carrying the form.
    ///
    /// # Panics
    ///
    /// Never for the fixed URI and headers used here.
    #[must_use]
    pub fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::post("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .expect("static request parts are valid")
    }
}

/// Build a JSON request, optionally with a bearer token.
///
/// # Panics
///
/// Panics if `uri` is not a valid request URI.
#[must_use]
pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<&serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid test request")
}

/// Read a response body as JSON (`Null` when empty).
///
/// # Panics
///
/// Panics if the body cannot be read or is not JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).expect("JSON body")
}
