//! Application state shared across handlers.

use std::sync::Arc;

use printdrop_core::SystemClock;

use crate::config::ServerConfig;
use crate::db::{LazyPool, PgOrderRepository, PgStoreRepository};
use crate::services::Backends;
use crate::services::auth::TokenService;
use crate::services::convert::{self, DocumentConverter};
use crate::storage::{self, StorageError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    backends: Backends,
    tokens: TokenService,
    converter: Option<Arc<dyn DocumentConverter>>,
}

impl AppState {
    /// Assemble state from already-built backends.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        backends: Backends,
        converter: Option<Arc<dyn DocumentConverter>>,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backends,
                tokens,
                converter,
            }),
        }
    }

    /// Build the `PostgreSQL` repositories, the configured content store and
    /// converter.
    ///
    /// The pool connects on first use, so this succeeds without a reachable
    /// database.
    ///
    /// # Errors
    ///
    /// Returns an error if the content store cannot be opened.
    pub async fn from_config(config: ServerConfig) -> Result<Self, StorageError> {
        let pool = Arc::new(LazyPool::new(config.database_url.clone()));
        let content = storage::from_config(&config.storage, pool.clone()).await?;
        let backends = Backends::new(
            Arc::new(PgStoreRepository::new(pool.clone())),
            Arc::new(PgOrderRepository::new(pool)),
            content,
            Arc::new(SystemClock),
        );
        let converter = convert::from_config(&config.converter);
        Ok(Self::new(config, backends, converter))
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Repositories, content store and clock.
    #[must_use]
    pub fn backends(&self) -> &Backends {
        &self.inner.backends
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Document converter, when one is configured.
    #[must_use]
    pub fn converter(&self) -> Option<&Arc<dyn DocumentConverter>> {
        self.inner.converter.as_ref()
    }
}
