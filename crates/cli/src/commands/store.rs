//! Store management commands.
//!
//! # Environment Variables
//!
//! - `PRINTDROP_DATABASE_URL` - `PostgreSQL` connection string
//! - `PRINTDROP_BASE_URL` - Base URL for QR payloads
//! - `PRINTDROP_JWT_SECRET` - Needed by `create`, which signs the store in

use std::sync::Arc;

use printdrop_core::{StoreCode, StoreStatus};
use printdrop_server::AppState;
use printdrop_server::config::ServerConfig;
use printdrop_server::db::{LazyPool, PgStoreRepository, StoreRepository};
use printdrop_server::services::auth::{AuthService, RegisterStore};
use printdrop_server::services::stores::StoreDirectory;
use thiserror::Error;

/// Errors specific to store commands.
#[derive(Debug, Error)]
pub enum StoreCommandError {
    #[error("Invalid store ID: {0}")]
    InvalidStoreId(String),

    #[error("Invalid status: {0}. Valid statuses: active, inactive")]
    InvalidStatus(String),

    #[error("No store with ID {0}")]
    NotFound(StoreCode),
}

/// Fields for `store create`.
pub struct NewStoreArgs {
    pub name: String,
    pub owner: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone: String,
}

fn parse_code(raw: &str) -> Result<StoreCode, StoreCommandError> {
    StoreCode::parse(raw).map_err(|_| StoreCommandError::InvalidStoreId(raw.to_owned()))
}

fn parse_status(raw: &str) -> Result<StoreStatus, StoreCommandError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(StoreStatus::Active),
        "inactive" => Ok(StoreStatus::Inactive),
        _ => Err(StoreCommandError::InvalidStatus(raw.to_owned())),
    }
}

/// Register a store, printing its ID and upload URL.
///
/// # Errors
///
/// Returns an error if configuration is invalid or registration fails.
pub async fn create(args: NewStoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(config).await?;
    let backends = state.backends();

    let form = RegisterStore {
        store_name: args.name,
        owner_name: args.owner,
        email: args.email,
        password: args.password,
        address: args.address,
        phone: args.phone,
    };
    let session = AuthService::new(
        backends.stores.as_ref(),
        state.tokens(),
        backends.clock.as_ref(),
        &state.config().base_url,
    )
    .register(form)
    .await?;

    tracing::info!(store_id = %session.qr.store_id, "Store created");
    #[allow(clippy::print_stdout)]
    {
        println!("Store ID:   {}", session.qr.store_id);
        println!("Upload URL: {}", session.qr.upload_url);
    }
    Ok(())
}

/// Activate or deactivate a store.
///
/// # Errors
///
/// Returns an error for a bad store ID or status, an unknown store, or a
/// database failure.
pub async fn set_status(store_id: &str, status: &str) -> Result<(), Box<dyn std::error::Error>> {
    let code = parse_code(store_id)?;
    let status = parse_status(status)?;

    let database_url = printdrop_server::config::database_url_from_env()?;
    let stores = PgStoreRepository::new(Arc::new(LazyPool::new(database_url)));

    match stores.set_status(&code, status).await {
        Ok(_) => {}
        Err(printdrop_server::db::RepositoryError::NotFound) => {
            return Err(StoreCommandError::NotFound(code).into());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(store_id = %code, status = %status, "Store status updated");
    Ok(())
}

/// Print a store's QR payload.
///
/// # Errors
///
/// Returns an error if the store does not exist or the database fails.
pub async fn qr(store_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let code = parse_code(store_id)?;
    let config = ServerConfig::from_env()?;
    let stores = PgStoreRepository::new(Arc::new(LazyPool::new(config.database_url.clone())));

    let payload = StoreDirectory::new(&stores, &config.base_url)
        .qr(code.as_str())
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", payload.upload_url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Active").ok(), Some(StoreStatus::Active));
        assert_eq!(parse_status(" inactive ").ok(), Some(StoreStatus::Inactive));
        assert!(parse_status("paused").is_err());
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(
            parse_code("corne123").ok().map(|c| c.to_string()),
            Some("CORNE123".to_string())
        );
        assert!(parse_code("bad id!").is_err());
    }
}
