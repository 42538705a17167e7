//! Public store lookups, QR payloads and store code generation.

use rand::Rng;
use serde::Serialize;

use printdrop_core::{StoreCode, StoreRecordId};

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::services::auth::AuthError;

/// Random candidates tried before giving up on generating a store code.
pub const MAX_CODE_ATTEMPTS: u32 = 100;

/// What a customer's phone needs to reach a store's upload page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub store_id: StoreCode,
    pub upload_url: String,
}

impl QrPayload {
    /// `{base_url}/customer/upload/{store_id}`.
    #[must_use]
    pub fn new(base_url: &str, store_id: &StoreCode) -> Self {
        Self {
            store_id: store_id.clone(),
            upload_url: format!(
                "{}/customer/upload/{store_id}",
                base_url.trim_end_matches('/')
            ),
        }
    }
}

/// Store fields anyone may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStore {
    pub id: StoreRecordId,
    pub store_id: StoreCode,
    pub store_name: String,
}

/// The subset shown to a customer validating a code before uploading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub store_name: String,
    pub store_id: StoreCode,
}

fn random_suffix() -> u16 {
    rand::rng().random_range(StoreCode::SUFFIX_MIN..=StoreCode::SUFFIX_MAX)
}

/// Pick an unused store code for `store_name`: the name's prefix plus a
/// random three-digit suffix, checked against existing stores.
///
/// # Errors
///
/// Returns `AuthError::StoreCodeExhausted` after [`MAX_CODE_ATTEMPTS`] taken
/// candidates, or `AuthError::Repository` if a lookup fails.
pub async fn generate_store_code(
    stores: &dyn StoreRepository,
    store_name: &str,
) -> Result<StoreCode, AuthError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = StoreCode::candidate(store_name, random_suffix());
        if !stores.code_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    tracing::warn!(store_name, "Store code space exhausted");
    Err(AuthError::StoreCodeExhausted)
}

/// Read-only store lookups for unauthenticated callers.
pub struct StoreDirectory<'a> {
    stores: &'a dyn StoreRepository,
    base_url: &'a str,
}

impl<'a> StoreDirectory<'a> {
    #[must_use]
    pub const fn new(stores: &'a dyn StoreRepository, base_url: &'a str) -> Self {
        Self { stores, base_url }
    }

    fn parse(raw: &str) -> Result<StoreCode, AppError> {
        StoreCode::parse(raw).map_err(|_| AppError::NotFound("Store not found".to_string()))
    }

    /// Public profile of any store with this code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no store uses the code.
    pub async fn public_profile(&self, raw_code: &str) -> Result<PublicStore, AppError> {
        let code = Self::parse(raw_code)?;
        let store = self
            .stores
            .get_by_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound("Store not found".to_string()))?;

        Ok(PublicStore {
            id: store.id,
            store_id: code,
            store_name: store.store_name,
        })
    }

    /// Resolve a code a customer typed or scanned. Inactive stores are
    /// reported as not found.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no active store uses the code.
    pub async fn validate(&self, raw_code: &str) -> Result<UploadTarget, AppError> {
        let code = Self::parse(raw_code)?;
        let store = self
            .stores
            .get_by_code(&code)
            .await?
            .filter(crate::models::Store::is_active)
            .ok_or_else(|| AppError::NotFound("Store not found or inactive".to_string()))?;

        Ok(UploadTarget {
            store_name: store.store_name,
            store_id: code,
        })
    }

    /// QR payload for an existing store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no store uses the code.
    pub async fn qr(&self, raw_code: &str) -> Result<QrPayload, AppError> {
        let code = Self::parse(raw_code)?;
        if !self.stores.code_exists(&code).await? {
            return Err(AppError::NotFound("Store not found".to_string()));
        }
        Ok(QrPayload::new(self.base_url, &code))
    }
}
