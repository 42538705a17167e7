//! Store registration, login and session tokens.

mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use token::{IssuedToken, StoreClaims, TokenService};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use printdrop_core::{Clock, Email};

use crate::db::{CONFLICT_EMAIL, CONFLICT_STORE_CODE, RepositoryError, StoreRepository};
use crate::models::{NewStore, Store, StoreProfile};
use crate::services::stores::{QrPayload, generate_store_code};
use password::{hash_password, validate_password, verify_password};

/// Times a lost race on a freshly generated code is retried.
const CODE_RACE_RETRIES: u32 = 3;

/// Registration form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterStore {
    pub store_name: String,
    pub owner_name: String,
    pub email: String,
    pub password: String,
    pub address: String,
    pub phone: String,
}

/// Login form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// What a store receives after registering or logging in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub store: StoreProfile,
    pub qr: QrPayload,
}

fn required(field: &'static str, value: &str) -> Result<String, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// Authentication service.
///
/// Handles store registration, login and store code assignment.
pub struct AuthService<'a> {
    stores: &'a dyn StoreRepository,
    tokens: &'a TokenService,
    clock: &'a dyn Clock,
    base_url: &'a str,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        stores: &'a dyn StoreRepository,
        tokens: &'a TokenService,
        clock: &'a dyn Clock,
        base_url: &'a str,
    ) -> Self {
        Self {
            stores,
            tokens,
            clock,
            base_url,
        }
    }

    /// Register a new store and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` for bad input, `AuthError::EmailTaken` if the
    /// email is registered, `AuthError::StoreCodeExhausted` if no code could
    /// be generated.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: RegisterStore) -> Result<StoreSession, AuthError> {
        let store_name = required("storeName", &form.store_name)?;
        let owner_name = required("ownerName", &form.owner_name)?;
        let email = Email::parse(&required("email", &form.email)?)?;
        if form.password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }
        validate_password(&form.password)?;
        let address = required("address", &form.address)?;
        let phone = required("phone", &form.phone)?;

        if self.stores.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&form.password)?;
        let created_at = self.clock.now();

        for _ in 0..CODE_RACE_RETRIES {
            let store_code = generate_store_code(self.stores, &store_name).await?;
            let new_store = NewStore {
                store_code,
                store_name: store_name.clone(),
                owner_name: owner_name.clone(),
                email: email.clone(),
                password_hash: password_hash.clone(),
                address: address.clone(),
                phone: phone.clone(),
                created_at,
            };

            match self.stores.create(new_store).await {
                Ok(store) => {
                    tracing::info!(store_id = ?store.store_code, "Store registered");
                    return self.session_for(&store);
                }
                Err(e) if e.is_conflict_on(CONFLICT_STORE_CODE) => {}
                Err(e) if e.is_conflict_on(CONFLICT_EMAIL) => return Err(AuthError::EmailTaken),
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreCodeExhausted)
    }

    /// Check credentials and sign the store in, assigning a store code first
    /// if the account predates codes.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or wrong
    /// password, `AuthError::StoreInactive` for a deactivated store.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<StoreSession, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let store = self
            .stores
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &store.password_hash)?;

        if !store.is_active() {
            return Err(AuthError::StoreInactive);
        }

        let store = if store.store_code.is_some() {
            store
        } else {
            self.backfill_code(store).await?
        };

        tracing::info!(store_id = ?store.store_code, "Store logged in");
        self.session_for(&store)
    }

    async fn backfill_code(&self, store: Store) -> Result<Store, AuthError> {
        for _ in 0..CODE_RACE_RETRIES {
            let code = generate_store_code(self.stores, &store.store_name).await?;
            match self.stores.assign_code(store.id, &code).await {
                Ok(updated) => {
                    tracing::info!(store_id = %code, "Assigned store ID to legacy account");
                    return Ok(updated);
                }
                Err(e) if e.is_conflict_on(CONFLICT_STORE_CODE) => {}
                Err(RepositoryError::NotFound) => {
                    // A concurrent login assigned one first
                    return self
                        .stores
                        .get_by_email(&store.email)
                        .await?
                        .filter(|s| s.store_code.is_some())
                        .ok_or(AuthError::InvalidCredentials);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreCodeExhausted)
    }

    fn session_for(&self, store: &Store) -> Result<StoreSession, AuthError> {
        let code = store
            .store_code
            .as_ref()
            .ok_or(AuthError::InvalidCredentials)?;
        let issued = self.tokens.issue(code, &store.email)?;

        Ok(StoreSession {
            token: issued.token,
            expires_at: issued.expires_at,
            store: store.profile(),
            qr: QrPayload::new(self.base_url, code),
        })
    }
}
