//! Store authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use printdrop_core::StoreCode;

use crate::error::{AppError, set_sentry_store};
use crate::services::auth::StoreClaims;
use crate::state::AppState;

/// Extractor that requires a valid store bearer token.
///
/// Any missing, malformed, expired or forged token is rejected with the same
/// `401 Unauthorized`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(StoreAuth(claims): StoreAuth) -> impl IntoResponse {
///     claims.store_id.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StoreAuth(pub StoreClaims);

impl StoreAuth {
    /// Require the token to belong to `store`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for another store's token.
    pub fn authorize(&self, store: &StoreCode) -> Result<(), AppError> {
        if self.0.store_id == *store {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Token does not belong to this store".to_string(),
            ))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for StoreAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state
            .tokens()
            .verify(token)
            .map_err(|_| AppError::Unauthorized)?;

        set_sentry_store(&claims.store_id, Some(claims.email.as_str()));
        Ok(Self(claims))
    }
}
