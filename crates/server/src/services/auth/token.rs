//! Store session tokens (HS256 JWT).
//!
//! Claims on the wire: `{ storeId, email, type: "store", iat, exp }`.
//! Verification failures are never distinguished to callers: a bad
//! signature, an expired token and a token with missing fields all come back
//! as [`AuthError::InvalidToken`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use printdrop_core::{Email, StoreCode};

use super::AuthError;

/// Value of the `type` claim for store sessions.
const STORE_TOKEN_TYPE: &str = "store";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    #[serde(default)]
    store_id: String,
    #[serde(default)]
    email: String,
    #[serde(rename = "type", default)]
    token_type: String,
    iat: i64,
    exp: i64,
}

/// Verified identity carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreClaims {
    pub store_id: StoreCode,
    pub email: Email,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies store session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    /// Sign a token for `store_id`, valid from now for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenIssue` if signing fails.
    pub fn issue(&self, store_id: &StoreCode, email: &Email) -> Result<IssuedToken, AuthError> {
        self.issue_at(store_id, email, Utc::now())
    }

    fn issue_at(
        &self,
        store_id: &StoreCode,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let claims = Claims {
            store_id: store_id.to_string(),
            email: email.to_string(),
            token_type: STORE_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature, expiry and claim shape.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for every kind of failure.
    pub fn verify(&self, token: &str) -> Result<StoreClaims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            AuthError::InvalidToken
        })?;
        let claims = data.claims;

        if claims.token_type != STORE_TOKEN_TYPE {
            return Err(AuthError::InvalidToken);
        }
        let store_id = StoreCode::parse(&claims.store_id).map_err(|_| AuthError::InvalidToken)?;
        let email = Email::parse(&claims.email).map_err(|_| AuthError::InvalidToken)?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::InvalidToken)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;

        Ok(StoreClaims {
            store_id,
            email,
            issued_at,
            expires_at,
        })
    }
}
