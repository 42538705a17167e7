//! Store account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use printdrop_core::{Email, StoreCode, StoreRecordId, StoreStatus};

/// A registered print shop (domain type).
///
/// Implements `Debug` manually so the password hash never reaches logs.
#[derive(Clone)]
pub struct Store {
    /// Internal record ID.
    pub id: StoreRecordId,
    /// Public store code. `None` only for accounts created before codes
    /// were assigned; login backfills it.
    pub store_code: Option<StoreCode>,
    pub store_name: String,
    pub owner_name: String,
    /// Login identity, unique across stores.
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub address: String,
    pub phone: String,
    pub status: StoreStatus,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("store_code", &self.store_code)
            .field("store_name", &self.store_name)
            .field("owner_name", &self.owner_name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("address", &self.address)
            .field("phone", &self.phone)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Store {
    /// Whether the store accepts uploads and logins.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == StoreStatus::Active
    }

    /// Public view without credentials.
    #[must_use]
    pub fn profile(&self) -> StoreProfile {
        StoreProfile {
            id: self.id,
            store_id: self.store_code.clone(),
            store_name: self.store_name.clone(),
            owner_name: self.owner_name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Data required to insert a store.
#[derive(Clone)]
pub struct NewStore {
    pub store_code: StoreCode,
    pub store_name: String,
    pub owner_name: String,
    pub email: Email,
    pub password_hash: String,
    pub address: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Store data returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProfile {
    pub id: StoreRecordId,
    pub store_id: Option<StoreCode>,
    pub store_name: String,
    pub owner_name: String,
    pub email: Email,
    pub address: String,
    pub phone: String,
    pub status: StoreStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store {
            id: StoreRecordId::generate(),
            store_code: Some(StoreCode::parse("CORNE427").unwrap()),
            store_name: "Corner Print".to_string(),
            owner_name: "Sam".to_string(),
            email: Email::parse("owner@corner.example").unwrap(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            address: "1 Main St".to_string(),
            phone: "555-0100".to_string(),
            status: StoreStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let output = format!("{:?}", store());
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("argon2id"));
    }

    #[test]
    fn test_profile_wire_shape_has_no_credentials() {
        let json = serde_json::to_value(store().profile()).unwrap();
        assert_eq!(json["storeId"], "CORNE427");
        assert_eq!(json["storeName"], "Corner Print");
        assert_eq!(json["status"], "active");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }
}
