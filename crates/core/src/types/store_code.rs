//! Human-facing store identifier (the `storeId` printed on QR codes).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`StoreCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreCodeError {
    /// The input string is empty.
    #[error("store ID cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("store ID must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains something other than ASCII letters and digits.
    #[error("store ID may only contain letters and digits")]
    InvalidCharacter,
}

/// A short, unique, immutable store identifier such as `CORNE427`.
///
/// Codes are uppercase ASCII alphanumerics. Parsing uppercases the input so a
/// code typed by a customer in lowercase resolves to the same store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreCode(String);

impl StoreCode {
    /// Maximum length of a store code.
    pub const MAX_LENGTH: usize = 16;

    /// Number of characters taken from the store name when generating a code.
    pub const PREFIX_LENGTH: usize = 5;

    /// Prefix used when the store name has no usable characters.
    pub const FALLBACK_PREFIX: &'static str = "STORE";

    /// Smallest random suffix (inclusive).
    pub const SUFFIX_MIN: u16 = 100;

    /// Largest random suffix (inclusive).
    pub const SUFFIX_MAX: u16 = 999;

    /// Parse a `StoreCode` from user or database input.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreCodeError`] if the input is empty, too long or
    /// contains non-alphanumeric characters.
    pub fn parse(s: &str) -> Result<Self, StoreCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(StoreCodeError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(StoreCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreCodeError::InvalidCharacter);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Derive the generation prefix from a store name: ASCII alphanumerics
    /// only, uppercased, truncated to [`Self::PREFIX_LENGTH`].
    ///
    /// ```
    /// use printdrop_core::StoreCode;
    ///
    /// assert_eq!(StoreCode::prefix_from_name("Corner Print & Copy"), "CORNE");
    /// assert_eq!(StoreCode::prefix_from_name("A-1"), "A1");
    /// assert_eq!(StoreCode::prefix_from_name("ÉÉÉ"), "STORE");
    /// ```
    #[must_use]
    pub fn prefix_from_name(store_name: &str) -> String {
        let prefix: String = store_name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(Self::PREFIX_LENGTH)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if prefix.is_empty() {
            Self::FALLBACK_PREFIX.to_owned()
        } else {
            prefix
        }
    }

    /// Build a candidate code from a store name and a numeric suffix.
    #[must_use]
    pub fn candidate(store_name: &str, suffix: u16) -> Self {
        Self(format!("{}{suffix}", Self::prefix_from_name(store_name)))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for StoreCode {
    type Err = StoreCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoreCode {
    type Error = StoreCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoreCode> for String {
    fn from(code: StoreCode) -> Self {
        code.0
    }
}

impl AsRef<str> for StoreCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for StoreCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for StoreCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for StoreCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases() {
        let code = StoreCode::parse(" corne427 ").unwrap();
        assert_eq!(code.as_str(), "CORNE427");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(StoreCode::parse(""), Err(StoreCodeError::Empty));
        assert_eq!(
            StoreCode::parse("CORNE-427"),
            Err(StoreCodeError::InvalidCharacter)
        );
        assert_eq!(
            StoreCode::parse("../etc"),
            Err(StoreCodeError::InvalidCharacter)
        );
        assert!(matches!(
            StoreCode::parse(&"A".repeat(17)),
            Err(StoreCodeError::TooLong { .. })
        ));
    }

    #[test]
    fn test_candidate_combines_prefix_and_suffix() {
        let code = StoreCode::candidate("quick print", 512);
        assert_eq!(code.as_str(), "QUICK512");
        // Generated codes always parse back to themselves
        assert_eq!(StoreCode::parse(code.as_str()).unwrap(), code);
    }

    #[test]
    fn test_candidate_short_and_empty_names() {
        assert_eq!(StoreCode::candidate("Ab", 100).as_str(), "AB100");
        assert_eq!(StoreCode::candidate("!!!", 999).as_str(), "STORE999");
    }

    #[test]
    fn test_serde_validates() {
        let code: StoreCode = serde_json::from_str("\"shop1\"").unwrap();
        assert_eq!(code.as_str(), "SHOP1");
        assert!(serde_json::from_str::<StoreCode>("\"a b\"").is_err());
    }
}
