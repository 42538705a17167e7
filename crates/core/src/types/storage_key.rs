//! Content store keys.
//!
//! A key has the shape `{namespace}/{nanos}-{name}` where `namespace` is the
//! owning store's code, `nanos` is the write timestamp in nanoseconds and
//! `name` is the sanitized original file name. The namespace keeps stores
//! from colliding with each other; the timestamp keeps two uploads of the
//! same name within one store apart.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::StoreCode;

/// Errors that can occur when parsing a [`StorageKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageKeyError {
    /// The key does not have the `namespace/name` shape.
    #[error("storage key must have the form namespace/name")]
    Malformed,
    /// The namespace is not a valid store code.
    #[error("storage key namespace is invalid")]
    InvalidNamespace,
    /// The file part contains path traversal or separator characters.
    #[error("storage key file name is invalid")]
    InvalidName,
}

/// A validated content store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Maximum length of the sanitized name part.
    pub const MAX_NAME_LENGTH: usize = 100;

    /// Build a key for `display_name` written by `namespace` at `timestamp_nanos`.
    #[must_use]
    pub fn generate(namespace: &StoreCode, display_name: &str, timestamp_nanos: i64) -> Self {
        Self(format!(
            "{namespace}/{timestamp_nanos}-{}",
            sanitize_name(display_name)
        ))
    }

    /// Parse a key read back from an order record.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageKeyError`] if the key is not of the form
    /// `STORECODE/name` or if the name could escape its namespace.
    pub fn parse(s: &str) -> Result<Self, StorageKeyError> {
        let (namespace, name) = s.split_once('/').ok_or(StorageKeyError::Malformed)?;
        StoreCode::parse(namespace)
            .ok()
            .filter(|code| code.as_str() == namespace)
            .ok_or(StorageKeyError::InvalidNamespace)?;

        if name.is_empty()
            || name.contains(['/', '\\'])
            || name == "."
            || name.starts_with("..")
            || name.chars().any(char::is_control)
        {
            return Err(StorageKeyError::InvalidName);
        }

        Ok(Self(s.to_owned()))
    }

    /// The owning store's code.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split_once('/').map_or("", |(ns, _)| ns)
    }

    /// The file part of the key (no separators).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, name)| name)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reduce a client-supplied file name to characters that are safe in a
/// filesystem path on every backend.
///
/// ```
/// use printdrop_core::types::storage_key::sanitize_name;
///
/// assert_eq!(sanitize_name("report final (v2).pdf"), "report_final__v2_.pdf");
/// assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_name(""), "file");
/// ```
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(StorageKey::MAX_NAME_LENGTH)
        .collect();

    if cleaned.starts_with('.') {
        cleaned.replace_range(..1, "_");
    }
    if cleaned.is_empty() {
        return "file".to_owned();
    }
    cleaned
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorageKey {
    type Error = StorageKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shop() -> StoreCode {
        StoreCode::parse("SHOP123").unwrap()
    }

    #[test]
    fn test_generate_shape() {
        let key = StorageKey::generate(&shop(), "flyer.pdf", 1_700_000_000_123_456_789);
        assert_eq!(key.as_str(), "SHOP123/1700000000123456789-flyer.pdf");
        assert_eq!(key.namespace(), "SHOP123");
        assert_eq!(key.file_name(), "1700000000123456789-flyer.pdf");
    }

    #[test]
    fn test_same_name_different_timestamps_differ() {
        let a = StorageKey::generate(&shop(), "scan.png", 1);
        let b = StorageKey::generate(&shop(), "scan.png", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_name_different_stores_differ() {
        let other = StoreCode::parse("OTHER456").unwrap();
        let a = StorageKey::generate(&shop(), "scan.png", 1);
        let b = StorageKey::generate(&other, "scan.png", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_keys_parse_back() {
        let key = StorageKey::generate(&shop(), "../../secret doc.docx", 7);
        assert_eq!(StorageKey::parse(key.as_str()).unwrap(), key);
        assert!(!key.file_name().contains('/'));
    }

    #[test]
    fn test_parse_rejects_traversal_and_bad_namespaces() {
        assert_eq!(
            StorageKey::parse("no-separator"),
            Err(StorageKeyError::Malformed)
        );
        assert_eq!(
            StorageKey::parse("SHOP123/../x"),
            Err(StorageKeyError::InvalidName)
        );
        assert_eq!(
            StorageKey::parse("SHOP123/a/b"),
            Err(StorageKeyError::InvalidName)
        );
        assert_eq!(
            StorageKey::parse("shop123/1-a.pdf"),
            Err(StorageKeyError::InvalidNamespace)
        );
        assert_eq!(
            StorageKey::parse("/1-a.pdf"),
            Err(StorageKeyError::InvalidNamespace)
        );
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_name(&long).len(), StorageKey::MAX_NAME_LENGTH);
    }

    #[test]
    fn test_sanitize_hidden_files() {
        assert_eq!(sanitize_name(".env"), "_env");
    }
}
