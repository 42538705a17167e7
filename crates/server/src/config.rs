//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PRINTDROP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PRINTDROP_BASE_URL` - Public URL customers reach the upload page on
//! - `PRINTDROP_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `PRINTDROP_HOST` - Bind address (default: 127.0.0.1)
//! - `PRINTDROP_PORT` - Listen port (default: 3000)
//! - `PRINTDROP_TOKEN_TTL_SECS` - Store session token lifetime (default: 604800, seven days)
//! - `PRINTDROP_ORDER_TTL_SECS` - Order lifetime (default: 300)
//! - `PRINTDROP_MAX_FILE_SIZE` - Per-file size limit in bytes (default: 10 MiB)
//! - `PRINTDROP_MAX_FILES_PER_ORDER` - File count limit (default: 20)
//! - `PRINTDROP_ALLOWED_TYPES` - Comma-separated kinds (default: pdf,doc,docx,jpeg,png)
//! - `PRINTDROP_STORAGE_BACKEND` - `filesystem` or `database` (default: filesystem)
//! - `PRINTDROP_UPLOAD_DIR` - Filesystem backend root (default: ./uploads)
//! - `PRINTDROP_STORAGE_TIMEOUT_SECS` - Per-operation storage deadline (default: 10)
//! - `PRINTDROP_REAPER_INTERVAL_SECS` - Background sweep period, 0 disables (default: 60)
//! - `PRINTDROP_CONVERTER` - `none` or `libreoffice` (default: none)
//! - `PRINTDROP_SOFFICE_PATH` - `LibreOffice` binary (default: soffice)
//! - `PRINTDROP_RATE_LIMIT` - Rate limit login and registration (default: true)
//! - `PRINTDROP_LOG_JSON` - Emit JSON logs (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use printdrop_core::{FileKind, OrderTtl};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::services::upload::UploadLimits;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Where file bytes are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// One file per key under `root`.
    Filesystem { root: PathBuf },
    /// A `bytea` table in the orders database.
    Database,
}

/// Content store configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Deadline applied to every put/get/delete.
    pub timeout: Duration,
}

/// Optional document-to-PDF conversion at print time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterConfig {
    None,
    LibreOffice { program: PathBuf, timeout: Duration },
}

/// Server configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build QR payloads
    pub base_url: String,
    /// HS256 signing secret for store session tokens
    pub jwt_secret: SecretString,
    /// Store session token lifetime
    pub token_ttl: Duration,
    /// Order lifetime
    pub order_ttl: OrderTtl,
    /// Upload validation limits
    pub upload: UploadLimits,
    pub storage: StorageConfig,
    /// Background reaper period (`None` disables the periodic sweep)
    pub reaper_interval: Option<Duration>,
    pub converter: ConverterConfig,
    /// Apply per-IP rate limits to login and registration
    pub rate_limit: bool,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("order_ttl", &self.order_ttl)
            .field("upload", &self.upload)
            .field("storage", &self.storage)
            .field("reaper_interval", &self.reaper_interval)
            .field("converter", &self.converter)
            .field("rate_limit", &self.rate_limit)
            .field("log_json", &self.log_json)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the signing secret fails validation (length, placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PRINTDROP_DATABASE_URL")?;
        let host = parse_env("PRINTDROP_HOST", "127.0.0.1")?;
        let port = parse_env("PRINTDROP_PORT", "3000")?;
        let base_url = get_required_env("PRINTDROP_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PRINTDROP_BASE_URL".to_string(), e.to_string())
        })?;

        let jwt_secret = get_validated_secret("PRINTDROP_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "PRINTDROP_JWT_SECRET")?;

        let token_ttl = Duration::from_secs(parse_env("PRINTDROP_TOKEN_TTL_SECS", "604800")?);
        let order_ttl = OrderTtl::from_secs(parse_env("PRINTDROP_ORDER_TTL_SECS", "300")?);
        if order_ttl.as_secs() == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PRINTDROP_ORDER_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let upload = UploadLimits {
            max_file_size: parse_env("PRINTDROP_MAX_FILE_SIZE", "10485760")?,
            max_files: parse_env("PRINTDROP_MAX_FILES_PER_ORDER", "20")?,
            allowed: parse_allowed_types(&get_env_or_default(
                "PRINTDROP_ALLOWED_TYPES",
                "pdf,doc,docx,jpeg,png",
            ))?,
        };

        let storage = StorageConfig {
            backend: parse_storage_backend(
                &get_env_or_default("PRINTDROP_STORAGE_BACKEND", "filesystem"),
                get_env_or_default("PRINTDROP_UPLOAD_DIR", "./uploads"),
            )?,
            timeout: Duration::from_secs(parse_env("PRINTDROP_STORAGE_TIMEOUT_SECS", "10")?),
        };

        let reaper_secs: u64 = parse_env("PRINTDROP_REAPER_INTERVAL_SECS", "60")?;
        let reaper_interval = (reaper_secs > 0).then(|| Duration::from_secs(reaper_secs));

        let converter = parse_converter(
            &get_env_or_default("PRINTDROP_CONVERTER", "none"),
            get_env_or_default("PRINTDROP_SOFFICE_PATH", "soffice"),
        )?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            jwt_secret,
            token_ttl,
            order_ttl,
            upload,
            storage,
            reaper_interval,
            converter,
            rate_limit: parse_env("PRINTDROP_RATE_LIMIT", "true")?,
            log_json: parse_env("PRINTDROP_LOG_JSON", "false")?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Configuration for tests and local experiments: in-process defaults,
    /// no rate limiting, no periodic reaper.
    #[cfg(any(test, feature = "testkit"))]
    #[must_use]
    pub fn testkit() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/printdrop_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            jwt_secret: SecretString::from("kT9#vQ2$mZ7!pR4@xW8&nB3*cF6^hJ1%"),
            token_ttl: Duration::from_secs(3600),
            order_ttl: OrderTtl::default(),
            upload: UploadLimits::default(),
            storage: StorageConfig {
                backend: StorageBackend::Filesystem {
                    root: PathBuf::from("./uploads"),
                },
                timeout: Duration::from_secs(5),
            },
            reaper_interval: None,
            converter: ConverterConfig::None,
            rate_limit: false,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

/// Load only the database URL, for tools that need nothing else.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `PRINTDROP_DATABASE_URL`
/// nor `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("PRINTDROP_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_allowed_types(raw: &str) -> Result<Vec<FileKind>, ConfigError> {
    let mut kinds = Vec::new();
    for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let kind = FileKind::from_short_name(name).ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "PRINTDROP_ALLOWED_TYPES".to_string(),
                format!("unknown file type '{}'", name.trim()),
            )
        })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            "PRINTDROP_ALLOWED_TYPES".to_string(),
            "at least one file type must be allowed".to_string(),
        ));
    }
    Ok(kinds)
}

fn parse_storage_backend(raw: &str, upload_dir: String) -> Result<StorageBackend, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "filesystem" | "fs" => Ok(StorageBackend::Filesystem {
            root: PathBuf::from(upload_dir),
        }),
        "database" | "db" => Ok(StorageBackend::Database),
        other => Err(ConfigError::InvalidEnvVar(
            "PRINTDROP_STORAGE_BACKEND".to_string(),
            format!("expected 'filesystem' or 'database', got '{other}'"),
        )),
    }
}

fn parse_converter(raw: &str, soffice: String) -> Result<ConverterConfig, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" | "" => Ok(ConverterConfig::None),
        "libreoffice" | "soffice" => Ok(ConverterConfig::LibreOffice {
            program: PathBuf::from(soffice),
            timeout: Duration::from_secs(60),
        }),
        other => Err(ConfigError::InvalidEnvVar(
            "PRINTDROP_CONVERTER".to_string(),
            format!("expected 'none' or 'libreoffice', got '{other}'"),
        )),
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
