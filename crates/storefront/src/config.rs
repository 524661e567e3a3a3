//! Configuration loaded from environment variables.
//!
//! # Relay service (`StorefrontConfig`)
//!
//! ## Required
//! - `SHOPWARE_API_URL` - Store-API root (e.g., <https://shop.example.de/store-api>)
//! - `SHOPWARE_ACCESS_KEY` - Sales channel access key (high entropy, never sent to browsers)
//!
//! ## Optional
//! - `SHOPWARE_STOREFRONT_URL` - Sales channel domain used for registrations
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_FRAME_ANCESTORS` - CSP `frame-ancestors` value (default: `'none'`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)
//!
//! # Client layer (`ClientConfig`)
//!
//! ## Required
//! - `STOREFRONT_RELAY_URL` - Relay root the client calls (e.g., <http://127.0.0.1:3000/api/shopware>)
//!
//! ## Optional
//! - `SHOPWARE_STOREFRONT_URL` - Needed only by registration calls
//! - `STOREFRONT_WISHLIST_MODE` - `local` or `remote` (default: local)
//! - `STOREFRONT_TOKEN_MAX_AGE_DAYS` - Context token lifetime (default: 30)
//! - `STOREFRONT_DATA_DIR` - Directory for durable client storage (default: in-memory)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::TimeDelta;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::client::WishlistMode;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_TOKEN_MAX_AGE_DAYS: i64 = 30;
const DEFAULT_FRAME_ANCESTORS: &str = "'none'";

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

// =============================================================================
// Relay Service
// =============================================================================

/// Relay service configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Shopware Store-API configuration
    pub shopware: ShopwareConfig,
    /// CSP `frame-ancestors` source list
    pub frame_ancestors: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Shopware Store-API configuration.
///
/// Implements `Debug` manually to redact the access key.
#[derive(Clone)]
pub struct ShopwareConfig {
    /// Store-API root URL
    pub api_url: Url,
    /// Sales channel access key (server-side only)
    pub access_key: SecretString,
    /// Sales channel domain sent with registrations
    pub storefront_url: Option<String>,
}

impl std::fmt::Debug for ShopwareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopwareConfig")
            .field("api_url", &self.api_url.as_str())
            .field("access_key", &"[REDACTED]")
            .field("storefront_url", &self.storefront_url)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the access key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let shopware = ShopwareConfig::from_env()?;
        let frame_ancestors =
            normalize_frame_ancestors(get_optional_env("STOREFRONT_FRAME_ANCESTORS").as_deref());

        Ok(Self {
            host,
            port,
            shopware,
            frame_ancestors,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether embedding the site in frames is disallowed entirely.
    #[must_use]
    pub fn denies_framing(&self) -> bool {
        self.frame_ancestors == DEFAULT_FRAME_ANCESTORS
    }
}

impl ShopwareConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_url("SHOPWARE_API_URL")?,
            access_key: get_validated_secret("SHOPWARE_ACCESS_KEY")?,
            storefront_url: get_optional_env("SHOPWARE_STOREFRONT_URL"),
        })
    }
}

// =============================================================================
// Client Layer
// =============================================================================

/// Client layer configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay root (`.../api/shopware`)
    pub relay_url: Url,
    /// Sales channel domain sent with registrations
    pub storefront_url: Option<String>,
    /// Where logged-in wishlists are kept
    pub wishlist_mode: WishlistMode,
    /// Lifetime of a stored context token
    pub token_max_age: TimeDelta,
    /// Directory for durable storage; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the relay URL.
    #[must_use]
    pub fn new(relay_url: Url) -> Self {
        Self {
            relay_url,
            storefront_url: None,
            wishlist_mode: WishlistMode::default(),
            token_max_age: TimeDelta::days(DEFAULT_TOKEN_MAX_AGE_DAYS),
            data_dir: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the relay URL is missing or any value fails
    /// to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let days: i64 = parse_env(
            "STOREFRONT_TOKEN_MAX_AGE_DAYS",
            &DEFAULT_TOKEN_MAX_AGE_DAYS.to_string(),
        )?;
        let token_max_age = TimeDelta::try_days(days).filter(|d| *d > TimeDelta::zero()).ok_or_else(
            || {
                ConfigError::InvalidEnvVar(
                    "STOREFRONT_TOKEN_MAX_AGE_DAYS".to_string(),
                    format!("{days} is not a positive number of days"),
                )
            },
        )?;

        Ok(Self {
            relay_url: get_required_url("STOREFRONT_RELAY_URL")?,
            storefront_url: get_optional_env("SHOPWARE_STOREFRONT_URL"),
            wishlist_mode: parse_env("STOREFRONT_WISHLIST_MODE", "local")?,
            token_max_age,
            data_dir: get_optional_env("STOREFRONT_DATA_DIR").map(PathBuf::from),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_optional_env(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a required environment variable as an absolute URL.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(key)?;
    Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Collapse an unset or blank `frame-ancestors` value to `'none'`.
fn normalize_frame_ancestors(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_FRAME_ANCESTORS)
        .to_string()
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
    let len = s.chars().count() as f64;
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

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    // Shopware access keys are 26 uppercase alphanumerics
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the sales channel settings."
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
