//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_URL` - Base URL of the cart store API
//! - `CART_API_TOKEN` - Bearer token for the cart store and catalog
//! - `CART_USER_ID` - UUID of the signed-in user whose cart is managed
//!
//! ## Optional
//! - `CATALOG_API_URL` - Base URL of the catalog API (default: `CART_API_URL`)
//! - `CART_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CATALOG_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `CART_CURRENCY` - ISO 4217 code used for display (default: USD)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use cartwright_core::{CurrencyCode, UserId};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Values that show up when a `.env` template was never filled in (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "placeholder",
    "replace",
    "xxx",
    "todo",
    "insert",
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

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Cart store base URL
    pub api_url: Url,
    /// Catalog base URL
    pub catalog_url: Url,
    /// Bearer token for both APIs
    pub api_token: SecretString,
    /// User whose cart this process manages
    pub user_id: UserId,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// How long catalog lookups stay cached
    pub catalog_cache_ttl: Duration,
    /// Currency for formatted prices
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_url("CART_API_URL", &get_required_env("CART_API_URL")?)?;
        let catalog_url = match get_optional_env("CATALOG_API_URL") {
            Some(value) => parse_url("CATALOG_API_URL", &value)?,
            None => api_url.clone(),
        };

        let api_token = SecretString::from(get_required_env("CART_API_TOKEN")?);
        validate_token(&api_token, "CART_API_TOKEN")?;

        let user_id = get_required_env("CART_USER_ID")?
            .parse::<UserId>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_USER_ID".to_string(), e.to_string()))?;

        let request_timeout = Duration::from_secs(parse_or_default(
            "CART_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let catalog_cache_ttl = Duration::from_secs(parse_or_default(
            "CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?);

        let currency = get_env_or_default("CART_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_CURRENCY".to_string(), e))?;

        Ok(Self {
            api_url,
            catalog_url,
            api_token,
            user_id,
            request_timeout,
            catalog_cache_ttl,
            currency,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing both APIs at `base_url`, with defaults elsewhere.
    #[must_use]
    pub fn for_base_url(base_url: Url, api_token: SecretString, user_id: UserId) -> Self {
        Self {
            catalog_url: base_url.clone(),
            api_url: base_url,
            api_token,
            user_id,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            currency: CurrencyCode::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional integer variable, falling back to `default`.
fn parse_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Reject empty tokens and unfilled template values.
fn validate_token(token: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = token.expose_secret();
    if value.trim().is_empty() {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "must not be empty".to_string(),
        ));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }
    Ok(())
}
