//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_API_URL` - Base URL of the remote cart service (unset: local-only)
//! - `CART_SESSION_TOKEN` - Session credential for the remote cart service
//! - `CART_STORAGE_DIR` - Directory for the persisted cart (default: .bulkcart)
//! - `CART_CURRENCY` - ISO 4217 display currency (default: USD)
//! - `CART_API_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use bulkcart_core::CurrencyCode;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Remote cart service, if one is configured
    pub api: Option<CartApiConfig>,
    /// Session credential for the remote cart service
    pub session_token: Option<SecretString>,
    /// Directory holding the persisted cart blobs
    pub storage_dir: PathBuf,
    /// Currency used to format prices
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote cart service configuration.
#[derive(Debug, Clone)]
pub struct CartApiConfig {
    /// Base URL; operation paths are appended to it
    pub base_url: Url,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// session token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = CartApiConfig::from_env()?;
        let session_token = get_optional_env("CART_SESSION_TOKEN")
            .map(|value| {
                validate_token(&value, "CART_SESSION_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;
        let storage_dir = PathBuf::from(get_env_or_default("CART_STORAGE_DIR", ".bulkcart"));
        let currency = get_env_or_default("CART_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_CURRENCY".to_string(), e.to_string()))?;

        Ok(Self {
            api,
            session_token,
            storage_dir,
            currency,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Whether the store will talk to a remote cart service.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.api.is_some() && self.session_token.is_some()
    }
}

impl CartApiConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(raw) = get_optional_env("CART_API_URL") else {
            return Ok(None);
        };
        let base_url = parse_base_url(&raw, "CART_API_URL")?;
        let timeout = get_optional_env("CART_API_TIMEOUT_SECS")
            .map(|s| parse_timeout(&s, "CART_API_TIMEOUT_SECS"))
            .transpose()?;

        Ok(Some(Self { base_url, timeout }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_base_url(raw: &str, var_name: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_timeout(raw: &str, var_name: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            e.to_string(),
        )),
    }
}

/// Reject tokens that are obviously copied from a template.
fn validate_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = token.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Last four characters of a token, safe to put in logs.
#[must_use]
pub fn token_fingerprint(token: &SecretString) -> String {
    let value = token.expose_secret();
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}
