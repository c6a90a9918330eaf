//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - URL the back office is served from
//! - `ADMIN_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key (refunds)
//! - `EASYPARCEL_API_KEY` - EasyParcel API key
//! - `SUPABASE_URL` - Supabase project URL
//! - `SUPABASE_SERVICE_ROLE_KEY` - Service role key for Storage uploads
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: `https://api.stripe.com`)
//! - `EASYPARCEL_BASE_URL` - EasyParcel endpoint (default: `https://connect.easyparcel.my`)
//! - `SUPABASE_STORAGE_BUCKET` - Bucket for product images (default: `product-images`)
//! - `REDIS_URL` - Role cache backend; in-process cache when unset
//! - `ROLE_CACHE_TTL_SECS` - Role cache TTL (default: 60)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   Customer emails on status changes; disabled unless all are set
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for human-readable
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
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

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` connection URL
    pub database_url: SecretString,
    /// Server bind address
    pub host: IpAddr,
    /// Server port
    pub port: u16,
    /// URL the back office is served from (no trailing slash)
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Stripe configuration (refunds only)
    pub stripe: StripeConfig,
    /// EasyParcel configuration
    pub easyparcel: EasyParcelConfig,
    /// Supabase Storage configuration
    pub storage: StorageConfig,
    /// Role cache configuration
    pub role_cache: RoleCacheConfig,
    /// SMTP configuration (optional - customer emails disabled when absent)
    pub email: Option<EmailConfig>,
    /// Emit JSON logs
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (HIGH PRIVILEGE - can refund payments)
    pub secret_key: SecretString,
    /// API base URL (no trailing slash)
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// EasyParcel API configuration.
#[derive(Clone)]
pub struct EasyParcelConfig {
    /// API key (spends the prepaid EasyParcel balance)
    pub api_key: SecretString,
    /// Endpoint base URL (no trailing slash)
    pub base_url: String,
}

impl std::fmt::Debug for EasyParcelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EasyParcelConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Supabase Storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    /// Supabase project URL (no trailing slash)
    pub supabase_url: String,
    /// Service role key (HIGH PRIVILEGE - bypasses row level security)
    pub service_role_key: SecretString,
    /// Bucket holding product images
    pub bucket: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("supabase_url", &self.supabase_url)
            .field("service_role_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Role cache configuration.
#[derive(Clone)]
pub struct RoleCacheConfig {
    /// Redis URL; `None` selects the in-process cache
    pub redis_url: Option<SecretString>,
    /// How long a cached role is trusted
    pub ttl: Duration,
}

impl std::fmt::Debug for RoleCacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleCacheConfig")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// SMTP configuration for customer emails.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ADMIN_DATABASE_URL")?;
        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = parse_env("ADMIN_PORT", "3001")?;
        let base_url = get_base_url("ADMIN_BASE_URL")?;
        let session_secret = get_validated_secret("ADMIN_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ADMIN_SESSION_SECRET")?;

        let stripe = StripeConfig {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            api_base: trimmed(get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com")),
        };
        let easyparcel = EasyParcelConfig {
            api_key: get_validated_secret("EASYPARCEL_API_KEY")?,
            base_url: trimmed(get_env_or_default(
                "EASYPARCEL_BASE_URL",
                "https://connect.easyparcel.my",
            )),
        };
        let storage = StorageConfig {
            supabase_url: get_base_url("SUPABASE_URL")?,
            service_role_key: get_validated_secret("SUPABASE_SERVICE_ROLE_KEY")?,
            bucket: get_env_or_default("SUPABASE_STORAGE_BUCKET", "product-images"),
        };
        let role_cache = RoleCacheConfig {
            redis_url: get_optional_env("REDIS_URL").map(SecretString::from),
            ttl: Duration::from_secs(parse_env("ROLE_CACHE_TTL_SECS", "60")?),
        };
        let email = EmailConfig::from_env()?;

        let json_logs = get_optional_env("LOG_FORMAT").is_some_and(|f| f == "json");
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            stripe,
            easyparcel,
            storage,
            role_cache,
            email,
            json_logs,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the back office is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl EmailConfig {
    /// All-or-nothing: SMTP is only enabled when host, credentials and sender are set.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(smtp_host), Some(smtp_username), Some(smtp_password), Some(from_address)) = (
            get_optional_env("SMTP_HOST"),
            get_optional_env("SMTP_USERNAME"),
            get_optional_env("SMTP_PASSWORD"),
            get_optional_env("EMAIL_FROM"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username,
            smtp_password: SecretString::from(smtp_password),
            from_address,
        }))
    }
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

/// Get and validate a base URL, stripping any trailing slash.
fn get_base_url(key: &str) -> Result<String, ConfigError> {
    let raw = get_required_env(key)?;
    let parsed = url::Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(trimmed(raw))
}

fn trimmed(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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
            #[allow(clippy::cast_precision_loss)]
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("changeme-easyparcel", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("EP-4kqT9zXw2mNc7vLb", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_trimmed_strips_trailing_slashes() {
        assert_eq!(
            trimmed("https://connect.easyparcel.my//".to_string()),
            "https://connect.easyparcel.my"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let storage = StorageConfig {
            supabase_url: "https://abc.supabase.co".to_string(),
            service_role_key: SecretString::from("eyJhbGciOiJIUzI1NiJ9.service"),
            bucket: "product-images".to_string(),
        };
        let output = format!("{storage:?}");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("eyJhbGci"));

        let cache = RoleCacheConfig {
            redis_url: Some(SecretString::from("redis://:hunter2@cache:6379")),
            ttl: Duration::from_secs(60),
        };
        assert!(!format!("{cache:?}").contains("hunter2"));
    }
}
