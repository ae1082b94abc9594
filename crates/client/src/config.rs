//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POPFLIX_API_URL` - Base URL of the PopFlix service (API lives under `/api`)
//!
//! ## Optional
//! - `POPFLIX_CREDENTIALS_PATH` - Credential store file (default: `.popflix/credentials.json`)
//! - `POPFLIX_ORIGIN_URL` - Origin the payment provider returns to (default: API origin)
//! - `POPFLIX_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `POPFLIX_CATALOG_CACHE_TTL_SECS` - Popular list cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: development)
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0-1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate, 0.0-1.0 (default: 0.0)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_CREDENTIALS_PATH: &str = ".popflix/credentials.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote service configuration
    pub api: ApiConfig,
    /// Where the session token is persisted
    pub credentials_path: PathBuf,
    /// Origin sent with checkout requests
    pub origin_url: Url,
    /// Error tracking configuration
    pub sentry: SentryConfig,
}

/// Remote service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Service base URL, without the `/api` suffix
    pub base_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How long popular lists stay cached
    pub catalog_cache_ttl: Duration,
}

/// Sentry configuration.
///
/// Implements `Debug` manually to redact the DSN.
#[derive(Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: String,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl std::fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = parse_http_url(
            "POPFLIX_API_URL",
            &get_required(env, "POPFLIX_API_URL")?,
        )?;

        let origin_url = match get_optional(env, "POPFLIX_ORIGIN_URL") {
            Some(raw) => parse_http_url("POPFLIX_ORIGIN_URL", &raw)?,
            None => origin_of(&base_url),
        };

        let api = ApiConfig {
            base_url,
            request_timeout: Duration::from_secs(parse_or_default(
                env,
                "POPFLIX_REQUEST_TIMEOUT_SECS",
                30,
            )?),
            catalog_cache_ttl: Duration::from_secs(parse_or_default(
                env,
                "POPFLIX_CATALOG_CACHE_TTL_SECS",
                300,
            )?),
        };

        Ok(Self {
            api,
            credentials_path: get_optional(env, "POPFLIX_CREDENTIALS_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH), PathBuf::from),
            origin_url,
            sentry: SentryConfig::from_lookup(env)?,
        })
    }
}

impl SentryConfig {
    /// Load Sentry settings alone, for early initialization.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a sample rate is not a number in 0.0-1.0.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional(env, "SENTRY_DSN"),
            environment: get_optional(env, "SENTRY_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
            sample_rate: parse_rate(env, "SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: parse_rate(env, "SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional(env, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional variable. Blank values count as unset.
fn get_optional(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

fn parse_or_default(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    get_optional(env, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn parse_rate(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: f32,
) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional(env, key) else {
        return Ok(default);
    };
    let rate = raw
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Scheme, host and port of `url`, with an empty path.
fn origin_of(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}
