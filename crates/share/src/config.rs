//! Share page configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHARE_PUBLIC_BASE_URL` - Public origin of the share site (e.g., <https://share.xetivo.app>)
//!
//! ## Record store
//! Missing values do not stop startup, but every product lookup fails with a
//! configuration error and `/health/ready` reports unavailable.
//! - `RECORD_STORE_URL` - Record store base URL (falls back to `SUPABASE_URL`)
//! - `RECORD_STORE_ANON_KEY` - Record store access key (falls back to `SUPABASE_ANON_KEY`)
//!
//! ## Optional
//! - `SHARE_HOST` - Bind address (default: 127.0.0.1)
//! - `SHARE_PORT` - Listen port (default: 3000)
//! - `SHARE_STATIC_DIR` - Static asset directory (default: crates/share/static)
//! - `SHARE_SITE_NAME` - Site name for titles and metadata (default: Xetivo)
//! - `SHARE_APP_SCHEME` - Native app URI scheme (default: xetivo)
//! - `SHARE_REDIRECT_DELAY_MS` - Fallback timer delay (default: 1200)
//! - `SHARE_REDIRECT_STALE_AFTER_MS` - Suppress fallback after this much elapsed time (default: 1500)
//! - `SHARE_SHOW_DESCRIPTION` - Render the product description (default: false)
//! - `SHARE_SHOW_APP_BUTTON` - Render the "Open in app" button (default: true)
//! - `SHARE_SOCIAL_METADATA` - Emit Open Graph and Twitter tags (default: true)
//! - `SHARE_AUTO_REDIRECT` - Try the native app on page load (default: true)
//! - `SHARE_DESCRIPTION_IN_METADATA` - Use the product description in metadata (default: false)
//! - `SHARE_IMAGE_REMOTE_PATTERNS` - Comma-separated image allow-list, e.g.
//!   `https://cdn.example.com/products/**` (default: the record store's public product image bucket)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;
use xetivo_share_core::redirect::{
    DEFAULT_REDIRECT_DELAY_MS, DEFAULT_REDIRECT_STALE_AFTER_MS, RedirectTiming,
    RedirectTimingError,
};

use crate::images::{ImageAllowList, RemotePattern};
use crate::page::PageOptions;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Path of the public product image bucket on the record store host.
const DEFAULT_IMAGE_BUCKET_PATH: &str = "/storage/v1/object/public/product_images/**";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "placeholder",
    "replace-me",
    "insert-",
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

/// Share page application configuration.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public origin of the share site, without a trailing slash
    pub public_base_url: String,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Site name used in titles and `og:site_name`
    pub site_name: String,
    /// Native app URI scheme, without `://`
    pub app_scheme: String,
    /// App-or-web arbitration timing
    pub redirect_timing: RedirectTiming,
    /// Display mode for product pages
    pub page: PageOptions,
    /// Record store access
    pub record_store: RecordStoreConfig,
    /// Remote image hosts the page may reference
    pub images: ImageAllowList,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Record store configuration.
///
/// Both values are optional at load time; the record store client reports a
/// configuration error on use when either is missing.
///
/// Implements `Debug` manually to redact the access key.
#[derive(Clone, Default)]
pub struct RecordStoreConfig {
    /// Record store base URL (the REST API lives under `/rest/v1`)
    pub base_url: Option<Url>,
    /// Access key sent as `apikey` and bearer token
    pub anon_key: Option<SecretString>,
}

impl std::fmt::Debug for RecordStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStoreConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field(
                "anon_key",
                &self.anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RecordStoreConfig {
    /// Whether both the URL and the key are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.base_url.is_some() && self.anon_key.is_some()
    }
}

impl ShareConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, any value is
    /// invalid, or the record store key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("SHARE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHARE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SHARE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHARE_PORT".to_string(), e.to_string()))?;
        let public_base_url = parse_public_base_url(
            "SHARE_PUBLIC_BASE_URL",
            &get_required_env("SHARE_PUBLIC_BASE_URL")?,
        )?;
        let static_dir = PathBuf::from(get_env_or_default(
            "SHARE_STATIC_DIR",
            "crates/share/static",
        ));
        let site_name = get_env_or_default("SHARE_SITE_NAME", "Xetivo");
        let app_scheme =
            parse_app_scheme("SHARE_APP_SCHEME", &get_env_or_default("SHARE_APP_SCHEME", "xetivo"))?;

        let redirect_timing = redirect_timing_from_env()?;
        let page = page_options_from_env()?;
        let record_store = RecordStoreConfig::from_env()?;
        let images = image_allow_list_from_env(&record_store)?;

        Ok(Self {
            host,
            port,
            public_base_url,
            static_dir,
            site_name,
            app_scheme,
            redirect_timing,
            page,
            record_store,
            images,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_rate(
                "SENTRY_SAMPLE_RATE",
                &get_env_or_default("SENTRY_SAMPLE_RATE", "1.0"),
            )?,
            sentry_traces_sample_rate: parse_rate(
                "SENTRY_TRACES_SAMPLE_RATE",
                &get_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0"),
            )?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RecordStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_with_fallback("RECORD_STORE_URL", "SUPABASE_URL")
            .map(|value| parse_record_store_url("RECORD_STORE_URL", &value))
            .transpose()?;

        let anon_key = get_env_with_fallback("RECORD_STORE_ANON_KEY", "SUPABASE_ANON_KEY")
            .map(|value| {
                validate_secret_strength(&value, "RECORD_STORE_ANON_KEY")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;

        Ok(Self { base_url, anon_key })
    }
}

fn redirect_timing_from_env() -> Result<RedirectTiming, ConfigError> {
    let delay_ms = parse_millis(
        "SHARE_REDIRECT_DELAY_MS",
        get_optional_env("SHARE_REDIRECT_DELAY_MS"),
        DEFAULT_REDIRECT_DELAY_MS,
    )?;
    let stale_after_ms = parse_millis(
        "SHARE_REDIRECT_STALE_AFTER_MS",
        get_optional_env("SHARE_REDIRECT_STALE_AFTER_MS"),
        DEFAULT_REDIRECT_STALE_AFTER_MS,
    )?;

    validate_redirect_timing(delay_ms, stale_after_ms)
}

/// Build redirect timing, blaming the variable(s) that caused a rejection.
fn validate_redirect_timing(delay_ms: u64, stale_after_ms: u64) -> Result<RedirectTiming, ConfigError> {
    RedirectTiming::new(delay_ms, stale_after_ms).map_err(|e| {
        let key = match e {
            RedirectTimingError::ZeroDelay => "SHARE_REDIRECT_DELAY_MS",
            RedirectTimingError::StaleBeforeDelay { .. } => {
                "SHARE_REDIRECT_DELAY_MS/SHARE_REDIRECT_STALE_AFTER_MS"
            }
        };
        ConfigError::InvalidEnvVar(key.to_string(), e.to_string())
    })
}

fn page_options_from_env() -> Result<PageOptions, ConfigError> {
    let defaults = PageOptions::default();
    Ok(PageOptions::default()
        .show_description(env_flag("SHARE_SHOW_DESCRIPTION", defaults.show_description)?)
        .show_app_button(env_flag("SHARE_SHOW_APP_BUTTON", defaults.show_app_button)?)
        .emit_social_metadata(env_flag(
            "SHARE_SOCIAL_METADATA",
            defaults.emit_social_metadata,
        )?)
        .auto_redirect_to_app(env_flag("SHARE_AUTO_REDIRECT", defaults.auto_redirect_to_app)?)
        .description_in_metadata(env_flag(
            "SHARE_DESCRIPTION_IN_METADATA",
            defaults.description_in_metadata,
        )?))
}

fn image_allow_list_from_env(record_store: &RecordStoreConfig) -> Result<ImageAllowList, ConfigError> {
    if let Some(value) = get_optional_env("SHARE_IMAGE_REMOTE_PATTERNS") {
        return parse_image_patterns("SHARE_IMAGE_REMOTE_PATTERNS", &value);
    }

    Ok(default_image_allow_list(record_store))
}

/// The record store's public product image bucket, when the store is known.
fn default_image_allow_list(record_store: &RecordStoreConfig) -> ImageAllowList {
    let pattern = record_store.base_url.as_ref().and_then(|url| {
        let host = url.host_str()?;
        RemotePattern::parse(&format!("https://{host}{DEFAULT_IMAGE_BUCKET_PATH}")).ok()
    });

    ImageAllowList::new(pattern.into_iter().collect())
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable, falling back to a provider-specific name.
fn get_env_with_fallback(primary_key: &str, fallback_key: &str) -> Option<String> {
    get_optional_env(primary_key).or_else(|| get_optional_env(fallback_key))
}

fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| parse_bool(key, &value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_millis(key: &str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn parse_rate(key: &str, value: &str) -> Result<f32, ConfigError> {
    let rate = value
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Parse an absolute http(s) URL and strip any trailing slash.
fn parse_public_base_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be an http(s) URL (got scheme '{}')", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must have a host".to_string(),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not have a query or fragment".to_string(),
        ));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_record_store_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL with a host".to_string(),
        ));
    }

    Ok(url)
}

/// Validate a URI scheme name (RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )).
fn parse_app_scheme(key: &str, value: &str) -> Result<String, ConfigError> {
    let scheme = value.trim().trim_end_matches("://").to_ascii_lowercase();

    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if !valid {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("'{value}' is not a valid URI scheme"),
        ));
    }
    if matches!(scheme.as_str(), "http" | "https" | "javascript" | "data") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("'{scheme}' cannot be used as an app scheme"),
        ));
    }

    Ok(scheme)
}

fn parse_image_patterns(key: &str, value: &str) -> Result<ImageAllowList, ConfigError> {
    let patterns = value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            RemotePattern::parse(p)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ImageAllowList::new(patterns))
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

    // Real keys (JWTs, random tokens) have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
