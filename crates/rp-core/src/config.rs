//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, auth, storage, streaming, payment and rate
//! limiting. Every section defaults sensibly so a completely empty `{}` file
//! is valid. Secrets can be supplied through the environment instead of the
//! file; see [`Config::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub streaming: StreamingConfig,
    pub payment: PaymentConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary key lookup.
    ///
    /// Recognised keys: `REELPASS_HOST`, `REELPASS_PORT`, `REELPASS_DB_PATH`,
    /// `REELPASS_MEDIA_DIR`, `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET`,
    /// `REELPASS_PAYMENT_URL`. Unparseable values are logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("REELPASS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("REELPASS_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(e) => tracing::warn!("Ignoring REELPASS_PORT={port}: {e}"),
            }
        }
        if let Some(db) = lookup("REELPASS_DB_PATH") {
            self.server.db_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup("REELPASS_MEDIA_DIR") {
            self.storage.media_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("REELPASS_PAYMENT_URL") {
            self.payment.provider_url = url;
        }
        if let Some(key_id) = lookup("RAZORPAY_KEY_ID") {
            self.payment.key_id = Some(key_id);
        }
        if let Some(secret) = lookup("RAZORPAY_KEY_SECRET") {
            self.payment.key_secret = Some(secret);
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.payment.key_id.is_none() || self.payment.key_secret.is_none() {
            warnings.push(
                "payment.key_id / payment.key_secret not set; order creation will fail".into(),
            );
        }

        if !self.payment.require_signature {
            warnings.push(
                "payment.require_signature is disabled; client-asserted payments unlock media"
                    .into(),
            );
        }

        if self.payment.currency.len() != 3 {
            warnings.push(format!(
                "payment.currency '{}' is not a 3-letter ISO code",
                self.payment.currency
            ));
        }

        if self.streaming.chunk_size == 0 {
            warnings.push("streaming.chunk_size is 0; falling back to 64 KiB".into());
        }

        if self.rate_limit.orders_per_minute == 0 {
            warnings.push("rate_limit.orders_per_minute is 0; falling back to 30".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            db_path: PathBuf::from("./data/reelpass.db"),
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 24 * 7,
        }
    }
}

/// Blob storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory that asset storage keys are resolved against.
    pub media_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("./uploads/videos"),
        }
    }
}

/// Range-streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Content type used when the storage key's extension is not recognised.
    pub content_type: String,
    /// Read buffer size for streamed bodies, in bytes.
    pub chunk_size: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            content_type: "video/mp4".into(),
            chunk_size: 64 * 1024,
        }
    }
}

impl StreamingConfig {
    /// Chunk size with the zero case replaced by the default.
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            64 * 1024
        } else {
            self.chunk_size
        }
    }
}

/// Payment gateway and checkout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Base URL of the gateway's REST API.
    pub provider_url: String,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    /// ISO 4217 currency code for charges.
    pub currency: String,
    /// Whether assets priced at zero may be checked out.
    pub allow_free: bool,
    /// Whether confirmations must carry a valid gateway signature.
    pub require_signature: bool,
    /// Timeout for gateway HTTP calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider_url: "https://api.razorpay.com".into(),
            key_id: None,
            key_secret: None,
            currency: "INR".into(),
            allow_free: false,
            require_signature: true,
            timeout_secs: 15,
        }
    }
}

/// Request rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub orders_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            orders_per_minute: 30,
        }
    }
}
