//! Configuration for busker.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Checkout settings.
    #[serde(default)]
    pub checkout: CheckoutConfig,

    /// Upload settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Read cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Backend connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Artist identity the client acts as when publishing.
    #[serde(default)]
    pub identity: Option<String>,

    /// Transport timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Checkout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Origin the gateway redirects back to (scheme and host).
    #[serde(default = "default_origin")]
    pub origin: String,

    /// ISO currency code for donation carts.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Smallest accepted total, in minor units.
    #[serde(default = "default_minimum_minor_units")]
    pub minimum_minor_units: u64,
}

/// Upload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Size of each streamed body chunk in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Ceiling for media uploads (unlimited when unset).
    #[serde(default)]
    pub max_media_bytes: Option<usize>,

    /// Ceiling for avatar uploads.
    #[serde(default = "default_max_avatar_bytes")]
    pub max_avatar_bytes: usize,
}

/// Read cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached read results.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            checkout: CheckoutConfig::default(),
            upload: UploadConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            identity: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            currency: default_currency(),
            minimum_minor_units: default_minimum_minor_units(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_media_bytes: None,
            max_avatar_bytes: default_max_avatar_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_minimum_minor_units() -> u64 {
    100 // one currency unit
}

const fn default_chunk_size() -> usize {
    256 * 1024
}

const fn default_max_avatar_bytes() -> usize {
    5 * 1024 * 1024
}

const fn default_cache_capacity() -> usize {
    1_024
}

/// Default location of the configuration file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "busker")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".busker/config.toml"))
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
