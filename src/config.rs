//! Configuration
//!
//! Loaded from YAML, then overridden field by field from CLI flags and
//! environment variables in `main.rs`.

use crate::cache::backend::DEFAULT_TTL_MS;
use crate::cache::entry::Ttl;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser storage areas are typically capped at 5 MiB per origin
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

// =============================================================================
// Cache Service Configuration
// =============================================================================

/// Configuration for the cache service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheServiceConfig {
    /// TTL used when callers do not choose one (<= 0 means never expire)
    pub default_ttl_ms: i64,
    /// Directory of the local area; in-memory area when unset
    pub local_dir: Option<PathBuf>,
    /// Parent directory of session areas; in-memory area when unset
    pub session_root: Option<PathBuf>,
    /// Session identifier, names the session area under `session_root`
    pub session_id: String,
    /// Byte quota per persistent area (None = unbounded)
    pub quota_bytes: Option<u64>,
    /// Collapse concurrent read-through misses for the same key
    pub single_flight: bool,
    /// Event channel capacity
    pub event_channel_capacity: usize,
}

impl Default for CacheServiceConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS as i64,
            local_dir: None,
            session_root: None,
            session_id: "default".to_string(),
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            single_flight: false,
            event_channel_capacity: 1024,
        }
    }
}

impl CacheServiceConfig {
    /// Default TTL as a [`Ttl`]
    pub fn default_ttl(&self) -> Ttl {
        Ttl::from_millis(self.default_ttl_ms)
    }

    /// Directory of this session's area, if sessions are on disk
    pub fn session_dir(&self) -> Option<PathBuf> {
        self.session_root
            .as_ref()
            .map(|root| root.join(&self.session_id))
    }

    /// Check the configuration for values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(Error::Configuration("session_id must not be empty".into()));
        }
        if self.session_id.contains(['/', '\\']) || self.session_id == ".." {
            return Err(Error::Configuration(format!(
                "session_id must be a single path component: {}",
                self.session_id
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Configuration(
                "event_channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// API Configuration
// =============================================================================

/// Configuration for the REST facade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Primary base URL
    pub base_url: String,
    /// Base URL retried once when the primary resets the connection
    pub fallback_base_url: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Bearer token attached to every request
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            fallback_base_url: None,
            timeout_ms: 30_000,
            auth_token: None,
        }
    }
}

impl ApiConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the fallback base URL
    pub fn with_fallback(mut self, base_url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(base_url.into());
        self
    }

    /// Set the authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for url in std::iter::once(&self.base_url).chain(self.fallback_base_url.iter()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Configuration(format!(
                    "base URL must be http(s): {}",
                    url
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(Error::Configuration("timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheServiceConfig,
    pub api: ApiConfig,
}

impl AppConfig {
    /// Parse YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.api.validate()
    }
}
