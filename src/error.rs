//! Error types for the hostel cache
//!
//! Storage failures are absorbed by the cache service and surface only as
//! misses, so [`StoreError`] is mostly seen through the `try_*` operations.
//! [`ApiError`] is what producers built on the REST facade fail with.

use thiserror::Error;

// =============================================================================
// Storage Errors
// =============================================================================

/// Failure of a single storage-area or entry-store operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: {used} + {requested} bytes over limit of {quota} bytes")]
    QuotaExceeded {
        used: u64,
        requested: u64,
        quota: u64,
    },

    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Storage area unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed entry for key {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same operation later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// =============================================================================
// API Errors
// =============================================================================

/// Errors raised by the REST facade
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Connection reset by {base_url}")]
    ConnectionReset { base_url: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status code, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the error is unauthorised/forbidden
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

// =============================================================================
// Crate Error
// =============================================================================

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Storage(e) => e.is_transient(),
            Error::Api(ApiError::ConnectionReset { .. } | ApiError::Timeout { .. }) => true,
            Error::Api(ApiError::Status { status, .. }) => *status >= 500,
            Error::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
