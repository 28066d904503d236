//! Cache Events
//!
//! Events emitted by the cache service for monitoring and observability.

use crate::cache::backend::Backend;
use serde::{Deserialize, Serialize};

/// Events emitted by the cache service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// Entry was written
    Set {
        key: String,
        backend: Backend,
        expiry: Option<i64>,
    },

    /// Live entry found
    Hit { key: String, backend: Backend },

    /// No live entry found
    Miss { key: String, backend: Backend },

    /// Entry was found past its expiry and dropped
    Expired { key: String, backend: Backend },

    /// Entry was removed explicitly
    Removed { key: String, backend: Backend },

    /// Backend was cleared
    Cleared { backend: Backend },

    /// Write was dropped because the backend failed
    WriteFailed {
        key: String,
        backend: Backend,
        error: String,
    },

    /// Read degraded to a miss because the backend failed
    ReadFailed {
        key: String,
        backend: Backend,
        error: String,
    },
}

impl CacheEvent {
    /// Get the key associated with this event (if any)
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Set { key, .. }
            | CacheEvent::Hit { key, .. }
            | CacheEvent::Miss { key, .. }
            | CacheEvent::Expired { key, .. }
            | CacheEvent::Removed { key, .. }
            | CacheEvent::WriteFailed { key, .. }
            | CacheEvent::ReadFailed { key, .. } => Some(key),
            CacheEvent::Cleared { .. } => None,
        }
    }

    /// Get the backend this event concerns
    pub fn backend(&self) -> Backend {
        match self {
            CacheEvent::Set { backend, .. }
            | CacheEvent::Hit { backend, .. }
            | CacheEvent::Miss { backend, .. }
            | CacheEvent::Expired { backend, .. }
            | CacheEvent::Removed { backend, .. }
            | CacheEvent::Cleared { backend }
            | CacheEvent::WriteFailed { backend, .. }
            | CacheEvent::ReadFailed { backend, .. } => *backend,
        }
    }

    /// Check if this is an error event
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CacheEvent::WriteFailed { .. } | CacheEvent::ReadFailed { .. }
        )
    }
}
