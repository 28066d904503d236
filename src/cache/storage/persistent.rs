//! Persistent Store
//!
//! Backs the session and local backends with a [`StorageArea`]. Each entry is
//! written as `{"value": ..., "expiry": ...}` JSON under the caller's key.

use crate::cache::backend::Backend;
use crate::cache::entry::ExpiringEntry;
use crate::cache::storage::{EntryStore, Lookup, StorageArea};
use crate::error::{StoreError, StoreResult};
use serde_json::Value;
use tracing::debug;

// =============================================================================
// Persistent Store
// =============================================================================

/// Entry store over a string key/value area
pub struct PersistentStore {
    backend: Backend,
    area: Box<dyn StorageArea>,
}

impl PersistentStore {
    /// Wrap `area` as the store for `backend`
    pub fn new(backend: Backend, area: Box<dyn StorageArea>) -> Self {
        debug_assert!(backend.is_persistent(), "memory backend has its own store");
        Self { backend, area }
    }

    /// Session-scoped store
    pub fn session(area: impl StorageArea + 'static) -> Self {
        Self::new(Backend::Session, Box::new(area))
    }

    /// Durable local store
    pub fn local(area: impl StorageArea + 'static) -> Self {
        Self::new(Backend::Local, Box::new(area))
    }

    /// Underlying area
    pub fn area(&self) -> &dyn StorageArea {
        self.area.as_ref()
    }

    /// Tear down the underlying area
    pub fn close(&self) -> StoreResult<()> {
        self.area.close()
    }

    fn decode(&self, key: &str, raw: &str) -> StoreResult<ExpiringEntry> {
        serde_json::from_str(raw).map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl EntryStore for PersistentStore {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn read(&self, key: &str, now_ms: i64) -> StoreResult<Lookup> {
        let Some(raw) = self.area.get_item(key)? else {
            return Ok(Lookup::Absent);
        };

        let entry = self.decode(key, &raw)?;
        if entry.is_expired_at(now_ms) {
            debug!(backend = %self.backend, key, "Dropping expired entry");
            self.area.remove_item(key)?;
            return Ok(Lookup::Expired);
        }
        Ok(Lookup::Hit(entry.value))
    }

    fn write(&self, key: &str, entry: ExpiringEntry) -> StoreResult<()> {
        let encoded = serde_json::to_string(&entry)?;
        self.area.set_item(key, &encoded)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.area.remove_item(key)
    }

    fn clear(&self) -> StoreResult<()> {
        self.area.clear()
    }

    fn len(&self) -> StoreResult<usize> {
        self.area.len()
    }

    fn expiring_len(&self) -> StoreResult<usize> {
        let mut count = 0;
        for key in self.area.keys()? {
            let Some(raw) = self.area.get_item(&key)? else {
                continue;
            };
            // Foreign items in the area are not ours to count
            if let Ok(entry) = self.decode(&key, &raw) {
                if entry.expiry.is_some() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
