//! Transient In-Memory Store
//!
//! Values and expiry timestamps live in two DashMaps keyed by the same
//! string. An entry without an expiry record never expires.

use crate::cache::backend::Backend;
use crate::cache::entry::{is_expired, ExpiringEntry};
use crate::cache::storage::{EntryStore, Lookup};
use crate::error::StoreResult;
use dashmap::DashMap;
use serde_json::Value;

// =============================================================================
// Memory Store
// =============================================================================

/// Transient backend, lost when the process exits
pub struct MemoryStore {
    /// Stored values
    values: DashMap<String, Value>,
    /// Side table of absolute expiry timestamps (Unix millis)
    expiries: DashMap<String, i64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            expiries: DashMap::new(),
        }
    }

    /// Recorded expiry for a key, if any
    pub fn expiry_of(&self, key: &str) -> Option<i64> {
        self.expiries.get(key).map(|e| *e.value())
    }

    fn evict(&self, key: &str) {
        self.values.remove(key);
        self.expiries.remove(key);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn read(&self, key: &str, now_ms: i64) -> StoreResult<Lookup> {
        if is_expired(self.expiry_of(key), now_ms) {
            self.evict(key);
            return Ok(Lookup::Expired);
        }
        Ok(match self.values.get(key) {
            Some(r) => Lookup::Hit(r.value().clone()),
            None => Lookup::Absent,
        })
    }

    fn write(&self, key: &str, entry: ExpiringEntry) -> StoreResult<()> {
        self.values.insert(key.to_string(), entry.value);
        match entry.expiry {
            Some(expiry) => {
                self.expiries.insert(key.to_string(), expiry);
            }
            None => {
                // Overwriting with a permanent value drops the old deadline
                self.expiries.remove(key);
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.evict(key);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.values.clear();
        self.expiries.clear();
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.values.len())
    }

    fn expiring_len(&self) -> StoreResult<usize> {
        Ok(self.expiries.len())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::Ttl;
    use serde_json::json;

    #[test]
    fn test_basic_operations() {
        let store = MemoryStore::new();

        store
            .write("hostel:1", ExpiringEntry::new(json!({"name": "North"}), Ttl::Millis(100), 0))
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.expiring_len().unwrap(), 1);
        assert_eq!(
            store.read("hostel:1", 50).unwrap(),
            Lookup::Hit(json!({"name": "North"}))
        );

        store.remove("hostel:1").unwrap();
        assert_eq!(store.read("hostel:1", 50).unwrap(), Lookup::Absent);
        assert!(store.is_empty().unwrap());
        assert_eq!(store.expiring_len().unwrap(), 0);
    }

    #[test]
    fn test_lazy_expiry_removes_both_tables() {
        let store = MemoryStore::new();
        store
            .write("k", ExpiringEntry::new(json!(1), Ttl::Millis(10), 1_000))
            .unwrap();

        // Not purged until read
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.read("k", 1_011).unwrap(), Lookup::Expired);
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.expiring_len().unwrap(), 0);
    }

    #[test]
    fn test_permanent_overwrite_drops_expiry() {
        let store = MemoryStore::new();
        store
            .write("k", ExpiringEntry::new(json!("old"), Ttl::Millis(10), 0))
            .unwrap();
        store.write("k", ExpiringEntry::permanent(json!("new"))).unwrap();

        assert_eq!(store.expiry_of("k"), None);
        assert_eq!(store.read("k", i64::MAX).unwrap(), Lookup::Hit(json!("new")));
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .write(&format!("room:{}", i), ExpiringEntry::new(json!(i), Ttl::Millis(5), 0))
                .unwrap();
        }
        store.write("forever", ExpiringEntry::permanent(json!(0))).unwrap();
        assert_eq!(store.len().unwrap(), 4);
        assert_eq!(store.expiring_len().unwrap(), 3);

        store.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.expiring_len().unwrap(), 0);
    }
}
