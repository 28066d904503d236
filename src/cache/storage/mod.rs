//! Cache Storage Backends
//!
//! One [`EntryStore`] per [`Backend`]: the transient map and the two
//! persistent areas.

mod area;
mod memory;
mod persistent;

pub use area::{DirectoryArea, MemoryArea, StorageArea};
pub use memory::MemoryStore;
pub use persistent::PersistentStore;

use crate::cache::backend::Backend;
use crate::cache::entry::ExpiringEntry;
use crate::error::StoreResult;
use serde_json::Value;

// =============================================================================
// Lookup Result
// =============================================================================

/// Outcome of reading one key from a store
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Live entry
    Hit(Value),
    /// Entry was past its expiry and has been deleted
    Expired,
    /// Nothing stored under the key
    Absent,
}

// =============================================================================
// EntryStore Trait
// =============================================================================

/// Capability interface every backend implements
///
/// Reads apply lazy expiry: an entry found past its expiry is deleted and
/// reported as [`Lookup::Expired`]. Nothing sweeps expired entries in the
/// background.
pub trait EntryStore: Send + Sync {
    /// Get the backend this store serves
    fn backend(&self) -> Backend;

    /// Look up the entry under `key` at `now_ms`
    fn read(&self, key: &str, now_ms: i64) -> StoreResult<Lookup>;

    /// Write an entry, replacing any previous one
    fn write(&self, key: &str, entry: ExpiringEntry) -> StoreResult<()>;

    /// Delete an entry; absent keys are not an error
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Delete every entry in the backend
    fn clear(&self) -> StoreResult<()>;

    /// Number of stored entries, expired-but-unread ones included
    fn len(&self) -> StoreResult<usize>;

    /// Whether the backend holds no entries
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of entries with a recorded expiry, expired or not
    fn expiring_len(&self) -> StoreResult<usize>;
}
