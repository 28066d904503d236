//! Cache Service
//!
//! Uniform get/set/remove/clear/has/get_or_set contract over the three
//! backends, with per-entry TTL and lazy expiry.
//!
//! Storage failures never reach callers: reads degrade to a miss and writes
//! are dropped, both logged and emitted as events. The `try_*` variants expose
//! the typed [`StoreError`] for callers that want to react to it.

use crate::cache::backend::Backend;
use crate::cache::clock::{Clock, SystemClock};
use crate::cache::entry::{ExpiringEntry, Ttl};
use crate::cache::events::CacheEvent;
use crate::cache::metrics::{CacheMetrics, CacheStats};
use crate::cache::storage::{
    DirectoryArea, EntryStore, Lookup, MemoryArea, MemoryStore, PersistentStore, StorageArea,
};
use crate::config::CacheServiceConfig;
use crate::error::{Result, StoreError, StoreResult};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Per-key lock shared by concurrent read-through misses
type FlightSlot = Arc<Mutex<()>>;

// =============================================================================
// Cache Service
// =============================================================================

/// Client-side TTL cache over memory, session and local backends
///
/// Construct one explicitly and share it as `Arc<CacheService>`.
pub struct CacheService {
    /// Transient backend
    memory: MemoryStore,
    /// Session-scoped backend
    session: PersistentStore,
    /// Durable backend
    local: PersistentStore,
    /// Time source for expiry
    clock: Arc<dyn Clock>,
    /// Counters
    metrics: CacheMetrics,
    /// TTL suggested to callers
    default_ttl: Ttl,
    /// Whether concurrent misses on one key share a producer run
    single_flight: bool,
    /// In-flight read-through slots keyed by (backend, key)
    in_flight: DashMap<(Backend, String), FlightSlot>,
    /// Event broadcaster
    event_tx: broadcast::Sender<CacheEvent>,
}

impl CacheService {
    /// Create a service whose persistent backends are in-memory areas
    pub fn in_memory() -> Self {
        let config = CacheServiceConfig::default();
        Self::with_areas(
            &config,
            Box::new(MemoryArea::with_quota(config.quota_bytes)),
            Box::new(MemoryArea::with_quota(config.quota_bytes)),
            Arc::new(SystemClock),
        )
    }

    /// Create a service from configuration, opening on-disk areas where
    /// directories are configured
    pub fn with_config(config: &CacheServiceConfig) -> Result<Self> {
        config.validate()?;

        let session_area: Box<dyn StorageArea> = match config.session_dir() {
            Some(dir) => Box::new(DirectoryArea::with_quota(dir, config.quota_bytes)?),
            None => Box::new(MemoryArea::with_quota(config.quota_bytes)),
        };
        let local_area: Box<dyn StorageArea> = match &config.local_dir {
            Some(dir) => Box::new(DirectoryArea::with_quota(dir.clone(), config.quota_bytes)?),
            None => Box::new(MemoryArea::with_quota(config.quota_bytes)),
        };

        let service = Self::with_areas(config, session_area, local_area, Arc::new(SystemClock));
        info!(
            session = %service.session.area().describe(),
            local = %service.local.area().describe(),
            default_ttl = %service.default_ttl,
            single_flight = service.single_flight,
            "Cache service initialized"
        );
        Ok(service)
    }

    /// Create a service over explicit areas and clock
    pub fn with_areas(
        config: &CacheServiceConfig,
        session_area: Box<dyn StorageArea>,
        local_area: Box<dyn StorageArea>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            memory: MemoryStore::new(),
            session: PersistentStore::new(Backend::Session, session_area),
            local: PersistentStore::new(Backend::Local, local_area),
            clock,
            metrics: CacheMetrics::new(),
            default_ttl: config.default_ttl(),
            single_flight: config.single_flight,
            in_flight: DashMap::new(),
            event_tx,
        }
    }

    /// TTL configured as the default
    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    /// Subscribe to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    /// Emit a cache event
    fn emit_event(&self, event: CacheEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Get the store for a backend
    fn store(&self, backend: Backend) -> &dyn EntryStore {
        match backend {
            Backend::Memory => &self.memory,
            Backend::Session => &self.session,
            Backend::Local => &self.local,
        }
    }

    fn check_key(key: &str) -> StoreResult<()> {
        if key.is_empty() {
            Err(StoreError::InvalidKey(key.to_string()))
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Typed operations
    // =========================================================================

    /// Look up `key`, reporting storage failures
    pub fn try_get(&self, key: &str, backend: Backend) -> StoreResult<Lookup> {
        Self::check_key(key)?;
        self.store(backend).read(key, self.clock.now_ms())
    }

    /// Write `value` under `key`, reporting storage failures
    pub fn try_set<V>(&self, key: &str, value: &V, ttl: Ttl, backend: Backend) -> StoreResult<()>
    where
        V: Serialize + ?Sized,
    {
        Self::check_key(key)?;
        let entry = ExpiringEntry::new(serde_json::to_value(value)?, ttl, self.clock.now_ms());
        let expiry = entry.expiry;
        self.store(backend).write(key, entry)?;

        self.metrics.backend(backend).record_write();
        self.emit_event(CacheEvent::Set {
            key: key.to_string(),
            backend,
            expiry,
        });
        Ok(())
    }

    /// Remove `key`, reporting storage failures
    pub fn try_remove(&self, key: &str, backend: Backend) -> StoreResult<()> {
        Self::check_key(key)?;
        self.store(backend).remove(key)?;
        self.emit_event(CacheEvent::Removed {
            key: key.to_string(),
            backend,
        });
        Ok(())
    }

    /// Clear a backend, reporting storage failures
    pub fn try_clear(&self, backend: Backend) -> StoreResult<()> {
        self.store(backend).clear()?;
        self.emit_event(CacheEvent::Cleared { backend });
        Ok(())
    }

    // =========================================================================
    // Fail-safe operations
    // =========================================================================

    /// Store `value` under `key` for `ttl`
    ///
    /// Returns whether the write landed. Failures (quota, unavailable area,
    /// serialization) are logged and dropped.
    pub fn set<V>(&self, key: &str, value: &V, ttl: Ttl, backend: Backend) -> bool
    where
        V: Serialize + ?Sized,
    {
        match self.try_set(key, value, ttl, backend) {
            Ok(()) => {
                debug!(key, backend = %backend, ttl = %ttl, "Cache set");
                true
            }
            Err(e) => {
                warn!(key, backend = %backend, error = %e, "Cache write dropped");
                self.metrics.backend(backend).record_write_failure();
                self.emit_event(CacheEvent::WriteFailed {
                    key: key.to_string(),
                    backend,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Live raw value under `key`, or `None`
    pub fn get_value(&self, key: &str, backend: Backend) -> Option<Value> {
        let metrics = self.metrics.backend(backend);
        match self.try_get(key, backend) {
            Ok(Lookup::Hit(value)) => {
                debug!(key, backend = %backend, "Cache hit");
                metrics.record_hit();
                self.emit_event(CacheEvent::Hit {
                    key: key.to_string(),
                    backend,
                });
                Some(value)
            }
            Ok(Lookup::Expired) => {
                debug!(key, backend = %backend, "Cache entry expired");
                metrics.record_expiration();
                metrics.record_miss();
                self.emit_event(CacheEvent::Expired {
                    key: key.to_string(),
                    backend,
                });
                None
            }
            Ok(Lookup::Absent) => {
                debug!(key, backend = %backend, "Cache miss");
                metrics.record_miss();
                self.emit_event(CacheEvent::Miss {
                    key: key.to_string(),
                    backend,
                });
                None
            }
            Err(e) => {
                warn!(key, backend = %backend, error = %e, "Cache read failed, treating as miss");
                metrics.record_miss();
                self.emit_event(CacheEvent::ReadFailed {
                    key: key.to_string(),
                    backend,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Live value under `key` decoded as `V`, or `None`
    ///
    /// A stored value that does not decode as `V` is reported as a miss.
    pub fn get<V: DeserializeOwned>(&self, key: &str, backend: Backend) -> Option<V> {
        let value = self.get_value(key, backend)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, backend = %backend, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Whether a live value exists under `key`; same expiry rule as `get`
    pub fn has(&self, key: &str, backend: Backend) -> bool {
        self.get_value(key, backend).is_some()
    }

    /// Remove `key`; absent keys and failures are not reported
    pub fn remove(&self, key: &str, backend: Backend) {
        if let Err(e) = self.try_remove(key, backend) {
            warn!(key, backend = %backend, error = %e, "Cache remove failed");
        }
    }

    /// Remove every entry in a backend
    ///
    /// For session and local this empties the whole area, including items
    /// this service did not write.
    pub fn clear(&self, backend: Backend) {
        match self.try_clear(backend) {
            Ok(()) => info!(backend = %backend, "Cache backend cleared"),
            Err(e) => warn!(backend = %backend, error = %e, "Cache clear failed"),
        }
    }

    // =========================================================================
    // Read-through
    // =========================================================================

    /// Return the cached value under `key`, or run `producer`, cache its
    /// output for `ttl` and return it
    ///
    /// A producer error is returned unchanged and nothing is cached. Unless
    /// single-flight is configured, concurrent misses on the same key each
    /// run their own producer and the last write wins.
    pub async fn get_or_set<V, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Ttl,
        backend: Backend,
    ) -> std::result::Result<V, E>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(cached) = self.get::<V>(key, backend) {
            return Ok(cached);
        }

        if !self.single_flight {
            return self.produce(key, producer, ttl, backend).await;
        }

        let slot_key = (backend, key.to_string());
        let slot: FlightSlot = self.in_flight.entry(slot_key.clone()).or_default().clone();

        let result = async {
            let _guard = match slot.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!(key, backend = %backend, "Waiting for in-flight producer");
                    slot.lock().await
                }
            };
            // A producer may have finished between the first read and the lock
            if let Some(cached) = self.peek::<V>(key, backend) {
                debug!(key, backend = %backend, "Served by earlier producer");
                return Ok(cached);
            }
            self.produce(key, producer, ttl, backend).await
        }
        .await;

        drop(slot);
        self.in_flight
            .remove_if(&slot_key, |_, slot| Arc::strong_count(slot) == 1);
        result
    }

    /// Live value under `key` without touching metrics or events
    fn peek<V: DeserializeOwned>(&self, key: &str, backend: Backend) -> Option<V> {
        match self.try_get(key, backend) {
            Ok(Lookup::Hit(value)) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    async fn produce<V, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Ttl,
        backend: Backend,
    ) -> std::result::Result<V, E>
    where
        V: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        debug!(key, backend = %backend, "Invoking producer");
        let value = producer().await?;
        self.set(key, &value, ttl, backend);
        Ok(value)
    }

    // =========================================================================
    // Lifecycle & stats
    // =========================================================================

    /// Snapshot of entry counts and counters
    pub fn stats(&self) -> CacheStats {
        let count = |backend: Backend, result: StoreResult<usize>| {
            result.unwrap_or_else(|e| {
                warn!(backend = %backend, error = %e, "Could not count entries");
                0
            })
        };

        CacheStats {
            memory_entries: count(Backend::Memory, self.memory.len()),
            memory_entries_with_expiry: count(Backend::Memory, self.memory.expiring_len()),
            session_entries: count(Backend::Session, self.session.len()),
            local_entries: count(Backend::Local, self.local.len()),
            counters: Backend::ALL.map(|b| self.metrics.backend(b).snapshot()),
        }
    }

    /// Drop all memory entries and zero the counters
    pub fn reset(&self) {
        let _ = self.memory.clear();
        self.metrics.reset();
    }

    /// End the session: wipe and remove the session area
    pub fn close_session(&self) -> StoreResult<()> {
        self.session.close()?;
        self.emit_event(CacheEvent::Cleared {
            backend: Backend::Session,
        });
        info!(area = %self.session.area().describe(), "Session closed");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
