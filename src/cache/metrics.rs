//! Cache Metrics
//!
//! Cache-line aligned per-backend counters, safe to bump from any thread.

use crate::cache::backend::Backend;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

// =============================================================================
// Per-Backend Metrics (Cache-Line Aligned)
// =============================================================================

/// Counters for one backend, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct BackendMetrics {
    /// Reads that returned a value
    pub hits: AtomicU64,
    /// Reads that returned nothing (absent, expired or failed)
    pub misses: AtomicU64,
    /// Writes that landed
    pub writes: AtomicU64,
    /// Writes dropped because the backend failed
    pub write_failures: AtomicU64,
    /// Entries dropped by lazy expiry
    pub expirations: AtomicU64,
}

const _: () = assert!(std::mem::size_of::<BackendMetrics>() <= CACHE_LINE_SIZE);

impl BackendMetrics {
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }

    /// Create a snapshot of current counters
    pub fn snapshot(&self) -> BackendMetricsSnapshot {
        BackendMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BackendMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub expirations: u64,
}

impl BackendMetricsSnapshot {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Global Cache Metrics
// =============================================================================

/// Counters for every backend
#[derive(Debug, Default)]
pub struct CacheMetrics {
    backends: [BackendMetrics; 3],
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get metrics for a specific backend
    #[inline]
    pub fn backend(&self, backend: Backend) -> &BackendMetrics {
        &self.backends[backend.index()]
    }

    pub fn reset(&self) {
        self.backends.iter().for_each(BackendMetrics::reset);
    }
}

// =============================================================================
// Cache Stats
// =============================================================================

/// Snapshot returned by `CacheService::stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries in the memory backend, expired-but-unread ones included
    pub memory_entries: usize,
    /// Memory entries with a recorded expiry, expired or not
    pub memory_entries_with_expiry: usize,
    /// Items in the session area (area-wide)
    pub session_entries: usize,
    /// Items in the local area (area-wide)
    pub local_entries: usize,
    /// Counters per backend, indexed like [`Backend::ALL`]
    pub counters: [BackendMetricsSnapshot; 3],
}

impl CacheStats {
    /// Counters for one backend
    pub fn counters(&self, backend: Backend) -> &BackendMetricsSnapshot {
        &self.counters[backend.index()]
    }

    /// Hit ratio across all backends
    pub fn hit_ratio(&self) -> f64 {
        let hits: u64 = self.counters.iter().map(|c| c.hits).sum();
        let misses: u64 = self.counters.iter().map(|c| c.misses).sum();
        if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        }
    }
}
