//! Client-Side TTL Cache
//!
//! One uniform contract over three storage backends:
//! - **Memory**: process-local map, gone when the process exits
//! - **Session**: persistent area scoped to one session, wiped on close
//! - **Local**: durable area that outlives sessions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          CacheService                            │
//! │   get / set / has / remove / clear / get_or_set / stats          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐    │
//! │  │ MemoryStore  │  │ PersistentStore  │  │ PersistentStore  │    │
//! │  │  (DashMap)   │  │    (session)     │  │     (local)      │    │
//! │  └──────────────┘  └────────┬─────────┘  └────────┬─────────┘    │
//! │                             │                     │              │
//! │                      ┌──────┴─────────────────────┴──────┐       │
//! │                      │  StorageArea (memory | directory) │       │
//! │                      └───────────────────────────────────┘       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  • Lazy expiry on read        • Storage failures read as misses  │
//! │  • Cache-line aligned metrics • Broadcast events                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hostel_cache::cache::{Backend, CacheService, Ttl};
//!
//! let cache = CacheService::in_memory();
//! cache.set("hostels", &hostels, Ttl::Millis(60_000), Backend::Memory);
//!
//! let rooms: Vec<Room> = cache
//!     .get_or_set("rooms:4", || api.get_json("/rooms?hostel=4"), Ttl::default(), Backend::Session)
//!     .await?;
//!
//! let stats = cache.stats();
//! println!("Hit ratio: {:.2}%", stats.hit_ratio() * 100.0);
//! ```

pub mod backend;
pub mod clock;
pub mod entry;
pub mod events;
pub mod metrics;
pub mod service;
pub mod storage;

// Re-export main types
pub use backend::{Backend, DEFAULT_TTL_MS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{ExpiringEntry, Ttl};
pub use events::CacheEvent;
pub use metrics::{BackendMetricsSnapshot, CacheMetrics, CacheStats};
pub use service::CacheService;
pub use storage::{DirectoryArea, EntryStore, Lookup, MemoryArea, StorageArea};
