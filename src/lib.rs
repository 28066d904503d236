//! Hostel Cache - client-side data layer for the hostel management frontend
//!
//! A TTL cache over three storage backends, a read-through REST facade on
//! top of it, and the page-list builder used by paged tables.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           Screens / CLI                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐   cached_get    ┌───────────────────────────┐  │
//! │  │    ApiClient     │ ──────────────▶ │       CacheService        │  │
//! │  │ (reqwest, token, │   get_or_set    │  memory │ session │ local │  │
//! │  │  fallback URL)   │                 │   TTL, lazy expiry        │  │
//! │  └──────────────────┘                 └───────────────────────────┘  │
//! │                                                                      │
//! │  ┌──────────────────┐                                                │
//! │  │   page_model     │  1 … 9 10 11 … 20                              │
//! │  └──────────────────┘                                                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: TTL cache service and its storage backends
//! - [`api`]: REST client and response normalisers
//! - [`pagination`]: Page-list builder
//! - [`config`]: Configuration loading
//! - [`error`]: Error types and handling

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod pagination;

// Re-export commonly used types
pub use api::{extract_list, extract_object, extract_total, ApiClient, HttpTransport};

pub use cache::{Backend, CacheEvent, CacheService, CacheStats, Ttl, DEFAULT_TTL_MS};

pub use config::{ApiConfig, AppConfig, CacheServiceConfig};

pub use error::{ApiError, Error, Result, StoreError, StoreResult};

pub use pagination::{page_model, PageItem, PageWindow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
