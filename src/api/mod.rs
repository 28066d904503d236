//! REST API facade
//!
//! JSON client for the hostel backend plus the helpers that normalise its
//! response shapes. Producers passed to
//! [`CacheService::get_or_set`](crate::cache::CacheService::get_or_set) are
//! usually built on [`ApiClient`].

pub mod client;
pub mod transform;
pub mod transport;

pub use client::ApiClient;
pub use transform::{extract_list, extract_object, extract_total};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, TransportError};
