//! Cache module for API responses
//!
//! This module provides an in-memory response cache keyed by request path.
//! Missing paths are loaded through the transport exactly once even under
//! concurrent demand, idle entries expire, and the least recently accessed
//! entry is evicted when the cache is full. Resident entries can be reloaded
//! in place; a failed reload keeps serving the previous response.

mod manager;

pub use manager::{
    CacheConfig, CachedResponse, RefreshFailure, RefreshSummary, ResponseCache,
    DEFAULT_EXPIRE_AFTER_ACCESS, DEFAULT_MAX_ENTRIES, DEFAULT_REFRESH_INTERVAL,
    DEFAULT_STALE_AFTER_FAILURES,
};
