//! AlphaTrader REST client library
//!
//! A typed client for the AlphaTrader trading game API. Responses are cached
//! by request path, loaded once under concurrent demand, refreshed in the
//! background and decoded into plain value structs.
//!
//! ```ignore
//! use alphatrader_rest::{ApiConfig, CacheConfig, CompanyProfile, Fetcher, HttpTransport, RefreshHandle, ResponseCache};
//!
//! let config = ApiConfig::from_env()?;
//! let cache = ResponseCache::new(HttpTransport::new(&config)?, CacheConfig::from_api_config(&config));
//! let refresher = RefreshHandle::spawn(cache.clone());
//! let fetcher = Fetcher::new(cache);
//!
//! let profile = CompanyProfile::get_by_company(&fetcher, "abc").await;
//! refresher.shutdown().await;
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod fetch;
pub mod refresh;
pub mod transport;

pub use cache::{CacheConfig, ResponseCache};
pub use config::{ApiConfig, ConfigError};
pub use data::{CompanyCapabilities, CompanyProfile, Order};
pub use fetch::{FetchError, Fetcher};
pub use refresh::{RefreshHandle, RefreshMessage};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};
