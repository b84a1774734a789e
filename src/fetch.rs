//! Typed retrieval on top of the response cache
//!
//! `Fetcher` turns cached raw responses into caller-chosen types. The
//! `fetch_*` methods never fail: a transport failure, a non-200 status or a
//! body that does not decode is logged and reported as absence (`None` or an
//! empty `Vec`). The `try_fetch_*` methods run the same pipeline but return
//! the failure, for callers that need to tell "empty" from "failed".

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::cache::ResponseCache;
use crate::transport::{Transport, TransportError};

/// Why a fetch produced no value
#[derive(Debug, Error)]
pub enum FetchError {
    /// The response could not be loaded
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API answered with something other than 200
    #[error("API answered with status {0}")]
    Status(u16),

    /// The body is not valid JSON for the requested type
    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decodes cached API responses into typed values
pub struct Fetcher<T> {
    cache: ResponseCache<T>,
}

impl<T> Clone for Fetcher<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(cache: ResponseCache<T>) -> Self {
        Self { cache }
    }

    /// The cache this fetcher reads through
    pub fn cache(&self) -> &ResponseCache<T> {
        &self.cache
    }

    /// Fetches a single object, or `None` if it is missing or anything failed
    pub async fn fetch_one<R: DeserializeOwned>(&self, path: &str) -> Option<R> {
        self.try_fetch_one(path).await.unwrap_or_else(|err| {
            log_failure::<R>(path, &err);
            None
        })
    }

    /// Fetches a list of objects; empty if the list is empty or anything failed
    ///
    /// Never returns a partially decoded list.
    pub async fn fetch_many<R: DeserializeOwned>(&self, path: &str) -> Vec<R> {
        self.try_fetch_many(path).await.unwrap_or_else(|err| {
            log_failure::<R>(path, &err);
            Vec::new()
        })
    }

    /// Like [`fetch_one`](Self::fetch_one) but returns the failure
    ///
    /// A body of `null` is `Ok(None)`.
    pub async fn try_fetch_one<R: DeserializeOwned>(&self, path: &str) -> Result<Option<R>, FetchError> {
        let response = self.cache.get(path).await?;
        if !response.is_ok() {
            return Err(FetchError::Status(response.status));
        }
        Ok(serde_json::from_str::<Option<R>>(&response.body)?)
    }

    /// Like [`fetch_many`](Self::fetch_many) but returns the failure
    ///
    /// A body of `null` or `[]` is `Ok` with an empty list.
    pub async fn try_fetch_many<R: DeserializeOwned>(&self, path: &str) -> Result<Vec<R>, FetchError> {
        let response = self.cache.get(path).await?;
        if !response.is_ok() {
            return Err(FetchError::Status(response.status));
        }
        let items = serde_json::from_str::<Option<Vec<R>>>(&response.body)?;
        Ok(items.unwrap_or_default())
    }
}

/// Last path segment of a type name, e.g. `Order` for `crate::data::order::Order`
fn short_type_name<R>() -> &'static str {
    let full = std::any::type_name::<R>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn log_failure<R>(path: &str, err: &FetchError) {
    let shape = short_type_name::<R>();
    match err {
        FetchError::Status(status) => {
            log::warn!("No {} at {}: API answered with status {}", shape, path, status)
        }
        _ => log::error!("Error fetching {}s from {}: {}", shape, path, err),
    }
    log::debug!("{:?}", err);
}
