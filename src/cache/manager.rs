//! In-memory response cache keyed by request path
//!
//! Provides a `ResponseCache` that loads missing paths through a [`Transport`],
//! shares one in-flight load between concurrent requesters of the same path,
//! evicts by access recency and idle time, and reloads every resident path on
//! demand for the background refresher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::config::{ApiConfig, DEFAULT_REFRESH_MINUTES};
use crate::transport::{RawResponse, Transport, TransportError};

/// Default maximum number of resident entries
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default idle time after which an entry expires (1 day)
pub const DEFAULT_EXPIRE_AFTER_ACCESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between refresh cycles (5 minutes)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(DEFAULT_REFRESH_MINUTES * 60);

/// Default number of consecutive failed refreshes before an entry is reported stale
pub const DEFAULT_STALE_AFTER_FAILURES: u32 = 3;

/// Cache tuning, fixed for the lifetime of a cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum resident entries; the least recently accessed is evicted beyond it
    pub max_entries: usize,
    /// Entries idle for longer than this are dropped on next access
    pub expire_after_access: Duration,
    /// Period of the background refresher; zero disables it
    pub refresh_interval: Duration,
    /// Consecutive refresh failures after which an entry counts as stale; zero never
    pub stale_after_failures: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            expire_after_access: DEFAULT_EXPIRE_AFTER_ACCESS,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            stale_after_failures: DEFAULT_STALE_AFTER_FAILURES,
        }
    }
}

impl CacheConfig {
    /// Default tuning with the refresh interval taken from the API settings
    pub fn from_api_config(config: &ApiConfig) -> Self {
        Self {
            refresh_interval: config.refresh_interval,
            ..Default::default()
        }
    }
}

/// A resident entry. Replaced as a whole, never patched field by field.
#[derive(Debug)]
struct CacheEntry {
    response: RawResponse,
    loaded_at: Instant,
    last_accessed: Instant,
    /// Access order stamp used for LRU eviction
    last_used: u64,
    failed_refreshes: u32,
}

/// Snapshot of a resident entry, as returned by [`ResponseCache::peek`]
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The stored response, whatever its status
    pub response: RawResponse,
    /// When the response was loaded or last successfully refreshed
    pub loaded_at: Instant,
    /// When the entry was last read through `get`
    pub last_accessed: Instant,
    /// Consecutive failed refreshes since the last successful load
    pub failed_refreshes: u32,
    /// Whether `failed_refreshes` reached the configured threshold
    pub is_stale: bool,
}

/// A path whose reload failed during a refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    pub path: String,
    pub error: TransportError,
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    /// Paths reloaded successfully
    pub refreshed: usize,
    /// Paths whose reload failed; their previous value is still resident
    pub failures: Vec<RefreshFailure>,
    /// Idle entries dropped before the cycle started
    pub expired: usize,
}

type SharedLoad = Shared<BoxFuture<'static, Result<RawResponse, TransportError>>>;

struct InFlight {
    load: SharedLoad,
    /// Store the result even if the path is not resident when the load ends
    insert: bool,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    clock: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Returns the resident response and marks it accessed, dropping it if idle too long
    fn hit(&mut self, path: &str, now: Instant, ttl: Duration) -> Option<RawResponse> {
        let stamp = self.tick();
        match self.entries.get_mut(path) {
            Some(entry) if now.duration_since(entry.last_accessed) <= ttl => {
                entry.last_accessed = now;
                entry.last_used = stamp;
                return Some(entry.response.clone());
            }
            Some(_) => {}
            None => return None,
        }
        self.entries.remove(path);
        log::debug!("Cache entry for {} expired after {:?} idle", path, ttl);
        None
    }

    fn evict_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_accessed) <= ttl);
        before - self.entries.len()
    }

    fn insert(&mut self, path: &str, response: RawResponse, now: Instant, max_entries: usize) {
        if max_entries == 0 {
            return;
        }
        if !self.entries.contains_key(path) {
            while self.entries.len() >= max_entries {
                match self.evict_lru() {
                    Some(evicted) => log::debug!("Evicted least recently used entry {}", evicted),
                    None => break,
                }
            }
        }
        let stamp = self.tick();
        self.entries.insert(
            path.to_string(),
            CacheEntry {
                response,
                loaded_at: now,
                last_accessed: now,
                last_used: stamp,
                failed_refreshes: 0,
            },
        );
    }

    fn evict_lru(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(path, _)| path.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

struct Inner<T> {
    transport: T,
    config: CacheConfig,
    state: Mutex<State>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a finished load to the map and clears its in-flight slot
    fn finish_load(&self, path: &str, result: &Result<RawResponse, TransportError>) {
        let mut state = self.lock();
        let insert = state
            .in_flight
            .remove(path)
            .map(|in_flight| in_flight.insert)
            .unwrap_or(false);
        let now = Instant::now();

        if let Some(entry) = state.entries.get_mut(path) {
            match result {
                Ok(response) => {
                    entry.response = response.clone();
                    entry.loaded_at = now;
                    entry.failed_refreshes = 0;
                }
                Err(_) => entry.failed_refreshes += 1,
            }
            return;
        }

        match result {
            Ok(response) if insert => {
                state.insert(path, response.clone(), now, self.config.max_entries)
            }
            Ok(_) => log::debug!("{} was evicted while refreshing, not reinserting", path),
            Err(_) => {}
        }
    }
}

/// Bounded, access-expiring path → response cache with coalesced loads
///
/// Cloning is cheap and every clone shares the same entries.
pub struct ResponseCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResponseCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ResponseCache<T> {
    /// Creates an empty cache loading through `transport`
    pub fn new(transport: T, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Returns the response for `path`, loading it on a miss
    ///
    /// Any response the transport returns is stored, whatever its status.
    /// A transport failure stores nothing and is returned. Concurrent callers
    /// asking for the same missing path wait on one shared load.
    pub async fn get(&self, path: &str) -> Result<RawResponse, TransportError> {
        let load = {
            let mut state = self.inner.lock();
            let ttl = self.inner.config.expire_after_access;
            if let Some(response) = state.hit(path, Instant::now(), ttl) {
                log::trace!("Cache hit for {}", path);
                return Ok(response);
            }
            match state.in_flight.get_mut(path) {
                Some(in_flight) => {
                    log::trace!("Joining in-flight load for {}", path);
                    in_flight.insert = true;
                    in_flight.load.clone()
                }
                None => {
                    log::debug!("Cache miss for {}, loading", path);
                    self.start_load(&mut state, path, true)
                }
            }
        };
        load.await
    }

    /// Reloads every resident path once, one after another
    ///
    /// A failed reload keeps the previous value and does not stop the cycle.
    /// Reloads do not count as accesses.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let paths: Vec<String> = {
            let mut state = self.inner.lock();
            summary.expired =
                state.evict_expired(Instant::now(), self.inner.config.expire_after_access);
            state.entries.keys().cloned().collect()
        };

        for path in paths {
            let load = {
                let mut state = self.inner.lock();
                if !state.entries.contains_key(&path) {
                    continue;
                }
                match state.in_flight.get(&path) {
                    Some(in_flight) => in_flight.load.clone(),
                    None => self.start_load(&mut state, &path, false),
                }
            };

            match load.await {
                Ok(_) => summary.refreshed += 1,
                Err(error) => {
                    log::warn!("Refresh of {} failed, keeping cached value: {}", path, error);
                    if let Some(cached) = self.peek(&path).filter(|c| c.is_stale) {
                        log::warn!(
                            "Serving stale response for {} after {} failed refreshes",
                            path,
                            cached.failed_refreshes
                        );
                    }
                    summary.failures.push(RefreshFailure { path, error });
                }
            }
        }

        log::debug!(
            "Refresh cycle done: {} refreshed, {} failed, {} expired",
            summary.refreshed,
            summary.failures.len(),
            summary.expired
        );
        summary
    }

    /// Registers and spawns a load for `path`; the caller holds the state lock
    ///
    /// The load runs on its own task so it completes even if every waiter is
    /// dropped.
    fn start_load(&self, state: &mut State, path: &str, insert: bool) -> SharedLoad {
        let inner = Arc::clone(&self.inner);
        let key = path.to_string();
        let task = tokio::spawn(async move {
            let result = inner.transport.get(&key).await;
            inner.finish_load(&key, &result);
            result
        });

        let inner = Arc::clone(&self.inner);
        let key = path.to_string();
        let load = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => {
                    inner.lock().in_flight.remove(&key);
                    Err(TransportError::Other(format!("Load of {} aborted: {}", key, err)))
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            path.to_string(),
            InFlight {
                load: load.clone(),
                insert,
            },
        );
        load
    }
}

impl<T> ResponseCache<T> {
    /// Inspects a resident entry without counting as an access
    pub fn peek(&self, path: &str) -> Option<CachedResponse> {
        let state = self.inner.lock();
        let threshold = self.inner.config.stale_after_failures;
        state.entries.get(path).map(|entry| CachedResponse {
            response: entry.response.clone(),
            loaded_at: entry.loaded_at,
            last_accessed: entry.last_accessed,
            failed_refreshes: entry.failed_refreshes,
            is_stale: threshold > 0 && entry.failed_refreshes >= threshold,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.lock().entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resident paths, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Drops one entry; the next `get` reloads it
    pub fn invalidate(&self, path: &str) -> Option<RawResponse> {
        self.inner
            .lock()
            .entries
            .remove(path)
            .map(|entry| entry.response)
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}
