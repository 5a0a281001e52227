//! The query client: fetch-with-cache, invalidation and garbage collection
//! over a pluggable `CacheStore`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::cache::{CacheStore, MemoryCache};
use crate::key::QueryKey;
use crate::options::{QueryOptions, RequestPolicy, ResultSource};

const EVENT_CAPACITY: usize = 64;

/// Notifications broadcast to every subscriber of a `QueryClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// A fresh value was written for the key.
    Updated(QueryKey),
    /// The key was marked stale; observers should refetch.
    Invalidated(QueryKey),
    /// The entry was dropped, explicitly or by garbage collection.
    Removed(QueryKey),
}

impl QueryEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            QueryEvent::Updated(key) | QueryEvent::Invalidated(key) | QueryEvent::Removed(key) => key,
        }
    }
}

/// A value served by [`QueryClient::fetch_query`].
#[derive(Debug)]
pub struct Fetched<T> {
    pub data: Arc<T>,
    pub source: ResultSource,
}

/// Shared cache front-end used by every query and mutation adapter.
pub struct QueryClient {
    store: Arc<dyn CacheStore>,
    observers: Mutex<HashMap<QueryKey, usize>>,
    /// Bumped by every invalidation, so a fetch can tell it was overtaken.
    generations: Mutex<HashMap<QueryKey, u64>>,
    events: broadcast::Sender<QueryEvent>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryCache::new()))
    }

    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            observers: Mutex::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Serve `key` from the cache when `policy` allows and the entry is fresh;
    /// otherwise run `fetcher` and cache its value. Errors are never cached.
    ///
    /// A value whose fetch started before an invalidation of `key` is cached
    /// as already stale, so the next observation fetches again.
    pub async fn fetch_query<T, E, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        policy: RequestPolicy,
        fetcher: F,
    ) -> Result<Fetched<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if policy == RequestPolicy::CacheFirst {
            let now = Instant::now();
            if let Some(entry) = self.store.get(key, now) {
                if !entry.is_stale(now, options.stale_time) {
                    if let Ok(data) = entry.value.downcast::<T>() {
                        trace!(key = %key, "cache hit");
                        return Ok(Fetched {
                            data,
                            source: ResultSource::Cache,
                        });
                    }
                }
            }
        }

        debug!(key = %key, ?policy, "fetching");
        let generation = self.generation(key);
        let data = Arc::new(fetcher().await?);
        let overtaken = self.generation(key) != generation;
        if overtaken {
            debug!(key = %key, "invalidated during fetch; caching as stale");
        }
        self.write(key.clone(), data.clone(), options, overtaken);
        Ok(Fetched {
            data,
            source: ResultSource::Network,
        })
    }

    /// Current cached value for `key`, fresh or stale.
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.store
            .get(key, Instant::now())
            .and_then(|entry| entry.value.downcast::<T>().ok())
    }

    /// Write `value` under `key` as if it had just been fetched.
    pub fn set_query_data<T: Send + Sync + 'static>(
        &self,
        key: QueryKey,
        value: T,
        options: &QueryOptions,
    ) {
        self.write(key, Arc::new(value), options, false);
    }

    /// Mark `key` stale and tell observers to refetch.
    ///
    /// The event is sent even when nothing is cached yet, so a query still in
    /// its first fetch refetches afterwards.
    pub fn invalidate_queries(&self, key: &QueryKey) {
        *self.generations.lock().entry(key.clone()).or_insert(0) += 1;
        let present = self.store.invalidate(key);
        debug!(key = %key, present, "invalidated");
        self.emit(QueryEvent::Invalidated(key.clone()));
    }

    pub fn remove_queries(&self, key: &QueryKey) -> bool {
        let removed = self.store.remove(key);
        self.generations.lock().remove(key);
        if removed {
            self.emit(QueryEvent::Removed(key.clone()));
        }
        removed
    }

    /// Evict idle entries not observed by a mounted query. Returns how many
    /// entries were dropped.
    pub fn collect_garbage(&self) -> usize {
        let observed: HashSet<QueryKey> = self.observers.lock().keys().cloned().collect();
        let evicted = self.store.evict_idle(Instant::now(), &observed);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted idle cache entries");
        }
        let count = evicted.len();
        let mut generations = self.generations.lock();
        for key in &evicted {
            generations.remove(key);
        }
        drop(generations);
        for key in evicted {
            self.emit(QueryEvent::Removed(key));
        }
        count
    }

    /// Sweep idle entries every `period` until the client is dropped.
    pub fn spawn_garbage_collector(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let client = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(client) = client.upgrade() else {
                    break;
                };
                client.collect_garbage();
            }
        })
    }

    /// One sweep after `delay`. A no-op outside a tokio runtime.
    pub(crate) fn schedule_garbage_collection(self: &Arc<Self>, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = client.upgrade() {
                client.collect_garbage();
            }
        });
    }

    /// Whether `key` needs a fetch under `options`: missing, invalidated or
    /// older than the staleness window.
    pub fn is_stale(&self, key: &QueryKey, options: &QueryOptions) -> bool {
        let now = Instant::now();
        self.store
            .get(key, now)
            .map_or(true, |entry| entry.is_stale(now, options.stale_time))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.observers.lock().get(key).copied().unwrap_or(0)
    }

    pub(crate) fn observe(&self, key: &QueryKey) {
        *self.observers.lock().entry(key.clone()).or_insert(0) += 1;
    }

    pub(crate) fn unobserve(&self, key: &QueryKey) {
        let mut observers = self.observers.lock();
        if let Some(count) = observers.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                observers.remove(key);
            }
        }
    }

    fn generation(&self, key: &QueryKey) -> u64 {
        self.generations.lock().get(key).copied().unwrap_or(0)
    }

    fn write(
        &self,
        key: QueryKey,
        value: Arc<dyn Any + Send + Sync>,
        options: &QueryOptions,
        invalidated: bool,
    ) {
        self.store
            .put(key.clone(), value, options.gc_time, Instant::now(), invalidated);
        self.emit(QueryEvent::Updated(key));
    }

    fn emit(&self, event: QueryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
