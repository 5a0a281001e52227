//! Read adapter: one cached query plus its loading/error/data projection.
//!
//! # Design
//! A `Query` is a cheap cloneable handle. Its state machine is
//! `Disabled | Idle -> Loading -> Success | Error`, re-entering `Loading` on
//! every fetch. Data survives a failed refetch; until the first success it is
//! `T::default()`. Errors are kept as display strings so no error object
//! crosses this boundary.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use starter_core::ApiError;
use tokio::sync::{broadcast::error::RecvError, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{QueryClient, QueryEvent};
use crate::key::QueryKey;
use crate::options::{QueryOptions, RequestPolicy, ResultSource};

pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Identity inputs are missing or the query was disabled; nothing is fetched.
    Disabled,
    /// Enabled but never fetched.
    Idle,
    Loading,
    Success,
    Error,
}

struct QueryState<T> {
    status: QueryStatus,
    data: Arc<T>,
    error: Option<String>,
    source: Option<ResultSource>,
    updated_at: Option<Instant>,
}

struct Inner<T> {
    target: Option<(QueryKey, Fetcher<T>)>,
    options: QueryOptions,
    cache: Arc<QueryClient>,
    state: Mutex<QueryState<T>>,
}

pub struct Query<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Query<T> {
    pub fn key(&self) -> Option<&QueryKey> {
        self.inner.target.as_ref().map(|(key, _)| key)
    }

    pub fn options(&self) -> &QueryOptions {
        &self.inner.options
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.target.is_some() && self.inner.options.enabled
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Query")
            .field("key", &self.key())
            .field("status", &state.status)
            .field("error", &state.error)
            .finish_non_exhaustive()
    }
}

impl<T> Query<T>
where
    T: Default + Send + Sync + 'static,
{
    pub fn new<F, Fut>(key: QueryKey, cache: Arc<QueryClient>, options: QueryOptions, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
        Self::build(Some((key, fetcher)), cache, options)
    }

    /// A query that can never fetch, for when identity inputs are absent.
    pub fn disabled(cache: Arc<QueryClient>, options: QueryOptions) -> Self {
        Self::build(None, cache, options)
    }

    fn build(
        target: Option<(QueryKey, Fetcher<T>)>,
        cache: Arc<QueryClient>,
        options: QueryOptions,
    ) -> Self {
        let status = if target.is_some() && options.enabled {
            QueryStatus::Idle
        } else {
            QueryStatus::Disabled
        };
        Self {
            inner: Arc::new(Inner {
                target,
                options,
                cache,
                state: Mutex::new(QueryState {
                    status,
                    data: Arc::new(T::default()),
                    error: None,
                    source: None,
                    updated_at: None,
                }),
            }),
        }
    }

    pub fn status(&self) -> QueryStatus {
        self.inner.state.lock().status
    }

    /// Last good value, or `T::default()` before the first success.
    pub fn data(&self) -> Arc<T> {
        self.inner.state.lock().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == QueryStatus::Loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    pub fn source(&self) -> Option<ResultSource> {
        self.inner.state.lock().source
    }

    pub fn updated_at(&self) -> Option<Instant> {
        self.inner.state.lock().updated_at
    }

    /// Whether the next `sync` would hit the network.
    pub fn is_stale(&self) -> bool {
        match self.enabled_target() {
            Some((key, _)) => self.inner.cache.is_stale(key, &self.inner.options),
            None => false,
        }
    }

    /// Observe the cache: serve a fresh entry, fetch otherwise.
    pub async fn sync(&self) {
        self.run(RequestPolicy::CacheFirst).await;
    }

    /// Fetch regardless of what is cached.
    pub async fn refetch(&self) {
        self.run(RequestPolicy::NetworkOnly).await;
    }

    /// Register as an observer and keep this query current in the background.
    ///
    /// The spawned task syncs once, then syncs again every time the key is
    /// invalidated. Must be called from within a tokio runtime. A disabled
    /// query returns an inert mount.
    pub fn mount(&self) -> QueryMount {
        let Some((key, _)) = self.enabled_target() else {
            return QueryMount {
                key: None,
                cache: self.inner.cache.clone(),
                gc_time: self.inner.options.gc_time,
                shutdown: None,
                task: None,
            };
        };
        let key = key.clone();
        let cache = self.inner.cache.clone();
        cache.observe(&key);

        // Subscribe before spawning so an invalidation racing the first sync is seen.
        let mut events = cache.subscribe();
        let (shutdown, mut stopped) = oneshot::channel::<()>();
        let query = self.clone();
        let watched = key.clone();
        let task = tokio::spawn(async move {
            query.sync().await;
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    event = events.recv() => match event {
                        Ok(QueryEvent::Invalidated(invalidated)) if invalidated == watched => {
                            query.sync().await;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(key = %watched, skipped, "query events lagged; resyncing");
                            query.sync().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        QueryMount {
            key: Some(key),
            cache,
            gc_time: self.inner.options.gc_time,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    fn enabled_target(&self) -> Option<&(QueryKey, Fetcher<T>)> {
        if self.inner.options.enabled {
            self.inner.target.as_ref()
        } else {
            None
        }
    }

    async fn run(&self, policy: RequestPolicy) {
        let Some((key, fetcher)) = self.enabled_target() else {
            return;
        };
        self.inner.state.lock().status = QueryStatus::Loading;

        let result = self
            .inner
            .cache
            .fetch_query(key, &self.inner.options, policy, || fetcher())
            .await;

        let mut state = self.inner.state.lock();
        match result {
            Ok(fetched) => {
                state.status = QueryStatus::Success;
                state.data = fetched.data;
                state.error = None;
                state.source = Some(fetched.source);
                state.updated_at = Some(Instant::now());
            }
            Err(error) => {
                warn!(key = %key, %error, "query failed");
                state.status = QueryStatus::Error;
                state.error = Some(error.to_string());
            }
        }
    }
}

/// Observer registration returned by [`Query::mount`].
///
/// Dropping it unregisters the observer and stops the background task. A
/// fetch already in flight is allowed to finish. Once `gc_time` has passed
/// the cache is swept, dropping the entry if nothing used it since.
pub struct QueryMount {
    key: Option<QueryKey>,
    cache: Arc<QueryClient>,
    gc_time: Duration,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl QueryMount {
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for QueryMount {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(key) = &self.key {
            self.cache.unobserve(key);
            self.cache.schedule_garbage_collection(self.gc_time);
        }
    }
}
