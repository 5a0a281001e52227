//! Query cache and UI-facing adapters on top of `starter-core`.
//!
//! # Overview
//! `QueryClient` caches decoded responses under structured `QueryKey`s,
//! decides when a cached value is fresh enough to serve, and broadcasts
//! invalidations. `Query<T>` projects one key into loading/error/data state
//! for a view; `HistoryMutations` runs writes and invalidates the keys they
//! affect.
//!
//! # Design
//! - Storage sits behind the `CacheStore` trait; `MemoryCache` is the default.
//! - Values are stored type-erased and downcast on read, so one client serves
//!   every endpoint.
//! - Adapters never surface `ApiError` values, only their display strings.
//! - Mounted queries refetch from a tokio task that listens for
//!   `QueryEvent::Invalidated` on their key.

pub mod adapters;
pub mod cache;
pub mod client;
pub mod key;
pub mod mutation;
pub mod options;
pub mod query;

pub use adapters::{histories_query, histories_total_query, user_query};
pub use cache::{CacheEntry, CacheStore, CachedValue, MemoryCache};
pub use client::{Fetched, QueryClient, QueryEvent};
pub use key::QueryKey;
pub use mutation::{HistoryMutations, NOT_SIGNED_IN};
pub use options::{QueryOptions, RequestPolicy, ResultSource, DEFAULT_GC_TIME, DEFAULT_STALE_TIME};
pub use query::{Fetcher, Query, QueryMount, QueryStatus};
