//! Storage behind the query client.
//!
//! # Design
//! Values are type-erased (`Arc<dyn Any + Send + Sync>`) so one store holds
//! users, history lists and totals side by side; the query client downcasts
//! on read. Stores only keep entries and their timestamps. Freshness rules
//! and events live in `QueryClient`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::key::QueryKey;

pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// One cached query result.
#[derive(Clone)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub updated_at: Instant,
    pub last_accessed: Instant,
    pub gc_time: Duration,
    /// Set by invalidation; cleared by the next write of a value fetched
    /// after it.
    pub invalidated: bool,
}

impl CacheEntry {
    pub fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
        self.invalidated || now.saturating_duration_since(self.updated_at) >= stale_time
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accessed) >= self.gc_time
    }
}

/// Key-scoped storage any caching engine can provide.
pub trait CacheStore: Send + Sync {
    /// Read an entry, refreshing its last-access time.
    fn get(&self, key: &QueryKey, now: Instant) -> Option<CacheEntry>;

    /// Insert or replace an entry. `invalidated` is set when the value was
    /// fetched before the key's most recent invalidation.
    fn put(
        &self,
        key: QueryKey,
        value: CachedValue,
        gc_time: Duration,
        now: Instant,
        invalidated: bool,
    );

    /// Mark an entry stale. Returns whether the key was present.
    fn invalidate(&self, key: &QueryKey) -> bool;

    /// Drop an entry. Returns whether the key was present.
    fn remove(&self, key: &QueryKey) -> bool;

    /// Drop every idle entry whose key is not in `observed`; return the keys dropped.
    fn evict_idle(&self, now: Instant, observed: &HashSet<QueryKey>) -> Vec<QueryKey>;
}

/// In-process `CacheStore` behind a single mutex.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &QueryKey, now: Instant) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        entry.last_accessed = now;
        Some(entry.clone())
    }

    fn put(
        &self,
        key: QueryKey,
        value: CachedValue,
        gc_time: Duration,
        now: Instant,
        invalidated: bool,
    ) {
        self.entries.lock().insert(
            key,
            CacheEntry {
                value,
                updated_at: now,
                last_accessed: now,
                gc_time,
                invalidated,
            },
        );
    }

    fn invalidate(&self, key: &QueryKey) -> bool {
        match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        }
    }

    fn remove(&self, key: &QueryKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    fn evict_idle(&self, now: Instant, observed: &HashSet<QueryKey>) -> Vec<QueryKey> {
        let mut entries = self.entries.lock();
        let evicted: Vec<QueryKey> = entries
            .iter()
            .filter(|(key, entry)| !observed.contains(*key) && entry.is_idle(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &evicted {
            entries.remove(key);
        }
        evicted
    }
}
