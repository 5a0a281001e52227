//! Adapter behaviour over a scripted transport.
//!
//! # Design
//! `Scripted` answers every request from a routing closure and records what
//! was sent; `RecordingStore` wraps `MemoryCache` and counts invalidations
//! per key. Together they pin down what each adapter sends and which cache
//! keys it touches, without a server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use starter_core::{
    HistoryCreateRequest, HistoryUpdateRequest, HttpMethod, HttpResponse, NetworkClient,
    RequestOptions, StarterClient, TransportError,
};
use starter_query::{
    histories_query, histories_total_query, user_query, CacheEntry, CacheStore, CachedValue,
    HistoryMutations, MemoryCache, QueryClient, QueryKey, QueryOptions, QueryStatus,
    NOT_SIGNED_IN,
};
use tokio::sync::Notify;
use uuid::Uuid;

const HISTORY_ID: &str = "6f1c2a3b-4d5e-4f60-8a7b-9c0d1e2f3a4b";

fn history_json(value: f64) -> String {
    format!(
        r#"{{"id":"{HISTORY_ID}","firebase_uid":"u1","value":{value},"recorded_at":"2024-05-01T08:30:00Z"}}"#
    )
}

fn respond(status: u16, body: impl Into<String>) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: body.into(),
    }
}

type Route = Box<dyn Fn(HttpMethod, &str) -> HttpResponse + Send + Sync>;

struct Scripted {
    route: Route,
    sent: Mutex<Vec<(HttpMethod, String)>>,
    gate: Option<Arc<Notify>>,
}

impl Scripted {
    fn new(route: impl Fn(HttpMethod, &str) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            route: Box::new(route),
            sent: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every response until `gate` is notified.
    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn sent(&self) -> Vec<(HttpMethod, String)> {
        self.sent.lock().clone()
    }

    async fn answer(&self, method: HttpMethod, url: &str) -> Result<HttpResponse, TransportError> {
        self.sent.lock().push((method, url.to_string()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok((self.route)(method, url))
    }
}

#[async_trait]
impl NetworkClient for Scripted {
    async fn get(&self, url: &str, _: RequestOptions) -> Result<HttpResponse, TransportError> {
        self.answer(HttpMethod::Get, url).await
    }

    async fn post(&self, url: &str, _: RequestOptions) -> Result<HttpResponse, TransportError> {
        self.answer(HttpMethod::Post, url).await
    }

    async fn put(&self, url: &str, _: RequestOptions) -> Result<HttpResponse, TransportError> {
        self.answer(HttpMethod::Put, url).await
    }

    async fn delete(&self, url: &str, _: RequestOptions) -> Result<HttpResponse, TransportError> {
        self.answer(HttpMethod::Delete, url).await
    }
}

/// `MemoryCache` that counts `invalidate` calls per key.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryCache,
    invalidations: Mutex<HashMap<QueryKey, usize>>,
}

impl RecordingStore {
    fn invalidations(&self, key: &QueryKey) -> usize {
        self.invalidations.lock().get(key).copied().unwrap_or(0)
    }

    fn total_invalidations(&self) -> usize {
        self.invalidations.lock().values().sum()
    }
}

impl CacheStore for RecordingStore {
    fn get(&self, key: &QueryKey, now: std::time::Instant) -> Option<CacheEntry> {
        self.inner.get(key, now)
    }

    fn put(
        &self,
        key: QueryKey,
        value: CachedValue,
        gc_time: Duration,
        now: std::time::Instant,
        invalidated: bool,
    ) {
        self.inner.put(key, value, gc_time, now, invalidated)
    }

    fn invalidate(&self, key: &QueryKey) -> bool {
        *self.invalidations.lock().entry(key.clone()).or_insert(0) += 1;
        self.inner.invalidate(key)
    }

    fn remove(&self, key: &QueryKey) -> bool {
        self.inner.remove(key)
    }

    fn evict_idle(
        &self,
        now: std::time::Instant,
        observed: &std::collections::HashSet<QueryKey>,
    ) -> Vec<QueryKey> {
        self.inner.evict_idle(now, observed)
    }
}

struct Harness {
    network: Arc<Scripted>,
    store: Arc<RecordingStore>,
    api: Arc<StarterClient>,
    cache: Arc<QueryClient>,
}

fn harness(network: Scripted) -> Harness {
    let network = Arc::new(network);
    let store = Arc::new(RecordingStore::default());
    let api = Arc::new(StarterClient::new("http://api.test", network.clone()));
    let cache = Arc::new(QueryClient::with_store(store.clone()));
    Harness {
        network,
        store,
        api,
        cache,
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn histories_query_loads_list() {
    let h = harness(Scripted::new(|_, _| {
        respond(200, format!(r#"{{"success":true,"data":[{}]}}"#, history_json(72.5)))
    }));
    let query = histories_query(h.api, h.cache, Some("u1"), Some("t"), QueryOptions::default());

    query.sync().await;
    assert_eq!(query.status(), QueryStatus::Success);
    assert_eq!(query.data().len(), 1);
    assert_eq!(query.data()[0].value, 72.5);
    assert_eq!(
        h.network.sent(),
        vec![(HttpMethod::Get, "http://api.test/api/v1/users/u1/histories".to_string())]
    );
}

#[tokio::test]
async fn failed_envelope_surfaces_message_and_default_data() {
    let h = harness(Scripted::new(|_, _| {
        respond(200, r#"{"success":false,"error":"boom"}"#)
    }));
    let histories = histories_query(
        h.api.clone(),
        h.cache.clone(),
        Some("u1"),
        Some("t"),
        QueryOptions::default(),
    );
    let total = histories_total_query(h.api, h.cache, QueryOptions::default());

    histories.sync().await;
    total.sync().await;

    assert_eq!(histories.status(), QueryStatus::Error);
    assert_eq!(histories.error().as_deref(), Some("boom"));
    assert!(histories.data().is_empty());
    assert_eq!(total.error().as_deref(), Some("boom"));
    assert_eq!(total.data().total, 0);
}

#[tokio::test]
async fn blank_server_message_falls_back() {
    let h = harness(Scripted::new(|_, _| respond(500, r#"{"success":false}"#)));
    let total = histories_total_query(h.api, h.cache, QueryOptions::default());

    total.sync().await;
    assert_eq!(total.error().as_deref(), Some("request failed"));
}

#[tokio::test]
async fn missing_identity_disables_queries() {
    let h = harness(Scripted::new(|_, _| respond(200, r#"{"success":true,"data":[]}"#)));
    let user = user_query(h.api.clone(), h.cache.clone(), Some("u1"), None, QueryOptions::default());
    let histories = histories_query(h.api, h.cache.clone(), None, Some("t"), QueryOptions::default());

    user.sync().await;
    histories.refetch().await;
    let _mount = histories.mount();

    assert_eq!(user.status(), QueryStatus::Disabled);
    assert_eq!(histories.status(), QueryStatus::Disabled);
    assert!(user.key().is_none());
    assert!(user.data().is_none());
    assert!(h.network.sent().is_empty());
    assert_eq!(h.cache.observer_count(&QueryKey::histories("u1")), 0);
}

#[tokio::test]
async fn queries_sharing_a_key_share_the_cache() {
    let h = harness(Scripted::new(|_, _| {
        respond(200, r#"{"success":true,"data":{"total":4}}"#)
    }));
    let first = histories_total_query(h.api.clone(), h.cache.clone(), QueryOptions::default());
    let second = histories_total_query(h.api, h.cache, QueryOptions::default());

    first.sync().await;
    second.sync().await;

    assert_eq!(second.data().total, 4);
    assert_eq!(h.network.sent().len(), 1);
}

#[tokio::test]
async fn missing_data_is_an_error() {
    let h = harness(Scripted::new(|_, _| respond(200, r#"{"success":true}"#)));
    let user = user_query(h.api, h.cache, Some("u1"), Some("t"), QueryOptions::default());

    user.sync().await;
    assert_eq!(user.error().as_deref(), Some("response did not include data"));
    assert!(user.data().is_none());
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

fn create_body() -> HistoryCreateRequest {
    HistoryCreateRequest {
        value: 72.5,
        recorded_at: None,
    }
}

#[tokio::test]
async fn create_invalidates_list_and_total_once() {
    let h = harness(Scripted::new(|_, _| {
        respond(201, format!(r#"{{"success":true,"data":{}}}"#, history_json(72.5)))
    }));
    let mutations = HistoryMutations::new(h.api, h.cache, Some("u1"), Some("t"));

    let created = mutations.create_history(&create_body()).await.unwrap();
    assert_eq!(created.id, Uuid::parse_str(HISTORY_ID).unwrap());
    assert!(mutations.error().is_none());
    assert_eq!(h.store.invalidations(&QueryKey::histories("u1")), 1);
    assert_eq!(h.store.invalidations(&QueryKey::histories_total()), 1);
    assert_eq!(h.store.total_invalidations(), 2);
}

#[tokio::test]
async fn update_and_delete_invalidate_too() {
    let h = harness(Scripted::new(|method, _| match method {
        HttpMethod::Delete => respond(200, r#"{"success":true}"#),
        _ => respond(200, format!(r#"{{"success":true,"data":{}}}"#, history_json(70.0))),
    }));
    let mutations = HistoryMutations::new(h.api, h.cache, Some("u1"), Some("t"));
    let id = Uuid::parse_str(HISTORY_ID).unwrap();

    let update = HistoryUpdateRequest {
        value: Some(70.0),
        recorded_at: None,
    };
    assert_eq!(mutations.update_history(id, &update).await.unwrap().value, 70.0);
    assert!(mutations.delete_history(id).await);

    assert_eq!(h.store.invalidations(&QueryKey::histories("u1")), 2);
    assert_eq!(h.store.invalidations(&QueryKey::histories_total()), 2);
    assert_eq!(
        h.network.sent(),
        vec![
            (HttpMethod::Put, format!("http://api.test/api/v1/users/u1/histories/{id}")),
            (HttpMethod::Delete, format!("http://api.test/api/v1/users/u1/histories/{id}")),
        ]
    );
}

#[tokio::test]
async fn failed_mutation_sets_error_without_invalidating() {
    let h = harness(Scripted::new(|_, _| {
        respond(404, r#"{"success":false,"error":"history not found"}"#)
    }));
    let mutations = HistoryMutations::new(h.api, h.cache, Some("u1"), Some("t"));

    assert!(!mutations.delete_history(Uuid::nil()).await);
    assert_eq!(mutations.error().as_deref(), Some("history not found"));
    assert_eq!(h.store.total_invalidations(), 0);

    mutations.clear_error();
    assert!(mutations.error().is_none());
}

#[tokio::test]
async fn create_without_data_is_a_failure() {
    let h = harness(Scripted::new(|_, _| respond(201, r#"{"success":true}"#)));
    let mutations = HistoryMutations::new(h.api, h.cache, Some("u1"), Some("t"));

    assert!(mutations.create_history(&create_body()).await.is_none());
    assert_eq!(
        mutations.error().as_deref(),
        Some("response did not include data")
    );
    assert_eq!(h.store.total_invalidations(), 0);
}

#[tokio::test]
async fn signed_out_mutations_send_nothing() {
    let h = harness(Scripted::new(|_, _| respond(200, r#"{"success":true}"#)));
    let mutations = HistoryMutations::new(h.api, h.cache, None, Some("t"));

    assert!(mutations.create_history(&create_body()).await.is_none());
    assert_eq!(mutations.error().as_deref(), Some(NOT_SIGNED_IN));
    assert!(!mutations.delete_history(Uuid::nil()).await);
    assert!(h.network.sent().is_empty());
    assert_eq!(h.store.total_invalidations(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_flag_spans_the_call() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        Scripted::new(|_, _| {
            respond(201, format!(r#"{{"success":true,"data":{}}}"#, history_json(1.0)))
        })
        .gated(gate.clone()),
    );
    let mutations = HistoryMutations::new(h.api, h.cache, Some("u1"), Some("t"));
    assert!(!mutations.is_pending());

    let task = tokio::spawn({
        let mutations = mutations.clone();
        async move { mutations.create_history(&create_body()).await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !mutations.is_creating() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(mutations.is_pending());
    assert!(!mutations.is_updating());
    assert!(!mutations.is_deleting());

    gate.notify_one();
    assert!(task.await.unwrap().is_some());
    assert!(!mutations.is_creating());
    assert!(!mutations.is_pending());
}

#[tokio::test]
async fn abandoned_mutation_releases_pending_flag() {
    let h = harness(
        Scripted::new(|_, _| respond(201, r#"{"success":true}"#)).gated(Arc::new(Notify::new())),
    );
    let mutations = HistoryMutations::new(h.api, h.cache, Some("u1"), Some("t"));

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        mutations.create_history(&create_body()),
    )
    .await;
    assert!(outcome.is_err());
    assert_eq!(h.network.sent().len(), 1);
    assert!(!mutations.is_creating());
    assert!(!mutations.is_pending());
    assert_eq!(h.store.total_invalidations(), 0);
}
