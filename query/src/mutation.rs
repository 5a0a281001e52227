//! Write adapter for histories.
//!
//! Every successful mutation invalidates the user's history list and the
//! global total, so mounted queries on either key refetch. Failures are kept
//! as a display string on the handle instead of being returned.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use starter_core::{ApiError, History, HistoryCreateRequest, HistoryUpdateRequest, StarterClient};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::identity;
use crate::client::QueryClient;
use crate::key::QueryKey;

pub const NOT_SIGNED_IN: &str = "not signed in";

#[derive(Debug, Clone, Copy)]
enum Kind {
    Create,
    Update,
    Delete,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Create => "create",
            Kind::Update => "update",
            Kind::Delete => "delete",
        }
    }
}

/// In-flight counts per kind; concurrent calls of one kind stack.
#[derive(Debug, Default)]
struct MutationState {
    creating: usize,
    updating: usize,
    deleting: usize,
    error: Option<String>,
}

impl MutationState {
    fn counter(&mut self, kind: Kind) -> &mut usize {
        match kind {
            Kind::Create => &mut self.creating,
            Kind::Update => &mut self.updating,
            Kind::Delete => &mut self.deleting,
        }
    }
}

/// Holds one in-flight count for `kind`; released on drop, including when the
/// mutation future is dropped before completing.
struct Pending {
    state: Arc<Mutex<MutationState>>,
    kind: Kind,
}

impl Pending {
    fn start(state: Arc<Mutex<MutationState>>, kind: Kind) -> Self {
        {
            let mut guard = state.lock();
            guard.error = None;
            *guard.counter(kind) += 1;
        }
        Self { state, kind }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        *self.state.lock().counter(self.kind) -= 1;
    }
}

#[derive(Clone)]
pub struct HistoryMutations {
    api: Arc<StarterClient>,
    cache: Arc<QueryClient>,
    identity: Option<(String, String)>,
    state: Arc<Mutex<MutationState>>,
}

impl fmt::Debug for HistoryMutations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryMutations")
            .field("user_id", &self.identity.as_ref().map(|(user_id, _)| user_id))
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl HistoryMutations {
    pub fn new(
        api: Arc<StarterClient>,
        cache: Arc<QueryClient>,
        user_id: Option<&str>,
        token: Option<&str>,
    ) -> Self {
        Self {
            api,
            cache,
            identity: identity(user_id, token),
            state: Arc::default(),
        }
    }

    pub async fn create_history(&self, body: &HistoryCreateRequest) -> Option<History> {
        let (user_id, token) = self.signed_in()?;
        self.run(Kind::Create, user_id, async {
            self.api
                .create_history(user_id, body, token)
                .await?
                .into_data()
        })
        .await
    }

    pub async fn update_history(
        &self,
        history_id: Uuid,
        body: &HistoryUpdateRequest,
    ) -> Option<History> {
        let (user_id, token) = self.signed_in()?;
        self.run(Kind::Update, user_id, async {
            self.api
                .update_history(user_id, history_id, body, token)
                .await?
                .into_data()
        })
        .await
    }

    /// Returns whether the server confirmed the delete.
    pub async fn delete_history(&self, history_id: Uuid) -> bool {
        let Some((user_id, token)) = self.signed_in() else {
            return false;
        };
        self.run(Kind::Delete, user_id, async {
            self.api
                .delete_history(user_id, history_id, token)
                .await?
                .into_unit()
        })
        .await
        .is_some()
    }

    pub fn is_creating(&self) -> bool {
        self.state.lock().creating > 0
    }

    pub fn is_updating(&self) -> bool {
        self.state.lock().updating > 0
    }

    pub fn is_deleting(&self) -> bool {
        self.state.lock().deleting > 0
    }

    pub fn is_pending(&self) -> bool {
        let state = self.state.lock();
        state.creating + state.updating + state.deleting > 0
    }

    /// Message of the most recent failed mutation.
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    fn signed_in(&self) -> Option<(&str, &str)> {
        match &self.identity {
            Some((user_id, token)) => Some((user_id.as_str(), token.as_str())),
            None => {
                self.state.lock().error = Some(NOT_SIGNED_IN.to_string());
                None
            }
        }
    }

    async fn run<R>(
        &self,
        kind: Kind,
        user_id: &str,
        call: impl Future<Output = Result<R, ApiError>>,
    ) -> Option<R> {
        let pending = Pending::start(self.state.clone(), kind);
        let result = call.await;
        drop(pending);

        match result {
            Ok(value) => {
                debug!(kind = kind.as_str(), user_id, "history mutation succeeded");
                self.cache.invalidate_queries(&QueryKey::histories(user_id));
                self.cache.invalidate_queries(&QueryKey::histories_total());
                Some(value)
            }
            Err(error) => {
                warn!(kind = kind.as_str(), user_id, %error, "history mutation failed");
                self.state.lock().error = Some(error.to_string());
                None
            }
        }
    }
}
