//! Ready-made queries for each read endpoint of the starter API.

use std::sync::Arc;

use starter_core::{HistoriesTotal, History, StarterClient, User};

use crate::client::QueryClient;
use crate::key::QueryKey;
use crate::options::QueryOptions;
use crate::query::Query;

/// Owned `(user_id, token)` pair, or `None` when either is absent or empty.
pub(crate) fn identity(user_id: Option<&str>, token: Option<&str>) -> Option<(String, String)> {
    match (user_id, token) {
        (Some(user_id), Some(token)) if !user_id.is_empty() && !token.is_empty() => {
            Some((user_id.to_string(), token.to_string()))
        }
        _ => None,
    }
}

/// The signed-in user's profile. Disabled until both identity inputs exist.
pub fn user_query(
    api: Arc<StarterClient>,
    cache: Arc<QueryClient>,
    user_id: Option<&str>,
    token: Option<&str>,
    options: QueryOptions,
) -> Query<Option<User>> {
    let Some((user_id, token)) = identity(user_id, token) else {
        return Query::disabled(cache, options);
    };
    let key = QueryKey::user(&user_id);
    Query::new(key, cache, options, move || {
        let api = api.clone();
        let user_id = user_id.clone();
        let token = token.clone();
        async move { api.get_user(&user_id, &token).await?.into_data().map(Some) }
    })
}

/// The user's history list. Disabled until both identity inputs exist.
pub fn histories_query(
    api: Arc<StarterClient>,
    cache: Arc<QueryClient>,
    user_id: Option<&str>,
    token: Option<&str>,
    options: QueryOptions,
) -> Query<Vec<History>> {
    let Some((user_id, token)) = identity(user_id, token) else {
        return Query::disabled(cache, options);
    };
    let key = QueryKey::histories(&user_id);
    Query::new(key, cache, options, move || {
        let api = api.clone();
        let user_id = user_id.clone();
        let token = token.clone();
        async move { api.get_histories(&user_id, &token).await?.into_data() }
    })
}

/// Global record count; public, so only `options.enabled` can disable it.
pub fn histories_total_query(
    api: Arc<StarterClient>,
    cache: Arc<QueryClient>,
    options: QueryOptions,
) -> Query<HistoriesTotal> {
    Query::new(QueryKey::histories_total(), cache, options, move || {
        let api = api.clone();
        async move { api.get_histories_total().await?.into_data() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_both_parts() {
        assert_eq!(
            identity(Some("u1"), Some("t")),
            Some(("u1".to_string(), "t".to_string()))
        );
        assert_eq!(identity(None, Some("t")), None);
        assert_eq!(identity(Some("u1"), None), None);
        assert_eq!(identity(Some(""), Some("t")), None);
        assert_eq!(identity(Some("u1"), Some("")), None);
    }
}
