//! Cache keys.

use std::fmt;

/// `(namespace, entity, scope)` tuple identifying one cached query result.
///
/// Keys group related entries: every history key lives in the `histories`
/// namespace so a write can invalidate the list and the aggregate together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub namespace: String,
    pub entity: String,
    pub scope: String,
}

impl QueryKey {
    pub fn new(
        namespace: impl Into<String>,
        entity: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            entity: entity.into(),
            scope: scope.into(),
        }
    }

    /// A single user record.
    pub fn user(user_id: &str) -> Self {
        Self::new("users", "detail", user_id)
    }

    /// The history list of one user.
    pub fn histories(user_id: &str) -> Self {
        Self::new("histories", "by-user", user_id)
    }

    /// The global history count.
    pub fn histories_total() -> Self {
        Self::new("histories", "total", "global")
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.entity, self.scope)
    }
}
