//! Read-through query cache with explicit invalidation.
//!
//! Entries are JSON values keyed by `QueryKey`. A successful mutation drops
//! every entry whose scope could include the changed record; entries also
//! go stale after `stale_after` and then read as misses.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Default staleness window for cached query results (5 minutes).
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Group of keys invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    User,
    AssetLists,
    Asset,
    Folders,
    Tags,
    Audit,
}

/// Identity of one cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CurrentUser,
    /// Asset list for one filter set, encoded as a query string.
    AssetList(String),
    Asset(String),
    Folders,
    Folder(String),
    Tags,
    /// Audit page for one filter set, encoded as a query string.
    AuditLog(String),
}

impl QueryKey {
    pub fn scope(&self) -> QueryScope {
        match self {
            QueryKey::CurrentUser => QueryScope::User,
            QueryKey::AssetList(_) => QueryScope::AssetLists,
            QueryKey::Asset(_) => QueryScope::Asset,
            QueryKey::Folders | QueryKey::Folder(_) => QueryScope::Folders,
            QueryKey::Tags => QueryScope::Tags,
            QueryKey::AuditLog(_) => QueryScope::Audit,
        }
    }

    /// Key for a filter set given as query pairs.
    pub fn asset_list(query: &[(String, String)]) -> Self {
        QueryKey::AssetList(encode_filters(query))
    }

    pub fn audit_log(query: &[(String, String)]) -> Self {
        QueryKey::AuditLog(encode_filters(query))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::CurrentUser => write!(f, "currentUser"),
            QueryKey::AssetList(q) => write!(f, "assets?{}", q),
            QueryKey::Asset(id) => write!(f, "asset:{}", id),
            QueryKey::Folders => write!(f, "folders"),
            QueryKey::Folder(id) => write!(f, "folders:{}", id),
            QueryKey::Tags => write!(f, "tags"),
            QueryKey::AuditLog(q) => write!(f, "audit?{}", q),
        }
    }
}

fn encode_filters(query: &[(String, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

struct CachedQuery {
    value: Value,
    fetched_at: Instant,
}

/// In-memory query cache.
pub struct QueryCache {
    entries: HashMap<QueryKey, CachedQuery>,
    stale_after: Duration,
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            stale_after,
        }
    }

    /// Cached value if present and still fresh.
    pub fn get(&self, key: &QueryKey) -> Option<&Value> {
        self.entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.stale_after)
            .map(|entry| &entry.value)
    }

    pub fn set(&mut self, key: QueryKey, value: Value) {
        self.entries.insert(
            key,
            CachedQuery {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Whether an entry exists for `key`, fresh or stale.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn invalidate(&mut self, key: &QueryKey) {
        if self.entries.remove(key).is_some() {
            log::debug!("Invalidated {}", key);
        }
    }

    /// Drop every entry belonging to `scope`.
    pub fn invalidate_scope(&mut self, scope: QueryScope) {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.scope() != scope);
        let removed = before - self.entries.len();
        if removed > 0 {
            log::debug!("Invalidated {} {:?} entries", removed, scope);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}
