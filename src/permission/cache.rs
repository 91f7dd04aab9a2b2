//! Concurrent permission cache with fetch-or-populate resolution.
//!
//! Authorization is expensive (the permission source walks a scope
//! breadcrumb against the identity service), so resolved trees are memoized
//! per (user, scope). Entries never expire on their own; they live until an
//! explicit evict or a whole-cache clear. Staleness after a role change is
//! accepted until the owning flow calls [`PermissionCache::evict`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::permission::PermissionTree;

// =============================================================================
// Scope
// =============================================================================

/// Authorization scope of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A single project
    Project(String),
    /// The root hierarchy spanning all projects
    Root,
}

impl Scope {
    /// Stable identifier used in cache keys.
    pub fn scope_id(&self) -> String {
        match self {
            Scope::Project(id) => format!("project:{}", id),
            Scope::Root => "root".to_string(),
        }
    }

    /// Breadcrumb the permission source walks, most specific scope first.
    pub fn breadcrumb(&self) -> String {
        match self {
            Scope::Project(id) => format!("project-details:{},cms-overview,root", id),
            Scope::Root => "cms-overview,root".to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scope_id())
    }
}

// =============================================================================
// Cache key and entry
// =============================================================================

/// Cache key for one user's permissions within one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    pub user_id: String,
    pub scope_id: String,
}

impl PermissionKey {
    pub fn new(user_id: &str, scope: &Scope) -> Self {
        Self {
            user_id: user_id.to_string(),
            scope_id: scope.scope_id(),
        }
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.scope_id)
    }
}

/// A cached permission tree with insertion metadata.
#[derive(Debug, Clone)]
struct CachedPermissions {
    tree: Arc<PermissionTree>,
    inserted_at: DateTime<Utc>,
}

// =============================================================================
// Cache statistics
// =============================================================================

/// Statistics for the permission cache.
#[derive(Debug, Default)]
pub struct PermissionCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    store_failures: AtomicU64,
}

impl PermissionCacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current stats.
    pub fn snapshot(&self) -> PermissionCacheStatsSnapshot {
        PermissionCacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of permission cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionCacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub store_failures: u64,
}

// =============================================================================
// Permission cache
// =============================================================================

/// Configuration for the permission cache.
#[derive(Debug, Clone)]
pub struct PermissionCacheConfig {
    /// Maximum number of cached (user, scope) entries
    pub max_entries: usize,
}

impl Default for PermissionCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50_000,
        }
    }
}

/// Concurrent (user, scope) -> permission tree cache.
pub struct PermissionCache {
    entries: DashMap<PermissionKey, CachedPermissions>,
    config: PermissionCacheConfig,
    clock: Arc<dyn Clock>,
    stats: PermissionCacheStats,
}

impl PermissionCache {
    /// Create a new permission cache.
    pub fn new(config: PermissionCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
            stats: PermissionCacheStats::default(),
        }
    }

    /// Create a cache with default configuration and the system clock.
    pub fn with_defaults() -> Self {
        Self::new(PermissionCacheConfig::default(), Arc::new(SystemClock))
    }

    /// Resolve the permission tree for a user in a scope.
    ///
    /// A cached entry with at least one permission node is returned as-is;
    /// anything else (absent, or cached empty) goes through `fetch`. A fetch
    /// error propagates unchanged and leaves the cache untouched. A store
    /// failure (cache at capacity) is logged and swallowed; the freshly
    /// fetched tree is still returned so the request can proceed.
    pub fn resolve<E, F>(
        &self,
        user_id: &str,
        scope: &Scope,
        fetch: F,
    ) -> Result<Arc<PermissionTree>, E>
    where
        F: FnOnce() -> Result<PermissionTree, E>,
    {
        let key = PermissionKey::new(user_id, scope);

        if let Some(entry) = self.entries.get(&key) {
            if !entry.tree.is_empty() {
                self.stats.record_hit();
                debug!(key = %key, "Permission cache hit");
                return Ok(entry.tree.clone());
            }
        }

        self.stats.record_miss();
        let tree = Arc::new(fetch()?);
        debug!(key = %key, nodes = tree.len(), "Fetched permission tree");

        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(&key) {
            self.stats.record_store_failure();
            warn!(
                key = %key,
                entries = self.entries.len(),
                "Permission cache at capacity, returning tree uncached"
            );
            return Ok(tree);
        }

        self.entries.insert(
            key,
            CachedPermissions {
                tree: tree.clone(),
                inserted_at: self.clock.now(),
            },
        );
        self.stats.record_insert();
        Ok(tree)
    }

    /// Look up a cached tree without fetching. Returns whatever is stored,
    /// empty trees included.
    pub fn peek(&self, user_id: &str, scope: &Scope) -> Option<Arc<PermissionTree>> {
        self.entries
            .get(&PermissionKey::new(user_id, scope))
            .map(|entry| entry.tree.clone())
    }

    /// When the cached entry for a user/scope was inserted.
    pub fn inserted_at(&self, user_id: &str, scope: &Scope) -> Option<DateTime<Utc>> {
        self.entries
            .get(&PermissionKey::new(user_id, scope))
            .map(|entry| entry.inserted_at)
    }

    /// Drop the cached tree for one user in one scope.
    ///
    /// Returns true if an entry was removed. The next resolve re-fetches.
    pub fn evict(&self, user_id: &str, scope: &Scope) -> bool {
        let removed = self
            .entries
            .remove(&PermissionKey::new(user_id, scope))
            .is_some();
        if removed {
            debug!(user_id = user_id, scope = %scope, "Evicted permission entry");
        }
        removed
    }

    /// Drop every cached tree for a user across all scopes.
    ///
    /// Returns the number of entries removed.
    pub fn evict_user(&self, user_id: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            if key.user_id == user_id {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(user_id = user_id, removed = removed, "Evicted user permissions");
        }
        removed
    }

    /// Drop every entry. Used when scope structure changes underneath the
    /// cache, e.g. on project deletion.
    pub fn clear(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        debug!(removed = removed, "Cleared permission cache");
        removed
    }

    /// Current number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> PermissionCacheStatsSnapshot {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
