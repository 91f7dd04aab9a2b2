//! Fingerprint-validated render cache.
//!
//! Maps (project, channel variant, item) to a rendered fragment plus the
//! content fingerprint it was rendered from. Every lookup revalidates: the
//! caller passes a closure that recomputes the current fingerprint from a
//! fresh content snapshot, and the cached fragment is served only on an
//! exact match. There is no TTL and no revision counter; a fragment stays
//! until its content moves on or an invalidation clears it.
//!
//! ## Invalidation granularities
//!
//! - project: clears every variant and item of the project (prefix scan)
//! - channel variant: clears one variant of one project (prefix scan)
//! - item: clears exactly one entry (exact key, so "item-1" never takes
//!   "item-10" with it)
//!
//! A stale read never evicts by itself; whoever re-renders overwrites the
//! entry with `put`.
//!
//! ## Feature flag
//!
//! Deployments whose render pipeline is too cheap to be worth caching
//! disable the cache at startup. Every operation then becomes a no-op that
//! always misses, so callers never branch on the flag.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::render::fingerprint::ContentFingerprint;
use crate::render::key::RenderKey;

// =============================================================================
// Fragment and entry
// =============================================================================

/// A rendered artifact, opaque to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFragment {
    /// Rendered bytes
    pub body: Bytes,
    /// Media type of the body (e.g. "text/html")
    pub content_type: String,
}

impl RenderedFragment {
    /// Create a fragment from body bytes and a media type.
    pub fn new(body: impl Into<Bytes>, content_type: &str) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.to_string(),
        }
    }

    /// Create an HTML fragment.
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self::new(body, "text/html")
    }

    /// Size of the rendered body in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A cached render: the fragment and the fingerprint it was built from.
#[derive(Debug, Clone)]
struct CachedRender {
    fingerprint: ContentFingerprint,
    fragment: RenderedFragment,
}

// =============================================================================
// Cache statistics
// =============================================================================

/// Statistics for the render cache.
#[derive(Debug, Default)]
pub struct RenderCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_misses: AtomicU64,
    fingerprint_failures: AtomicU64,
    inserts: AtomicU64,
    invalidations: AtomicU64,
}

impl RenderCacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_stale_miss(&self) {
        self.stale_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fingerprint_failure(&self) {
        self.fingerprint_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current stats.
    pub fn snapshot(&self) -> RenderCacheStatsSnapshot {
        RenderCacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_misses: self.stale_misses.load(Ordering::Relaxed),
            fingerprint_failures: self.fingerprint_failures.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of render cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RenderCacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an entry whose fingerprint no longer matched
    pub stale_misses: u64,
    /// Lookups where the current fingerprint could not be computed
    pub fingerprint_failures: u64,
    pub inserts: u64,
    pub invalidations: u64,
}

// =============================================================================
// Render cache
// =============================================================================

/// Configuration for the render cache.
#[derive(Debug, Clone)]
pub struct RenderCacheConfig {
    /// Whether the cache is active. Decided once at startup.
    pub enabled: bool,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Concurrent render cache validated by content fingerprints.
pub struct RenderCache {
    entries: DashMap<String, CachedRender>,
    enabled: bool,
    stats: RenderCacheStats,
}

impl RenderCache {
    /// Create a new render cache.
    pub fn new(config: RenderCacheConfig) -> Self {
        if !config.enabled {
            info!("Render cache disabled, all lookups will miss");
        }
        Self {
            entries: DashMap::new(),
            enabled: config.enabled,
            stats: RenderCacheStats::default(),
        }
    }

    /// Create an enabled cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RenderCacheConfig::default())
    }

    /// Whether the cache was enabled at startup.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a fragment, revalidating it against the current content.
    ///
    /// `current_fingerprint` runs only when an entry exists and must
    /// recompute the fingerprint from a fresh content snapshot. Returning
    /// `None` there (snapshot unavailable or inconsistent) downgrades the
    /// lookup to a miss; the entry stays in place either way, since only a
    /// re-render or an explicit invalidation replaces it.
    pub fn get<F>(&self, key: &RenderKey, current_fingerprint: F) -> Option<RenderedFragment>
    where
        F: FnOnce() -> Option<ContentFingerprint>,
    {
        if !self.enabled {
            return None;
        }

        let storage_key = key.to_storage_key();

        // Clone out and release the map guard before recomputing; the
        // closure may consult the content source.
        let cached = match self.entries.get(&storage_key) {
            Some(entry) => entry.value().clone(),
            None => {
                self.stats.record_miss();
                debug!(key = %key, "Render cache miss");
                return None;
            }
        };

        let current = match current_fingerprint() {
            Some(fingerprint) => fingerprint,
            None => {
                self.stats.record_fingerprint_failure();
                warn!(key = %key, "Current fingerprint unavailable, serving as miss");
                return None;
            }
        };

        if cached.fingerprint == current {
            self.stats.record_hit();
            debug!(key = %key, fingerprint = %current, "Render cache hit");
            Some(cached.fragment)
        } else {
            self.stats.record_stale_miss();
            debug!(
                key = %key,
                cached = %cached.fingerprint,
                current = %current,
                "Cached render stale, fingerprint moved"
            );
            None
        }
    }

    /// Store a rendered fragment under its fingerprint.
    ///
    /// Unconditional upsert; when concurrent renders race, the last writer
    /// wins and the survivor revalidates correctly on the next lookup.
    pub fn put(&self, key: &RenderKey, fingerprint: ContentFingerprint, fragment: RenderedFragment) {
        if !self.enabled {
            return;
        }

        debug!(key = %key, fingerprint = %fingerprint, bytes = fragment.len(), "Caching rendered fragment");
        self.entries.insert(
            key.to_storage_key(),
            CachedRender {
                fingerprint,
                fragment,
            },
        );
        self.stats.record_insert();
    }

    /// Drop every fragment of a project, across all channel variants.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_project(&self, project_id: &str) -> usize {
        let removed = self.remove_prefix(&RenderKey::project_prefix(project_id));
        if self.enabled {
            info!(project_id = project_id, removed = removed, "Invalidated project renders");
        }
        removed
    }

    /// Drop every fragment of one channel variant of a project.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_variant(&self, project_id: &str, channel_variant_id: &str) -> usize {
        let removed =
            self.remove_prefix(&RenderKey::variant_prefix(project_id, channel_variant_id));
        if self.enabled {
            info!(
                project_id = project_id,
                channel_variant_id = channel_variant_id,
                removed = removed,
                "Invalidated variant renders"
            );
        }
        removed
    }

    /// Drop the fragment of a single item.
    ///
    /// Returns true if an entry was removed. Exact-key removal: sibling
    /// items whose ids merely share a textual prefix are untouched.
    pub fn invalidate_item(
        &self,
        project_id: &str,
        channel_variant_id: &str,
        item_id: &str,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let key = RenderKey::new(project_id, channel_variant_id, item_id);
        let removed = self.entries.remove(&key.to_storage_key()).is_some();
        if removed {
            self.stats.record_invalidations(1);
            debug!(key = %key, "Invalidated cached render");
        }
        removed
    }

    /// Drop every cached fragment.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.record_invalidations(removed);
        info!(removed = removed, "Cleared render cache");
        removed
    }

    fn remove_prefix(&self, prefix: &str) -> usize {
        if !self.enabled {
            return 0;
        }
        let mut removed = 0;
        self.entries.retain(|storage_key, _| {
            if storage_key.starts_with(prefix) {
                removed += 1;
                false
            } else {
                true
            }
        });
        self.stats.record_invalidations(removed);
        removed
    }

    /// Current number of cached fragments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> RenderCacheStatsSnapshot {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
