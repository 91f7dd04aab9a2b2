//! Top-level configuration.

use chrono::Duration;

use crate::permission::PermissionCacheConfig;
use crate::render::RenderCacheConfig;

/// Configuration for the consistency layer.
#[derive(Debug, Clone)]
pub struct VigilConfig {
    /// Whether rendered fragments are cached at all. Deployments whose
    /// render pipeline is cheap run with this off.
    pub render_cache_enabled: bool,

    /// Sliding TTL of a browser session
    pub session_ttl: Duration,

    /// Maximum number of cached (user, scope) permission entries
    pub permission_max_entries: usize,

    /// Principal exempt from session concurrency checks (background jobs,
    /// scheduled imports). Requests by this user are never admitted into
    /// nor blocked by the session guard.
    pub system_principal: String,

    /// Bound on waiting for an in-flight project teardown, in milliseconds
    pub teardown_wait_ms: u64,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            render_cache_enabled: true,
            session_ttl: Duration::seconds(1800), // 30 minutes
            permission_max_entries: 50_000,
            system_principal: "system".to_string(),
            teardown_wait_ms: 10_000,
        }
    }
}

impl VigilConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RENDER_CACHE_ENABLED") {
            if let Ok(enabled) = val.parse::<bool>() {
                config.render_cache_enabled = enabled;
            }
        }

        if let Ok(val) = std::env::var("SESSION_TTL_SECS") {
            if let Ok(secs) = val.parse::<i64>() {
                config.session_ttl = Duration::seconds(secs);
            }
        }

        if let Ok(val) = std::env::var("PERMISSION_CACHE_MAX_ENTRIES") {
            if let Ok(max) = val.parse::<usize>() {
                config.permission_max_entries = max;
            }
        }

        if let Ok(val) = std::env::var("SYSTEM_PRINCIPAL") {
            if !val.is_empty() {
                config.system_principal = val;
            }
        }

        if let Ok(val) = std::env::var("TEARDOWN_WAIT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.teardown_wait_ms = ms;
            }
        }

        config
    }

    /// Render cache configuration slice.
    pub fn render_cache(&self) -> RenderCacheConfig {
        RenderCacheConfig {
            enabled: self.render_cache_enabled,
        }
    }

    /// Permission cache configuration slice.
    pub fn permission_cache(&self) -> PermissionCacheConfig {
        PermissionCacheConfig {
            max_entries: self.permission_max_entries,
        }
    }
}
