//! Top-level composition of the consistency layer.
//!
//! [`Vigil`] owns the three components and the collaborator seams and wires
//! them into the request flow:
//!
//! ```text
//! authenticated request
//!       │
//!       ▼
//! ┌───────────────────────────────────────────────┐
//! │  Vigil                                        │
//! │   admit ──▶ SessionGuard (one browser/user)   │
//! │   authorize ──▶ PermissionCache ──▶ source    │
//! │   fragments ──▶ RenderCache ◀── fingerprints  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Exemption policy lives here, not in the guard: the system principal and
//! flagged internal service calls skip session accounting entirely, and
//! logout flows call [`Vigil::logout`] instead of being admitted.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::VigilConfig;
use crate::content::DigestIndex;
use crate::inflight::{FlightBoard, FlightStatus};
use crate::permission::{PermissionCache, PermissionTree, Scope};
use crate::render::{
    compute_fingerprint, ContentFingerprint, RenderCache, RenderKey, RenderedFragment,
};
use crate::session::{Admission, Origin, SessionGuard, SessionRecord};
use crate::source::{ContentSource, PermissionSource};
use crate::types::{Result, VigilError};

/// Identity and transport facts of one incoming request.
#[derive(Debug, Clone)]
pub struct RequesterContext {
    /// Authenticated user id
    pub user_id: String,
    /// Remote network address the request arrived from
    pub remote_addr: String,
    /// Raw user-agent header
    pub user_agent: String,
    /// Whether this is a call between internal services rather than a
    /// browser request
    pub internal_service: bool,
}

impl RequesterContext {
    /// Context for a browser request.
    pub fn browser(user_id: &str, remote_addr: &str, user_agent: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            remote_addr: remote_addr.to_string(),
            user_agent: user_agent.to_string(),
            internal_service: false,
        }
    }

    /// Context for an internal service-to-service call.
    pub fn internal(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            remote_addr: String::new(),
            user_agent: String::new(),
            internal_service: true,
        }
    }
}

/// Outcome of the combined session and permission check.
#[derive(Debug, Clone)]
pub enum RequestDecision {
    /// Session admitted and view permission present
    Allowed(Arc<PermissionTree>),
    /// Session admitted but the scope grants no view permission
    Denied,
    /// Another browser holds the user's session
    SessionBusy(crate::session::SessionConflict),
}

impl RequestDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RequestDecision::Allowed(_))
    }
}

/// What a project teardown call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectTeardown {
    /// This caller performed the teardown
    Performed {
        renders_removed: usize,
        permissions_cleared: usize,
    },
    /// Another caller was already tearing down; we waited for it
    Joined,
}

/// The consistency layer: permission cache, render cache, and session
/// guard behind one composition.
pub struct Vigil {
    config: VigilConfig,
    clock: Arc<dyn Clock>,
    permission_source: Arc<dyn PermissionSource>,
    content_source: Arc<dyn ContentSource>,

    /// (user, scope) -> permission tree
    pub permissions: PermissionCache,
    /// (project, variant, item) -> rendered fragment
    pub renders: RenderCache,
    /// user -> active session record
    pub sessions: SessionGuard,

    teardowns: FlightBoard,
}

impl Vigil {
    /// Wire up the layer from configuration, collaborators, and a clock.
    pub fn new(
        config: VigilConfig,
        permission_source: Arc<dyn PermissionSource>,
        content_source: Arc<dyn ContentSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            render_cache_enabled = config.render_cache_enabled,
            session_ttl_secs = config.session_ttl.num_seconds(),
            "Consistency layer starting"
        );
        Self {
            permissions: PermissionCache::new(config.permission_cache(), clock.clone()),
            renders: RenderCache::new(config.render_cache()),
            sessions: SessionGuard::new(),
            teardowns: FlightBoard::new(),
            config,
            clock,
            permission_source,
            content_source,
        }
    }

    /// The configuration this instance runs with.
    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Admit or refuse a request under the one-session-per-user rule.
    ///
    /// Exempt requesters (the system principal, internal service calls)
    /// bypass session accounting entirely: nothing is recorded and nothing
    /// blocks them.
    pub fn admit(&self, ctx: &RequesterContext) -> Admission {
        if self.is_exempt(ctx) {
            debug!(user_id = %ctx.user_id, "Session accounting bypassed for exempt requester");
            return Admission::Admitted;
        }
        let origin = Origin::derive(&ctx.user_id, &ctx.remote_addr, &ctx.user_agent);
        self.sessions.admit(
            &ctx.user_id,
            &origin,
            self.config.session_ttl,
            self.clock.now(),
        )
    }

    /// End a user's session. Logout endpoints call this instead of
    /// [`Vigil::admit`].
    pub fn logout(&self, user_id: &str) -> Option<SessionRecord> {
        self.sessions.remove_user(user_id)
    }

    /// Administratively revoke whichever session holds the given key.
    pub fn revoke_session(&self, session_key: &str) -> Option<SessionRecord> {
        self.sessions.remove_by_session_key(session_key)
    }

    /// Sessions currently alive, for admin surfaces.
    pub fn active_sessions(&self) -> Vec<SessionRecord> {
        self.sessions
            .active_sessions(self.config.session_ttl, self.clock.now())
    }

    fn is_exempt(&self, ctx: &RequesterContext) -> bool {
        ctx.internal_service || ctx.user_id == self.config.system_principal
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Resolve the user's permission tree for a scope, fetching through the
    /// permission source on a miss.
    pub fn authorize(&self, user_id: &str, scope: &Scope) -> Result<Arc<PermissionTree>> {
        self.permissions
            .resolve(user_id, scope, || {
                self.permission_source
                    .fetch_permissions(&scope.breadcrumb())
            })
            .map_err(VigilError::from)
    }

    /// Drop and re-fetch the user's permissions for a scope. Called after a
    /// role change so the new grants take effect immediately.
    pub fn refresh_permissions(
        &self,
        user_id: &str,
        scope: &Scope,
    ) -> Result<Arc<PermissionTree>> {
        self.permissions.evict(user_id, scope);
        self.authorize(user_id, scope)
    }

    /// Run the full per-request check: session admission, then view
    /// permission for the scope.
    pub fn check_request(
        &self,
        ctx: &RequesterContext,
        scope: &Scope,
    ) -> Result<RequestDecision> {
        if let Admission::Rejected(conflict) = self.admit(ctx) {
            return Ok(RequestDecision::SessionBusy(conflict));
        }

        let tree = self.authorize(&ctx.user_id, scope)?;
        if tree.has_view() {
            Ok(RequestDecision::Allowed(tree))
        } else {
            debug!(user_id = %ctx.user_id, scope = %scope, "No view permission in scope");
            Ok(RequestDecision::Denied)
        }
    }

    // =========================================================================
    // Rendered fragments
    // =========================================================================

    /// Fetch a cached fragment if one exists and its content is unchanged.
    pub fn cached_fragment(
        &self,
        project_id: &str,
        channel_variant_id: &str,
        item_id: &str,
    ) -> Option<RenderedFragment> {
        let key = RenderKey::new(project_id, channel_variant_id, item_id);
        self.renders.get(&key, || {
            self.current_fingerprint(project_id, channel_variant_id, item_id)
        })
    }

    /// Render an item through `render` and cache the result.
    ///
    /// The fingerprint is captured before `render` runs. An edit landing
    /// while the render is in progress moves the live fingerprint away
    /// from the one stamped here, so the next lookup misses and re-renders
    /// instead of serving the torn artifact. When no fingerprint can be
    /// established (content model inconsistency or source failure) the
    /// render still happens and is returned, just not cached.
    pub fn render_and_store<F>(
        &self,
        project_id: &str,
        channel_variant_id: &str,
        item_id: &str,
        render: F,
    ) -> RenderedFragment
    where
        F: FnOnce() -> RenderedFragment,
    {
        if !self.renders.is_enabled() {
            return render();
        }

        let key = RenderKey::new(project_id, channel_variant_id, item_id);
        let fingerprint = self.current_fingerprint(project_id, channel_variant_id, item_id);
        let fragment = render();
        match fingerprint {
            Some(fingerprint) => {
                self.renders.put(&key, fingerprint, fragment.clone());
            }
            None => {
                warn!(key = %key, "No fingerprint before render, serving uncached");
            }
        }
        fragment
    }

    /// Compute the fingerprint an item's render depends on right now.
    ///
    /// Failures are logged and collapse to `None`, which every caller
    /// treats as "do not trust the cache".
    fn current_fingerprint(
        &self,
        project_id: &str,
        channel_variant_id: &str,
        item_id: &str,
    ) -> Option<ContentFingerprint> {
        let metadata_key = Self::hierarchy_key(project_id, channel_variant_id);

        let hierarchy = match self.content_source.hierarchy(&metadata_key) {
            Ok(hierarchy) => hierarchy,
            Err(err) => {
                warn!(metadata_key = %metadata_key, error = %err, "Hierarchy unavailable");
                return None;
            }
        };
        let digests: DigestIndex = match self.content_source.content_digests(project_id) {
            Ok(digests) => digests,
            Err(err) => {
                warn!(project_id = project_id, error = %err, "Content digests unavailable");
                return None;
            }
        };

        match compute_fingerprint(&hierarchy, item_id, &digests) {
            Ok(fingerprint) => Some(fingerprint),
            Err(err) => {
                warn!(
                    project_id = project_id,
                    item_id = item_id,
                    error = %err,
                    "Fingerprint computation failed"
                );
                None
            }
        }
    }

    /// Metadata key under which a variant's hierarchy is stored.
    fn hierarchy_key(project_id: &str, channel_variant_id: &str) -> String {
        format!("{}:{}", project_id, channel_variant_id)
    }

    // =========================================================================
    // Project teardown
    // =========================================================================

    /// Tear down all cached state of a project.
    ///
    /// Renders of the project are invalidated and the permission cache is
    /// cleared wholesale (scope trees embed project structure, so every
    /// entry is suspect once a project disappears). Concurrent callers for
    /// the same project coalesce onto one flight: the leader does the work,
    /// the rest wait for it to finish, bounded by the configured teardown
    /// wait.
    pub fn remove_project(&self, project_id: &str) -> Result<ProjectTeardown> {
        let flight_key = format!("project-teardown:{}", project_id);
        match self.teardowns.begin(&flight_key) {
            FlightStatus::Leader(guard) => {
                let renders_removed = self.renders.invalidate_project(project_id);
                let permissions_cleared = self.permissions.clear();
                guard.complete();
                info!(
                    project_id = project_id,
                    renders_removed = renders_removed,
                    permissions_cleared = permissions_cleared,
                    "Project state torn down"
                );
                Ok(ProjectTeardown::Performed {
                    renders_removed,
                    permissions_cleared,
                })
            }
            FlightStatus::Follower(handle) => {
                let wait = StdDuration::from_millis(self.config.teardown_wait_ms);
                if handle.wait(wait) {
                    debug!(project_id = project_id, "Joined completed teardown");
                    Ok(ProjectTeardown::Joined)
                } else {
                    Err(VigilError::Timeout {
                        operation: format!("teardown of project {}", project_id),
                    })
                }
            }
        }
    }
}
