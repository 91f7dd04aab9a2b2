//! Collaborator seams.
//!
//! The consistency layer performs no I/O of its own; permission data and
//! content snapshots come through these traits. Implementations typically
//! wrap the platform's identity and document services. Both snapshot views
//! are read-only as of the call.

use thiserror::Error;

use crate::content::{ContentNode, DigestIndex};
use crate::permission::PermissionTree;

/// A collaborator could not supply the requested data.
#[derive(Debug, Clone, Error)]
#[error("source failure: {message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Supplies effective permissions for a scope breadcrumb.
pub trait PermissionSource: Send + Sync {
    /// Fetch the permission tree along the given breadcrumb, most specific
    /// scope first (see [`crate::permission::Scope::breadcrumb`]).
    fn fetch_permissions(&self, breadcrumb: &str) -> Result<PermissionTree, SourceError>;
}

/// Supplies content hierarchy and digest snapshots.
pub trait ContentSource: Send + Sync {
    /// The current hierarchy tree stored under the given metadata key.
    fn hierarchy(&self, metadata_key: &str) -> Result<ContentNode, SourceError>;

    /// The current content digests for a project, keyed by content
    /// reference.
    fn content_digests(&self, project_id: &str) -> Result<DigestIndex, SourceError>;
}
