//! Crate-wide error and result types.

use thiserror::Error;

use crate::source::SourceError;

/// Errors that cross the crate boundary.
///
/// Cache misses are never errors (they come back as `None`), and a stale
/// fingerprint is downgraded to a miss where it is detected. What remains is
/// collaborator failure and the bounded wait on a coalesced teardown.
#[derive(Debug, Error)]
pub enum VigilError {
    /// A collaborator could not supply the requested data. Propagated
    /// unchanged so the caller sees the original failure.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A coalesced operation did not complete within the bounded wait.
    #[error("timed out waiting for in-flight {operation} to complete")]
    Timeout { operation: String },
}

pub type Result<T> = std::result::Result<T, VigilError>;
