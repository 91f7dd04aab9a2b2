//! Rendered-content caching keyed by content fingerprints.
//!
//! Rendering a hierarchy item for a publishing channel is the expensive
//! step of content delivery. Fragments are cached per
//! (project, channel variant, item) and validated on every read against a
//! fingerprint of the content they were rendered from, so editors never see
//! stale output no matter who changed what.

pub mod cache;
pub mod fingerprint;
pub mod key;

pub use cache::{
    RenderCache, RenderCacheConfig, RenderCacheStatsSnapshot, RenderedFragment,
};
pub use fingerprint::{compute_fingerprint, ContentFingerprint, FingerprintError};
pub use key::{RenderKey, KEY_SEPARATOR};
