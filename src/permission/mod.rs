//! Permission resolution and caching.
//!
//! Authorization answers "may this user act within this scope" with a
//! [`PermissionTree`] fetched from the permission source. Trees are memoized
//! per (user, scope) and refreshed only on explicit eviction; a role change
//! takes effect when the owning flow evicts the affected entries.

pub mod cache;
pub mod tree;

pub use cache::{
    PermissionCache, PermissionCacheConfig, PermissionCacheStatsSnapshot, PermissionKey, Scope,
};
pub use tree::{PermissionFlag, PermissionNode, PermissionTree};
