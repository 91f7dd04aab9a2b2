//! Session concurrency control.
//!
//! One user, one browser at a time. A session's identity is its origin: a
//! digest of (user, remote address, user agent). The guard admits a request
//! when the user has no live session or the request arrives from the origin
//! already holding it, refreshes the sliding expiry on every admission, and
//! refuses anything else with a description of the browser that holds the
//! slot. Nothing here authenticates anyone; identity is established before
//! the guard is consulted.

pub mod guard;
pub mod origin;

pub use guard::{
    Admission, SessionConflict, SessionGuard, SessionGuardStatsSnapshot, SessionRecord,
};
pub use origin::{describe_user_agent, DeviceSummary, Origin};
