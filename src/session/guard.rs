//! Single-active-session accounting per user.
//!
//! The guard keeps the last known good session of every user and admits a
//! request only when no other browser origin currently holds that slot.
//! Expiry is a sliding TTL over `last_seen`, evaluated lazily on the
//! admission path; there is no background sweeper. Records are keyed by
//! user id, so "at most one live session per user" holds structurally and
//! the conflict check runs inside the per-user map entry.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::session::origin::{describe_user_agent, DeviceSummary, Origin};

// =============================================================================
// Session record
// =============================================================================

/// The retained record of a user's last known good session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    /// Derived session key; doubles as the origin identity of the record
    pub session_key: String,

    /// Owning user
    pub user_id: String,

    /// Remote address the session was admitted from
    pub remote_addr: String,

    /// Raw user-agent string, kept so a conflict can be described
    pub user_agent: String,

    /// When this origin was first admitted
    pub created_at: DateTime<Utc>,

    /// Most recent admission through this origin (sliding expiry basis)
    pub last_seen: DateTime<Utc>,
}

impl SessionRecord {
    fn new(user_id: &str, origin: &Origin, now: DateTime<Utc>) -> Self {
        Self {
            session_key: origin.key().to_string(),
            user_id: user_id.to_string(),
            remote_addr: origin.remote_addr().to_string(),
            user_agent: origin.user_agent().to_string(),
            created_at: now,
            last_seen: now,
        }
    }

    /// The origin identity of this record (same value as the session key).
    pub fn origin(&self) -> &str {
        &self.session_key
    }

    /// True if the sliding TTL has run out at `now`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_seen > ttl
    }

    /// Parsed browser/OS/device of this session.
    pub fn device(&self) -> DeviceSummary {
        describe_user_agent(&self.user_agent)
    }
}

/// A refused admission: another origin holds the user's session slot.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConflict {
    /// The record that blocked admission
    pub existing: SessionRecord,
}

impl SessionConflict {
    /// Blocking message shown to the refused browser.
    pub fn message(&self) -> String {
        format!(
            "Another session is already active for this account in {}. \
             Sign out there or wait for it to expire before continuing here.",
            self.existing.device()
        )
    }
}

impl std::fmt::Display for SessionConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Outcome of an admission attempt.
#[derive(Debug, Clone)]
pub enum Admission {
    /// The request may proceed; the record now reflects this origin
    Admitted,
    /// A different origin holds the active session
    Rejected(SessionConflict),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    pub fn conflict(&self) -> Option<&SessionConflict> {
        match self {
            Admission::Admitted => None,
            Admission::Rejected(conflict) => Some(conflict),
        }
    }
}

// =============================================================================
// Guard statistics
// =============================================================================

/// Statistics for the session guard.
#[derive(Debug, Default)]
pub struct SessionGuardStats {
    admitted: AtomicU64,
    rejected: AtomicU64,
    swept: AtomicU64,
}

impl SessionGuardStats {
    fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_swept(&self, count: usize) {
        self.swept.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current stats.
    pub fn snapshot(&self) -> SessionGuardStatsSnapshot {
        SessionGuardStatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of session guard statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGuardStatsSnapshot {
    pub admitted: u64,
    pub rejected: u64,
    pub swept: u64,
}

// =============================================================================
// Session guard
// =============================================================================

/// Concurrent per-user session slot store.
pub struct SessionGuard {
    /// Session records keyed by user id
    sessions: DashMap<String, SessionRecord>,

    /// Guard statistics
    stats: SessionGuardStats,
}

impl SessionGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            stats: SessionGuardStats::default(),
        }
    }

    /// Admit or refuse a request origin for a user.
    ///
    /// All expired records are swept first, lazily, on this path. The
    /// check-and-mutate for the admitting user then runs inside the map
    /// entry for the user id, so two browsers racing the same account
    /// serialize there. Admission never depends on the sweep having seen a
    /// record: the entry path re-checks expiry of the occupant itself.
    pub fn admit(
        &self,
        user_id: &str,
        origin: &Origin,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Admission {
        self.sweep_expired(ttl, now);

        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.is_expired(ttl, now) {
                    *record = SessionRecord::new(user_id, origin, now);
                    self.stats.record_admitted();
                    debug!(user_id = user_id, "Expired session replaced on admission");
                    Admission::Admitted
                } else if record.origin() != origin.key() {
                    self.stats.record_rejected();
                    info!(
                        user_id = user_id,
                        held_by = %record.device(),
                        "Admission refused, another browser holds the session"
                    );
                    Admission::Rejected(SessionConflict {
                        existing: record.clone(),
                    })
                } else {
                    record.last_seen = now;
                    self.stats.record_admitted();
                    debug!(user_id = user_id, "Session refreshed");
                    Admission::Admitted
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SessionRecord::new(user_id, origin, now));
                self.stats.record_admitted();
                debug!(user_id = user_id, "New session admitted");
                Admission::Admitted
            }
        }
    }

    /// Remove a user's session (logout).
    ///
    /// Returns the removed record, if any.
    pub fn remove_user(&self, user_id: &str) -> Option<SessionRecord> {
        let removed = self.sessions.remove(user_id).map(|(_, record)| record);
        if removed.is_some() {
            debug!(user_id = user_id, "Session removed");
        }
        removed
    }

    /// Remove whichever session holds the given session key (administrative
    /// teardown). A scan is fine here: teardown is rare and the map is
    /// keyed by user.
    pub fn remove_by_session_key(&self, session_key: &str) -> Option<SessionRecord> {
        let user_id = self
            .sessions
            .iter()
            .find(|record| record.session_key == session_key)
            .map(|record| record.user_id.clone())?;

        // The user may have re-admitted under a new origin between the scan
        // and the removal; only remove the record we actually matched.
        let removed = self
            .sessions
            .remove_if(&user_id, |_, record| record.session_key == session_key)
            .map(|(_, record)| record);
        if removed.is_some() {
            info!(user_id = %user_id, "Session removed by key");
        }
        removed
    }

    /// Sessions still alive at `now` under `ttl`, ordered by user id.
    pub fn active_sessions(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> = self
            .sessions
            .iter()
            .filter(|record| !record.is_expired(ttl, now))
            .map(|record| record.value().clone())
            .collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        records
    }

    /// Current number of records, expired ones included until the next
    /// sweep.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the guard holds no records.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get guard statistics.
    pub fn stats(&self) -> SessionGuardStatsSnapshot {
        self.stats.snapshot()
    }

    fn sweep_expired(&self, ttl: Duration, now: DateTime<Utc>) {
        let mut swept = 0;
        self.sessions.retain(|_, record| {
            if record.is_expired(ttl, now) {
                swept += 1;
                false
            } else {
                true
            }
        });
        if swept > 0 {
            self.stats.record_swept(swept);
            debug!(swept = swept, "Swept expired sessions");
        }
    }
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
