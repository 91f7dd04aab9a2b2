//! Keyed single-flight coordination.
//!
//! When several request handlers hit the same expensive transition at once
//! (a project teardown, typically), exactly one should perform it while the
//! rest wait for completion instead of polling and retrying. The first
//! caller to open a flight for a key becomes its leader and receives a
//! completion guard; every concurrent caller for the same key receives a
//! follower handle that blocks, with a bounded wait, until the leader
//! finishes. A leader that unwinds still releases its waiters via the
//! guard's Drop.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Shared state of one in-flight operation.
struct Flight {
    done: Mutex<bool>,
    completed: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            completed: Condvar::new(),
        }
    }

    fn finish(&self) {
        if let Ok(mut done) = self.done.lock() {
            *done = true;
        }
        self.completed.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = match self.done.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        while !*done {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.completed.wait_timeout(done, remaining) {
                Ok((guard, _)) => done = guard,
                Err(_) => return false,
            }
        }
        true
    }
}

/// Leader's completion guard for one flight.
///
/// Call [`FlightGuard::complete`] when the operation is done; dropping the
/// guard without completing releases the waiters all the same, so an
/// unwinding leader cannot strand them.
pub struct FlightGuard {
    key: String,
    flight: Arc<Flight>,
    flights: Arc<DashMap<String, Arc<Flight>>>,
    completed: bool,
}

impl FlightGuard {
    /// Mark the operation complete and release all waiters.
    pub fn complete(mut self) {
        self.finish_flight();
    }

    fn finish_flight(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        // Remove first so late arrivals open a fresh flight instead of
        // joining a finished one.
        self.flights.remove(&self.key);
        self.flight.finish();
        debug!(key = %self.key, "Flight completed");
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.finish_flight();
    }
}

/// Follower's handle on someone else's flight.
pub struct FlightHandle {
    flight: Arc<Flight>,
}

impl FlightHandle {
    /// Block until the leader finishes or the timeout runs out.
    ///
    /// Returns true if the flight completed within the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.flight.wait(timeout)
    }
}

/// How a caller relates to the operation it asked to begin.
pub enum FlightStatus {
    /// This caller leads the operation and must complete the guard
    Leader(FlightGuard),
    /// Another caller leads; wait on the handle
    Follower(FlightHandle),
}

/// Registry of in-flight operations, one slot per key.
pub struct FlightBoard {
    flights: Arc<DashMap<String, Arc<Flight>>>,
}

impl FlightBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Open or join the flight for a key.
    ///
    /// The leader/follower decision and the flight registration happen in
    /// one map-entry step, so exactly one concurrent caller leads.
    pub fn begin(&self, key: &str) -> FlightStatus {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                debug!(key = key, "Joining in-flight operation");
                FlightStatus::Follower(FlightHandle {
                    flight: occupied.get().clone(),
                })
            }
            Entry::Vacant(vacant) => {
                let flight = Arc::new(Flight::new());
                vacant.insert(flight.clone());
                debug!(key = key, "Opened flight");
                FlightStatus::Leader(FlightGuard {
                    key: key.to_string(),
                    flight,
                    flights: self.flights.clone(),
                    completed: false,
                })
            }
        }
    }

    /// Whether a flight is currently open for the key.
    pub fn in_flight(&self, key: &str) -> bool {
        self.flights.contains_key(key)
    }

    /// Number of open flights.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl Default for FlightBoard {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
