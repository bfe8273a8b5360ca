//! In-flight action deduplication.
//!
//! At most one action per key may be outstanding. [`ActionDeduplicator::try_begin`]
//! hands out an [`InFlightToken`] that releases the key when dropped, so a
//! key is freed whether the action succeeds, fails or is abandoned.

use crate::dispatcher::ActionHandle;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Tracks keys with an outstanding action.
#[derive(Debug, Clone, Default)]
pub struct ActionDeduplicator {
    in_flight: InFlight,
}

impl ActionDeduplicator {
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` if an action for it is already in flight.
    pub fn try_begin(&self, key: &str) -> Option<InFlightToken> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(key.to_owned()) {
            trace!(key, "action already in flight");
            return None;
        }
        Some(InFlightToken {
            key: key.to_owned(),
            in_flight: self.in_flight.clone(),
        })
    }

    /// Whether `key` is currently claimed.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains(key)
    }

    /// Number of claimed keys.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Claim on a key; released on drop.
#[must_use = "dropping the token releases the key immediately"]
#[derive(Debug)]
pub struct InFlightToken {
    key: String,
    in_flight: InFlight,
}

impl InFlightToken {
    /// Hold the claim until `handle` completes.
    pub fn bind(self, handle: &ActionHandle) {
        handle.on_complete(move |_| drop(self));
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
        trace!(key = %self.key, "released in-flight key");
    }
}
