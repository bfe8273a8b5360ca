//! Offences and the bounded, expiration-ordered ledger that holds them.

use crate::error::{ModerationError, Result};
use antiping_core::{EvictingPriorityQueue, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

/// A single weighted, time-limited infraction.
///
/// Offences order by expiration. Weight only breaks ties so that `Ord`
/// agrees with `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offence {
    /// Instant after which the offence no longer counts
    pub expiration: Timestamp,
    /// Contribution to the offender's total weight
    pub weight: u32,
}

impl Offence {
    /// Create an offence expiring at `expiration`.
    pub fn new(expiration: Timestamp, weight: u32) -> Self {
        Self { expiration, weight }
    }

    /// Create an offence committed at `origin` that lives for `ttl`.
    pub fn committed_at(origin: Timestamp, weight: u32, ttl: Duration) -> Self {
        Self::new(origin + ttl, weight)
    }

    /// Whether the offence expired strictly before `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration < now
    }
}

impl Ord for Offence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiration
            .cmp(&other.expiration)
            .then(self.weight.cmp(&other.weight))
    }
}

impl PartialOrd for Offence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Weight thresholds for SPAM and BAN verdicts; `spam <= ban`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    spam: u64,
    ban: u64,
}

impl Limits {
    /// Create limits, rejecting `spam > ban`.
    pub fn new(spam: u64, ban: u64) -> Result<Self> {
        if spam > ban {
            return Err(ModerationError::config(format!(
                "spam limit {spam} exceeds ban limit {ban}"
            )));
        }
        Ok(Self { spam, ban })
    }

    /// Weight at which an offender is alerted.
    pub fn spam(&self) -> u64 {
        self.spam
    }

    /// Weight at which an offender is banned.
    pub fn ban(&self) -> u64 {
        self.ban
    }
}

/// Verdict derived from a ledger's total weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Below the spam limit
    Okay,
    /// At or above the spam limit
    Spam,
    /// At or above the ban limit
    Ban,
}

/// Bounded collection of an identity's live offences.
#[derive(Debug, Clone)]
pub struct OffenceLedger {
    offences: EvictingPriorityQueue<Offence>,
}

impl OffenceLedger {
    /// Create an empty ledger holding at most `capacity` offences.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            offences: EvictingPriorityQueue::new(capacity)?,
        })
    }

    /// Record an offence; fails with `CapacityExceeded` when full.
    pub fn push(&mut self, offence: Offence) -> Result<()> {
        self.offences.push(offence)?;
        Ok(())
    }

    /// Remove the offence that expires first.
    pub fn pop(&mut self) -> Result<Offence> {
        Ok(self.offences.pop_min()?)
    }

    /// The offence that expires first.
    pub fn oldest(&self) -> Option<&Offence> {
        self.offences.peek_min()
    }

    /// Drop every offence that expired before `now`.
    ///
    /// Returns the removed offences in ascending expiration order. Stops at
    /// the first offence that is still live.
    pub fn clear_expired(&mut self, now: Timestamp) -> Result<Vec<Offence>> {
        let mut removed = Vec::new();
        while self.oldest().is_some_and(|offence| offence.is_expired(now)) {
            removed.push(self.pop()?);
        }
        Ok(removed)
    }

    /// Sum of the weights of all held offences.
    pub fn total_weight(&self) -> u64 {
        self.offences.iter().map(|o| u64::from(o.weight)).sum()
    }

    /// Classify the current total weight; thresholds are inclusive.
    pub fn classify(&self, limits: &Limits) -> Classification {
        let weight = self.total_weight();
        if weight >= limits.ban() {
            Classification::Ban
        } else if weight >= limits.spam() {
            Classification::Spam
        } else {
            Classification::Okay
        }
    }

    /// Number of held offences.
    pub fn len(&self) -> usize {
        self.offences.len()
    }

    /// Whether no offences are held.
    pub fn is_empty(&self) -> bool {
        self.offences.is_empty()
    }

    /// Whether the next push will be rejected.
    pub fn is_full(&self) -> bool {
        self.offences.is_full()
    }

    /// Maximum number of offences held.
    pub fn capacity(&self) -> usize {
        self.offences.capacity()
    }

    /// Iterate over held offences in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Offence> + '_ {
        self.offences.iter()
    }
}
