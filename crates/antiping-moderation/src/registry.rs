//! Offender registry
//!
//! Maps identities to their [`Offender`] and garbage-collects idle entries.
//!
//! ## Lock Usage
//!
//! - The map sits behind a `parking_lot::RwLock` held only for lookup,
//!   insert, and removal; never while a ledger is being processed.
//! - Each offender has its own `parking_lot::Mutex`, which serializes
//!   push, expiry and classification for one identity.
//! - Lock order is map then offender. Ingestion releases the map lock before
//!   taking the offender lock, so it never holds both.
//! - Neither lock is held across `.await`.
//!
//! When the sweep removes an identity it marks the offender retired while
//! holding both locks. An ingestion that raced with the removal sees the
//! flag and re-resolves the identity instead of writing to a detached entry.

use crate::error::{ModerationError, Result};
use crate::offence::{Classification, Limits, Offence};
use crate::offender::{ModerationState, Offender};
use antiping_core::Timestamp;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of recording one offence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// State before the offence
    pub previous: ModerationState,
    /// State after the offence
    pub state: ModerationState,
    /// Classification after pushing and expiring
    pub classification: Classification,
    /// Total live weight after pushing and expiring
    pub total_weight: u64,
    /// Offences dropped by expiry during this call
    pub expired: usize,
    /// Offence discarded to make room in a full ledger
    pub evicted: Option<Offence>,
}

impl RecordOutcome {
    /// The new state if this offence moved the identity upward.
    pub fn escalation(&self) -> Option<ModerationState> {
        (self.state > self.previous).then_some(self.state)
    }
}

/// Counters from one garbage-collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Identities visited
    pub examined: usize,
    /// Offences dropped by expiry
    pub expired_offences: usize,
    /// Identities reset to `Okay`
    pub demoted: usize,
    /// Identities removed with empty ledgers
    pub removed: usize,
    /// Identities whose ledger could not be swept
    pub failed: usize,
}

/// Registry of tracked identities.
#[derive(Debug)]
pub struct OffenderRegistry {
    offenders: RwLock<HashMap<String, Arc<Mutex<Offender>>>>,
    history_capacity: usize,
    limits: Limits,
}

impl OffenderRegistry {
    /// Create a registry whose ledgers hold `history_capacity` offences.
    pub fn new(history_capacity: usize, limits: Limits) -> Result<Self> {
        if history_capacity == 0 {
            return Err(ModerationError::config(
                "history capacity must be greater than zero",
            ));
        }
        Ok(Self {
            offenders: RwLock::new(HashMap::new()),
            history_capacity,
            limits,
        })
    }

    /// Classification thresholds.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.offenders.read().len()
    }

    /// Whether no identities are tracked.
    pub fn is_empty(&self) -> bool {
        self.offenders.read().is_empty()
    }

    /// Current state of `identity`, if tracked.
    pub fn state_of(&self, identity: &str) -> Option<ModerationState> {
        let entry = self.offenders.read().get(identity).cloned()?;
        let state = entry.lock().state();
        Some(state)
    }

    /// Live weight of `identity`, if tracked.
    pub fn total_weight_of(&self, identity: &str) -> Option<u64> {
        let entry = self.offenders.read().get(identity).cloned()?;
        let weight = entry.lock().ledger().total_weight();
        Some(weight)
    }

    /// Return the offender for `identity`, creating an empty one on first use.
    pub fn get_or_create(&self, identity: &str) -> Result<Arc<Mutex<Offender>>> {
        if let Some(entry) = self.offenders.read().get(identity) {
            return Ok(entry.clone());
        }

        let mut offenders = self.offenders.write();
        if let Some(entry) = offenders.get(identity) {
            return Ok(entry.clone());
        }
        let entry = Arc::new(Mutex::new(Offender::new(self.history_capacity)?));
        offenders.insert(identity.to_owned(), entry.clone());
        debug!(identity, "tracking new offender");
        Ok(entry)
    }

    /// Record `offence` against `identity`, expire relative to `now`, and
    /// raise the state to match the new classification.
    pub fn record(&self, identity: &str, offence: Offence, now: Timestamp) -> Result<RecordOutcome> {
        loop {
            let entry = self.get_or_create(identity)?;
            let mut offender = entry.lock();
            if offender.is_retired() {
                continue;
            }
            let outcome = self.record_locked(&mut offender, offence, now)?;
            debug!(
                identity,
                weight = offence.weight,
                total_weight = outcome.total_weight,
                state = %outcome.state,
                "recorded offence"
            );
            return Ok(outcome);
        }
    }

    fn record_locked(
        &self,
        offender: &mut Offender,
        offence: Offence,
        now: Timestamp,
    ) -> Result<RecordOutcome> {
        let mut expired = 0;
        let mut evicted = None;

        match offender.ledger_mut().push(offence) {
            Ok(()) => {}
            Err(ModerationError::Collection(err)) if err.is_recoverable() => {
                expired += offender.ledger_mut().clear_expired(now)?.len();
                evicted = Self::make_room(offender, offence)?;
            }
            Err(err) => return Err(err),
        }

        expired += offender.ledger_mut().clear_expired(now)?.len();
        let classification = offender.ledger().classify(&self.limits);
        let previous = offender.escalate(classification);

        Ok(RecordOutcome {
            previous,
            state: offender.state(),
            classification,
            total_weight: offender.ledger().total_weight(),
            expired,
            evicted,
        })
    }

    /// Push into a ledger that was full before expiry.
    ///
    /// If it is still full, whichever of the held minimum and the new
    /// offence expires first is discarded.
    fn make_room(offender: &mut Offender, offence: Offence) -> Result<Option<Offence>> {
        let ledger = offender.ledger_mut();
        if !ledger.is_full() {
            ledger.push(offence)?;
            return Ok(None);
        }
        if ledger.oldest().is_some_and(|oldest| offence <= *oldest) {
            return Ok(Some(offence));
        }
        let evicted = ledger.pop()?;
        ledger.push(offence)?;
        Ok(Some(evicted))
    }

    /// Expire every ledger, demote identities whose ledger is back to
    /// `Okay`, and drop identities whose ledger is empty.
    pub fn gc_sweep(&self, now: Timestamp) -> SweepReport {
        let snapshot: Vec<(String, Arc<Mutex<Offender>>)> = self
            .offenders
            .read()
            .iter()
            .map(|(identity, entry)| (identity.clone(), entry.clone()))
            .collect();

        let mut report = SweepReport {
            examined: snapshot.len(),
            ..SweepReport::default()
        };
        let mut idle = Vec::new();

        for (identity, entry) in snapshot {
            let mut offender = entry.lock();
            match offender.ledger_mut().clear_expired(now) {
                Ok(removed) => report.expired_offences += removed.len(),
                Err(err) => {
                    warn!(identity = %identity, error = %err, "failed to sweep offender");
                    report.failed += 1;
                    continue;
                }
            }

            if offender.ledger().is_empty() {
                idle.push(identity);
            } else if offender.demote_if_okay(&self.limits) {
                debug!(identity = %identity, "offender demoted to okay");
                report.demoted += 1;
            }
        }

        if !idle.is_empty() {
            let mut offenders = self.offenders.write();
            for identity in idle {
                let still_idle = offenders.get(&identity).is_some_and(|entry| {
                    let mut offender = entry.lock();
                    if offender.ledger().is_empty() {
                        offender.retire();
                        true
                    } else {
                        false
                    }
                });
                if still_idle {
                    offenders.remove(&identity);
                    report.removed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn registry(capacity: usize) -> OffenderRegistry {
        OffenderRegistry::new(capacity, Limits::new(20, 30).unwrap()).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(OffenderRegistry::new(0, Limits::new(1, 2).unwrap()).is_err());
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let registry = registry(4);
        assert!(registry.is_empty());
        let first = registry.get_or_create("@alice:example.org").unwrap();
        let second = registry.get_or_create("@alice:example.org").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.state_of("@alice:example.org"),
            Some(ModerationState::Okay)
        );
        assert_eq!(registry.state_of("@bob:example.org"), None);
    }

    #[test]
    fn test_record_escalates_through_states() {
        let registry = registry(8);
        let states: Vec<ModerationState> = (0..3)
            .map(|i| {
                registry
                    .record("@spam:example.org", Offence::new(at(10_000 + i), 10), at(0))
                    .unwrap()
                    .state
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ModerationState::Okay,
                ModerationState::Alerted,
                ModerationState::Banned
            ]
        );
    }

    #[test]
    fn test_new_offences_never_lower_state() {
        let registry = registry(8);
        let outcome = registry
            .record("@x:example.org", Offence::new(at(100), 30), at(0))
            .unwrap();
        assert_eq!(outcome.escalation(), Some(ModerationState::Banned));

        // The heavy offence expires during this push, but the state holds
        let outcome = registry
            .record("@x:example.org", Offence::new(at(10_000), 1), at(500))
            .unwrap();
        assert_eq!(outcome.classification, Classification::Okay);
        assert_eq!(outcome.expired, 1);
        assert_eq!(outcome.state, ModerationState::Banned);
        assert_eq!(outcome.escalation(), None);
    }

    #[test]
    fn test_full_ledger_expires_before_evicting() {
        let registry = registry(2);
        registry
            .record("@y:example.org", Offence::new(at(100), 1), at(0))
            .unwrap();
        registry
            .record("@y:example.org", Offence::new(at(200), 1), at(0))
            .unwrap();

        let outcome = registry
            .record("@y:example.org", Offence::new(at(300), 5), at(150))
            .unwrap();
        assert_eq!(outcome.expired, 1);
        assert_eq!(outcome.evicted, None);
        assert_eq!(outcome.total_weight, 6);
    }

    #[test]
    fn test_full_ledger_discards_soonest_expiring() {
        let registry = registry(2);
        for expires in [100, 200] {
            registry
                .record("@z:example.org", Offence::new(at(expires), 1), at(0))
                .unwrap();
        }

        let outcome = registry
            .record("@z:example.org", Offence::new(at(300), 7), at(0))
            .unwrap();
        assert_eq!(outcome.evicted, Some(Offence::new(at(100), 1)));
        assert_eq!(outcome.total_weight, 8);

        let outcome = registry
            .record("@z:example.org", Offence::new(at(50), 9), at(0))
            .unwrap();
        assert_eq!(outcome.evicted, Some(Offence::new(at(50), 9)));
        assert_eq!(outcome.total_weight, 8);
    }

    #[test]
    fn test_gc_removes_empty_and_demotes_okay() {
        let registry = registry(8);
        registry
            .record("@gone:example.org", Offence::new(at(100), 25), at(0))
            .unwrap();
        registry
            .record("@calm:example.org", Offence::new(at(100), 25), at(0))
            .unwrap();
        registry
            .record("@calm:example.org", Offence::new(at(5_000), 2), at(0))
            .unwrap();
        registry
            .record("@loud:example.org", Offence::new(at(5_000), 25), at(0))
            .unwrap();

        let report = registry.gc_sweep(at(1_000));
        assert_eq!(report.examined, 3);
        assert_eq!(report.expired_offences, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.demoted, 1);

        assert_eq!(registry.state_of("@gone:example.org"), None);
        assert_eq!(
            registry.state_of("@calm:example.org"),
            Some(ModerationState::Okay)
        );
        assert_eq!(
            registry.state_of("@loud:example.org"),
            Some(ModerationState::Alerted)
        );
    }

    #[test]
    fn test_record_after_removal_uses_fresh_entry() {
        let registry = registry(4);
        registry
            .record("@back:example.org", Offence::new(at(100), 30), at(0))
            .unwrap();
        let stale = registry.get_or_create("@back:example.org").unwrap();

        registry.gc_sweep(at(1_000));
        assert!(stale.lock().is_retired());
        assert!(registry.is_empty());

        let outcome = registry
            .record("@back:example.org", Offence::new(at(9_000), 1), at(1_000))
            .unwrap();
        assert_eq!(outcome.previous, ModerationState::Okay);
        assert_eq!(registry.total_weight_of("@back:example.org"), Some(1));
    }
}
