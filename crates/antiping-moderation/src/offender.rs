//! Per-identity moderation state.
//!
//! State only rises on new offences. The one way back down is
//! [`Offender::demote_if_okay`], which the registry's sweep calls after
//! expiring stale offences.

use crate::error::Result;
use crate::offence::{Classification, Limits, OffenceLedger};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far moderation has gone against an identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationState {
    /// No action taken
    #[default]
    Okay,
    /// Warned for spam
    Alerted,
    /// Ban issued
    Banned,
}

impl ModerationState {
    /// State implied by a classification.
    pub fn for_classification(classification: Classification) -> Self {
        match classification {
            Classification::Okay => Self::Okay,
            Classification::Spam => Self::Alerted,
            Classification::Ban => Self::Banned,
        }
    }
}

impl fmt::Display for ModerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Okay => "okay",
            Self::Alerted => "alerted",
            Self::Banned => "banned",
        };
        f.write_str(label)
    }
}

/// One identity's ledger and state.
#[derive(Debug, Clone)]
pub struct Offender {
    ledger: OffenceLedger,
    state: ModerationState,
    retired: bool,
}

impl Offender {
    /// Create an offender with an empty ledger of `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            ledger: OffenceLedger::new(capacity)?,
            state: ModerationState::Okay,
            retired: false,
        })
    }

    /// Current state.
    pub fn state(&self) -> ModerationState {
        self.state
    }

    /// Borrow the ledger.
    pub fn ledger(&self) -> &OffenceLedger {
        &self.ledger
    }

    /// Mutably borrow the ledger.
    pub fn ledger_mut(&mut self) -> &mut OffenceLedger {
        &mut self.ledger
    }

    /// Raise the state to match `classification`; never lowers it.
    ///
    /// Returns the previous state.
    pub fn escalate(&mut self, classification: Classification) -> ModerationState {
        let previous = self.state;
        self.state = previous.max(ModerationState::for_classification(classification));
        previous
    }

    /// Reset to `Okay` when the ledger classifies as `Okay`.
    ///
    /// Returns true if the state changed.
    pub fn demote_if_okay(&mut self, limits: &Limits) -> bool {
        if self.ledger.classify(limits) == Classification::Okay && self.state != ModerationState::Okay
        {
            self.state = ModerationState::Okay;
            return true;
        }
        false
    }

    /// Whether the registry has dropped this offender.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }
}
