//! Moderation error types
//!
//! Errors from the decision path. A request that fails with any of these is
//! reported as not processed; it is never treated as a clean message.

use crate::event::EventError;
use antiping_core::CollectionError;
use thiserror::Error;

/// Errors from moderation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    /// A bounded collection rejected an operation.
    #[error("ledger error: {0}")]
    Collection(#[from] CollectionError),

    /// Configuration failed validation.
    #[error("invalid configuration: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// An inbound event could not be parsed.
    #[error("malformed event: {0}")]
    Event(#[from] EventError),

    /// Offence parameters out of range.
    #[error("invalid offence: {reason}")]
    InvalidOffence {
        /// Reason for rejection
        reason: String,
    },
}

impl ModerationError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid offence error.
    pub fn invalid_offence(reason: impl Into<String>) -> Self {
        Self::InvalidOffence {
            reason: reason.into(),
        }
    }
}

/// Result alias for moderation operations.
pub type Result<T> = std::result::Result<T, ModerationError>;
