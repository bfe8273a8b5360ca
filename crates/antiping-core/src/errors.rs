//! Errors raised by the bounded collections.
//!
//! `CapacityExceeded` is the only recoverable condition: the caller is
//! expected to make room (expire or pop) and try again. The remaining
//! variants signal a broken call discipline.

use thiserror::Error;

/// Errors from bounded collection operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// A collection was constructed with zero capacity.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// Removal was attempted on an empty collection.
    #[error("{operation} from empty collection")]
    Underflow {
        /// The operation that underflowed
        operation: &'static str,
    },

    /// Logical index outside `[-len, len)`.
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// Requested logical index
        index: isize,
        /// Current logical length
        len: usize,
    },

    /// Insert rejected because the collection is full.
    #[error("collection is full (capacity {capacity})")]
    CapacityExceeded {
        /// Fixed capacity of the collection
        capacity: usize,
    },
}

impl CollectionError {
    /// Create an underflow error for the named operation.
    pub fn underflow(operation: &'static str) -> Self {
        Self::Underflow { operation }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(index: isize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Create a capacity-exceeded error.
    pub fn capacity_exceeded(capacity: usize) -> Self {
        Self::CapacityExceeded { capacity }
    }

    /// Whether the caller can recover by making room and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// Result alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;
