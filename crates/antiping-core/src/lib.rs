//! # antiping-core - Bounded Collections and Time
//!
//! Leaf building blocks for offence tracking:
//!
//! - `BoundedRing`: fixed-capacity circular buffer with FIFO overwrite
//! - `EvictingPriorityQueue`: binary min-heap laid over a `BoundedRing`
//! - `Timestamp`, `PhysicalClock`: millisecond wall-clock time with an
//!   injectable clock so callers can advance time deterministically in tests
//!
//! Nothing in this crate knows about moderation; the ledger and registry
//! built on these types live in `antiping-moderation`.

#![forbid(unsafe_code)]

/// Collection error types
pub mod errors;

/// Binary min-heap over a bounded ring
pub mod heap;

/// Fixed-capacity circular buffer
pub mod ring;

/// Timestamps and clock providers
pub mod time;

pub use errors::{CollectionError, Result as CollectionResult};
pub use heap::EvictingPriorityQueue;
pub use ring::BoundedRing;
pub use time::{ManualClock, PhysicalClock, SystemClock, Timestamp};
