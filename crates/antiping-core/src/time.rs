//! Millisecond timestamps and clock providers.
//!
//! Expiry decisions take the current time from a `PhysicalClock` rather than
//! reading the system clock directly. Production code uses `SystemClock`;
//! tests use `ManualClock` and advance it explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock instant in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl Timestamp {
    /// Create a timestamp from milliseconds since the epoch.
    pub const fn from_millis(ts_ms: u64) -> Self {
        Self { ts_ms }
    }

    /// Timestamp `duration` later, saturating at `u64::MAX`.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let delta = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self {
            ts_ms: self.ts_ms.saturating_add(delta),
        }
    }
}

impl std::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.ts_ms)
    }
}

/// Source of the current wall-clock time.
pub trait PhysicalClock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

impl<T: PhysicalClock + ?Sized> PhysicalClock for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PhysicalClock for SystemClock {
    fn now(&self) -> Timestamp {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timestamp::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Manually driven clock; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ts_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            ts_ms: Arc::new(AtomicU64::new(start.ts_ms)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.ts_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |ts| {
                Some(ts.saturating_add(delta))
            })
            .ok();
    }

    /// Move the clock forward to `to`; earlier times leave it unchanged.
    pub fn advance_to(&self, to: Timestamp) {
        self.ts_ms.fetch_max(to.ts_ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Timestamp) {
        self.ts_ms.store(to.ts_ms, Ordering::SeqCst);
    }
}

impl PhysicalClock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.ts_ms.load(Ordering::SeqCst))
    }
}
