//! Binary min-heap over a `BoundedRing`.
//!
//! The ring is used purely as fixed-size backing storage. Because an append
//! to a full ring would overwrite the oldest *inserted* slot (an arbitrary
//! heap position), `push` rejects inserts once the queue is full. The ring's
//! overwrite path is therefore never taken and the heap invariant holds after
//! every public call. Callers make room with `pop_min` (or by expiring
//! entries) before retrying.

use crate::errors::{CollectionError, Result};
use crate::ring::BoundedRing;

/// Fixed-capacity min-ordered priority queue.
#[derive(Debug, Clone)]
pub struct EvictingPriorityQueue<T> {
    storage: BoundedRing<T>,
}

impl<T: Ord> EvictingPriorityQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            storage: BoundedRing::new(capacity)?,
        })
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Whether `push` will be rejected.
    pub fn is_full(&self) -> bool {
        self.storage.is_full()
    }

    /// Insert `item`, or fail with `CapacityExceeded` when full.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.storage.is_full() {
            return Err(CollectionError::capacity_exceeded(self.capacity()));
        }
        self.storage.append(item);
        self.sift_up(self.len() - 1)?;
        debug_assert!(self.is_heap());
        Ok(())
    }

    /// Remove and return the minimum.
    pub fn pop_min(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(CollectionError::underflow("pop_min"));
        }
        let last = self.storage.pop_back()?;
        if self.is_empty() {
            return Ok(last);
        }
        let min = self.storage.set(0, last)?;
        self.sift_down(0)?;
        debug_assert!(self.is_heap());
        Ok(min)
    }

    /// Borrow the minimum without removing it.
    pub fn peek_min(&self) -> Option<&T> {
        self.storage.get(0).ok()
    }

    /// Iterate in heap (storage) order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.storage.iter()
    }

    /// Check that every parent is no greater than its children.
    pub fn is_heap(&self) -> bool {
        let items: Vec<&T> = self.storage.iter().collect();
        (1..items.len()).all(|child| items[(child - 1) / 2] <= items[child])
    }

    fn at(&self, index: usize) -> Result<&T> {
        self.storage.get(to_signed(index))
    }

    fn sift_up(&mut self, mut pos: usize) -> Result<()> {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.at(pos)? >= self.at(parent)? {
                break;
            }
            self.storage.swap(to_signed(pos), to_signed(parent))?;
            pos = parent;
        }
        Ok(())
    }

    fn sift_down(&mut self, mut pos: usize) -> Result<()> {
        let len = self.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                return Ok(());
            }
            let right = left + 1;
            let smallest = if right < len && self.at(right)? < self.at(left)? {
                right
            } else {
                left
            };
            if self.at(pos)? <= self.at(smallest)? {
                return Ok(());
            }
            self.storage.swap(to_signed(pos), to_signed(smallest))?;
            pos = smallest;
        }
    }
}

// Ring capacities are allocation sizes, so they always fit in isize.
fn to_signed(index: usize) -> isize {
    isize::try_from(index).unwrap_or(isize::MAX)
}
