//! Fixed-capacity circular buffer.
//!
//! `BoundedRing` stores up to `capacity` elements in a pre-sized slot array
//! and a write cursor. Logical index `0` is the oldest retained element and
//! `-1` the most recent, following slice-from-the-end conventions. Appending
//! to a full ring overwrites the chronologically oldest element; eviction
//! order is insertion order regardless of any ordering a caller layers on
//! top.

use crate::errors::{CollectionError, Result};

/// Fixed-capacity circular buffer with FIFO overwrite.
#[derive(Debug, Clone)]
pub struct BoundedRing<T> {
    slots: Vec<Option<T>>,
    /// Physical slot the next append writes to.
    next: usize,
    len: usize,
}

impl<T> BoundedRing<T> {
    /// Create an empty ring holding at most `capacity` elements.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CollectionError::ZeroCapacity);
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots,
            next: 0,
            len: 0,
        })
    }

    /// Fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of retained elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next append will overwrite the oldest element.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append `item`, returning the evicted oldest element when full.
    pub fn append(&mut self, item: T) -> Option<T> {
        let cap = self.capacity();
        let evicted = self.slots[self.next].replace(item);
        self.next = (self.next + 1) % cap;
        if self.len < cap {
            self.len += 1;
            None
        } else {
            evicted
        }
    }

    /// Remove and return the oldest element.
    pub fn pop_front(&mut self) -> Result<T> {
        let index = self
            .physical_index(0)
            .map_err(|_| CollectionError::underflow("pop_front"))?;
        let item = self.slots[index]
            .take()
            .ok_or_else(|| CollectionError::underflow("pop_front"))?;
        self.len -= 1;
        Ok(item)
    }

    /// Remove and return the most recently retained element.
    pub fn pop_back(&mut self) -> Result<T> {
        let index = self
            .physical_index(-1)
            .map_err(|_| CollectionError::underflow("pop_back"))?;
        let item = self.slots[index]
            .take()
            .ok_or_else(|| CollectionError::underflow("pop_back"))?;
        self.len -= 1;
        self.next = index;
        Ok(item)
    }

    /// Borrow the element at logical `index`.
    pub fn get(&self, index: isize) -> Result<&T> {
        let physical = self.physical_index(index)?;
        self.slots[physical]
            .as_ref()
            .ok_or_else(|| CollectionError::out_of_range(index, self.len))
    }

    /// Mutably borrow the element at logical `index`.
    pub fn get_mut(&mut self, index: isize) -> Result<&mut T> {
        let physical = self.physical_index(index)?;
        let len = self.len;
        self.slots[physical]
            .as_mut()
            .ok_or_else(|| CollectionError::out_of_range(index, len))
    }

    /// Replace the element at logical `index`, returning the previous one.
    pub fn set(&mut self, index: isize, item: T) -> Result<T> {
        let slot = self.get_mut(index)?;
        Ok(std::mem::replace(slot, item))
    }

    /// Exchange the elements at two logical indices.
    pub fn swap(&mut self, a: isize, b: isize) -> Result<()> {
        let pa = self.physical_index(a)?;
        let pb = self.physical_index(b)?;
        self.slots.swap(pa, pb);
        Ok(())
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let cap = self.capacity();
        let start = (self.next + cap - self.len) % cap;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % cap].as_ref())
    }

    fn physical_index(&self, index: isize) -> Result<usize> {
        let cap = self.capacity();
        let offset = index.unsigned_abs();
        if index >= 0 {
            if offset >= self.len {
                return Err(CollectionError::out_of_range(index, self.len));
            }
            Ok((self.next + cap - self.len + offset) % cap)
        } else {
            if offset > self.len {
                return Err(CollectionError::out_of_range(index, self.len));
            }
            Ok((self.next + cap - offset) % cap)
        }
    }
}

impl<'a, T> IntoIterator for &'a BoundedRing<T> {
    type Item = &'a T;
    type IntoIter = Box<dyn Iterator<Item = &'a T> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(cap: usize, items: &[i32]) -> BoundedRing<i32> {
        let mut ring = BoundedRing::new(cap).unwrap();
        for item in items {
            ring.append(*item);
        }
        ring
    }

    fn contents(ring: &BoundedRing<i32>) -> Vec<i32> {
        ring.iter().copied().collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            BoundedRing::<i32>::new(0).unwrap_err(),
            CollectionError::ZeroCapacity
        );
    }

    #[test]
    fn test_append_within_capacity() {
        let ring = ring_of(3, &[321, 654, 789]);
        assert_eq!(ring.len(), 3);
        assert!(ring.is_full());
        assert_eq!(contents(&ring), vec![321, 654, 789]);
    }

    #[test]
    fn test_append_past_capacity_evicts_oldest() {
        let mut ring = ring_of(3, &[321, 654, 789]);
        assert_eq!(ring.append(987), Some(321));
        assert_eq!(ring.len(), 3);
        assert_eq!(contents(&ring), vec![654, 789, 987]);

        assert_eq!(ring.append(111), Some(654));
        assert_eq!(contents(&ring), vec![789, 987, 111]);
    }

    #[test]
    fn test_negative_indexing() {
        let ring = ring_of(3, &[1, 2, 3, 4]);
        assert_eq!(*ring.get(-1).unwrap(), 4);
        assert_eq!(*ring.get(-3).unwrap(), 2);
        assert_eq!(*ring.get(0).unwrap(), 2);
        assert_eq!(
            ring.get(-4).unwrap_err(),
            CollectionError::out_of_range(-4, 3)
        );
        assert_eq!(ring.get(3).unwrap_err(), CollectionError::out_of_range(3, 3));
    }

    #[test]
    fn test_set_and_swap() {
        let mut ring = ring_of(4, &[10, 20, 30]);
        assert_eq!(ring.set(1, 25).unwrap(), 20);
        ring.swap(0, -1).unwrap();
        assert_eq!(contents(&ring), vec![30, 25, 10]);
        assert!(ring.set(3, 0).is_err());
    }

    #[test]
    fn test_pop_front_and_back() {
        let mut ring = ring_of(3, &[1, 2, 3, 4]);
        assert_eq!(ring.pop_front().unwrap(), 2);
        assert_eq!(ring.pop_back().unwrap(), 4);
        assert_eq!(contents(&ring), vec![3]);

        ring.append(5);
        ring.append(6);
        assert_eq!(contents(&ring), vec![3, 5, 6]);
        assert_eq!(ring.append(7), Some(3));
        assert_eq!(contents(&ring), vec![5, 6, 7]);
    }

    #[test]
    fn test_pop_empty_underflows() {
        let mut ring = BoundedRing::<i32>::new(2).unwrap();
        assert_eq!(
            ring.pop_front().unwrap_err(),
            CollectionError::underflow("pop_front")
        );
        assert_eq!(
            ring.pop_back().unwrap_err(),
            CollectionError::underflow("pop_back")
        );

        ring.append(1);
        ring.pop_back().unwrap();
        assert!(ring.pop_back().is_err());
        assert!(ring.is_empty());
    }
}
