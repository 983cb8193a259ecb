//! Fixed-capacity ownership tracking for batch scenarios.
//!
//! Two-phase protocol: fill the arena (slot index = trial number), then
//! either hand every record back to the allocator with
//! [`HandleArena::release_all`] or drain records one by one into timed
//! releases.

use crate::allocator::{Allocator, Handle};
use crate::error::BenchError;

/// One outstanding allocation.
#[derive(Debug)]
pub struct AllocationRecord {
    pub handle: Handle,
    pub requested_size: usize,
}

/// Arena of at most `capacity` records, never reallocating.
#[derive(Debug)]
pub struct HandleArena {
    records: Vec<AllocationRecord>,
    capacity: usize,
}

impl HandleArena {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Stores `record` in the next trial slot.
    pub fn try_push(&mut self, record: AllocationRecord) -> Result<usize, BenchError> {
        if self.records.len() == self.capacity {
            return Err(BenchError::ArenaFull {
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        Ok(self.records.len() - 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Releases every record in trial order. Returns how many were released.
    pub fn release_all<A: Allocator + ?Sized>(&mut self, allocator: &mut A) -> usize {
        let released = self.records.len();
        for record in self.records.drain(..) {
            allocator.release(record.handle);
        }
        released
    }

    /// Takes records out in trial order, leaving the arena empty.
    pub fn drain(&mut self) -> impl Iterator<Item = AllocationRecord> + '_ {
        self.records.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SegregatedHeap;

    fn fill(arena: &mut HandleArena, heap: &mut SegregatedHeap, n: usize) {
        for i in 0..n {
            let size = 16 * (i + 1);
            let handle = heap.allocate(size).unwrap();
            arena
                .try_push(AllocationRecord {
                    handle,
                    requested_size: size,
                })
                .unwrap();
        }
    }

    #[test]
    fn release_all_empties_the_arena() {
        let mut heap = SegregatedHeap::new(1 << 20);
        let mut arena = HandleArena::with_capacity(4);
        fill(&mut arena, &mut heap, 3);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.release_all(&mut heap), 3);
        assert_eq!(arena.release_all(&mut heap), 0);
        assert!(arena.is_empty());
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn push_past_capacity_is_refused() {
        let mut heap = SegregatedHeap::new(1 << 20);
        let mut arena = HandleArena::with_capacity(2);
        fill(&mut arena, &mut heap, 2);
        let extra = heap.allocate(8).unwrap();
        let err = arena
            .try_push(AllocationRecord {
                handle: extra,
                requested_size: 8,
            })
            .unwrap_err();
        assert!(matches!(err, BenchError::ArenaFull { capacity: 2 }));
        assert_eq!(arena.capacity(), 2);
        arena.release_all(&mut heap);
        assert_eq!(heap.stats().used_blocks, 1);
    }

    #[test]
    fn drain_yields_trial_order() {
        let mut heap = SegregatedHeap::new(1 << 20);
        let mut arena = HandleArena::with_capacity(3);
        fill(&mut arena, &mut heap, 3);
        let sizes: Vec<usize> = arena
            .drain()
            .map(|record| {
                let size = record.requested_size;
                heap.release(record.handle);
                size
            })
            .collect();
        assert_eq!(sizes, vec![16, 32, 48]);
        assert!(heap.is_single_free_span());
    }
}
