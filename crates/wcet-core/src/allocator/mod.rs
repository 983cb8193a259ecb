//! Allocator capability interface.
//!
//! The workload generator only ever sees [`Allocator`]: an `allocate` that
//! may fail and a `release` that consumes the ownership token. Any
//! allocator under test is plugged in behind it:
//! - [`LibcMalloc`]: the process C library `malloc`/`free` (unix)
//! - [`GlobalHeap`]: the Rust global allocator
//! - [`SegregatedHeap`]: an inspectable two-level segregated-fit model

pub mod segregated;
pub mod system;

use std::num::NonZeroUsize;

pub use segregated::{HeapLogLevel, HeapLogRecord, HeapStats, SegregatedHeap};
#[cfg(unix)]
pub use system::LibcMalloc;
pub use system::GlobalHeap;

/// Exclusive ownership token for one allocated region.
///
/// Not `Clone`: the only way to give it back is [`Allocator::release`],
/// which consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    addr: NonZeroUsize,
    size: usize,
}

impl Handle {
    /// Wraps an allocator-specific address token and the size it was
    /// requested with.
    #[must_use]
    pub fn from_raw_parts(addr: NonZeroUsize, size: usize) -> Self {
        Self { addr, size }
    }

    /// Address token. Only meaningful to the allocator that issued it.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr.get()
    }

    /// Size the region was requested with.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// The allocate/release contract measured by the workload generator.
///
/// `&mut self` on both calls: a benchmarking run has exclusive,
/// single-threaded access to the allocator under test.
pub trait Allocator {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Requests `size` bytes. `None` signals out-of-memory.
    fn allocate(&mut self, size: usize) -> Option<Handle>;

    /// Returns a region to the allocator.
    fn release(&mut self, handle: Handle);

    /// Takes the lifecycle records collected since the last drain.
    ///
    /// Allocators without a lifecycle trace have nothing to give.
    fn drain_lifecycle_logs(&mut self) -> Vec<HeapLogRecord> {
        Vec::new()
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    #[inline]
    fn allocate(&mut self, size: usize) -> Option<Handle> {
        (**self).allocate(size)
    }

    #[inline]
    fn release(&mut self, handle: Handle) {
        (**self).release(handle)
    }

    fn drain_lifecycle_logs(&mut self) -> Vec<HeapLogRecord> {
        (**self).drain_lifecycle_logs()
    }
}

/// Free space physically adjacent to a live block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbors {
    /// Bytes of the free block ending where the block starts (0 if used).
    pub left_free: usize,
    /// Bytes of the free block starting where the block ends (0 if used).
    pub right_free: usize,
}

impl Neighbors {
    /// Both sides are mergeable free blocks.
    #[must_use]
    pub const fn both_free(self) -> bool {
        self.left_free > 0 && self.right_free > 0
    }
}

/// Boundary inspection for allocators that expose their block layout.
pub trait InspectNeighbors {
    /// Free neighbors of the live block behind `handle`, or `None` if the
    /// handle is not live in this allocator.
    fn free_neighbors(&self, handle: &Handle) -> Option<Neighbors>;
}
