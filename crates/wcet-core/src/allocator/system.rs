//! Process allocators: C `malloc`/`free` and the Rust global allocator.

use std::alloc::Layout;
use std::num::NonZeroUsize;

use super::{Allocator, Handle};

/// Alignment requested from the global allocator, matching what `malloc`
/// guarantees on 64-bit targets.
const GLOBAL_ALIGN: usize = 16;

/// The C library allocator linked (or preloaded) into this process.
///
/// A TLSF `malloc` installed with `LD_PRELOAD` is measured through this.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcMalloc;

#[cfg(unix)]
impl Allocator for LibcMalloc {
    fn name(&self) -> &'static str {
        "libc"
    }

    #[inline]
    fn allocate(&mut self, size: usize) -> Option<Handle> {
        let size = size.max(1);
        // SAFETY: `malloc` accepts any size and returns null on failure.
        let ptr = unsafe { libc::malloc(size) };
        NonZeroUsize::new(ptr as usize).map(|addr| Handle::from_raw_parts(addr, size))
    }

    #[inline]
    fn release(&mut self, handle: Handle) {
        // SAFETY: the handle was produced by `allocate` above and is consumed
        // here, so the pointer is live and freed exactly once.
        unsafe { libc::free(handle.addr() as *mut libc::c_void) }
    }
}

/// The Rust global allocator (`#[global_allocator]`, or the system
/// allocator when none is registered).
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalHeap;

impl GlobalHeap {
    fn layout(size: usize) -> Option<Layout> {
        Layout::from_size_align(size, GLOBAL_ALIGN).ok()
    }
}

impl Allocator for GlobalHeap {
    fn name(&self) -> &'static str {
        "global"
    }

    #[inline]
    fn allocate(&mut self, size: usize) -> Option<Handle> {
        let size = size.max(1);
        let layout = Self::layout(size)?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonZeroUsize::new(ptr as usize).map(|addr| Handle::from_raw_parts(addr, size))
    }

    #[inline]
    fn release(&mut self, handle: Handle) {
        let Some(layout) = Self::layout(handle.size()) else {
            return;
        };
        // SAFETY: the handle came from `allocate` with this same layout and
        // is consumed here.
        unsafe { std::alloc::dealloc(handle.addr() as *mut u8, layout) }
    }
}
