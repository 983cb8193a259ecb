//! Best-effort cache eviction between scenarios.
//!
//! Touching a region at least as large as the cache pushes the previous
//! scenario's working set out. No privileged cache-control instruction is
//! used and full eviction is not guaranteed. Never call this inside a
//! measurement bracket.

use std::hint::black_box;

use crate::error::BenchError;

/// Value written into every word of the flush region.
pub const FLUSH_PATTERN: u32 = 123;

/// What a flush touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub words: usize,
    pub bytes: usize,
}

pub trait CacheFlusher {
    /// Perturbs cache state using `size_hint` (the user's estimate of the
    /// cache capacity in bytes).
    fn flush(&mut self, size_hint: usize) -> Result<FlushReport, BenchError>;
}

impl<F: CacheFlusher + ?Sized> CacheFlusher for Box<F> {
    fn flush(&mut self, size_hint: usize) -> Result<FlushReport, BenchError> {
        (**self).flush(size_hint)
    }
}

/// Writes [`FLUSH_PATTERN`] into `size_hint` 32-bit words, then frees them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TouchFlusher;

impl CacheFlusher for TouchFlusher {
    fn flush(&mut self, size_hint: usize) -> Result<FlushReport, BenchError> {
        let words = size_hint;
        let bytes = words
            .checked_mul(size_of::<u32>())
            .ok_or(BenchError::FlushReservation { bytes: usize::MAX })?;

        let mut region: Vec<u32> = Vec::new();
        region
            .try_reserve_exact(words)
            .map_err(|_| BenchError::FlushReservation { bytes })?;
        region.resize(words, FLUSH_PATTERN);
        // Keep the stores alive; an unread buffer would otherwise be elided.
        black_box(region.as_mut_slice());

        Ok(FlushReport { words, bytes })
    }
}
