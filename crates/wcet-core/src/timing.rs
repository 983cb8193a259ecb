//! The measurement bracket.

use crate::clock::{Clock, Tick};

/// One timing observation around exactly one allocator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub start_tick: Tick,
    pub end_tick: Tick,
}

impl Sample {
    /// `end_tick - start_tick`, saturating at zero.
    #[must_use]
    pub const fn elapsed(&self) -> Tick {
        self.end_tick.saturating_sub(self.start_tick)
    }
}

/// Reads `clock`, runs `op`, reads `clock` again.
///
/// Nothing else happens between the two reads; whatever `op` returns is
/// handed back untouched alongside the sample.
#[inline(always)]
pub fn measure<C, R, F>(clock: &C, op: F) -> (Sample, R)
where
    C: Clock + ?Sized,
    F: FnOnce() -> R,
{
    let start_tick = clock.now();
    let out = op();
    let end_tick = clock.now();
    (
        Sample {
            start_tick,
            end_tick,
        },
        out,
    )
}

/// Running sum of elapsed ticks, reduced to an arithmetic mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeanAccumulator {
    total: u128,
    count: usize,
}

impl MeanAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self { total: 0, count: 0 }
    }

    /// Folds one sample in; the sample itself is not retained.
    pub fn push(&mut self, sample: Sample) {
        self.total += u128::from(sample.elapsed());
        self.count += 1;
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Sum of elapsed ticks, saturated to `u64`.
    #[must_use]
    pub fn total(&self) -> Tick {
        Tick::try_from(self.total).unwrap_or(Tick::MAX)
    }

    /// `total / count`, or 0.0 with no samples.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total as f64 / self.count as f64
    }
}
