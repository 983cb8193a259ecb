//! Tick sources for the measurement bracket.
//!
//! Elapsed values are reported as raw tick deltas; converting to seconds
//! is left to whoever reads the results, using [`TickUnit`].

use std::fmt;
use std::time::Instant;

/// One clock reading.
pub type Tick = u64;

/// What one tick of a [`Clock`] means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickUnit {
    /// Nanoseconds of CPU time consumed by this process.
    CpuNanoseconds,
    /// Nanoseconds of monotonic wall time.
    Nanoseconds,
}

impl fmt::Display for TickUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuNanoseconds => f.write_str("cpu_ns"),
            Self::Nanoseconds => f.write_str("ns"),
        }
    }
}

/// A monotonic tick source with consistent units for a whole run.
pub trait Clock {
    /// Current reading.
    fn now(&self) -> Tick;

    /// Unit of [`Clock::now`].
    fn unit(&self) -> TickUnit;
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    #[inline(always)]
    fn now(&self) -> Tick {
        (**self).now()
    }

    fn unit(&self) -> TickUnit {
        (**self).unit()
    }
}

/// Per-process CPU time from `CLOCK_PROCESS_CPUTIME_ID`, in nanoseconds.
///
/// Counts only time this process spent on a CPU, so preemption between the
/// two reads of a bracket does not inflate a sample.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuClock;

#[cfg(unix)]
impl Clock for CpuClock {
    #[inline(always)]
    fn now(&self) -> Tick {
        // SAFETY: all-zero is a valid `timespec`.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        // SAFETY: `ts` is a valid, writable `timespec`.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
        if rc != 0 {
            return 0;
        }
        (ts.tv_sec.max(0) as Tick)
            .saturating_mul(1_000_000_000)
            .saturating_add(ts.tv_nsec.max(0) as Tick)
    }

    fn unit(&self) -> TickUnit {
        TickUnit::CpuNanoseconds
    }
}

/// Monotonic wall time in nanoseconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&self) -> Tick {
        self.origin.elapsed().as_nanos() as Tick
    }

    fn unit(&self) -> TickUnit {
        TickUnit::Nanoseconds
    }
}
