//! Synthetic workloads that steer an allocator onto a chosen path.
//!
//! Worst cases follow the TLSF analysis: `allocate` is most expensive when
//! a small block must be carved out of the only (large) free block, and
//! `release` is most expensive when the freed block merges with free
//! neighbors on both sides. Average cases time 1000 independent calls
//! with pseudo-random sizes.
//!
//! Every scenario times exactly the call under test and nothing else, and
//! every region a scenario acquires is released before it returns.

use std::fmt;

use crate::allocator::{Allocator, Handle};
use crate::arena::{AllocationRecord, HandleArena};
use crate::clock::{Clock, Tick};
use crate::error::BenchError;
use crate::sizes::SizeSampler;
use crate::timing::{MeanAccumulator, measure};

/// Request size for the allocation worst case.
pub const WORST_CASE_ALLOCATION_SIZE: usize = 40;
/// Size of each of the three regions in the release worst case.
pub const WORST_CASE_RELEASE_SIZE: usize = 512;
/// Samples per average-case scenario.
pub const AVERAGE_CASE_TRIALS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    AllocationWorstCase,
    AllocationAverageCase,
    ReleaseWorstCase,
    ReleaseAverageCase,
}

impl Scenario {
    /// Menu order.
    pub const ALL: [Scenario; 4] = [
        Self::AllocationWorstCase,
        Self::AllocationAverageCase,
        Self::ReleaseWorstCase,
        Self::ReleaseAverageCase,
    ];

    /// Key used in result records (`<key>_time:<ticks>;`).
    #[must_use]
    pub const fn record_key(self) -> &'static str {
        match self {
            Self::AllocationWorstCase => "allocation",
            Self::AllocationAverageCase => "average_allocation",
            Self::ReleaseWorstCase => "release",
            Self::ReleaseAverageCase => "average_release",
        }
    }

    /// CLI-facing name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AllocationWorstCase => "allocation-worst",
            Self::AllocationAverageCase => "allocation-average",
            Self::ReleaseWorstCase => "release-worst",
            Self::ReleaseAverageCase => "release-average",
        }
    }

    /// Runs this scenario against `allocator`.
    pub fn run<A, C>(
        self,
        allocator: &mut A,
        clock: &C,
        sizes: &mut SizeSampler,
    ) -> Result<Measurement, BenchError>
    where
        A: Allocator + ?Sized,
        C: Clock + ?Sized,
    {
        match self {
            Self::AllocationWorstCase => allocation_worst_case(allocator, clock),
            Self::AllocationAverageCase => allocation_average_case(allocator, clock, sizes),
            Self::ReleaseWorstCase => release_worst_case(allocator, clock),
            Self::ReleaseAverageCase => release_average_case(allocator, clock, sizes),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one scenario run, in raw clock ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub scenario: Scenario,
    /// Timed calls taken.
    pub samples: usize,
    pub total_ticks: Tick,
    /// `total_ticks / samples`.
    pub mean_ticks: f64,
    /// Timed allocations that returned no handle (average allocation only).
    pub failures: usize,
}

impl Measurement {
    fn from_accumulator(scenario: Scenario, acc: &MeanAccumulator, failures: usize) -> Self {
        Self {
            scenario,
            samples: acc.count(),
            total_ticks: acc.total(),
            mean_ticks: acc.mean(),
            failures,
        }
    }
}

/// Times one 40-byte allocation.
///
/// Precondition: the workload holds no allocations, so the allocator's free
/// space is one large span. The region is released right after timing.
pub fn allocation_worst_case<A, C>(allocator: &mut A, clock: &C) -> Result<Measurement, BenchError>
where
    A: Allocator + ?Sized,
    C: Clock + ?Sized,
{
    let (sample, handle) = measure(clock, || allocator.allocate(WORST_CASE_ALLOCATION_SIZE));
    let Some(handle) = handle else {
        return Err(BenchError::MeasuredAllocation {
            scenario: Scenario::AllocationWorstCase,
            size: WORST_CASE_ALLOCATION_SIZE,
        });
    };
    allocator.release(handle);

    let mut acc = MeanAccumulator::new();
    acc.push(sample);
    Ok(Measurement::from_accumulator(
        Scenario::AllocationWorstCase,
        &acc,
        0,
    ))
}

/// Middle region of the release worst case, flanked by two freed regions.
#[derive(Debug)]
pub struct CoalesceTarget {
    pub handle: Handle,
}

/// Allocates R1, R2, R3 (512 bytes each, back to back), then releases R1
/// and R3 in that order so R2 has a free neighbor on each side.
///
/// If any allocation fails the ones that succeeded are released before the
/// error is returned.
pub fn prepare_release_worst_case<A>(allocator: &mut A) -> Result<CoalesceTarget, BenchError>
where
    A: Allocator + ?Sized,
{
    let setup_failed = |trial| BenchError::SetupAllocation {
        scenario: Scenario::ReleaseWorstCase,
        trial,
        size: WORST_CASE_RELEASE_SIZE,
    };

    let Some(r1) = allocator.allocate(WORST_CASE_RELEASE_SIZE) else {
        return Err(setup_failed(1));
    };
    let Some(r2) = allocator.allocate(WORST_CASE_RELEASE_SIZE) else {
        allocator.release(r1);
        return Err(setup_failed(2));
    };
    let Some(r3) = allocator.allocate(WORST_CASE_RELEASE_SIZE) else {
        allocator.release(r1);
        allocator.release(r2);
        return Err(setup_failed(3));
    };

    allocator.release(r1);
    allocator.release(r3);
    Ok(CoalesceTarget { handle: r2 })
}

/// Times the release of R2 after R1 and R3 are already free.
pub fn release_worst_case<A, C>(allocator: &mut A, clock: &C) -> Result<Measurement, BenchError>
where
    A: Allocator + ?Sized,
    C: Clock + ?Sized,
{
    let target = prepare_release_worst_case(allocator)?;
    let handle = target.handle;
    let (sample, ()) = measure(clock, || allocator.release(handle));

    let mut acc = MeanAccumulator::new();
    acc.push(sample);
    Ok(Measurement::from_accumulator(
        Scenario::ReleaseWorstCase,
        &acc,
        0,
    ))
}

/// Times 1000 individually bracketed allocations of sampled sizes, then
/// releases them all in an untimed pass.
pub fn allocation_average_case<A, C>(
    allocator: &mut A,
    clock: &C,
    sizes: &mut SizeSampler,
) -> Result<Measurement, BenchError>
where
    A: Allocator + ?Sized,
    C: Clock + ?Sized,
{
    let mut arena = HandleArena::with_capacity(AVERAGE_CASE_TRIALS);
    let mut acc = MeanAccumulator::new();
    let mut failures = 0;

    for _ in 0..AVERAGE_CASE_TRIALS {
        let size = sizes.next_size();
        let (sample, handle) = measure(clock, || allocator.allocate(size));
        acc.push(sample);
        match handle {
            Some(handle) => {
                if let Err(err) = arena.try_push(AllocationRecord {
                    handle,
                    requested_size: size,
                }) {
                    arena.release_all(allocator);
                    return Err(err);
                }
            }
            None => failures += 1,
        }
    }

    arena.release_all(allocator);
    Ok(Measurement::from_accumulator(
        Scenario::AllocationAverageCase,
        &acc,
        failures,
    ))
}

/// Allocates 1000 regions of sampled sizes untimed, then times each
/// release individually.
///
/// A failed setup allocation releases everything acquired so far and skips
/// the timed pass.
pub fn release_average_case<A, C>(
    allocator: &mut A,
    clock: &C,
    sizes: &mut SizeSampler,
) -> Result<Measurement, BenchError>
where
    A: Allocator + ?Sized,
    C: Clock + ?Sized,
{
    let mut arena = HandleArena::with_capacity(AVERAGE_CASE_TRIALS);

    for trial in 0..AVERAGE_CASE_TRIALS {
        let size = sizes.next_size();
        let Some(handle) = allocator.allocate(size) else {
            arena.release_all(allocator);
            return Err(BenchError::SetupAllocation {
                scenario: Scenario::ReleaseAverageCase,
                trial,
                size,
            });
        };
        if let Err(err) = arena.try_push(AllocationRecord {
            handle,
            requested_size: size,
        }) {
            arena.release_all(allocator);
            return Err(err);
        }
    }

    let mut acc = MeanAccumulator::new();
    for record in arena.drain() {
        let handle = record.handle;
        let (sample, ()) = measure(clock, || allocator.release(handle));
        acc.push(sample);
    }

    Ok(Measurement::from_accumulator(
        Scenario::ReleaseAverageCase,
        &acc,
        0,
    ))
}
