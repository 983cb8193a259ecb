//! Run configuration.
//!
//! Allocator and clock come from CLI flags, falling back to environment
//! variables, falling back to defaults:
//! - `WCET_ALLOCATOR`: `libc` (default), `global`, or `segregated`
//! - `WCET_CLOCK`: `cpu` (default) or `monotonic`
//!
//! Environment values are matched loosely; anything unrecognized resolves
//! to the default.

use clap::ValueEnum;

use wcet_core::sizes::DEFAULT_MAX_REQUEST;
use wcet_core::{Allocator, Clock, GlobalHeap, MonotonicClock, Scenario, SegregatedHeap};

pub const ALLOCATOR_ENV: &str = "WCET_ALLOCATOR";
pub const CLOCK_ENV: &str = "WCET_CLOCK";

/// Logical size of the segregated-fit model heap.
pub const DEFAULT_HEAP_CAPACITY: usize = 256 << 20;

/// Which allocator is under test.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum AllocatorKind {
    /// C library `malloc`/`free`.
    #[default]
    Libc,
    /// Rust global allocator.
    Global,
    /// In-process two-level segregated-fit model.
    Segregated,
}

impl AllocatorKind {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "libc" | "malloc" | "system" => Self::Libc,
            "global" | "rust" => Self::Global,
            "segregated" | "tlsf" | "model" => Self::Segregated,
            _ => Self::default(),
        }
    }

    /// Builds the allocator. `trace_heap` turns on the segregated model's
    /// lifecycle trace; the system allocators have none.
    #[must_use]
    pub fn build(self, heap_capacity: usize, trace_heap: bool) -> Box<dyn Allocator> {
        match self {
            #[cfg(unix)]
            Self::Libc => Box::new(wcet_core::LibcMalloc),
            #[cfg(not(unix))]
            Self::Libc => Box::new(GlobalHeap),
            Self::Global => Box::new(GlobalHeap),
            Self::Segregated if trace_heap => {
                Box::new(SegregatedHeap::new(heap_capacity).with_lifecycle_trace())
            }
            Self::Segregated => Box::new(SegregatedHeap::new(heap_capacity)),
        }
    }
}

/// Which tick source brackets the measured calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ClockKind {
    /// Per-process CPU time in nanoseconds.
    #[default]
    Cpu,
    /// Monotonic wall time, nanoseconds.
    Monotonic,
}

impl ClockKind {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "clock" | "process" => Self::Cpu,
            "monotonic" | "wall" | "instant" => Self::Monotonic,
            _ => Self::default(),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Monotonic => "monotonic",
        }
    }

    #[must_use]
    pub fn build(self) -> Box<dyn Clock> {
        match self {
            #[cfg(unix)]
            Self::Cpu => Box::new(wcet_core::CpuClock),
            #[cfg(not(unix))]
            Self::Cpu => Box::new(MonotonicClock::new()),
            Self::Monotonic => Box::new(MonotonicClock::new()),
        }
    }
}

/// Scenario selector: one scenario or all four in menu order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioSelection {
    #[default]
    All,
    AllocationWorst,
    AllocationAverage,
    ReleaseWorst,
    ReleaseAverage,
}

impl ScenarioSelection {
    #[must_use]
    pub fn scenarios(self) -> Vec<Scenario> {
        match self {
            Self::All => Scenario::ALL.to_vec(),
            Self::AllocationWorst => vec![Scenario::AllocationWorstCase],
            Self::AllocationAverage => vec![Scenario::AllocationAverageCase],
            Self::ReleaseWorst => vec![Scenario::ReleaseWorstCase],
            Self::ReleaseAverage => vec![Scenario::ReleaseAverageCase],
        }
    }
}

/// CLI value, else loosely parsed environment value, else default.
fn resolve<T: Default>(cli: Option<T>, env_value: Option<&str>, parse: fn(&str) -> T) -> T {
    cli.or_else(|| env_value.map(parse)).unwrap_or_default()
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Cache-size estimate in bytes, reused for every flush.
    pub cache_size: usize,
    pub allocator: AllocatorKind,
    pub clock: ClockKind,
    /// Seed for request sizes; `None` draws from entropy.
    pub seed: Option<u64>,
    pub max_request: usize,
    pub heap_capacity: usize,
    /// Forward the segregated model's lifecycle records into the log.
    pub trace_heap: bool,
}

impl RunConfig {
    #[must_use]
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache_size,
            allocator: AllocatorKind::default(),
            clock: ClockKind::default(),
            seed: None,
            max_request: DEFAULT_MAX_REQUEST,
            heap_capacity: DEFAULT_HEAP_CAPACITY,
            trace_heap: false,
        }
    }

    /// Fills allocator and clock from CLI values or the process environment.
    #[must_use]
    pub fn with_selection(
        self,
        allocator: Option<AllocatorKind>,
        clock: Option<ClockKind>,
    ) -> Self {
        let allocator_env = std::env::var(ALLOCATOR_ENV).ok();
        let clock_env = std::env::var(CLOCK_ENV).ok();
        self.with_selection_from(
            allocator,
            allocator_env.as_deref(),
            clock,
            clock_env.as_deref(),
        )
    }

    /// As [`RunConfig::with_selection`], with explicit environment values.
    #[must_use]
    pub fn with_selection_from(
        mut self,
        allocator: Option<AllocatorKind>,
        allocator_env: Option<&str>,
        clock: Option<ClockKind>,
        clock_env: Option<&str>,
    ) -> Self {
        self.allocator = resolve(allocator, allocator_env, AllocatorKind::from_str_loose);
        self.clock = resolve(clock, clock_env, ClockKind::from_str_loose);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_max_request(mut self, max_request: usize) -> Self {
        self.max_request = max_request;
        self
    }

    #[must_use]
    pub fn with_heap_capacity(mut self, heap_capacity: usize) -> Self {
        self.heap_capacity = heap_capacity;
        self
    }

    #[must_use]
    pub fn with_heap_trace(mut self, trace_heap: bool) -> Self {
        self.trace_heap = trace_heap;
        self
    }
}
