//! Worst-case execution time measurement for dynamic memory allocators.
//!
//! Builds synthetic workloads that drive an allocator down its documented
//! worst-case paths (small allocation carved from a single large free
//! block; release that coalesces with both neighbors), brackets exactly one
//! allocator call per sample with clock reads, and touches a cache-sized
//! region between scenarios so every measurement starts from a comparable
//! cache state.
//!
//! - [`allocator`]: the `allocate`/`release` capability and implementations
//! - [`clock`]: tick sources
//! - [`timing`]: the measurement bracket and mean reduction
//! - [`cache`]: best-effort cache eviction between scenarios
//! - [`workload`]: scenario construction

pub mod allocator;
pub mod arena;
pub mod cache;
pub mod clock;
pub mod error;
pub mod report;
pub mod sizes;
pub mod timing;
pub mod workload;

pub use allocator::{Allocator, GlobalHeap, Handle, InspectNeighbors, Neighbors, SegregatedHeap};
#[cfg(unix)]
pub use allocator::LibcMalloc;
pub use arena::{AllocationRecord, HandleArena};
pub use cache::{CacheFlusher, FlushReport, TouchFlusher};
#[cfg(unix)]
pub use clock::CpuClock;
pub use clock::{Clock, MonotonicClock, Tick, TickUnit};
pub use error::BenchError;
pub use report::ResultRecord;
pub use sizes::SizeSampler;
pub use timing::{MeanAccumulator, Sample, measure};
pub use workload::{Measurement, Scenario};
