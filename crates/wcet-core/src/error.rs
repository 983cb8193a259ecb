//! Measurement error taxonomy.

use thiserror::Error;

use crate::workload::Scenario;

#[derive(Debug, Error)]
pub enum BenchError {
    /// A region needed before the timed call could not be obtained. Every
    /// region already acquired by the scenario has been released.
    #[error("{scenario}: setup allocation #{trial} of {size} bytes failed")]
    SetupAllocation {
        scenario: Scenario,
        trial: usize,
        size: usize,
    },
    /// The timed allocation itself returned no handle. The benchmark
    /// preconditions do not hold; there is no meaningful measurement.
    #[error("{scenario}: measured allocation of {size} bytes returned no handle")]
    MeasuredAllocation { scenario: Scenario, size: usize },
    #[error("cache flush could not reserve {bytes} bytes")]
    FlushReservation { bytes: usize },
    #[error("handle arena is full ({capacity} records)")]
    ArenaFull { capacity: usize },
}

impl BenchError {
    /// Whether the run must stop rather than continue with the next
    /// scenario.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MeasuredAllocation { .. })
    }
}
