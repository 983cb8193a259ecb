//! Pseudo-random request sizes for average-case scenarios.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default upper bound for a sampled request, in bytes.
pub const DEFAULT_MAX_REQUEST: usize = 64 * 1024;

/// Uniform request sizes in `1..=max_request`.
#[derive(Debug, Clone)]
pub struct SizeSampler {
    rng: StdRng,
    max_request: usize,
    seed: Option<u64>,
}

impl SizeSampler {
    /// Entropy-seeded when `seed` is `None`, so workloads differ run to run.
    #[must_use]
    pub fn new(seed: Option<u64>, max_request: usize) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            max_request: max_request.max(1),
            seed,
        }
    }

    /// Seed in use, if reproducibility was requested.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    #[must_use]
    pub fn max_request(&self) -> usize {
        self.max_request
    }

    pub fn next_size(&mut self) -> usize {
        self.rng.gen_range(1..=self.max_request)
    }
}

impl Default for SizeSampler {
    fn default() -> Self {
        Self::new(None, DEFAULT_MAX_REQUEST)
    }
}
