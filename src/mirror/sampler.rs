//! Per-request mirroring decision.

use std::sync::{Mutex, PoisonError};

use rand::{rngs::StdRng, Rng, SeedableRng};

enum RandomSource {
    /// `rand::thread_rng`, independent per runtime thread.
    ThreadLocal,
    /// Reproducible stream shared behind a lock.
    Seeded(Mutex<StdRng>),
}

/// Decides whether a request is mirrored, given a percentage in 0..=100.
pub struct TrafficSampler {
    percent: u8,
    source: RandomSource,
}

impl TrafficSampler {
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            source: RandomSource::ThreadLocal,
        }
    }

    /// A sampler drawing from a seeded generator, for reproducible runs.
    pub fn seeded(percent: u8, seed: u64) -> Self {
        Self {
            percent: percent.min(100),
            source: RandomSource::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// One uniform draw in `[0, 100)` compared against the percentage.
    /// The bounds short-circuit without touching the generator.
    pub fn should_mirror(&self) -> bool {
        match self.percent {
            100 => true,
            0 => false,
            percent => self.draw() < f64::from(percent),
        }
    }

    fn draw(&self) -> f64 {
        match &self.source {
            RandomSource::ThreadLocal => rand::thread_rng().gen_range(0.0..100.0),
            RandomSource::Seeded(rng) => rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(0.0..100.0),
        }
    }
}

impl std::fmt::Debug for TrafficSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficSampler")
            .field("percent", &self.percent)
            .finish_non_exhaustive()
    }
}
