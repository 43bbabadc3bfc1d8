//! Reproducible seeds: one master seed per job file, a stream per job.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest seed handed to the engine.
const MAX_SEED: u64 = 900_000_000;

pub struct SeedStream {
    rng: StdRng,
}

impl SeedStream {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed of calculation `index` derived from the master seed.
    pub fn job_seed(master: u64, index: usize) -> u64 {
        let mut rng = StdRng::seed_from_u64(master);
        let mut seed = 0;
        for _ in 0..=index {
            seed = rng.r#gen::<u64>();
        }
        seed
    }

    /// Next velocity or thermostat seed, in `1..MAX_SEED`.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen_range(1..MAX_SEED)
    }
}
