//! The core module
pub mod estimators;

use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};

/// Trait which every integrand must implement.
///
/// The integrand must be a pure function of the sampled point: workers call
/// it concurrently from several threads and no mutable state is passed in.
/// The number of dimensions is determined by the bounds the estimator was
/// constructed with, so unlike the point-generating side there is nothing
/// else to implement.
pub trait Integrand<T>: Send + Sync {
    /// Evaluates the integrand at the point `x` in the caller's domain.
    fn call(&self, x: &[T]) -> T;
}

impl<T, F> Integrand<T> for F
where
    F: Fn(&[T]) -> T + Send + Sync,
{
    fn call(&self, x: &[T]) -> T {
        self(x)
    }
}

/// Replaces a zero seed by one drawn from the operating system.
///
/// A zero seed means "pick for me", once per run, so repeated runs of the
/// same estimator explore different sample streams.
pub(crate) fn resolve_seed(seed: u64) -> u64 {
    if seed == 0 {
        OsRng.next_u64()
    } else {
        seed
    }
}

/// Derives one seed per worker from a single master generator.
///
/// Seeding every worker from one master stream (rather than from separate
/// entropy draws) keeps a run reproducible under a fixed non-zero master
/// seed and a fixed worker count.
pub(crate) fn worker_seeds<R>(master_seed: u64, workers: usize) -> Vec<u64>
where
    R: Rng + SeedableRng,
{
    let mut master = R::seed_from_u64(master_seed);
    (0..workers).map(|_| master.gen()).collect()
}
