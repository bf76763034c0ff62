//! Naive Monte Carlo integrator with live statistics.
//!
//! [`NaiveMonteCarlo`] estimates an integral by uniform, unstratified
//! sampling on several worker threads. The estimator stays fully observable
//! while it runs: the current estimate, its standard error, the progress
//! towards the error goal and the expected remaining time can all be read
//! concurrently, the error goal can be tightened or loosened mid-run, and
//! the run can be cancelled without losing the samples collected so far.

use crate::bounds::SampleSpace;
use crate::callbacks::{Callback, SinkCallback};
use crate::core::estimators::{Updateable, WorkerEstimators};
use crate::core::{resolve_seed, worker_seeds, Integrand};
use crate::error::IntegrationError;
use crate::real::Real;
use crate::state::SharedState;

use rand::distributions::{Distribution, Standard};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crossbeam as cb;

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Number of integrand evaluations a worker performs between publishes.
///
/// Publishing after every call would contend on the shared cache lines;
/// publishing too rarely would both delay convergence detection and risk
/// premature termination from a spuriously small variance estimate. With
/// 2048 calls per batch the relative resolution of the standard error is
/// about $1/\sqrt{2048} \approx 2\%$ per publish.
const CALLS_PER_BATCH: usize = 2048;

/// How long the supervisor sleeps between aggregation polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Construction-time options of the estimator.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Perturb the endpoints of finite axes one representable step inward,
    /// so integrands with integrable boundary singularities are never
    /// evaluated on the boundary itself. Defaults to `true`.
    pub singular: bool,
    /// Number of worker threads. Zero is coerced to one; the default is the
    /// available hardware parallelism.
    pub threads: usize,
    /// Master seed of the sample streams. Zero (the default) draws a fresh
    /// seed from the operating system on every run; any other value makes
    /// runs reproducible for a fixed thread count.
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            singular: true,
            threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            seed: 0,
        }
    }
}

/// A handle to a running integration.
///
/// Returned by [`NaiveMonteCarlo::integrate`]; the run proceeds in the
/// background until it converges, is cancelled, or fails.
pub struct RunHandle<T: Real> {
    handle: thread::JoinHandle<Result<T, IntegrationError<T>>>,
}

impl<T: Real> RunHandle<T> {
    /// Waits for the run to finish and returns the final estimate, or the
    /// failure captured from a worker.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NonFiniteValue`] if the integrand
    /// produced a non-finite value, or
    /// [`IntegrationError::IntegrandPanic`] if it panicked.
    ///
    /// # Panics
    ///
    /// Panics if the supervisor thread itself panicked, which indicates a
    /// bug rather than a failing integrand.
    pub fn join(self) -> Result<T, IntegrationError<T>> {
        self.handle.join().expect("supervisor thread panicked")
    }

    /// Returns `true` once the run has terminated and `join` will not
    /// block.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Everything shared between the estimator handle, the supervisor, and the
/// workers of a run.
struct Inner<T: Real, F> {
    integrand: F,
    space: SampleSpace<T>,
    state: SharedState<T>,
    seed: AtomicU64,
}

/// A naive Monte Carlo estimator of a definite integral over a
/// multi-dimensional box.
///
/// The box may be finite, semi-infinite, or doubly-infinite on every axis
/// independently; infinite axes are compactified by rational
/// transformations so that uniform sampling of the unit hypercube covers
/// them (see [`SampleSpace`]).
///
/// Construction validates the bounds and performs one priming evaluation
/// per prospective worker, so all statistics accessors are meaningful
/// before the first run. One run at a time: statistics accessors,
/// [`cancel`](Self::cancel) and
/// [`update_target_error`](Self::update_target_error) may be called
/// concurrently with a run, but a second `integrate` must wait for the
/// previous handle to resolve.
pub struct NaiveMonteCarlo<T: Real, F, R = Pcg64> {
    inner: Arc<Inner<T, F>>,
    threads: usize,
    _rng: PhantomData<R>,
}

impl<T, F, R> NaiveMonteCarlo<T, F, R>
where
    T: Real,
    F: Integrand<T>,
    R: Rng + SeedableRng,
    Standard: Distribution<T>,
{
    /// Creates an estimator with default [`Options`].
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::InvalidBounds`] if any axis has
    /// `hi <= lo`.
    pub fn new(
        integrand: F,
        bounds: &[(T, T)],
        error_goal: T,
    ) -> Result<Self, IntegrationError<T>> {
        Self::with_options(integrand, bounds, error_goal, Options::default())
    }

    /// Creates an estimator with explicit [`Options`].
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::InvalidBounds`] if any axis has
    /// `hi <= lo`.
    pub fn with_options(
        integrand: F,
        bounds: &[(T, T)],
        error_goal: T,
        options: Options,
    ) -> Result<Self, IntegrationError<T>> {
        let space = SampleSpace::new(bounds, options.singular)?;
        let threads = options.threads.max(1);

        // one priming evaluation per prospective worker, so statistics can
        // be queried before the first run and a run can resume accumulation
        let mut rng = R::seed_from_u64(resolve_seed(options.seed));
        let mut x = vec![T::zero(); space.dim()];
        let mut primed = Vec::with_capacity(threads);
        let mut failure = None;

        for _ in 0..threads {
            x.iter_mut().for_each(|u| *u = rng.gen());
            let coeff = space.map_in_place(&mut x);
            let value = coeff * integrand.call(&x);
            if value.is_finite() {
                primed.push(value);
            } else {
                if failure.is_none() {
                    failure = Some(IntegrationError::NonFiniteValue {
                        point: x.clone(),
                        value,
                    });
                }
                primed.push(T::zero());
            }
        }

        let state = SharedState::new(&primed, error_goal);
        if let Some(error) = failure {
            state.fail(error);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                integrand,
                space,
                state,
                seed: AtomicU64::new(options.seed),
            }),
            threads,
            _rng: PhantomData,
        })
    }
}

impl<T, F, R> NaiveMonteCarlo<T, F, R>
where
    T: Real,
    F: Integrand<T> + 'static,
    R: Rng + SeedableRng + 'static,
    Standard: Distribution<T>,
{
    /// Starts a run without any observer.
    ///
    /// The run converges once the standard error of the estimate drops to
    /// the error goal. The returned handle resolves with the final
    /// estimate after all workers have joined.
    pub fn integrate(&self) -> RunHandle<T> {
        self.integrate_with(SinkCallback {})
    }

    /// Starts a run, handing the published statistics of every supervisor
    /// poll to `callback`.
    pub fn integrate_with<C>(&self, callback: C) -> RunHandle<T>
    where
        C: Callback<T> + Send + 'static,
    {
        // clear a previous cancellation so the run can start
        self.inner.state.reset_done();

        let inner = Arc::clone(&self.inner);
        let threads = self.threads;
        let handle = thread::spawn(move || supervise::<T, F, R, C>(&inner, threads, &callback));

        RunHandle { handle }
    }
}

impl<T: Real, F, R> NaiveMonteCarlo<T, F, R> {
    /// Returns the number of worker threads a run uses.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Returns the last published combined estimate of the integral.
    pub fn current_estimate(&self) -> T {
        self.inner.state.current_estimate()
    }

    /// Returns the last published combined variance.
    ///
    /// Before the first batch lands this is the largest finite value, so a
    /// freshly primed estimator never looks converged.
    pub fn variance(&self) -> T {
        self.inner.state.variance()
    }

    /// Returns the standard error of the estimate, $\sqrt{V/N}$.
    pub fn current_error_estimate(&self) -> T {
        self.inner.state.current_error_estimate()
    }

    /// Returns the total number of integrand evaluations so far, summed
    /// over all workers and runs.
    pub fn calls(&self) -> usize {
        self.inner.state.calls()
    }

    /// Returns the fraction of the error goal reached so far, in $[0, 1]$.
    ///
    /// Standard error shrinks as $1/\sqrt{N}$, so this is the ratio of the
    /// calls made to the calls needed, saturated at one.
    pub fn progress(&self) -> T {
        self.inner.state.progress()
    }

    /// Estimates the remaining wall-clock time until the error goal is met,
    /// assuming the evaluation rate stays as it was so far.
    pub fn estimated_time_to_completion(&self) -> Duration {
        self.inner.state.estimated_time_to_completion()
    }

    /// Replaces the error goal.
    ///
    /// A looser goal can terminate a running integration at its next
    /// supervisor poll; a tighter goal extends it.
    pub fn update_target_error(&self, new_goal: T) {
        self.inner.state.set_error_goal(new_goal);
    }

    /// Requests cooperative termination of a running integration.
    ///
    /// Workers stop at their next batch boundary and the run handle then
    /// resolves with the estimate accumulated so far. The stored seed is
    /// squared so that a subsequent run does not replay the identical
    /// sample stream; a zero seed stays zero and keeps drawing fresh
    /// entropy per run.
    pub fn cancel(&self) {
        let seed = self.inner.seed.load(Ordering::SeqCst);
        self.inner.seed.store(seed.wrapping_mul(seed), Ordering::SeqCst);
        self.inner.state.set_done();
    }
}

/// The supervisor of one run: seeds and spawns the workers, polls and
/// publishes the aggregate, decides termination, and joins everyone.
fn supervise<T, F, R, C>(
    inner: &Inner<T, F>,
    threads: usize,
    callback: &C,
) -> Result<T, IntegrationError<T>>
where
    T: Real,
    F: Integrand<T>,
    R: Rng + SeedableRng,
    C: Callback<T>,
    Standard: Distribution<T>,
{
    let state = &inner.state;
    state.restart_clock();

    // a failure captured by a previous run or by the priming phase is
    // re-raised instead of sampling a broken integrand again
    if let Some(error) = state.failure() {
        state.set_done();
        return Err(error);
    }

    let master_seed = resolve_seed(inner.seed.load(Ordering::SeqCst));
    let seeds = worker_seeds::<R>(master_seed, threads);

    cb::thread::scope(|s| {
        let mut handles = Vec::with_capacity(threads);

        for (index, seed) in seeds.into_iter().enumerate() {
            handles.push(s.spawn(move |_| run_worker::<T, F, R>(inner, index, seed)));
        }

        loop {
            thread::sleep(POLL_INTERVAL);
            state.aggregate();
            callback.poll(&state.snapshot());

            // cancellation or a worker failure
            if state.is_done() {
                break;
            }
            if state.current_error_estimate() <= state.error_goal() {
                break;
            }
        }

        // goal met: signal the workers
        state.set_done();

        for handle in handles {
            handle.join().unwrap();
        }
    })
    .unwrap();

    if let Some(error) = state.failure() {
        return Err(error);
    }

    // incorporate the final batches into a consistent aggregate
    Ok(state.aggregate())
}

/// The sampling loop of one worker.
///
/// Resumes accumulation from the worker's publication slot, evaluates the
/// integrand in batches of [`CALLS_PER_BATCH`], and publishes after every
/// batch until the done flag flips. A non-finite value or a panic of the
/// integrand is recorded in the shared failure slot and stops the run; the
/// partial batch it came from is never published.
fn run_worker<T, F, R>(inner: &Inner<T, F>, index: usize, seed: u64)
where
    T: Real,
    F: Integrand<T>,
    R: Rng + SeedableRng,
    Standard: Distribution<T>,
{
    let state = &inner.state;
    let mut rng = R::seed_from_u64(seed);
    let mut x = vec![T::zero(); inner.space.dim()];

    let (calls, mean, sum_sq_dev) = state.worker(index).load();
    let mut estimators = WorkerEstimators::resume(calls, mean, sum_sq_dev);

    while !state.is_done() {
        let batch = panic::catch_unwind(AssertUnwindSafe(|| {
            for _ in 0..CALLS_PER_BATCH {
                x.iter_mut().for_each(|u| *u = rng.gen());
                let coeff = inner.space.map_in_place(&mut x);
                let value = coeff * inner.integrand.call(&x);

                if !value.is_finite() {
                    // x holds the transformed point, so the error reports
                    // the coordinates the integrand actually saw
                    return Err(IntegrationError::NonFiniteValue {
                        point: x.clone(),
                        value,
                    });
                }

                estimators.update(value);
            }
            Ok(())
        }));

        match batch {
            Ok(Ok(())) => state.worker(index).publish(&estimators),
            Ok(Err(error)) => {
                state.fail(error);
                return;
            }
            Err(payload) => {
                state.fail(IntegrationError::IntegrandPanic(panic_message(&payload)));
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_integrand(_: &[f64]) -> f64 {
        1.0
    }

    #[test]
    fn priming_fills_one_call_per_worker() {
        let mc: NaiveMonteCarlo<f64, _> = NaiveMonteCarlo::with_options(
            unit_integrand,
            &[(0.0, 1.0), (0.0, 1.0)],
            1e-3,
            Options {
                singular: false,
                threads: 3,
                seed: 9,
            },
        )
        .unwrap();

        assert_eq!(mc.threads(), 3);
        assert_eq!(mc.calls(), 3);
        assert_eq!(mc.current_estimate(), 1.0);
        assert_eq!(mc.variance(), f64::MAX);
        assert!(mc.progress() < 1e-6);
    }

    #[test]
    fn priming_is_deterministic_under_a_fixed_seed() {
        let options = Options {
            singular: true,
            threads: 4,
            seed: 0xcafef00d,
        };
        let integrand = |x: &[f64]| (x[0] * x[1]).sqrt().recip();
        let first: NaiveMonteCarlo<f64, _> =
            NaiveMonteCarlo::with_options(integrand, &[(0.0, 1.0), (0.0, 1.0)], 1e-3, options)
                .unwrap();
        let second: NaiveMonteCarlo<f64, _> =
            NaiveMonteCarlo::with_options(integrand, &[(0.0, 1.0), (0.0, 1.0)], 1e-3, options)
                .unwrap();

        assert_eq!(first.current_estimate(), second.current_estimate());
    }

    #[test]
    fn zero_threads_are_coerced_to_one() {
        let mc: NaiveMonteCarlo<f64, _> = NaiveMonteCarlo::with_options(
            unit_integrand,
            &[(0.0, 1.0)],
            1e-3,
            Options {
                singular: false,
                threads: 0,
                seed: 1,
            },
        )
        .unwrap();

        assert_eq!(mc.threads(), 1);
        assert_eq!(mc.calls(), 1);
    }

    #[test]
    fn cancel_squares_a_non_zero_seed_and_preserves_zero() {
        let mc: NaiveMonteCarlo<f64, _> = NaiveMonteCarlo::with_options(
            unit_integrand,
            &[(0.0, 1.0)],
            1e-3,
            Options {
                singular: false,
                threads: 1,
                seed: 3,
            },
        )
        .unwrap();
        mc.cancel();
        assert_eq!(mc.inner.seed.load(Ordering::SeqCst), 9);
        mc.cancel();
        assert_eq!(mc.inner.seed.load(Ordering::SeqCst), 81);

        let mc: NaiveMonteCarlo<f64, _> = NaiveMonteCarlo::with_options(
            unit_integrand,
            &[(0.0, 1.0)],
            1e-3,
            Options {
                singular: false,
                threads: 1,
                seed: 0,
            },
        )
        .unwrap();
        mc.cancel();
        assert_eq!(mc.inner.seed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let result: Result<NaiveMonteCarlo<f64, _>, _> =
            NaiveMonteCarlo::new(unit_integrand, &[(0.0, 1.0), (2.0, 2.0)], 1e-3);

        assert_eq!(
            result.err(),
            Some(IntegrationError::InvalidBounds {
                axis: 1,
                lo: 2.0,
                hi: 2.0,
            })
        );
    }
}
