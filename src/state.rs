//! Shared state of a running integration.
//!
//! One `SharedState` instance is shared between the supervisor, the worker
//! threads, and any caller polling live statistics. Workers publish into
//! their own `WorkerSlot`; only the supervisor writes the combined
//! aggregates. Every statistics read is a plain atomic load, so it is safe
//! to call from any thread at any point of a run.

use crate::core::estimators::{BasicEstimators, Estimators, MeanVar, WorkerEstimators};
use crate::error::IntegrationError;
use crate::real::{Real, RealSlot};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The publication slot of one worker.
///
/// Single writer (the owning worker), multiple readers. Readers may observe
/// a triple whose call count is newer than its statistics; that is fine
/// because the supervisor recomputes a consistent aggregate after joining.
pub(crate) struct WorkerSlot<T: Real> {
    calls: AtomicUsize,
    mean: RealSlot<T>,
    sum_sq_dev: RealSlot<T>,
}

impl<T: Real> WorkerSlot<T> {
    fn primed(value: T) -> Self {
        Self {
            calls: AtomicUsize::new(1),
            mean: RealSlot::new(value),
            sum_sq_dev: RealSlot::new(T::zero()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn load(&self) -> (usize, T, T) {
        (
            self.calls.load(Ordering::SeqCst),
            self.mean.load(),
            self.sum_sq_dev.load(),
        )
    }

    /// Publishes a batch of accumulation. The call count goes last so a
    /// reader never weights statistics by more calls than produced them.
    pub(crate) fn publish(&self, estimators: &WorkerEstimators<T>) {
        self.mean.store(estimators.mean());
        self.sum_sq_dev.store(estimators.sum_sq_dev());
        self.calls.store(estimators.calls(), Ordering::SeqCst);
    }
}

/// Aggregate state shared by the supervisor, the workers, and live readers.
pub(crate) struct SharedState<T: Real> {
    mean: RealSlot<T>,
    variance: RealSlot<T>,
    error_goal: RealSlot<T>,
    total_calls: AtomicUsize,
    done: AtomicBool,
    failure: Mutex<Option<IntegrationError<T>>>,
    start: Mutex<Instant>,
    workers: Box<[WorkerSlot<T>]>,
}

impl<T: Real> SharedState<T> {
    /// Creates the state from one priming evaluation per prospective worker.
    ///
    /// The combined mean starts at the average of the priming values and the
    /// variance at the largest finite value, so statistics are queryable
    /// before the first run without ever looking converged.
    pub(crate) fn new(primed: &[T], error_goal: T) -> Self {
        let mut sum = T::zero();
        for &value in primed {
            sum = sum + value;
        }
        let mean = sum / T::from_usize(primed.len()).unwrap();

        Self {
            mean: RealSlot::new(mean),
            variance: RealSlot::new(T::max_value()),
            error_goal: RealSlot::new(error_goal),
            total_calls: AtomicUsize::new(primed.len()),
            done: AtomicBool::new(false),
            failure: Mutex::new(None),
            start: Mutex::new(Instant::now()),
            workers: primed.iter().map(|&value| WorkerSlot::primed(value)).collect(),
        }
    }

    pub(crate) fn worker(&self, index: usize) -> &WorkerSlot<T> {
        &self.workers[index]
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    pub(crate) fn set_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset_done(&self) {
        self.done.store(false, Ordering::SeqCst);
    }

    /// Records a worker failure and stops the run. The first failure wins.
    pub(crate) fn fail(&self, error: IntegrationError<T>) {
        let mut slot = self.failure.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.set_done();
    }

    pub(crate) fn failure(&self) -> Option<IntegrationError<T>> {
        self.failure.lock().unwrap().clone()
    }

    pub(crate) fn restart_clock(&self) {
        *self.start.lock().unwrap() = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.start.lock().unwrap().elapsed()
    }

    /// Recomputes the combined statistics from the per-worker slots,
    /// publishes them, and returns the combined mean.
    ///
    /// The mean is weighted by each worker's share of the total calls; the
    /// variance is the pooled sum of squared deviations over `total - 1`,
    /// which is the sample variance of the union of the streams because all
    /// workers sample the same distribution.
    pub(crate) fn aggregate(&self) -> T {
        let mut total = 0;
        for worker in self.workers.iter() {
            total += worker.calls();
        }
        let total_real = T::from_usize(total).unwrap();

        let mut mean = T::zero();
        let mut sum_sq_dev = T::zero();
        for worker in self.workers.iter() {
            let (calls, worker_mean, worker_sum) = worker.load();
            mean = mean + worker_mean * (T::from_usize(calls).unwrap() / total_real);
            sum_sq_dev = sum_sq_dev + worker_sum;
        }

        self.mean.store(mean);
        self.variance.store(sum_sq_dev / (total_real - T::one()));
        self.total_calls.store(total, Ordering::SeqCst);

        mean
    }

    pub(crate) fn current_estimate(&self) -> T {
        self.mean.load()
    }

    pub(crate) fn variance(&self) -> T {
        self.variance.load()
    }

    pub(crate) fn calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn error_goal(&self) -> T {
        self.error_goal.load()
    }

    pub(crate) fn set_error_goal(&self, goal: T) {
        self.error_goal.store(goal);
    }

    pub(crate) fn current_error_estimate(&self) -> T {
        let calls = T::from_usize(self.calls()).unwrap();
        (self.variance.load() / calls).sqrt()
    }

    pub(crate) fn progress(&self) -> T {
        let r = self.error_goal() / self.current_error_estimate();
        if r * r >= T::one() {
            T::one()
        } else {
            r * r
        }
    }

    pub(crate) fn estimated_time_to_completion(&self) -> Duration {
        let elapsed = self.elapsed();
        let r = (self.current_error_estimate() / self.error_goal())
            .to_f64()
            .unwrap_or(f64::INFINITY);
        if r * r <= 1.0 {
            return Duration::ZERO;
        }

        let remaining = (r * r - 1.0) * elapsed.as_secs_f64();
        if remaining.is_finite() && remaining < Duration::MAX.as_secs_f64() {
            Duration::from_secs_f64(remaining)
        } else {
            Duration::MAX
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            stats: MeanVar::new(self.current_estimate(), self.variance()),
            calls: self.calls(),
            error_estimate: self.current_error_estimate(),
            progress: self.progress(),
        }
    }
}

/// The live statistics of a run at one point in time.
///
/// Handed to [`Callback`](crate::callbacks::Callback) implementations on
/// every supervisor poll.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Snapshot<T> {
    stats: MeanVar<T>,
    calls: usize,
    error_estimate: T,
    progress: T,
}

impl<T: Copy> Snapshot<T> {
    /// Returns the standard error of the estimate, $\sqrt{V/N}$.
    pub fn error_estimate(&self) -> T {
        self.error_estimate
    }

    /// Returns the fraction of the error goal reached so far, in $[0, 1]$.
    pub fn progress(&self) -> T {
        self.progress
    }
}

impl<T: Real> BasicEstimators<T> for Snapshot<T> {
    fn mean(&self) -> T {
        self.stats.mean()
    }

    fn var(&self) -> T {
        self.stats.var()
    }
}

impl<T: Real> Estimators<T> for Snapshot<T> {
    fn calls(&self) -> usize {
        self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::estimators::Updateable;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn priming_statistics() {
        let state = SharedState::new(&[1.0, 3.0], 1e-3);

        assert_eq!(state.calls(), 2);
        assert_eq!(state.current_estimate(), 2.0);
        assert_eq!(state.variance(), f64::MAX);
        assert!(!state.is_done());
        assert!(state.progress() < 1e-6);
    }

    #[test]
    fn aggregate_weights_workers_by_calls() {
        let state = SharedState::new(&[0.0, 0.0], 1e-3);

        let mut first: WorkerEstimators<f64> = WorkerEstimators::resume(1, 0.0, 0.0);
        for _ in 0..9 {
            first.update(2.0);
        }
        state.worker(0).publish(&first);

        let mut second: WorkerEstimators<f64> = WorkerEstimators::resume(1, 0.0, 0.0);
        for _ in 0..29 {
            second.update(4.0);
        }
        state.worker(1).publish(&second);

        let mean = state.aggregate();

        assert_eq!(state.calls(), 40);
        assert_approx_eq!(mean, (10.0 * first.mean() + 30.0 * second.mean()) / 40.0, 1e-12);
        assert_approx_eq!(
            state.variance(),
            (first.sum_sq_dev() + second.sum_sq_dev()) / 39.0,
            1e-12
        );
        assert_approx_eq!(
            state.current_error_estimate(),
            (state.variance() / 40.0).sqrt(),
            1e-15
        );
    }

    #[test]
    fn failure_stops_the_run_and_keeps_the_first_error() {
        let state = SharedState::new(&[0.0], 1e-3);

        state.fail(IntegrationError::IntegrandPanic("first".to_string()));
        state.fail(IntegrationError::IntegrandPanic("second".to_string()));

        assert!(state.is_done());
        assert_eq!(
            state.failure(),
            Some(IntegrationError::IntegrandPanic("first".to_string()))
        );
    }

    #[test]
    fn loose_goal_saturates_progress() {
        let state = SharedState::new(&[1.0, 1.0], 1e-3);

        let mut estimators = WorkerEstimators::resume(1, 1.0, 0.0);
        for _ in 0..999 {
            estimators.update(1.0);
        }
        state.worker(0).publish(&estimators);
        state.worker(1).publish(&estimators);
        state.aggregate();

        // zero variance: the goal is met no matter how tight
        assert_eq!(state.progress(), 1.0);
        assert_eq!(state.estimated_time_to_completion(), Duration::ZERO);
    }

    #[test]
    fn unconverged_state_reports_remaining_time() {
        let state = SharedState::new(&[0.0, 1.0], 1e-12);

        let mut estimators = WorkerEstimators::resume(1, 0.0, 0.0);
        for i in 0..999 {
            estimators.update(if i % 2 == 0 { 1.0 } else { -1.0 });
        }
        state.worker(0).publish(&estimators);
        state.worker(1).publish(&estimators);
        state.aggregate();

        assert!(state.estimated_time_to_completion() > Duration::ZERO);
    }

    #[test]
    fn snapshot_serializes() {
        let state = SharedState::new(&[1.0, 3.0], 1e-3);
        let snapshot = state.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot<f64> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.calls(), 2);
        assert_eq!(back.mean(), 2.0);
    }
}
