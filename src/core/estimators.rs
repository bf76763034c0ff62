//! This module contains everything related to estimators.
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};

/// Basic estimators, like the mean, variance, and the standard deviation.
pub trait BasicEstimators<T: Float> {
    /// Returns the mean value.
    fn mean(&self) -> T;

    /// Returns the variance, $V$.
    fn var(&self) -> T;

    /// Returns the standard deviation, $\sigma = \sqrt{V}$.
    fn std(&self) -> T {
        self.var().sqrt()
    }
}

/// Everything that needs to be updated.
pub(crate) trait Updateable<T> {
    /// Update this estimator with `value`.
    fn update(&mut self, value: T);
}

/// More estimators.
pub trait Estimators<T: Float>: BasicEstimators<T> {
    /// Returns the number of times, $N$, the integrand has been called.
    fn calls(&self) -> usize;
}

/// A struct implementing the `BasicEstimators<T>` trait.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct MeanVar<T> {
    mean: T,
    var: T,
}

impl<T> MeanVar<T> {
    /// Constructor.
    pub const fn new(mean: T, var: T) -> Self {
        Self { mean, var }
    }
}

impl<T: Float> BasicEstimators<T> for MeanVar<T> {
    fn mean(&self) -> T {
        self.mean
    }

    fn var(&self) -> T {
        self.var
    }
}

/// The running statistics one worker keeps between publishes.
///
/// The mean is updated with Kahan compensation on top of Welford's
/// recurrence. Plain Welford accumulation drifts like $\epsilon N$ from
/// accumulated round-off, which eventually dominates the $\sigma/\sqrt{N}$
/// statistical error; the compensation bounds the drift to $\epsilon^2 N$,
/// so the usable run length is effectively unlimited on IEEE-754 doubles.
/// The compensator is private working state and is never published.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct WorkerEstimators<T> {
    calls: usize,
    mean: T,
    sum_sq_dev: T,
    compensator: T,
}

impl<T: Float> WorkerEstimators<T> {
    /// Continues accumulation from previously published state.
    ///
    /// The compensator always restarts at zero; it only corrects the
    /// updates performed by this instance.
    pub(crate) fn resume(calls: usize, mean: T, sum_sq_dev: T) -> Self {
        Self {
            calls,
            mean,
            sum_sq_dev,
            compensator: T::zero(),
        }
    }

    /// Returns Welford's sum of squared deviations,
    /// $S = \sum_i (f_i - \bar f_i)(f_i - \bar f_{i-1})$.
    pub(crate) fn sum_sq_dev(&self) -> T {
        self.sum_sq_dev
    }
}

impl<T: Float + FromPrimitive> Updateable<T> for WorkerEstimators<T> {
    fn update(&mut self, value: T) {
        self.calls += 1;

        let k = T::from_usize(self.calls).unwrap();
        let term = (value - self.mean) / k;
        let y = term - self.compensator;
        let mean = self.mean + y;
        self.compensator = (mean - self.mean) - y;
        self.sum_sq_dev = self.sum_sq_dev + (value - self.mean) * (value - mean);
        self.mean = mean;
    }
}

impl<T: Float + FromPrimitive> BasicEstimators<T> for WorkerEstimators<T> {
    fn mean(&self) -> T {
        self.mean
    }

    fn var(&self) -> T {
        if self.calls < 2 {
            T::zero()
        } else {
            self.sum_sq_dev / T::from_usize(self.calls - 1).unwrap()
        }
    }
}

impl<T: Float + FromPrimitive> Estimators<T> for WorkerEstimators<T> {
    fn calls(&self) -> usize {
        self.calls
    }
}
