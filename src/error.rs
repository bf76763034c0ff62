//! Error types for construction and integration failures.

use std::fmt::{Debug, Display};
use thiserror::Error;

/// Everything that can go wrong while constructing an estimator or running
/// an integration.
///
/// Failures raised on a worker thread are captured and re-raised from
/// [`RunHandle::join`](crate::integrators::naive::RunHandle::join); the live
/// statistics accessors never fail.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum IntegrationError<T: Debug + Display> {
    /// The bounds of an axis do not describe a non-empty interval.
    #[error("the upper bound {hi} of axis {axis} is not above the lower bound {lo}")]
    InvalidBounds {
        /// Zero-based index of the offending axis.
        axis: usize,
        /// Lower bound as given by the caller.
        lo: T,
        /// Upper bound as given by the caller.
        hi: T,
    },

    /// The integrand returned a non-finite value.
    ///
    /// The coordinates are the point in the caller's domain at which the
    /// integrand was evaluated, after the transformation from the unit
    /// hypercube.
    #[error("the integrand was evaluated at {point:?} and returned {value}")]
    NonFiniteValue {
        /// The sampled point in the caller's domain.
        point: Vec<T>,
        /// The offending value.
        value: T,
    },

    /// The integrand panicked on a worker thread.
    #[error("the integrand panicked: {0}")]
    IntegrandPanic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bounds_message_names_the_axis() {
        let err = IntegrationError::InvalidBounds {
            axis: 2,
            lo: 1.0,
            hi: 0.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("axis 2"));
        assert!(msg.contains("0.5"));
        assert!(msg.contains('1'));
    }

    #[test]
    fn non_finite_message_carries_the_point() {
        let err = IntegrationError::NonFiniteValue {
            point: vec![0.25, 0.75],
            value: f64::NAN,
        };
        let msg = err.to_string();
        assert!(msg.contains("0.25"));
        assert!(msg.contains("NaN"));
    }
}
