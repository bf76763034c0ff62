#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `mcnaive` estimates definite multi-dimensional [integrals] by
//! naive (unstratified) [Monte Carlo integration], aimed at integrands that
//! are expensive, possibly singular at the boundary, or defined on
//! semi-infinite and doubly-infinite boxes.
//!
//! # Features
//!
//! This library was designed with the following features as essential in
//! mind:
//!
//! - **Live observability**. A running integration stays fully queryable:
//! the current estimate, its standard error, the total number of calls, the
//! progress towards the error goal, and the expected remaining wall-clock
//! time are all wait-free atomic reads, safe from any thread.
//! - **Goal-driven termination**. Instead of a fixed call budget, the
//! integration runs until the standard error of the estimate drops to a
//! target. The target can be loosened or tightened while the run is in
//! flight, and the run can be cancelled without losing the samples
//! collected so far.
//! - **Infinite domains**. Each axis of the integration box may be finite,
//! semi-infinite, or doubly-infinite; infinite axes are compactified by
//! rational transformations so that uniform sampling covers them. In
//! singular mode the endpoints of finite axes are perturbed one
//! representable step inward, so integrands with integrable boundary
//! singularities such as $1/\sqrt{x}$ are never evaluated on the boundary.
//! - **Numerically stable accumulation**. Worker statistics use Welford's
//! recurrence with Kahan compensation on the mean, so the estimate does not
//! drift away from the statistical error even over billions of calls.
//! - **Generic numeric type**. The numeric type is a generic parameter
//! bounded by the [`Real`](crate::real::Real) trait, implemented for `f32`
//! and `f64`.
//! - **Generic random number generator**. Every seedable random number
//! generator implementing the `Rng` trait from the `rand` crate can drive
//! the sampling; per-worker streams are derived from one master seed, so
//! results are reproducible for a fixed seed and thread count.
//!
//! # What is ...?
//!
//! Given
//!
//! $$ I = \int_{\Omega} f(x_1, x_2, \ldots, x_d) \, \mathrm{d}^d x $$
//!
//! over a box $\Omega$, the estimator maps uniform samples of $[0,1)^d$
//! into $\Omega$ and approximates $I$ by the sample mean of the transformed
//! integrand. We use the following terms:
//!
//! - the number of *calls* is $N$, the number of times the integrand has
//! been evaluated. We assume that this is the expensive operation;
//! - the *integrand* is the function $f$ that is being integrated;
//! - the *error goal* is the target upper bound on the standard error
//! $\sqrt{V/N}$ of the estimate;
//! - a *worker* is one thread drawing samples and accumulating statistics;
//! the *supervisor* combines the worker statistics and decides when the
//! run terminates.
//!
//! [Monte Carlo integration]: https://en.wikipedia.org/wiki/Monte_Carlo_integration
//! [integrals]: https://en.wikipedia.org/wiki/Integral

pub mod bounds;
pub mod callbacks;
pub mod core;
pub mod error;
pub mod integrators;
pub mod real;
pub mod state;

pub use crate::core::*;
