use mcnaive::callbacks::SimpleCallback;
use mcnaive::integrators::naive::{NaiveMonteCarlo, Options};

use std::f64::consts::PI;

/// Integrating exp(-x^2) over the whole real line, which gives sqrt(pi).
///
/// The doubly-infinite axis is compactified internally, so the integrand is
/// written exactly as it appears on paper.
fn main() {
    let mc: NaiveMonteCarlo<f64, _> = NaiveMonteCarlo::with_options(
        |x: &[f64]| (-x[0] * x[0]).exp(),
        &[(f64::NEG_INFINITY, f64::INFINITY)],
        1e-4,
        Options {
            seed: 0xcafef00d,
            ..Options::default()
        },
    )
    .expect("the bounds are valid");

    // SimpleCallback prints the running estimate on every supervisor poll
    let result = mc
        .integrate_with(SimpleCallback {})
        .join()
        .expect("the integrand is finite everywhere");

    println!();
    println!("result:   {result}");
    println!("expected: {} (sqrt of pi)", PI.sqrt());
    println!("std err:  {}", mc.current_error_estimate());
    println!("calls:    {}", mc.calls());
}
