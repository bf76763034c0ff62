use mcnaive::integrators::naive::{NaiveMonteCarlo, Options};

use std::thread::sleep;
use std::time::Duration;

/// Integrating 1 / sqrt(u v) over the unit square, which gives 4.
///
/// The integrand diverges at the origin; in singular mode (the default) the
/// sample points stay strictly inside the open box, so the singularity is
/// integrable and never evaluated. The main thread watches the live
/// statistics while the run proceeds in the background.
fn main() {
    let mc: NaiveMonteCarlo<f64, _> = NaiveMonteCarlo::with_options(
        |x: &[f64]| 1.0 / (x[0] * x[1]).sqrt(),
        &[(0.0, 1.0), (0.0, 1.0)],
        5e-3,
        Options::default(),
    )
    .expect("the bounds are valid");

    let handle = mc.integrate();

    while !handle.is_finished() {
        println!(
            "progress {:5.1}%, estimated time to completion {:?}",
            mc.progress() * 100.0,
            mc.estimated_time_to_completion()
        );
        sleep(Duration::from_millis(250));
    }

    let result = handle.join().expect("the integrand is finite inside the box");

    println!();
    println!("result:   {result}");
    println!("expected: 4");
    println!("std err:  {}", mc.current_error_estimate());
    println!("calls:    {}", mc.calls());
}
