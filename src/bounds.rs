//! The integration domain and its mapping from the unit hypercube.
//!
//! Samples are always drawn uniformly from $[0,1)^d$. [`SampleSpace`]
//! classifies each axis of the caller's box at construction time and later
//! transforms every sampled point into the box, accumulating the Jacobian of
//! the change of variables along the way. Finite axes are an affine
//! rescaling whose constant factor is folded into a precomputed volume;
//! semi-infinite and doubly-infinite axes use rational transformations that
//! compactify the axis, so their Jacobian depends on the sampled point and
//! is contributed per call.

use crate::error::IntegrationError;
use crate::real::Real;
use serde::{Deserialize, Serialize};

/// The classification of one axis of the integration domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AxisKind {
    /// Both bounds finite.
    Finite,
    /// Finite lower bound, upper bound $+\infty$.
    UpperInfinite,
    /// Lower bound $-\infty$, finite upper bound.
    LowerInfinite,
    /// Both bounds infinite.
    DoubleInfinite,
}

/// Per-axis transform parameters.
///
/// `LowerInfinite` stores the finite *upper* bound as its origin; the
/// transform reflects the semi-infinite ray around it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
enum Axis<T> {
    Finite { origin: T, width: T },
    UpperInfinite { origin: T },
    LowerInfinite { origin: T },
    DoubleInfinite,
}

impl<T> Axis<T> {
    fn kind(&self) -> AxisKind {
        match self {
            Self::Finite { .. } => AxisKind::Finite,
            Self::UpperInfinite { .. } => AxisKind::UpperInfinite,
            Self::LowerInfinite { .. } => AxisKind::LowerInfinite,
            Self::DoubleInfinite => AxisKind::DoubleInfinite,
        }
    }
}

/// A validated integration domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleSpace<T> {
    axes: Vec<Axis<T>>,
    volume: T,
}

impl<T: Real> SampleSpace<T> {
    /// Classifies and validates `bounds`.
    ///
    /// In `singular` mode the endpoints of finite axes are moved one
    /// representable step into the open interval (a zero lower bound becomes
    /// the machine epsilon), so an integrand with an integrable boundary
    /// singularity is never evaluated on the boundary itself. The lower
    /// bound of an upper-infinite axis is perturbed the same way.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::InvalidBounds`] if any axis has
    /// `hi <= lo`.
    pub fn new(bounds: &[(T, T)], singular: bool) -> Result<Self, IntegrationError<T>> {
        let mut axes = Vec::with_capacity(bounds.len());
        let mut volume = T::one();

        for (i, &(lo, hi)) in bounds.iter().enumerate() {
            if hi <= lo {
                return Err(IntegrationError::InvalidBounds { axis: i, lo, hi });
            }

            let axis = if lo == T::neg_infinity() {
                if hi == T::infinity() {
                    Axis::DoubleInfinite
                } else {
                    Axis::LowerInfinite { origin: hi }
                }
            } else if hi == T::infinity() {
                let origin = if singular { lo.next_up() } else { lo };
                Axis::UpperInfinite { origin }
            } else {
                let (origin, width) = if singular {
                    let origin = if lo == T::zero() {
                        T::epsilon()
                    } else {
                        lo.next_up()
                    };
                    (origin, hi.next_down() - origin)
                } else {
                    (lo, hi - lo)
                };
                volume = volume * width;
                Axis::Finite { origin, width }
            };

            axes.push(axis);
        }

        Ok(Self { axes, volume })
    }

    /// Returns the number of dimensions of the domain.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// Returns the product of the widths of all finite axes.
    ///
    /// Infinite axes do not contribute; their Jacobian is produced entirely
    /// by [`map_in_place`](Self::map_in_place). A domain whose axes are all
    /// infinite therefore has volume one.
    pub fn volume(&self) -> T {
        self.volume
    }

    /// Returns the classification of axis `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn kind(&self, i: usize) -> AxisKind {
        self.axes[i].kind()
    }

    /// Transforms `x` from the unit hypercube into the caller's domain and
    /// returns the accumulated coefficient (Jacobian times base volume).
    ///
    /// Each component of `x` must lie in $[0,1)$ on entry; on return it
    /// holds the corresponding coordinate of the mapped point.
    pub fn map_in_place(&self, x: &mut [T]) -> T {
        debug_assert_eq!(x.len(), self.axes.len());

        let one = T::one();
        let two = one + one;
        let four = two + two;
        let eps = T::epsilon();

        let mut coeff = self.volume;

        for (xi, axis) in x.iter_mut().zip(&self.axes) {
            let t = *xi;
            match *axis {
                Axis::Finite { origin, width } => {
                    *xi = origin + t * width;
                }
                Axis::UpperInfinite { origin } => {
                    let z = (one + eps - t).recip();
                    coeff = coeff * z * z * (one + eps);
                    *xi = origin + t * z;
                }
                Axis::LowerInfinite { origin } => {
                    let z = (t + T::min_positive_value().sqrt()).recip();
                    coeff = coeff * z * z;
                    *xi = origin + (t - one) * z;
                }
                Axis::DoubleInfinite => {
                    let t1 = (one + eps - t).recip();
                    let t2 = (t + eps).recip();
                    coeff = coeff * (t1 * t1 + t2 * t2) / four;
                    *xi = (two * t - one) * t1 * t2 / four;
                }
            }
        }

        coeff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn classifies_all_axis_kinds() {
        let space = SampleSpace::new(
            &[
                (0.0, 1.0),
                (0.0, f64::INFINITY),
                (f64::NEG_INFINITY, 2.0),
                (f64::NEG_INFINITY, f64::INFINITY),
            ],
            false,
        )
        .unwrap();

        assert_eq!(space.dim(), 4);
        assert_eq!(space.kind(0), AxisKind::Finite);
        assert_eq!(space.kind(1), AxisKind::UpperInfinite);
        assert_eq!(space.kind(2), AxisKind::LowerInfinite);
        assert_eq!(space.kind(3), AxisKind::DoubleInfinite);
    }

    #[test]
    fn rejects_empty_intervals() {
        let err = SampleSpace::new(&[(0.0, 1.0), (1.0, 1.0)], true).unwrap_err();
        assert_eq!(
            err,
            IntegrationError::InvalidBounds {
                axis: 1,
                lo: 1.0,
                hi: 1.0,
            }
        );

        assert!(SampleSpace::<f64>::new(&[(2.0, -3.0)], true).is_err());
    }

    #[test]
    fn volume_covers_finite_axes_only() {
        let space = SampleSpace::new(&[(0.0, 2.0), (1.0, 4.0)], false).unwrap();
        assert_eq!(space.volume(), 6.0);

        let space = SampleSpace::new(
            &[(f64::NEG_INFINITY, f64::INFINITY), (0.0, f64::INFINITY)],
            false,
        )
        .unwrap();
        assert_eq!(space.volume(), 1.0);
    }

    #[test]
    fn singular_mode_moves_endpoints_inward() {
        let space = SampleSpace::new(&[(0.0, 1.0)], true).unwrap();

        // t = 0 must land strictly inside the interval, t -> 1 strictly
        // below the upper bound
        let mut x = [0.0];
        space.map_in_place(&mut x);
        assert_eq!(x[0], f64::EPSILON);

        let mut x = [1.0 - f64::EPSILON];
        space.map_in_place(&mut x);
        assert!(x[0] < 1.0);
        assert!(x[0] > 0.0);
    }

    #[test]
    fn finite_map_is_affine() {
        let space = SampleSpace::new(&[(1.0, 3.0)], false).unwrap();

        let mut x = [0.5];
        let coeff = space.map_in_place(&mut x);
        assert_eq!(x[0], 2.0);
        assert_eq!(coeff, 2.0);
    }

    #[test]
    fn upper_infinite_map_starts_at_the_lower_bound() {
        let space = SampleSpace::new(&[(1.0, f64::INFINITY)], false).unwrap();

        let mut x = [0.0];
        let coeff = space.map_in_place(&mut x);
        assert_eq!(x[0], 1.0);
        assert_approx_eq!(coeff, 1.0, 1e-12);

        // larger t maps further out
        let mut far = [0.99];
        space.map_in_place(&mut far);
        assert!(far[0] > 90.0);
    }

    #[test]
    fn lower_infinite_map_stays_below_the_upper_bound() {
        let space = SampleSpace::new(&[(f64::NEG_INFINITY, 2.0)], false).unwrap();

        for &t in &[0.01, 0.5, 0.99] {
            let mut x = [t];
            let coeff = space.map_in_place(&mut x);
            assert!(x[0] < 2.0);
            assert!(coeff > 0.0);
        }
    }

    #[test]
    fn double_infinite_map_is_centred() {
        let space = SampleSpace::new(&[(f64::NEG_INFINITY, f64::INFINITY)], false).unwrap();

        let mut x = [0.5];
        let coeff = space.map_in_place(&mut x);
        assert_eq!(x[0], 0.0);
        assert_approx_eq!(coeff, 2.0, 1e-9);

        let mut left = [0.1];
        let mut right = [0.9];
        space.map_in_place(&mut left);
        space.map_in_place(&mut right);
        assert!(left[0] < 0.0);
        assert!(right[0] > 0.0);
    }
}
