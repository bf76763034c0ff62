//! The floating-point types the estimator can run on.
//!
//! The live statistics of a running integration are published through
//! lock-free slots holding the bit pattern of a floating-point value in an
//! integer atomic. The [`Real`] trait ties a `Float` type to its atomic
//! carrier and is implemented for `f32` and `f64`; it is sealed because the
//! bit-pattern trick only works for types with a fixed IEEE-754 layout.

use num_traits::{Float, FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

mod sealed {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A floating-point type whose values can be published through an atomic
/// bit-pattern slot.
pub trait Real:
    Float
    + FromPrimitive
    + ToPrimitive
    + Debug
    + Display
    + Send
    + Sync
    + 'static
    + sealed::Sealed
{
    /// The integer atomic that carries the bit pattern.
    type Atomic: Send + Sync;

    /// Creates a slot holding `value`.
    fn atomic(value: Self) -> Self::Atomic;

    /// Reads the value currently held by `slot`.
    fn load(slot: &Self::Atomic) -> Self;

    /// Publishes `value` into `slot`.
    fn store(slot: &Self::Atomic, value: Self);

    /// Returns the next representable value towards positive infinity.
    fn next_up(self) -> Self;

    /// Returns the next representable value towards negative infinity.
    fn next_down(self) -> Self;
}

impl Real for f32 {
    type Atomic = AtomicU32;

    fn atomic(value: Self) -> Self::Atomic {
        AtomicU32::new(value.to_bits())
    }

    fn load(slot: &Self::Atomic) -> Self {
        Self::from_bits(slot.load(Ordering::SeqCst))
    }

    fn store(slot: &Self::Atomic, value: Self) {
        slot.store(value.to_bits(), Ordering::SeqCst);
    }

    fn next_up(self) -> Self {
        f32::next_up(self)
    }

    fn next_down(self) -> Self {
        f32::next_down(self)
    }
}

impl Real for f64 {
    type Atomic = AtomicU64;

    fn atomic(value: Self) -> Self::Atomic {
        AtomicU64::new(value.to_bits())
    }

    fn load(slot: &Self::Atomic) -> Self {
        Self::from_bits(slot.load(Ordering::SeqCst))
    }

    fn store(slot: &Self::Atomic, value: Self) {
        slot.store(value.to_bits(), Ordering::SeqCst);
    }

    fn next_up(self) -> Self {
        f64::next_up(self)
    }

    fn next_down(self) -> Self {
        f64::next_down(self)
    }
}

/// A single-writer, multi-reader publication slot for a floating-point value.
pub(crate) struct RealSlot<T: Real>(T::Atomic);

impl<T: Real> RealSlot<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(T::atomic(value))
    }

    pub(crate) fn load(&self) -> T {
        T::load(&self.0)
    }

    pub(crate) fn store(&self, value: T) {
        T::store(&self.0, value);
    }
}
