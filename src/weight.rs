//! Numeric weights and the functions that extract them from payloads.

use core::fmt::Debug;
use core::ops::Add;
use core::ops::Sub;

use rand::distr::uniform::SampleUniform;

/// A scalar usable as an entry weight.
///
/// Sums are maintained incrementally, so the type must support exact-ish
/// addition and subtraction. Integer weights compare exactly; floating point
/// weights compare with a relative tolerance to absorb rounding drift in the
/// running sum.
pub trait Weight:
    Copy + PartialOrd + Debug + SampleUniform + Add<Output = Self> + Sub<Output = Self>
{
    /// The additive identity. Virgin slots weigh this much.
    const ZERO: Self;

    /// Equality up to accumulated rounding error.
    fn approx_eq(self, other: Self) -> bool;
}

macro_rules! exact_weight {
    ($($ty:ty),* $(,)?) => {$(
        impl Weight for $ty {
            const ZERO: Self = 0;

            #[inline(always)]
            fn approx_eq(self, other: Self) -> bool {
                self == other
            }
        }
    )*};
}

macro_rules! float_weight {
    ($($ty:ty),* $(,)?) => {$(
        impl Weight for $ty {
            const ZERO: Self = 0.0;

            #[inline]
            fn approx_eq(self, other: Self) -> bool {
                let magnitude = |x: $ty| if x < 0.0 { -x } else { x };
                let scale = [magnitude(self), magnitude(other)]
                    .into_iter()
                    .fold(1.0, |acc, x| if x > acc { x } else { acc });
                magnitude(self - other) <= scale * (<$ty>::EPSILON * 1024.0)
            }
        }
    )*};
}

exact_weight!(u8, u16, u32, u64, usize, i32, i64);
float_weight!(f32, f64);

/// Maps a payload to its weight.
///
/// Implemented for any `Fn(&V) -> W`, so a closure can be passed directly at
/// construction.
pub trait WeightFn<V> {
    /// The weight type produced.
    type Weight: Weight;

    /// Computes the weight of `value`.
    fn weight(&self, value: &V) -> Self::Weight;
}

impl<V, W, F> WeightFn<V> for F
where
    F: Fn(&V) -> W,
    W: Weight,
{
    type Weight = W;

    #[inline(always)]
    fn weight(&self, value: &V) -> W {
        self(value)
    }
}

/// Uses the payload itself as its weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<W: Weight> WeightFn<W> for Identity {
    type Weight = W;

    #[inline(always)]
    fn weight(&self, value: &W) -> W {
        *value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_weights_are_exact() {
        assert!(3u64.approx_eq(3));
        assert!(!3u64.approx_eq(4));
        assert_eq!(<i64 as Weight>::ZERO, 0);
    }

    #[test]
    fn float_weights_tolerate_drift() {
        let mut sum = 0.0f64;
        for _ in 0..10 {
            sum = sum + 0.1;
        }
        assert!(sum.approx_eq(1.0));
        assert!(!sum.approx_eq(1.001));
        assert!(1.0e9f64.approx_eq(1.0e9 + 1.0e-4));
    }

    #[test]
    fn closures_and_identity() {
        let halve = |v: &(u32, f64)| v.1 / 2.0;
        assert_eq!(halve.weight(&(1, 3.0)), 1.5);
        assert_eq!(Identity.weight(&7u32), 7);
    }
}
