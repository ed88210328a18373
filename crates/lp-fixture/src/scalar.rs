use core::fmt::Debug;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Floating-point width a fixture, routine or scenario runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    /// LAPACK naming prefix (`s` for single, `d` for double).
    #[must_use]
    pub fn prefix(self) -> char {
        match self {
            Self::Single => 's',
            Self::Double => 'd',
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "f32",
            Self::Double => "f64",
        }
    }

    /// Base unit every derived tolerance is a multiple of.
    #[must_use]
    pub fn unit(self) -> f64 {
        match self {
            Self::Single => 1e-5,
            Self::Double => 1e-14,
        }
    }

    #[must_use]
    pub fn machine_epsilon(self) -> f64 {
        match self {
            Self::Single => f64::from(f32::EPSILON),
            Self::Double => f64::EPSILON,
        }
    }
}

/// Real scalar the generators and routines are generic over.
pub trait Real:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    const PRECISION: Precision;
    const ZERO: Self;
    const ONE: Self;
    const TWO: Self;
    const EPSILON: Self;
    /// Smallest positive normal value.
    const SAFE_MIN: Self;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn hypot(self, other: Self) -> Self;
    fn mul_add(self, a: Self, b: Self) -> Self;
    fn copysign(self, sign: Self) -> Self;
    fn is_finite(self) -> bool;
    fn max(self, other: Self) -> Self;
    fn min(self, other: Self) -> Self;
    fn append_le_bytes(self, out: &mut Vec<u8>);

    #[must_use]
    fn from_usize(value: usize) -> Self {
        Self::from_f64(value as f64)
    }
}

macro_rules! impl_real {
    ($ty:ty, $precision:expr) => {
        impl Real for $ty {
            const PRECISION: Precision = $precision;
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const TWO: Self = 2.0;
            const EPSILON: Self = <$ty>::EPSILON;
            const SAFE_MIN: Self = <$ty>::MIN_POSITIVE;

            #[allow(clippy::cast_possible_truncation)]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            fn abs(self) -> Self {
                <$ty>::abs(self)
            }

            fn sqrt(self) -> Self {
                <$ty>::sqrt(self)
            }

            fn hypot(self, other: Self) -> Self {
                <$ty>::hypot(self, other)
            }

            fn mul_add(self, a: Self, b: Self) -> Self {
                <$ty>::mul_add(self, a, b)
            }

            fn copysign(self, sign: Self) -> Self {
                <$ty>::copysign(self, sign)
            }

            fn is_finite(self) -> bool {
                <$ty>::is_finite(self)
            }

            fn max(self, other: Self) -> Self {
                <$ty>::max(self, other)
            }

            fn min(self, other: Self) -> Self {
                <$ty>::min(self, other)
            }

            fn append_le_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_real!(f32, Precision::Single);
impl_real!(f64, Precision::Double);
