#![forbid(unsafe_code)]

//! Admissible error bounds for cross-implementation comparisons.
//!
//! A bound is always derived from the magnitude of the expected value and
//! the precision unit of the arithmetic being compared. Routine families
//! pick a [`ToleranceMode`] from [`presets`]; the mode plus the precision
//! unit yields a [`ToleranceSpec`], and the spec yields a bound per value.

pub mod presets;

use core::fmt;

use lp_fixture::Precision;
use serde::{Deserialize, Serialize};

pub const MAX_ABSOLUTE_MULTIPLIER: f64 = 100.0;
pub const MAX_EXPONENT_SHIFT: i32 = 8;
pub const MAX_RELATIVE_FACTOR: f64 = 10.0;

pub const TOLERANCE_REASON_CODES: [&str; 3] = [
    "tolerance_multiplier_out_of_range",
    "tolerance_shift_out_of_range",
    "tolerance_factor_out_of_range",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ToleranceError {
    MultiplierOutOfRange(f64),
    ShiftOutOfRange(i32),
    FactorOutOfRange(f64),
}

impl ToleranceError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MultiplierOutOfRange(_) => "tolerance_multiplier_out_of_range",
            Self::ShiftOutOfRange(_) => "tolerance_shift_out_of_range",
            Self::FactorOutOfRange(_) => "tolerance_factor_out_of_range",
        }
    }
}

impl fmt::Display for ToleranceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiplierOutOfRange(k) => {
                write!(f, "absolute multiplier {k} outside [1, {MAX_ABSOLUTE_MULTIPLIER}]")
            }
            Self::ShiftOutOfRange(shift) => {
                write!(f, "exponent shift {shift} outside +/-{MAX_EXPONENT_SHIFT}")
            }
            Self::FactorOutOfRange(factor) => {
                write!(f, "relative factor {factor} outside (0, {MAX_RELATIVE_FACTOR}]")
            }
        }
    }
}

impl std::error::Error for ToleranceError {}

/// Unbiased binary exponent of `value`, i.e. `floor(log2(|value|))` for
/// normal numbers. Zero and subnormals map to `f64::MIN_EXP - 2` (-1023);
/// infinities and NaN map to `f64::MAX_EXP` (1024).
#[must_use]
pub fn exponent(value: f64) -> i32 {
    let biased = ((value.to_bits() >> 52) & 0x7ff) as i32;
    biased - 1023
}

/// `value * 2^scale`.
#[must_use]
pub fn scalb(value: f64, scale: i32) -> f64 {
    // split so that neither factor over/underflows on its own
    let half = scale / 2;
    value * 2f64.powi(half) * 2f64.powi(scale - half)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToleranceMode {
    /// `multiplier * unit`.
    Absolute { multiplier: f64 },
    /// `unit * 2^(exponent(magnitude) + shift)`.
    ScaledByExponent { shift: i32 },
    /// `max(unit, |expected| * factor)`.
    Relative { factor: f64 },
}

impl ToleranceMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute { .. } => "absolute",
            Self::ScaledByExponent { .. } => "scaled_by_exponent",
            Self::Relative { .. } => "relative",
        }
    }

    pub fn validate(&self) -> Result<(), ToleranceError> {
        match *self {
            Self::Absolute { multiplier } => {
                if !(1.0..=MAX_ABSOLUTE_MULTIPLIER).contains(&multiplier) {
                    return Err(ToleranceError::MultiplierOutOfRange(multiplier));
                }
            }
            Self::ScaledByExponent { shift } => {
                if shift.abs() > MAX_EXPONENT_SHIFT {
                    return Err(ToleranceError::ShiftOutOfRange(shift));
                }
            }
            Self::Relative { factor } => {
                if !(factor > 0.0 && factor <= MAX_RELATIVE_FACTOR) {
                    return Err(ToleranceError::FactorOutOfRange(factor));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute { multiplier } => write!(f, "absolute(k={multiplier})"),
            Self::ScaledByExponent { shift } => write!(f, "scaled_by_exponent(k={shift})"),
            Self::Relative { factor } => write!(f, "relative(factor={factor})"),
        }
    }
}

/// Per-comparison tolerance, derived from a [`ToleranceMode`] and the
/// precision unit of the arithmetic under test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    pub absolute: f64,
    pub relative_factor: f64,
    pub scale_by_magnitude: bool,
}

impl ToleranceSpec {
    #[must_use]
    pub fn derive(mode: ToleranceMode, precision_unit: f64) -> Self {
        match mode {
            ToleranceMode::Absolute { multiplier } => Self {
                absolute: multiplier * precision_unit,
                relative_factor: 0.0,
                scale_by_magnitude: false,
            },
            ToleranceMode::ScaledByExponent { shift } => Self {
                absolute: scalb(precision_unit, shift),
                relative_factor: 0.0,
                scale_by_magnitude: true,
            },
            ToleranceMode::Relative { factor } => Self {
                absolute: precision_unit,
                relative_factor: factor,
                scale_by_magnitude: false,
            },
        }
    }

    #[must_use]
    pub fn for_precision(mode: ToleranceMode, precision: Precision) -> Self {
        Self::derive(mode, precision.unit())
    }

    /// Admissible absolute error for a value whose expected magnitude is
    /// `expected_magnitude`. The scaled bound never drops below its value
    /// at magnitude one, so zero and subnormal expectations keep a floor.
    #[must_use]
    pub fn bound(&self, expected_magnitude: f64) -> f64 {
        let magnitude = expected_magnitude.abs();
        let base = if self.scale_by_magnitude {
            scalb(self.absolute, exponent(magnitude)).max(self.absolute)
        } else {
            self.absolute
        };
        base.max(magnitude * self.relative_factor)
    }

    #[must_use]
    pub fn admits(&self, expected: f64, actual: f64, magnitude: f64) -> bool {
        (expected - actual).abs() <= self.bound(magnitude)
    }
}

#[must_use]
pub fn bound(expected_magnitude: f64, precision_unit: f64, mode: ToleranceMode) -> f64 {
    ToleranceSpec::derive(mode, precision_unit).bound(expected_magnitude)
}

/// Bound on `max |Q^T Q - I|` for an `n`-column orthogonal factor.
#[must_use]
pub fn orthogonality_bound(n: usize, precision_unit: f64) -> f64 {
    n.max(1) as f64 * precision_unit * 100.0
}

/// Bound on a reconstruction residual such as `||A - QR||`.
#[must_use]
pub fn residual_bound(norm: f64, precision_unit: f64) -> f64 {
    precision_unit * 100.0 * norm
}

#[cfg(test)]
mod tests {
    use super::{
        ToleranceError, ToleranceMode, ToleranceSpec, bound, exponent, orthogonality_bound,
        residual_bound, scalb,
    };
    use lp_fixture::Precision;

    #[test]
    fn exponent_matches_binary_representation() {
        assert_eq!(exponent(1.0), 0);
        assert_eq!(exponent(1.5), 0);
        assert_eq!(exponent(2.0), 1);
        assert_eq!(exponent(0.75), -1);
        assert_eq!(exponent(-8.0), 3);
        assert_eq!(exponent(0.0), -1023);
        assert_eq!(exponent(f64::INFINITY), 1024);
    }

    #[test]
    fn scalb_is_exact_power_of_two_scaling() {
        assert_eq!(scalb(1e-14, 3), 8e-14);
        assert_eq!(scalb(3.0, -1), 1.5);
        assert_eq!(scalb(1.0, -1074), f64::from_bits(1));
        assert!(scalb(1.0, 2000).is_infinite());
    }

    #[test]
    fn absolute_mode_ignores_magnitude() {
        let mode = ToleranceMode::Absolute { multiplier: 10.0 };
        assert_eq!(bound(1e6, 1e-14, mode), 1e-13);
        assert_eq!(bound(1e-6, 1e-14, mode), 1e-13);
    }

    #[test]
    fn scaled_mode_floats_with_exponent() {
        let mode = ToleranceMode::ScaledByExponent { shift: 1 };
        // max|x| = 5.0 has exponent 2
        assert_eq!(bound(5.0, 1e-14, mode), scalb(1e-14, 3));
        assert!(bound(1e6, 1e-14, mode) > bound(1.0, 1e-14, mode));
    }

    #[test]
    fn scaled_mode_floors_below_unit_magnitude() {
        let mode = ToleranceMode::ScaledByExponent { shift: 1 };
        assert_eq!(bound(0.3, 1e-14, mode), scalb(1e-14, 1));
        assert_eq!(bound(0.0, 1e-14, mode), scalb(1e-14, 1));
        assert_eq!(bound(f64::MIN_POSITIVE / 4.0, 1e-14, mode), scalb(1e-14, 1));
        assert_eq!(bound(1.0, 1e-14, mode), scalb(1e-14, 1));
    }

    #[test]
    fn relative_mode_has_unit_floor() {
        let mode = ToleranceMode::Relative { factor: 5.0 };
        assert_eq!(bound(0.0, 1e-14, mode), 1e-14);
        assert_eq!(bound(1e-15, 1e-14, mode), 1e-14);
        assert_eq!(bound(1e-3, 1e-14, mode), 5e-3);
    }

    #[test]
    fn precision_selects_unit() {
        let mode = ToleranceMode::Absolute { multiplier: 10.0 };
        let single = ToleranceSpec::for_precision(mode, Precision::Single);
        let double = ToleranceSpec::for_precision(mode, Precision::Double);
        assert!((single.absolute - 1e-4).abs() < 1e-18);
        assert!((double.absolute - 1e-13).abs() < 1e-27);
    }

    #[test]
    fn spec_fields_follow_mode() {
        let spec = ToleranceSpec::derive(ToleranceMode::Relative { factor: 0.5 }, 1e-5);
        assert_eq!(spec.absolute, 1e-5);
        assert_eq!(spec.relative_factor, 0.5);
        assert!(!spec.scale_by_magnitude);
        assert!(spec.admits(2.0, 2.5, 2.0));
        assert!(!spec.admits(2.0, 3.5, 2.0));
    }

    #[test]
    fn validation_rejects_out_of_range_modes() {
        let err = ToleranceMode::Absolute { multiplier: 1000.0 }
            .validate()
            .expect_err("multiplier too large");
        assert_eq!(err.reason_code(), "tolerance_multiplier_out_of_range");
        assert_eq!(
            ToleranceMode::ScaledByExponent { shift: 40 }.validate(),
            Err(ToleranceError::ShiftOutOfRange(40))
        );
        assert!(
            ToleranceMode::Relative { factor: 0.0 }
                .validate()
                .is_err()
        );
        ToleranceMode::ScaledByExponent { shift: -2 }
            .validate()
            .expect("small shifts are valid");
    }

    #[test]
    fn invariant_bounds() {
        assert!((orthogonality_bound(10, 1e-14) - 1e-11).abs() < 1e-25);
        assert_eq!(residual_bound(2.0, 1e-14), 2e-12);
    }
}
