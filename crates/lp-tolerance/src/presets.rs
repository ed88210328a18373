//! Tolerance modes per routine family.
//!
//! Every comparison in the scenario catalog takes its mode from here. The
//! precision unit (`1e-14` double, `1e-5` single) is applied later, so one
//! preset serves both precisions.
//!
//! | Family | Mode | Basis |
//! |--------|------|-------|
//! | Direct solves | scaled, `k = 1` | backward-stable, error tracks `max|x|` |
//! | Factor entries | scaled, `k = 2` | pivoting order fixed, rounding only |
//! | Symmetric spectra | scaled, `k = 2` | eigensolver variants, `O(n eps ||A||)` |
//! | Singular values | scaled, `k = 3` | Jacobi sweep order, `O(n eps ||A||)` |
//! | Forward error estimate | relative, `5` | estimator, not a value |
//! | Backward error estimate | absolute, `10` | near machine precision by construction |
//! | Condition estimate | relative, `1e-4` | estimator iterates can differ in rounding |
//! | Generalized ratios | scaled, `k = 0` | ratio of two rounded quantities |
//! | BLAS products | scaled, `k = 1` | summation order, FMA |

use crate::ToleranceMode;

/// Solutions of factor-then-solve routines (`getrs`, `gbtrs`, `potrs`,
/// `gtsv`, refined `gbrfs` output).
pub const DIRECT_SOLVE: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 1 };

/// Factor entries and Householder scalars where both implementations take
/// the same pivots.
pub const FACTOR_ENTRIES: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 2 };

/// Sorted eigenvalues of symmetric problems, bounded by the largest
/// eigenvalue magnitude.
pub const SYMMETRIC_SPECTRUM: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 2 };

/// Sign-normalized eigenvectors of well-separated eigenvalues.
pub const EIGENVECTORS: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 4 };

/// Sorted singular values.
pub const SINGULAR_VALUES: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 3 };

/// Sign-normalized orthogonal factors (`orgqr`, QR `Q`).
pub const ORTHOGONAL_FACTOR: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 4 };

/// Nonsymmetric eigenvalues from Hessenberg QR.
pub const NONSYMMETRIC_SPECTRUM: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 3 };

/// Forward error bounds (`FERR`) from iterative refinement.
///
/// Documented exception: `FERR` is itself an estimate computed from a
/// condition estimator, and two implementations routinely disagree by a
/// small factor. Agreement to within five times the value is the contract.
pub const FORWARD_ERROR_ESTIMATE: ToleranceMode = ToleranceMode::Relative { factor: 5.0 };

/// Componentwise backward errors (`BERR`); both land near machine precision.
pub const BACKWARD_ERROR_ESTIMATE: ToleranceMode = ToleranceMode::Absolute { multiplier: 10.0 };

/// Reciprocal condition number estimates (`RCOND`).
pub const CONDITION_ESTIMATE: ToleranceMode = ToleranceMode::Relative { factor: 1e-4 };

/// Finite generalized eigenvalues `alpha/beta`, sorted.
pub const GENERALIZED_RATIO: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 0 };

/// Least-squares solutions from rank-revealing QR.
pub const LEAST_SQUARES: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 2 };

/// BLAS level 2/3 results.
pub const BLAS_PRODUCT: ToleranceMode = ToleranceMode::ScaledByExponent { shift: 1 };

#[must_use]
pub fn all() -> [(&'static str, ToleranceMode); 13] {
    [
        ("direct_solve", DIRECT_SOLVE),
        ("factor_entries", FACTOR_ENTRIES),
        ("symmetric_spectrum", SYMMETRIC_SPECTRUM),
        ("eigenvectors", EIGENVECTORS),
        ("singular_values", SINGULAR_VALUES),
        ("orthogonal_factor", ORTHOGONAL_FACTOR),
        ("nonsymmetric_spectrum", NONSYMMETRIC_SPECTRUM),
        ("forward_error_estimate", FORWARD_ERROR_ESTIMATE),
        ("backward_error_estimate", BACKWARD_ERROR_ESTIMATE),
        ("condition_estimate", CONDITION_ESTIMATE),
        ("generalized_ratio", GENERALIZED_RATIO),
        ("least_squares", LEAST_SQUARES),
        ("blas_product", BLAS_PRODUCT),
    ]
}
