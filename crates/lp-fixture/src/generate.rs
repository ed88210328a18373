//! Deterministic fixture generators.
//!
//! Every generator is a pure function of its arguments: no randomness, no
//! global state. Matrices are column-major; indices in the formulas below
//! are zero-based.

use crate::{Fixture, Real, Uplo};

fn at<T: Real>(value: usize) -> T {
    T::from_usize(value)
}

/// `(i+1)*a + (j+1)*b`, plus `diagonal_boost` on the main diagonal.
#[must_use]
pub fn dense_general<T: Real>(
    rows: usize,
    cols: usize,
    a: f64,
    b: f64,
    diagonal_boost: f64,
) -> Fixture<T> {
    Fixture::from_fn(rows, cols, |i, j| {
        let mut value = (i + 1) as f64 * a + (j + 1) as f64 * b;
        if i == j {
            value += diagonal_boost;
        }
        T::from_f64(value)
    })
}

/// `scale*(i+1)*(j+1)`: a rank-one matrix.
#[must_use]
pub fn rank_one<T: Real>(rows: usize, cols: usize, scale: f64) -> Fixture<T> {
    let scale = T::from_f64(scale);
    Fixture::from_fn(rows, cols, |i, j| scale * at::<T>(i + 1) * at::<T>(j + 1))
}

/// `(i+1)*(j+1)`: symmetric, rank one, so `n-1` eigenvalues are zero.
#[must_use]
pub fn symmetric<T: Real>(n: usize) -> Fixture<T> {
    rank_one(n, n, 1.0)
}

/// Diagonal `n+1`, off-diagonal `1/(|i-j|+1)` decaying with distance from
/// the diagonal.
///
/// Each off-diagonal row sum is below `2*ln(n) + 1 < n+1`, so the matrix is
/// strictly diagonally dominant and all eigenvalues are positive.
#[must_use]
pub fn positive_definite<T: Real>(n: usize) -> Fixture<T> {
    let diagonal = at::<T>(n + 1);
    Fixture::from_fn(n, n, |i, j| {
        if i == j {
            diagonal
        } else {
            T::ONE / at::<T>(i.abs_diff(j) + 1)
        }
    })
}

#[must_use]
pub fn hilbert<T: Real>(n: usize) -> Fixture<T> {
    Fixture::from_fn(n, n, |i, j| T::ONE / at::<T>(i + j + 1))
}

/// Diagonal `diag_base + diag_slope*i`, strict upper part
/// `offdiag_scale/(j-i+1)`, zero below.
#[must_use]
pub fn upper_triangular<T: Real>(
    n: usize,
    diag_base: f64,
    diag_slope: f64,
    offdiag_scale: f64,
) -> Fixture<T> {
    Fixture::from_fn(n, n, |i, j| {
        if i == j {
            T::from_f64(diag_base + diag_slope * i as f64)
        } else if i < j {
            T::from_f64(offdiag_scale / (j - i + 1) as f64)
        } else {
            T::ZERO
        }
    })
}

/// `1 + 0.1*i + 0.05*j` on and above the first sub-diagonal.
#[must_use]
pub fn upper_hessenberg<T: Real>(n: usize) -> Fixture<T> {
    Fixture::from_fn(n, n, |i, j| {
        if j + 1 >= i {
            T::from_f64(1.0 + 0.1 * i as f64 + 0.05 * j as f64)
        } else {
            T::ZERO
        }
    })
}

/// Dense `n x n` matrix with `kl` sub- and `ku` super-diagonals.
/// Diagonal `n+1`, in-band entries `1/(i+j+2)`.
#[must_use]
pub fn diagonally_dominant_band<T: Real>(n: usize, kl: usize, ku: usize) -> Fixture<T> {
    let diagonal = at::<T>(n + 1);
    Fixture::from_fn(n, n, |i, j| {
        if i == j {
            diagonal
        } else if i + ku >= j && i <= j + kl {
            T::ONE / at::<T>(i + j + 2)
        } else {
            T::ZERO
        }
    })
}

/// Symmetric band with `kd` off-diagonals in `ldab = kd+1` storage.
/// Diagonal `diag`, off-diagonal `offdiag_scale/(|i-j|+1)`.
#[must_use]
pub fn banded_symmetric<T: Real>(
    n: usize,
    kd: usize,
    diag: f64,
    offdiag_scale: f64,
    uplo: Uplo,
) -> Fixture<T> {
    let dense = Fixture::from_fn(n, n, |i, j| {
        let distance = i.abs_diff(j);
        if distance == 0 {
            T::from_f64(diag)
        } else if distance <= kd {
            T::from_f64(offdiag_scale / (distance + 1) as f64)
        } else {
            T::ZERO
        }
    });
    dense.to_symmetric_band(kd, uplo)
}

/// Packed symmetric matrix with diagonal `diag` and off-diagonal `1/(i+j+1)`.
#[must_use]
pub fn packed_symmetric<T: Real>(n: usize, diag: f64, uplo: Uplo) -> Fixture<T> {
    let diag = T::from_f64(diag);
    let dense = Fixture::from_fn(n, n, |i, j| {
        if i == j {
            diag
        } else {
            T::ONE / at::<T>(i + j + 1)
        }
    });
    dense.to_packed(uplo)
}

/// Symmetric tridiagonal split vectors: diagonal `2 + 0.1*i`,
/// off-diagonals `1/(i+1)`.
#[must_use]
pub fn tridiagonal<T: Real>(n: usize) -> Fixture<T> {
    let diag = (0..n).map(|i| T::from_f64(2.0 + 0.1 * i as f64)).collect();
    let off: Vec<T> = (0..n.saturating_sub(1))
        .map(|i| T::ONE / at::<T>(i + 1))
        .collect();
    Fixture::tridiagonal(off.clone(), diag, off)
}

/// `scale*(i+1)` as an `n x 1` fixture.
#[must_use]
pub fn ramp<T: Real>(n: usize, scale: f64) -> Fixture<T> {
    let scale = T::from_f64(scale);
    Fixture::vector((0..n).map(|i| scale * at::<T>(i + 1)).collect())
}

/// `start + 0.1*i` as an `n x 1` fixture.
#[must_use]
pub fn range<T: Real>(n: usize, start: f64) -> Fixture<T> {
    Fixture::vector((0..n).map(|i| T::from_f64(start + 0.1 * i as f64)).collect())
}

/// `seed*(i+1)`.
#[must_use]
pub fn int_ramp(n: usize, seed: i32) -> Vec<i32> {
    (1..=n).map(|i| seed.saturating_mul(i as i32)).collect()
}

#[cfg(test)]
mod tests {
    use super::{
        banded_symmetric, dense_general, diagonally_dominant_band, int_ramp, positive_definite,
        ramp, range, upper_hessenberg, upper_triangular,
    };
    use crate::{StorageKind, Uplo};

    fn approx_equal(lhs: f64, rhs: f64, tol: f64) -> bool {
        (lhs - rhs).abs() <= tol
    }

    #[test]
    fn positive_definite_is_strictly_diagonally_dominant() {
        let n = 8;
        let a = positive_definite::<f64>(n);
        for i in 0..n {
            let off: f64 = (0..n).filter(|&j| j != i).map(|j| a.get(i, j).abs()).sum();
            assert!(a.get(i, i) > off, "row {i} is not dominant");
            for j in 0..n {
                assert_eq!(a.get(i, j), a.get(j, i));
            }
        }
    }

    #[test]
    fn positive_definite_off_diagonal_decays_with_distance() {
        let a = positive_definite::<f64>(6);
        assert_eq!(a.get(0, 1), 0.5);
        assert_eq!(a.get(3, 4), 0.5);
        assert!(approx_equal(a.get(0, 5), 1.0 / 6.0, 1e-15));
        for j in 2..6 {
            assert!(a.get(0, j) < a.get(0, j - 1), "column {j} does not decay");
        }
    }

    #[test]
    fn dense_general_adds_boost_on_diagonal() {
        let a = dense_general::<f64>(3, 3, 1.0, 2.0, 10.0);
        assert_eq!(a.get(0, 0), 13.0);
        assert_eq!(a.get(1, 0), 4.0);
        assert_eq!(a.get(0, 2), 7.0);
    }

    #[test]
    fn band_generator_zeroes_outside_band() {
        let a = diagonally_dominant_band::<f64>(5, 2, 1);
        assert_eq!(a.get(0, 2), 0.0);
        assert_eq!(a.get(3, 0), 0.0);
        assert!(approx_equal(a.get(2, 0), 0.25, 1e-15));
        assert!(approx_equal(a.get(0, 1), 1.0 / 3.0, 1e-15));
    }

    #[test]
    fn triangular_and_hessenberg_shapes() {
        let u = upper_triangular::<f64>(4, 2.0, 0.5, 1.0);
        assert_eq!(u.get(3, 3), 3.5);
        assert_eq!(u.get(0, 3), 0.25);
        assert_eq!(u.get(2, 1), 0.0);
        let h = upper_hessenberg::<f64>(4);
        assert_eq!(h.get(3, 1), 0.0);
        assert!(approx_equal(h.get(2, 1), 1.25, 1e-15));
    }

    #[test]
    fn banded_symmetric_uses_kd_plus_one_rows() {
        let ab = banded_symmetric::<f64>(6, 2, 4.0, 1.0, Uplo::Upper);
        assert_eq!(ab.ld(), 3);
        assert_eq!(
            ab.kind(),
            StorageKind::SymmetricBand {
                kd: 2,
                uplo: Uplo::Upper
            }
        );
        let dense = ab.to_dense();
        assert_eq!(dense.get(0, 3), 0.0);
        assert!(approx_equal(dense.get(1, 3), 1.0 / 3.0, 1e-15));
        assert_eq!(dense.get(4, 4), 4.0);
    }

    #[test]
    fn vector_generators() {
        assert_eq!(ramp::<f64>(3, 2.0).data(), &[2.0, 4.0, 6.0]);
        let r = range::<f64>(3, 1.0);
        assert!(approx_equal(r.data()[2], 1.2, 1e-15));
        assert_eq!(int_ramp(3, 7), vec![7, 14, 21]);
    }
}
