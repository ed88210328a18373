use lp_fixture::{Real, Uplo, packed_index};

use crate::kernels::{dim, dot, fits, fmadd};
use crate::{Call, Implementation, Norm, Trans};

/// `y := alpha * op(A) * x + beta * y` for a general band `A` stored with
/// `ld >= kl + ku + 1`, diagonal in row `ku`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn band_matvec<T: Real>(
    imp: Implementation,
    trans: Trans,
    (m, n, kl, ku): (usize, usize, usize, usize),
    alpha: T,
    ab: &[T],
    ldab: usize,
    x: &[T],
    beta: T,
    y: &mut [T],
) {
    let leny = if trans == Trans::No { m } else { n };
    for value in y.iter_mut().take(leny) {
        *value = if beta == T::ZERO { T::ZERO } else { beta * *value };
    }
    if alpha == T::ZERO {
        return;
    }
    let entry = |i: usize, j: usize| ab[ku + i - j + j * ldab];
    match (trans, imp) {
        (Trans::No, Implementation::Reference) => {
            for j in 0..n {
                let temp = alpha * x[j];
                for i in j.saturating_sub(ku)..(j + kl + 1).min(m) {
                    y[i] = fmadd(imp, temp, entry(i, j), y[i]);
                }
            }
        }
        (Trans::No, Implementation::Candidate) => {
            for i in 0..m {
                let first = i.saturating_sub(kl);
                let last = (i + ku + 1).min(n);
                let sum = dot(imp, last.saturating_sub(first), |t| entry(i, first + t), |t| {
                    x[first + t]
                });
                y[i] = fmadd(imp, alpha, sum, y[i]);
            }
        }
        (Trans::Transpose, _) => {
            for j in 0..n {
                let first = j.saturating_sub(ku);
                let last = (j + kl + 1).min(m);
                let sum = dot(imp, last.saturating_sub(first), |t| entry(first + t, j), |t| {
                    x[first + t]
                });
                y[j] = fmadd(imp, alpha, sum, y[j]);
            }
        }
    }
}

pub(crate) fn gemm<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    let options = call.options;
    if dims.m < 0 {
        return -3;
    }
    if dims.n < 0 {
        return -4;
    }
    if dims.k < 0 {
        return -5;
    }
    let (m, n, k) = (dim(dims.m), dim(dims.n), dim(dims.k));
    let (a_rows, a_cols) = if options.trans == Trans::No { (m, k) } else { (k, m) };
    let (b_rows, b_cols) = if options.trans_b == Trans::No { (k, n) } else { (n, k) };
    let Some(a) = call.a.as_ref() else { return -7 };
    if !fits(a, a_rows, a_cols) {
        return -8;
    }
    let Some(b) = call.b.as_ref() else { return -9 };
    if !fits(b, b_rows, b_cols) {
        return -10;
    }
    let Some(c) = call.c.as_mut() else { return -12 };
    if !fits(c, m, n) {
        return -13;
    }
    let alpha = T::from_f64(call.scalars.alpha);
    let beta = T::from_f64(call.scalars.beta);
    let (lda, ldb, ldc) = (a.ld(), b.ld(), c.ld());
    let a = a.data();
    let b = b.data();
    let op_a = |i: usize, l: usize| match options.trans {
        Trans::No => a[i + l * lda],
        Trans::Transpose => a[l + i * lda],
    };
    let op_b = |l: usize, j: usize| match options.trans_b {
        Trans::No => b[l + j * ldb],
        Trans::Transpose => b[j + l * ldb],
    };
    let c = c.data_mut();
    for j in 0..n {
        for i in 0..m {
            let current = c[i + j * ldc];
            c[i + j * ldc] = if beta == T::ZERO { T::ZERO } else { beta * current };
        }
    }
    if alpha == T::ZERO || m == 0 || n == 0 {
        return 0;
    }
    match imp {
        Implementation::Reference => {
            for j in 0..n {
                for l in 0..k {
                    let temp = alpha * op_b(l, j);
                    for i in 0..m {
                        c[i + j * ldc] = fmadd(imp, temp, op_a(i, l), c[i + j * ldc]);
                    }
                }
            }
        }
        Implementation::Candidate => {
            for j in 0..n {
                for i in 0..m {
                    let sum = dot(imp, k, |l| op_a(i, l), |l| op_b(l, j));
                    c[i + j * ldc] = fmadd(imp, alpha, sum, c[i + j * ldc]);
                }
            }
        }
    }
    0
}

pub(crate) fn gbmv<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if dims.m < 0 {
        return -2;
    }
    if dims.n < 0 {
        return -3;
    }
    if dims.kl < 0 {
        return -4;
    }
    if dims.ku < 0 {
        return -5;
    }
    let (m, n, kl, ku) = (dim(dims.m), dim(dims.n), dim(dims.kl), dim(dims.ku));
    let Some(ab) = call.ab.as_ref() else { return -7 };
    if ab.ld() < kl + ku + 1 || ab.len() < ab.ld() * n {
        return -8;
    }
    let trans = call.options.trans;
    let (lenx, leny) = if trans == Trans::No { (n, m) } else { (m, n) };
    let Some(x) = call.x.as_ref() else { return -9 };
    if x.len() < lenx {
        return -10;
    }
    let Some(y) = call.y.as_mut() else { return -12 };
    if y.len() < leny {
        return -13;
    }
    band_matvec(
        imp,
        trans,
        (m, n, kl, ku),
        T::from_f64(call.scalars.alpha),
        ab.data(),
        ab.ld(),
        x.data(),
        T::from_f64(call.scalars.beta),
        y.data_mut(),
    );
    0
}

pub(crate) fn spmv<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.n < 0 {
        return -2;
    }
    let n = dim(call.dims.n);
    let uplo = call.options.uplo;
    let Some(ap) = call.ap.as_ref() else { return -4 };
    if ap.len() < n * (n + 1) / 2 {
        return -4;
    }
    let Some(x) = call.x.as_ref() else { return -5 };
    if x.len() < n {
        return -6;
    }
    let Some(y) = call.y.as_mut() else { return -8 };
    if y.len() < n {
        return -9;
    }
    let alpha = T::from_f64(call.scalars.alpha);
    let beta = T::from_f64(call.scalars.beta);
    let ap = ap.data();
    let x = x.data();
    let entry = |i: usize, j: usize| {
        let (r, c) = match uplo {
            Uplo::Upper if i <= j => (i, j),
            Uplo::Lower if i >= j => (i, j),
            _ => (j, i),
        };
        ap[packed_index(uplo, n, r, c)]
    };
    let y = y.data_mut();
    for i in 0..n {
        let sum = dot(imp, n, |j| entry(i, j), |j| x[j]);
        let scaled = if beta == T::ZERO { T::ZERO } else { beta * y[i] };
        y[i] = fmadd(imp, alpha, sum, scaled);
    }
    0
}

/// Matrix norm of `A` written to the single-value `anorm` cell.
pub(crate) fn lange<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.m < 0 {
        return -2;
    }
    if call.dims.n < 0 {
        return -3;
    }
    let (m, n) = (dim(call.dims.m), dim(call.dims.n));
    let Some(a) = call.a.as_ref() else { return -4 };
    if !fits(a, m, n) {
        return -5;
    }
    let lda = a.ld();
    let data = a.data();
    let entry = |i: usize, j: usize| data[i + j * lda].abs();
    let value = if m == 0 || n == 0 {
        T::ZERO
    } else {
        match call.options.norm {
            Norm::One => (0..n)
                .map(|j| dot(imp, m, |i| entry(i, j), |_| T::ONE))
                .fold(T::ZERO, T::max),
            Norm::Infinity => (0..m)
                .map(|i| dot(imp, n, |j| entry(i, j), |_| T::ONE))
                .fold(T::ZERO, T::max),
            Norm::Max => (0..n)
                .flat_map(|j| (0..m).map(move |i| (i, j)))
                .map(|(i, j)| entry(i, j))
                .fold(T::ZERO, T::max),
            Norm::Frobenius => dot(imp, m * n, |k| entry(k % m, k / m), |k| entry(k % m, k / m))
                .sqrt(),
        }
    };
    let Some(anorm) = call.anorm.as_mut() else { return -6 };
    match anorm.data_mut().first_mut() {
        Some(cell) => *cell = value,
        None => return -6,
    }
    0
}

#[cfg(test)]
mod tests {
    use crate::{Call, Dims, Implementation, Norm, Options, Routine, Slot, Trans};
    use lp_fixture::{BandLayout, Fixture, Uplo, generate};

    fn approx_equal(lhs: f64, rhs: f64, tol: f64) -> bool {
        (lhs - rhs).abs() <= tol
    }

    #[test]
    fn gemm_matches_fixture_product_for_both_flavors() {
        let a = generate::hilbert::<f64>(3);
        let b = generate::positive_definite::<f64>(3);
        let expected = a.matmul(&b);
        for imp in Implementation::ALL {
            let mut call = Call::new(
                Dims {
                    m: 3,
                    n: 3,
                    k: 3,
                    ..Dims::default()
                },
                Options::default(),
            );
            call.scalars.alpha = 1.0;
            call.set_real(Slot::A, a.clone());
            call.set_real(Slot::B, b.clone());
            call.set_real(Slot::C, Fixture::zeros(3, 3));
            assert_eq!(imp.invoke(Routine::Gemm, &mut call), 0);
            let c = call.c.expect("c present");
            for (got, want) in c.data().iter().zip(expected.data()) {
                assert!(approx_equal(*got, *want, 1e-13));
            }
        }
    }

    #[test]
    fn gemm_reports_bad_leading_dimension() {
        let mut call = Call::<f64>::new(
            Dims {
                m: 3,
                n: 2,
                k: 2,
                ..Dims::default()
            },
            Options::default(),
        );
        call.set_real(Slot::A, Fixture::zeros(2, 2));
        call.set_real(Slot::B, Fixture::zeros(2, 2));
        call.set_real(Slot::C, Fixture::zeros(3, 2));
        assert_eq!(Implementation::Reference.invoke(Routine::Gemm, &mut call), -8);
    }

    #[test]
    fn gbmv_agrees_with_dense_product() {
        let dense = generate::diagonally_dominant_band::<f64>(5, 2, 1);
        let band = dense.to_band(2, 1, BandLayout::Plain);
        let x = generate::ramp::<f64>(5, 1.0);
        for trans in [Trans::No, Trans::Transpose] {
            let op = if trans == Trans::No { dense.clone() } else { dense.transpose() };
            let expected = op.matmul(&x);
            for imp in Implementation::ALL {
                let mut options = Options::default();
                options.trans = trans;
                let mut call = Call::new(
                    Dims {
                        m: 5,
                        n: 5,
                        kl: 2,
                        ku: 1,
                        ..Dims::default()
                    },
                    options,
                );
                call.scalars.alpha = 1.0;
                call.set_real(Slot::Ab, band.clone());
                call.set_real(Slot::X, x.clone());
                call.set_real(Slot::Y, Fixture::zeros(5, 1));
                assert_eq!(imp.invoke(Routine::Gbmv, &mut call), 0);
                let y = call.y.expect("y present");
                for (got, want) in y.data().iter().zip(expected.data()) {
                    assert!(approx_equal(*got, *want, 1e-13));
                }
            }
        }
    }

    #[test]
    fn spmv_reads_either_triangle() {
        let dense = generate::positive_definite::<f64>(4);
        let x = generate::ramp::<f64>(4, 0.5);
        let expected = dense.matmul(&x);
        for uplo in [Uplo::Upper, Uplo::Lower] {
            let mut options = Options::default();
            options.uplo = uplo;
            let mut call = Call::new(Dims::square(4), options);
            call.scalars.alpha = 1.0;
            call.set_real(Slot::Ap, dense.to_packed(uplo));
            call.set_real(Slot::X, x.clone());
            call.set_real(Slot::Y, Fixture::zeros(4, 1));
            assert_eq!(Implementation::Candidate.invoke(Routine::Spmv, &mut call), 0);
            let y = call.y.expect("y present");
            for (got, want) in y.data().iter().zip(expected.data()) {
                assert!(approx_equal(*got, *want, 1e-13));
            }
        }
    }

    #[test]
    fn lange_norms() {
        let a = Fixture::<f64>::dense(2, 2, vec![1.0, -3.0, 2.0, 4.0]);
        let cases = [
            (Norm::One, 6.0),
            (Norm::Infinity, 7.0),
            (Norm::Max, 4.0),
            (Norm::Frobenius, 30f64.sqrt()),
        ];
        for (norm, expected) in cases {
            let mut options = Options::default();
            options.norm = norm;
            let mut call = Call::new(Dims::square(2), options);
            call.set_real(Slot::A, a.clone());
            call.set_real(Slot::Anorm, Fixture::zeros(1, 1));
            assert_eq!(Implementation::Reference.invoke(Routine::Lange, &mut call), 0);
            let value = call.anorm.expect("anorm present").data()[0];
            assert!(approx_equal(value, expected, 1e-14), "{norm:?}");
        }
    }
}
