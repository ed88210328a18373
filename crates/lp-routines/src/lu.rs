use lp_fixture::Real;

use crate::kernels::{dim, dot, estimate_one_norm, fits, fmadd, iamax};
use crate::{Call, Implementation, Norm, Trans};

/// In-place LU factorization with partial pivoting of an `m x n` matrix.
/// `ipiv` receives 1-based row interchanges.
pub(crate) fn factor<T: Real>(
    imp: Implementation,
    m: usize,
    n: usize,
    a: &mut [T],
    lda: usize,
    ipiv: &mut [i32],
) -> i32 {
    let mn = m.min(n);
    let mut info = 0;
    match imp {
        // right-looking: eliminate one column, update the whole trailing block
        Implementation::Reference => {
            for j in 0..mn {
                let p = j + iamax(m - j, |t| a[j + t + j * lda]);
                ipiv[j] = to_pivot(p);
                if a[p + j * lda] != T::ZERO {
                    if p != j {
                        for c in 0..n {
                            a.swap(j + c * lda, p + c * lda);
                        }
                    }
                    let pivot = a[j + j * lda];
                    if pivot.abs() >= T::SAFE_MIN {
                        let r = T::ONE / pivot;
                        for i in j + 1..m {
                            a[i + j * lda] *= r;
                        }
                    } else {
                        for i in j + 1..m {
                            a[i + j * lda] /= pivot;
                        }
                    }
                } else if info == 0 {
                    info = to_pivot(j);
                }
                for c in j + 1..n {
                    let u = a[j + c * lda];
                    for i in j + 1..m {
                        a[i + c * lda] = fmadd(imp, -a[i + j * lda], u, a[i + c * lda]);
                    }
                }
            }
        }
        // left-looking Crout: each column is brought up to date only when reached
        Implementation::Candidate => {
            for j in 0..n {
                for k in 0..j.min(mn) {
                    let p = (ipiv[k] - 1) as usize;
                    if p != k {
                        a.swap(k + j * lda, p + j * lda);
                    }
                }
                for i in 0..j.min(m) {
                    let s = dot(imp, i, |k| a[i + k * lda], |k| a[k + j * lda]);
                    a[i + j * lda] -= s;
                }
                if j >= mn {
                    continue;
                }
                for i in j..m {
                    let s = dot(imp, j, |k| a[i + k * lda], |k| a[k + j * lda]);
                    a[i + j * lda] -= s;
                }
                let p = j + iamax(m - j, |t| a[j + t + j * lda]);
                ipiv[j] = to_pivot(p);
                if a[p + j * lda] != T::ZERO {
                    if p != j {
                        for c in 0..=j {
                            a.swap(j + c * lda, p + c * lda);
                        }
                    }
                    let pivot = a[j + j * lda];
                    for i in j + 1..m {
                        a[i + j * lda] /= pivot;
                    }
                } else if info == 0 {
                    info = to_pivot(j);
                }
            }
        }
    }
    info
}

fn to_pivot(index: usize) -> i32 {
    i32::try_from(index + 1).unwrap_or(i32::MAX)
}

/// Solve `op(A) x = b` in place using factors from [`factor`].
pub(crate) fn solve<T: Real>(
    imp: Implementation,
    trans: Trans,
    n: usize,
    a: &[T],
    lda: usize,
    ipiv: &[i32],
    b: &mut [T],
) {
    let at = |i: usize, j: usize| a[i + j * lda];
    match trans {
        Trans::No => {
            for k in 0..n {
                let p = (ipiv[k] - 1) as usize;
                if p != k {
                    b.swap(k, p);
                }
            }
            for i in 0..n {
                let s = dot(imp, i, |k| at(i, k), |k| b[k]);
                b[i] -= s;
            }
            for i in (0..n).rev() {
                let s = dot(imp, n - i - 1, |t| at(i, i + 1 + t), |t| b[i + 1 + t]);
                b[i] = (b[i] - s) / at(i, i);
            }
        }
        Trans::Transpose => {
            for i in 0..n {
                let s = dot(imp, i, |k| at(k, i), |k| b[k]);
                b[i] = (b[i] - s) / at(i, i);
            }
            for i in (0..n).rev() {
                let s = dot(imp, n - i - 1, |t| at(i + 1 + t, i), |t| b[i + 1 + t]);
                b[i] -= s;
            }
            for k in (0..n).rev() {
                let p = (ipiv[k] - 1) as usize;
                if p != k {
                    b.swap(k, p);
                }
            }
        }
    }
}

pub(crate) fn getrf<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.m < 0 {
        return -1;
    }
    if call.dims.n < 0 {
        return -2;
    }
    let (m, n) = (dim(call.dims.m), dim(call.dims.n));
    let Some(a) = call.a.as_mut() else { return -3 };
    if !fits(a, m, n) {
        return -4;
    }
    let Some(ipiv) = call.ipiv.as_mut() else { return -5 };
    if ipiv.len() < m.min(n) {
        return -5;
    }
    if m == 0 || n == 0 {
        return 0;
    }
    let lda = a.ld();
    factor(imp, m, n, a.data_mut(), lda, ipiv)
}

pub(crate) fn getrs<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.n < 0 {
        return -2;
    }
    if call.dims.nrhs < 0 {
        return -3;
    }
    let (n, nrhs) = (dim(call.dims.n), dim(call.dims.nrhs));
    let Some(a) = call.a.as_ref() else { return -4 };
    if !fits(a, n, n) {
        return -5;
    }
    let Some(ipiv) = call.ipiv.as_ref() else { return -6 };
    if ipiv.len() < n || !valid_pivots(ipiv, n) {
        return -6;
    }
    let Some(b) = call.b.as_mut() else { return -7 };
    if !fits(b, n, nrhs) {
        return -8;
    }
    let ldb = b.ld();
    for column in b.data_mut().chunks_mut(ldb).take(nrhs) {
        solve(imp, call.options.trans, n, a.data(), a.ld(), ipiv, &mut column[..n]);
    }
    0
}

pub(crate) fn valid_pivots(ipiv: &[i32], n: usize) -> bool {
    ipiv.iter()
        .take(n)
        .all(|&p| p >= 1 && usize::try_from(p).is_ok_and(|p| p <= n))
}

/// Reciprocal condition number of a factored matrix in the 1- or
/// infinity-norm, given the norm of the original matrix in `anorm`.
pub(crate) fn gecon<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let norm = call.options.norm;
    if !matches!(norm, Norm::One | Norm::Infinity) {
        return -1;
    }
    if call.dims.n < 0 {
        return -2;
    }
    let n = dim(call.dims.n);
    let Some(a) = call.a.as_ref() else { return -3 };
    if !fits(a, n, n) {
        return -4;
    }
    let Some(anorm) = call.anorm.as_ref().and_then(|cell| cell.data().first().copied()) else {
        return -5;
    };
    if anorm < T::ZERO || !anorm.is_finite() {
        return -5;
    }
    let Some(rcond) = call.rcond.as_mut() else { return -6 };
    if rcond.is_empty() {
        return -6;
    }
    let Some(work) = call.work.as_mut() else { return -7 };
    if work.len() < 4 * n {
        return -7;
    }
    let Some(iwork) = call.iwork.as_ref() else { return -8 };
    if iwork.len() < n {
        return -8;
    }
    let ipiv = call.ipiv.as_deref().unwrap_or(&[]);
    if ipiv.len() < n || !valid_pivots(ipiv, n) {
        return -3;
    }

    let value = if n == 0 {
        T::ONE
    } else if anorm == T::ZERO {
        T::ZERO
    } else {
        let (forward, adjoint) = match norm {
            Norm::Infinity => (Trans::Transpose, Trans::No),
            _ => (Trans::No, Trans::Transpose),
        };
        let lda = a.ld();
        let factors = a.data();
        let (x, rest) = work.data_mut().split_at_mut(n);
        let y = &mut rest[..n];
        let inverse_norm = estimate_one_norm(n, x, y, |transpose, v| {
            let op = if transpose { adjoint } else { forward };
            solve(imp, op, n, factors, lda, ipiv, v);
        });
        if inverse_norm == T::ZERO || !inverse_norm.is_finite() {
            T::ZERO
        } else {
            (T::ONE / inverse_norm) / anorm
        }
    };
    rcond.data_mut()[0] = value;
    0
}

#[cfg(test)]
mod tests {
    use crate::{Call, Dims, Implementation, Norm, Options, Routine, Slot, Trans};
    use lp_fixture::{Fixture, generate};

    fn approx_equal(lhs: f64, rhs: f64, tol: f64) -> bool {
        (lhs - rhs).abs() <= tol
    }

    fn factor_and_solve(imp: Implementation, trans: Trans) -> Vec<f64> {
        let n = 6;
        let mut options = Options::default();
        options.trans = trans;
        let mut call = Call::new(Dims::square(n).with_rhs(1), options);
        call.set_real(Slot::A, generate::dense_general::<f64>(n, n, 0.5, -0.25, 8.0));
        call.set_int(Slot::Ipiv, vec![0; n]);
        call.set_real(Slot::B, generate::ramp::<f64>(n, 1.0));
        assert_eq!(imp.invoke(Routine::Getrf, &mut call), 0);
        assert_eq!(imp.invoke(Routine::Getrs, &mut call), 0);
        call.b.expect("b present").data().to_vec()
    }

    #[test]
    fn factor_then_solve_reproduces_rhs() {
        let n = 6;
        let a = generate::dense_general::<f64>(n, n, 0.5, -0.25, 8.0);
        for trans in [Trans::No, Trans::Transpose] {
            let op = if trans == Trans::No { a.clone() } else { a.transpose() };
            for imp in Implementation::ALL {
                let x = factor_and_solve(imp, trans);
                let ax = op.matmul(&Fixture::vector(x));
                for (i, value) in ax.data().iter().enumerate() {
                    assert!(approx_equal(*value, (i + 1) as f64, 1e-12));
                }
            }
        }
    }

    #[test]
    fn both_flavors_choose_same_pivots() {
        let a = Fixture::<f64>::from_fn(4, 4, |i, j| {
            if i + j == 3 { 10.0 } else { 1.0 / (i + j + 1) as f64 }
        });
        let mut pivots = Vec::new();
        for imp in Implementation::ALL {
            let mut call = Call::new(Dims::square(4), Options::default());
            call.set_real(Slot::A, a.clone());
            call.set_int(Slot::Ipiv, vec![0; 4]);
            assert_eq!(imp.invoke(Routine::Getrf, &mut call), 0);
            pivots.push(call.ipiv.expect("ipiv present"));
        }
        assert_eq!(pivots[0], pivots[1]);
        assert_eq!(pivots[0][0], 4);
    }

    #[test]
    fn singular_matrix_reports_first_zero_pivot() {
        for imp in Implementation::ALL {
            let mut call = Call::new(Dims::square(3), Options::default());
            let a = Fixture::<f64>::from_fn(3, 3, |i, j| match (i, j) {
                (_, 1) => 0.0,
                (i, j) if i == j => 2.0,
                _ => 0.5,
            });
            call.set_real(Slot::A, a);
            call.set_int(Slot::Ipiv, vec![0; 3]);
            assert_eq!(imp.invoke(Routine::Getrf, &mut call), 2);
        }
    }

    #[test]
    fn condition_estimate_of_identity_is_one() {
        for imp in Implementation::ALL {
            for norm in [Norm::One, Norm::Infinity] {
                let mut options = Options::default();
                options.norm = norm;
                let mut call = Call::new(Dims::square(4), options);
                call.set_real(Slot::A, Fixture::identity(4));
                call.set_int(Slot::Ipiv, vec![0; 4]);
                call.set_real(Slot::Anorm, Fixture::vector(vec![0.0]));
                call.set_real(Slot::Rcond, Fixture::vector(vec![0.0]));
                call.set_real(Slot::Work, Fixture::zeros(16, 1));
                call.set_int(Slot::Iwork, vec![0; 4]);
                assert_eq!(imp.invoke(Routine::Lange, &mut call), 0);
                assert_eq!(imp.invoke(Routine::Getrf, &mut call), 0);
                assert_eq!(imp.invoke(Routine::Gecon, &mut call), 0);
                let rcond = call.rcond.expect("rcond present").data()[0];
                assert!(approx_equal(rcond, 1.0, 1e-14));
            }
        }
    }

    #[test]
    fn gecon_rejects_short_workspace() {
        let mut call = Call::<f64>::new(Dims::square(4), Options::default());
        call.set_real(Slot::A, Fixture::identity(4));
        call.set_int(Slot::Ipiv, vec![1, 2, 3, 4]);
        call.set_real(Slot::Anorm, Fixture::vector(vec![1.0]));
        call.set_real(Slot::Rcond, Fixture::vector(vec![0.0]));
        call.set_real(Slot::Work, Fixture::zeros(15, 1));
        call.set_int(Slot::Iwork, vec![0; 4]);
        assert_eq!(Implementation::Reference.invoke(Routine::Gecon, &mut call), -7);
    }
}
