use lp_fixture::{Real, StorageKind};

use crate::kernels::{dim, fmadd};
use crate::{Call, Implementation};

/// General tridiagonal solve by Gaussian elimination with partial pivoting.
///
/// The `t` fixture is overwritten: the diagonal with `U`'s diagonal, the
/// super-diagonal with `U`'s first super-diagonal and the sub-diagonal with
/// the fill-in second super-diagonal. `b` is overwritten with the solution.
pub(crate) fn gtsv<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.n < 0 {
        return -1;
    }
    if call.dims.nrhs < 0 {
        return -2;
    }
    let (n, nrhs) = (dim(call.dims.n), dim(call.dims.nrhs));
    let Some(t) = call.t.as_mut() else { return -3 };
    if t.kind() != StorageKind::Tridiagonal || t.rows() != n {
        return -4;
    }
    let Some(b) = call.b.as_mut() else { return -6 };
    if b.ld() < n.max(1) || b.len() < b.ld() * nrhs {
        return -7;
    }
    if n == 0 {
        return 0;
    }
    let ldb = b.ld();
    let b = b.data_mut();
    let (dl, d, du) = t.tridiagonal_parts_mut();

    for i in 0..n - 1 {
        if d[i].abs() >= dl[i].abs() {
            if d[i] == T::ZERO {
                return info_at(i);
            }
            let fact = dl[i] / d[i];
            d[i + 1] = fmadd(imp, -fact, du[i], d[i + 1]);
            for c in 0..nrhs {
                let col = c * ldb;
                b[col + i + 1] = fmadd(imp, -fact, b[col + i], b[col + i + 1]);
            }
            if i + 2 < n {
                dl[i] = T::ZERO;
            }
        } else {
            let fact = d[i] / dl[i];
            d[i] = dl[i];
            let temp = d[i + 1];
            d[i + 1] = fmadd(imp, -fact, temp, du[i]);
            if i + 2 < n {
                dl[i] = du[i + 1];
                du[i + 1] = -fact * dl[i];
            }
            du[i] = temp;
            for c in 0..nrhs {
                let col = c * ldb;
                let upper = b[col + i];
                b[col + i] = b[col + i + 1];
                b[col + i + 1] = fmadd(imp, -fact, b[col + i + 1], upper);
            }
        }
    }
    if d[n - 1] == T::ZERO {
        return info_at(n - 1);
    }

    for c in 0..nrhs {
        let x = &mut b[c * ldb..c * ldb + n];
        x[n - 1] /= d[n - 1];
        if n > 1 {
            x[n - 2] = fmadd(imp, -du[n - 2], x[n - 1], x[n - 2]) / d[n - 2];
        }
        for i in (0..n.saturating_sub(2)).rev() {
            let partial = fmadd(imp, -du[i], x[i + 1], x[i]);
            x[i] = fmadd(imp, -dl[i], x[i + 2], partial) / d[i];
        }
    }
    0
}

fn info_at(i: usize) -> i32 {
    i32::try_from(i + 1).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use crate::{Call, Dims, Implementation, Options, Routine, Slot};
    use lp_fixture::{Fixture, generate};

    fn approx_equal(lhs: f64, rhs: f64, tol: f64) -> bool {
        (lhs - rhs).abs() <= tol
    }

    fn solve(imp: Implementation, tri: &Fixture<f64>, rhs: Fixture<f64>) -> (i32, Fixture<f64>) {
        let n = tri.rows();
        let mut call = Call::new(Dims::square(n).with_rhs(rhs.cols()), Options::default());
        call.set_real(Slot::T, tri.clone());
        call.set_real(Slot::B, rhs);
        let status = imp.invoke(Routine::Gtsv, &mut call);
        (status, call.b.expect("b present"))
    }

    #[test]
    fn solves_diagonally_dominant_system() {
        let tri = generate::tridiagonal::<f64>(8);
        let dense = tri.to_dense();
        for imp in Implementation::ALL {
            let (status, x) = solve(imp, &tri, generate::ramp(8, 1.0));
            assert_eq!(status, 0);
            let product = dense.matmul(&x);
            for i in 0..8 {
                assert!(approx_equal(product.get(i, 0), (i + 1) as f64, 1e-13));
            }
        }
    }

    #[test]
    fn pivots_when_sub_diagonal_dominates() {
        let sub = vec![5.0, 4.0, 6.0];
        let diag = vec![1.0, 0.5, 1.0, 2.0];
        let tri = Fixture::tridiagonal(sub, diag, vec![1.0; 3]);
        let dense = tri.to_dense();
        let rhs = Fixture::from_fn(4, 2, |i, j| (i + 1) as f64 * (j + 1) as f64);
        for imp in Implementation::ALL {
            let (status, x) = solve(imp, &tri, rhs.clone());
            assert_eq!(status, 0);
            let product = dense.matmul(&x);
            for j in 0..2 {
                for i in 0..4 {
                    assert!(approx_equal(product.get(i, j), rhs.get(i, j), 1e-12));
                }
            }
        }
    }

    #[test]
    fn zero_column_reports_position() {
        let tri = Fixture::tridiagonal(vec![0.0, 1.0], vec![0.0, 1.0, 1.0], vec![1.0, 1.0]);
        for imp in Implementation::ALL {
            let (status, _) = solve(imp, &tri, generate::ramp(3, 1.0));
            assert_eq!(status, 1);
        }
    }

    #[test]
    fn wrong_storage_is_rejected() {
        let mut call = Call::<f64>::new(Dims::square(3).with_rhs(1), Options::default());
        call.set_real(Slot::T, Fixture::identity(3));
        call.set_real(Slot::B, generate::ramp(3, 1.0));
        assert_eq!(Implementation::Reference.invoke(Routine::Gtsv, &mut call), -4);
    }
}
