use lp_fixture::Real;

use crate::kernels::{dim, dot, fits};
use crate::workspace::{WorkCheck, check_work};
use crate::{Call, Implementation, Job, Routine};

const MAX_SWEEPS: usize = 75;

/// `A = U diag(sigma) V^T` for a column-major `rows x cols` matrix with
/// `rows >= cols`. `u` is `rows x cols`, `v` is `cols x cols`.
struct Decomposition<T> {
    info: i32,
    u: Vec<T>,
    sigma: Vec<T>,
    v: Vec<T>,
}

fn rotate_columns<T: Real>(data: &mut [T], len: usize, p: usize, q: usize, c: T, s: T) {
    for k in 0..len {
        let xp = data[k + p * len];
        let xq = data[k + q * len];
        data[k + p * len] = c * xp - s * xq;
        data[k + q * len] = s * xp + c * xq;
    }
}

/// One-sided Jacobi: orthogonalize the columns of `A` by plane rotations.
/// The candidate visits column pairs in reverse order and leaves the
/// singular values in column order; the reference sorts them descending.
fn one_sided_jacobi<T: Real>(
    imp: Implementation,
    rows: usize,
    cols: usize,
    mut u: Vec<T>,
) -> Decomposition<T> {
    let mut v = vec![T::ZERO; cols * cols];
    for i in 0..cols {
        v[i + i * cols] = T::ONE;
    }
    let pairs: Vec<(usize, usize)> = {
        let mut pairs: Vec<_> = (0..cols)
            .flat_map(|p| (p + 1..cols).map(move |q| (p, q)))
            .collect();
        if imp == Implementation::Candidate {
            pairs.reverse();
        }
        pairs
    };

    let mut unconverged = pairs.len();
    for _ in 0..MAX_SWEEPS {
        unconverged = 0;
        for &(p, q) in &pairs {
            let column = |j: usize, k: usize| u[k + j * rows];
            let alpha = dot(imp, rows, |k| column(p, k), |k| column(p, k));
            let beta = dot(imp, rows, |k| column(q, k), |k| column(q, k));
            let gamma = dot(imp, rows, |k| column(p, k), |k| column(q, k));
            if gamma == T::ZERO || gamma.abs() <= T::EPSILON * (alpha * beta).sqrt() {
                continue;
            }
            unconverged += 1;
            let zeta = (beta - alpha) / (T::TWO * gamma);
            let t = T::ONE.copysign(zeta) / (zeta.abs() + zeta.hypot(T::ONE));
            let c = T::ONE / t.hypot(T::ONE);
            let s = c * t;
            rotate_columns(&mut u, rows, p, q, c, s);
            rotate_columns(&mut v, cols, p, q, c, s);
        }
        if unconverged == 0 {
            break;
        }
    }

    let mut sigma: Vec<T> = (0..cols)
        .map(|j| dot(imp, rows, |k| u[k + j * rows], |k| u[k + j * rows]).sqrt())
        .collect();
    let largest = sigma.iter().fold(T::ZERO, |acc, s| acc.max(*s));
    let negligible = T::EPSILON * largest * T::from_usize(rows.max(1));
    let mut pending = Vec::new();
    for (j, value) in sigma.iter_mut().enumerate() {
        if *value > negligible && *value > T::ZERO {
            let scale = T::ONE / *value;
            for entry in &mut u[j * rows..(j + 1) * rows] {
                *entry *= scale;
            }
        } else {
            *value = T::ZERO;
            pending.push(j);
        }
    }
    complete_basis(imp, rows, cols, &mut u, &pending);

    let mut out = Decomposition {
        info: i32::try_from(unconverged).unwrap_or(i32::MAX),
        u,
        sigma,
        v,
    };
    if imp == Implementation::Reference {
        sort_descending(&mut out, rows, cols);
    }
    out
}

/// Replace the columns in `pending` by unit vectors orthogonal to the rest.
fn complete_basis<T: Real>(
    imp: Implementation,
    rows: usize,
    cols: usize,
    u: &mut [T],
    pending: &[usize],
) {
    let mut settled: Vec<usize> = (0..cols).filter(|j| !pending.contains(j)).collect();
    for &j in pending {
        let mut best = vec![T::ZERO; rows];
        let mut best_norm = T::ZERO;
        for k in 0..rows {
            let mut trial = vec![T::ZERO; rows];
            trial[k] = T::ONE;
            for _ in 0..2 {
                for &other in &settled {
                    let basis = &u[other * rows..(other + 1) * rows];
                    let projection = dot(imp, rows, |t| basis[t], |t| trial[t]);
                    for (value, b) in trial.iter_mut().zip(basis) {
                        *value -= projection * *b;
                    }
                }
            }
            let norm = dot(imp, rows, |t| trial[t], |t| trial[t]).sqrt();
            if norm > best_norm {
                best_norm = norm;
                best = trial;
            }
        }
        if best_norm > T::ZERO {
            for (target, value) in u[j * rows..(j + 1) * rows].iter_mut().zip(&best) {
                *target = *value / best_norm;
            }
        }
        settled.push(j);
    }
}

fn sort_descending<T: Real>(out: &mut Decomposition<T>, rows: usize, cols: usize) {
    for i in 0..cols.saturating_sub(1) {
        let mut k = i;
        for j in i + 1..cols {
            if out.sigma[j] > out.sigma[k] {
                k = j;
            }
        }
        if k != i {
            out.sigma.swap(i, k);
            for r in 0..rows {
                out.u.swap(r + i * rows, r + k * rows);
            }
            for r in 0..cols {
                out.v.swap(r + i * cols, r + k * cols);
            }
        }
    }
}

/// Singular value decomposition `A = U diag(S) VT` with thin factors
/// (`U` is `m x min(m,n)`, `VT` is `min(m,n) x n`) when vectors are asked for.
pub(crate) fn gesvd<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    let options = call.options;
    if dims.m < 0 {
        return -3;
    }
    if dims.n < 0 {
        return -4;
    }
    let (m, n) = (dim(dims.m), dim(dims.n));
    let mn = m.min(n);
    let Some(a) = call.a.as_ref() else { return -5 };
    if !fits(a, m, n) {
        return -6;
    }
    let Some(s) = call.s.as_mut() else { return -7 };
    if s.len() < mn {
        return -7;
    }
    let want_u = options.jobu == Job::Vectors;
    let want_vt = options.jobvt == Job::Vectors;
    if want_u && !call.u.as_ref().is_some_and(|u| fits(u, m, mn)) {
        return -9;
    }
    if want_vt && !call.vt.as_ref().is_some_and(|vt| fits(vt, mn, n)) {
        return -11;
    }
    match check_work(Routine::Gesvd, imp, &dims, call.lwork, call.work.as_mut(), 13) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    if mn == 0 {
        return 0;
    }

    let lda = a.ld();
    let transposed = m < n;
    let (rows, cols) = if transposed { (n, m) } else { (m, n) };
    let input: Vec<T> = (0..cols)
        .flat_map(|j| (0..rows).map(move |i| (i, j)))
        .map(|(i, j)| {
            if transposed {
                a.data()[j + i * lda]
            } else {
                a.data()[i + j * lda]
            }
        })
        .collect();
    let out = one_sided_jacobi(imp, rows, cols, input);
    s.data_mut()[..mn].copy_from_slice(&out.sigma);

    // left factor is `u` for tall input, `v` for wide input
    let left = |i: usize, j: usize| {
        if transposed {
            out.v[i + j * cols]
        } else {
            out.u[i + j * rows]
        }
    };
    let right = |i: usize, j: usize| {
        if transposed {
            out.u[j + i * rows]
        } else {
            out.v[j + i * cols]
        }
    };
    if let (true, Some(u)) = (want_u, call.u.as_mut()) {
        let ldu = u.ld();
        let data = u.data_mut();
        for j in 0..mn {
            for i in 0..m {
                data[i + j * ldu] = left(i, j);
            }
        }
    }
    if let (true, Some(vt)) = (want_vt, call.vt.as_mut()) {
        let ldvt = vt.ld();
        let data = vt.data_mut();
        for j in 0..n {
            for i in 0..mn {
                data[i + j * ldvt] = right(i, j);
            }
        }
    }
    out.info
}
