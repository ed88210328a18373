use lp_fixture::Real;

use crate::kernels::{dim, dot, fits, fmadd, householder, nrm2};
use crate::workspace::{WorkCheck, check_work};
use crate::{Call, Implementation, Routine};

/// Apply `H = I - tau * v * v^T`, `v = [1; tail]`, to `column` from the left.
fn reflect<T: Real>(imp: Implementation, tail: &[T], tau: T, column: &mut [T]) {
    if tau == T::ZERO {
        return;
    }
    let (head, rest) = column.split_at_mut(1);
    let w = head[0] + dot(imp, tail.len(), |t| tail[t], |t| rest[t]);
    let scaled = tau * w;
    head[0] -= scaled;
    for (value, v) in rest.iter_mut().zip(tail) {
        *value = fmadd(imp, -scaled, *v, *value);
    }
}

/// Householder step `i` of an `m x n` QR factorization: reflector `i` is
/// stored below the diagonal of column `i`, its `tau` is returned.
fn factor_column<T: Real>(
    imp: Implementation,
    m: usize,
    n: usize,
    a: &mut [T],
    lda: usize,
    i: usize,
) -> T {
    let (head, tail) = a[i + i * lda..m + i * lda].split_at_mut(1);
    let (beta, tau) = householder(imp, head[0], tail);
    head[0] = beta;
    let v = tail.to_vec();
    for c in i + 1..n {
        reflect(imp, &v, tau, &mut a[i + c * lda..m + c * lda]);
    }
    tau
}

pub(crate) fn geqrf<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if dims.m < 0 {
        return -1;
    }
    if dims.n < 0 {
        return -2;
    }
    let (m, n) = (dim(dims.m), dim(dims.n));
    let Some(a) = call.a.as_mut() else { return -3 };
    if !fits(a, m, n) {
        return -4;
    }
    let Some(tau) = call.tau.as_mut() else { return -5 };
    if tau.len() < m.min(n) {
        return -5;
    }
    match check_work(Routine::Geqrf, imp, &dims, call.lwork, call.work.as_mut(), 7) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    let lda = a.ld();
    let data = a.data_mut();
    let taus = tau.data_mut();
    for i in 0..m.min(n) {
        taus[i] = factor_column(imp, m, n, data, lda, i);
    }
    0
}

/// Form the first `n` columns of `Q` from `k` reflectors left by [`geqrf`].
pub(crate) fn orgqr<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if dims.m < 0 {
        return -1;
    }
    if dims.n < 0 || dims.n > dims.m {
        return -2;
    }
    if dims.k < 0 || dims.k > dims.n {
        return -3;
    }
    let (m, n, k) = (dim(dims.m), dim(dims.n), dim(dims.k));
    let Some(a) = call.a.as_mut() else { return -4 };
    if !fits(a, m, n) {
        return -5;
    }
    let Some(tau) = call.tau.as_ref() else { return -6 };
    if tau.len() < k {
        return -6;
    }
    match check_work(Routine::Orgqr, imp, &dims, call.lwork, call.work.as_mut(), 8) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    if n == 0 {
        return 0;
    }
    let lda = a.ld();
    let data = a.data_mut();
    let taus = tau.data();
    for j in k..n {
        data[j * lda..j * lda + m].fill(T::ZERO);
        data[j + j * lda] = T::ONE;
    }
    for i in (0..k).rev() {
        let t = taus[i];
        let v = data[i + 1 + i * lda..m + i * lda].to_vec();
        if i + 1 < n {
            data[i + i * lda] = T::ONE;
            for c in i + 1..n {
                reflect(imp, &v, t, &mut data[i + c * lda..m + c * lda]);
            }
        }
        for value in &mut data[i + 1 + i * lda..m + i * lda] {
            *value *= -t;
        }
        data[i + i * lda] = T::ONE - t;
        data[i * lda..i + i * lda].fill(T::ZERO);
    }
    0
}

/// Least squares `min ||A x - b||` by QR with column pivoting.
///
/// The effective rank is the number of leading `|R(i,i)|` above
/// `rcond * |R(0,0)|`; the candidate scales that threshold by
/// `sqrt(max(m, n))`. Columns beyond the rank get a zero component (basic
/// solution). The `jpvt` input is ignored and overwritten with the 1-based
/// pivot order.
pub(crate) fn gelsy<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if dims.m < 0 {
        return -1;
    }
    if dims.n < 0 {
        return -2;
    }
    if dims.nrhs < 0 {
        return -3;
    }
    let (m, n, nrhs) = (dim(dims.m), dim(dims.n), dim(dims.nrhs));
    let Some(a) = call.a.as_mut() else { return -4 };
    if !fits(a, m, n) {
        return -5;
    }
    let Some(b) = call.b.as_mut() else { return -6 };
    if b.ld() < m.max(n).max(1) || b.len() < b.ld() * nrhs {
        return -7;
    }
    let Some(jpvt) = call.jpvt.as_mut() else { return -8 };
    if jpvt.len() < n {
        return -8;
    }
    let rcond = T::from_f64(call.scalars.rcond);
    if !(rcond >= T::ZERO) {
        return -9;
    }
    let Some(rank_out) = call.rank.as_mut() else { return -10 };
    if rank_out.is_empty() {
        return -10;
    }
    match check_work(Routine::Gelsy, imp, &dims, call.lwork, call.work.as_mut(), 12) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    let mn = m.min(n);
    let lda = a.ld();
    let ldb = b.ld();
    let data = a.data_mut();
    let rhs = b.data_mut();

    let mut order: Vec<usize> = (0..n).collect();
    let mut taus = vec![T::ZERO; mn];
    for i in 0..mn {
        let norms: Vec<T> = (i..n)
            .map(|c| nrm2(imp, m - i, |t| data[i + t + c * lda]))
            .collect();
        let mut best = 0;
        for (offset, norm) in norms.iter().enumerate() {
            if *norm > norms[best] {
                best = offset;
            }
        }
        let p = i + best;
        if p != i {
            for r in 0..m {
                data.swap(r + i * lda, r + p * lda);
            }
            order.swap(i, p);
        }
        taus[i] = factor_column(imp, m, n, data, lda, i);
    }
    for (slot, column) in jpvt.iter_mut().zip(&order) {
        *slot = i32::try_from(column + 1).unwrap_or(i32::MAX);
    }

    let r00 = if mn > 0 { data[0].abs() } else { T::ZERO };
    let threshold = match imp {
        Implementation::Reference => rcond * r00,
        Implementation::Candidate => rcond * r00 * T::from_usize(m.max(n).max(1)).sqrt(),
    };
    let rank = if r00 == T::ZERO {
        0
    } else {
        (0..mn)
            .take_while(|&i| data[i + i * lda].abs() > threshold)
            .count()
    };
    rank_out[0] = i32::try_from(rank).unwrap_or(i32::MAX);

    let mut solution = vec![T::ZERO; n];
    for c in 0..nrhs {
        let column = &mut rhs[c * ldb..c * ldb + m.max(n)];
        for (i, tau) in taus.iter().enumerate() {
            let tail = &data[i + 1 + i * lda..m + i * lda];
            reflect(imp, tail, *tau, &mut column[i..m]);
        }
        solution.fill(T::ZERO);
        for i in (0..rank).rev() {
            let s = dot(imp, rank - i - 1, |t| data[i + (i + 1 + t) * lda], |t| {
                solution[i + 1 + t]
            });
            solution[i] = (column[i] - s) / data[i + i * lda];
        }
        for (position, value) in order.iter().zip(&solution) {
            column[*position] = *value;
        }
        for value in &mut column[n..] {
            *value = T::ZERO;
        }
    }
    0
}
