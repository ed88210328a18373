//! Eigenvalues of general matrices and pencils.
//!
//! Only eigenvalues are computed; asking for eigenvectors is reported as an
//! illegal `jobvr` argument. The candidate runs on the transpose and
//! returns generalized eigenvalues as the negated pair `(-alpha, -beta)` in
//! reverse order, so element-wise comparison of raw outputs is meaningless
//! and results must be canonicalized first.

use lp_fixture::{Fixture, Real};

use crate::kernels::{dim, fits};
use crate::lu;
use crate::workspace::{WorkCheck, check_work};
use crate::{Call, Implementation, Job, Routine, Trans};

/// Reduce a column-major `n x n` matrix to upper Hessenberg form in place.
fn hessenberg<T: Real>(n: usize, h: &mut [T]) {
    if n < 3 {
        return;
    }
    let at = |i: usize, j: usize| i + j * n;
    let high = n - 1;
    let mut ort = vec![T::ZERO; n];
    for m in 1..high {
        let scale = (m..=high).fold(T::ZERO, |acc, i| acc + h[at(i, m - 1)].abs());
        if scale == T::ZERO {
            continue;
        }
        let mut sum = T::ZERO;
        for i in (m..=high).rev() {
            ort[i] = h[at(i, m - 1)] / scale;
            sum += ort[i] * ort[i];
        }
        let mut g = sum.sqrt();
        if ort[m] > T::ZERO {
            g = -g;
        }
        sum -= ort[m] * g;
        ort[m] -= g;
        for j in m..n {
            let mut f = T::ZERO;
            for i in (m..=high).rev() {
                f += ort[i] * h[at(i, j)];
            }
            f /= sum;
            for i in m..=high {
                h[at(i, j)] -= f * ort[i];
            }
        }
        for i in 0..=high {
            let mut f = T::ZERO;
            for j in (m..=high).rev() {
                f += ort[j] * h[at(i, j)];
            }
            f /= sum;
            for j in m..=high {
                h[at(i, j)] -= f * ort[j];
            }
        }
        ort[m] *= scale;
        h[at(m, m - 1)] = scale * g;
    }
}

/// Eigenvalues `(re, im)` of an upper Hessenberg matrix by the shifted
/// double-step QR iteration. On failure returns the 1-based index of the
/// eigenvalue that did not converge.
#[allow(clippy::many_single_char_names)]
fn hessenberg_eigenvalues<T: Real>(nn: usize, h: &mut [T]) -> Result<(Vec<T>, Vec<T>), i32> {
    let mut wr = vec![T::ZERO; nn];
    let mut wi = vec![T::ZERO; nn];
    if nn == 0 {
        return Ok((wr, wi));
    }
    let at = |i: usize, j: usize| i + j * nn;
    let eps = T::EPSILON;
    let max_iterations = 30 * nn;
    let half = T::ONE / T::TWO;

    let mut norm = T::ZERO;
    for i in 0..nn {
        for j in i.saturating_sub(1)..nn {
            norm += h[at(i, j)].abs();
        }
    }

    let mut n = nn - 1;
    let mut exshift = T::ZERO;
    let mut iter = 0;
    let mut total = 0;
    let (mut p, mut q, mut r, mut s, mut z) = (T::ZERO, T::ZERO, T::ZERO, T::ZERO, T::ZERO);
    let (mut w, mut x, mut y) = (T::ZERO, T::ZERO, T::ZERO);
    loop {
        // small sub-diagonal element
        let mut l = n;
        while l > 0 {
            s = h[at(l - 1, l - 1)].abs() + h[at(l, l)].abs();
            if s == T::ZERO {
                s = norm;
            }
            if h[at(l, l - 1)].abs() < eps * s {
                break;
            }
            l -= 1;
        }

        if l == n {
            h[at(n, n)] += exshift;
            wr[n] = h[at(n, n)];
            wi[n] = T::ZERO;
            iter = 0;
            if n == 0 {
                break;
            }
            n -= 1;
        } else if l + 1 == n {
            w = h[at(n, n - 1)] * h[at(n - 1, n)];
            p = (h[at(n - 1, n - 1)] - h[at(n, n)]) * half;
            q = p * p + w;
            z = q.abs().sqrt();
            h[at(n, n)] += exshift;
            h[at(n - 1, n - 1)] += exshift;
            x = h[at(n, n)];
            if q >= T::ZERO {
                z = if p >= T::ZERO { p + z } else { p - z };
                wr[n - 1] = x + z;
                wr[n] = wr[n - 1];
                if z != T::ZERO {
                    wr[n] = x - w / z;
                }
                wi[n - 1] = T::ZERO;
                wi[n] = T::ZERO;
                x = h[at(n, n - 1)];
                s = x.abs() + z.abs();
                p = x / s;
                q = z / s;
                r = p.hypot(q);
                p /= r;
                q /= r;
                for j in n - 1..nn {
                    z = h[at(n - 1, j)];
                    h[at(n - 1, j)] = q * z + p * h[at(n, j)];
                    h[at(n, j)] = q * h[at(n, j)] - p * z;
                }
                for i in 0..=n {
                    z = h[at(i, n - 1)];
                    h[at(i, n - 1)] = q * z + p * h[at(i, n)];
                    h[at(i, n)] = q * h[at(i, n)] - p * z;
                }
            } else {
                wr[n - 1] = x + p;
                wr[n] = x + p;
                wi[n - 1] = z;
                wi[n] = -z;
            }
            iter = 0;
            if n == 1 {
                break;
            }
            n -= 2;
        } else {
            total += 1;
            if total > max_iterations {
                return Err(i32::try_from(n + 1).unwrap_or(i32::MAX));
            }
            x = h[at(n, n)];
            y = h[at(n - 1, n - 1)];
            w = h[at(n, n - 1)] * h[at(n - 1, n)];

            // exceptional shifts
            if iter == 10 {
                exshift += x;
                for i in 0..=n {
                    h[at(i, i)] -= x;
                }
                s = h[at(n, n - 1)].abs() + h[at(n - 1, n - 2)].abs();
                x = T::from_f64(0.75) * s;
                y = x;
                w = T::from_f64(-0.4375) * s * s;
            }
            if iter == 30 {
                s = (y - x) * half;
                s = s * s + w;
                if s > T::ZERO {
                    s = s.sqrt();
                    if y < x {
                        s = -s;
                    }
                    s = x - w / ((y - x) * half + s);
                    for i in 0..=n {
                        h[at(i, i)] -= s;
                    }
                    exshift += s;
                    x = T::from_f64(0.964);
                    y = x;
                    w = x;
                }
            }
            iter += 1;

            // two consecutive small sub-diagonal elements
            let mut m = n - 2;
            loop {
                z = h[at(m, m)];
                r = x - z;
                s = y - z;
                p = (r * s - w) / h[at(m + 1, m)] + h[at(m, m + 1)];
                q = h[at(m + 1, m + 1)] - z - r - s;
                r = h[at(m + 2, m + 1)];
                s = p.abs() + q.abs() + r.abs();
                p /= s;
                q /= s;
                r /= s;
                if m == l {
                    break;
                }
                let lhs = h[at(m, m - 1)].abs() * (q.abs() + r.abs());
                let rhs = eps
                    * (p.abs() * (h[at(m - 1, m - 1)].abs() + z.abs() + h[at(m + 1, m + 1)].abs()));
                if lhs < rhs {
                    break;
                }
                m -= 1;
            }
            for i in m + 2..=n {
                h[at(i, i - 2)] = T::ZERO;
                if i > m + 2 {
                    h[at(i, i - 3)] = T::ZERO;
                }
            }

            // double QR step on rows l..=n and columns m..=n
            for k in m..n {
                let notlast = k + 1 != n;
                if k != m {
                    p = h[at(k, k - 1)];
                    q = h[at(k + 1, k - 1)];
                    r = if notlast { h[at(k + 2, k - 1)] } else { T::ZERO };
                    x = p.abs() + q.abs() + r.abs();
                    if x == T::ZERO {
                        continue;
                    }
                    p /= x;
                    q /= x;
                    r /= x;
                }
                s = (p * p + q * q + r * r).sqrt();
                if p < T::ZERO {
                    s = -s;
                }
                if s == T::ZERO {
                    continue;
                }
                if k != m {
                    h[at(k, k - 1)] = -s * x;
                } else if l != m {
                    h[at(k, k - 1)] = -h[at(k, k - 1)];
                }
                p += s;
                x = p / s;
                y = q / s;
                z = r / s;
                q /= p;
                r /= p;
                for j in k..nn {
                    p = h[at(k, j)] + q * h[at(k + 1, j)];
                    if notlast {
                        p += r * h[at(k + 2, j)];
                        h[at(k + 2, j)] -= p * z;
                    }
                    h[at(k, j)] -= p * x;
                    h[at(k + 1, j)] -= p * y;
                }
                for i in 0..=n.min(k + 3) {
                    p = x * h[at(i, k)] + y * h[at(i, k + 1)];
                    if notlast {
                        p += z * h[at(i, k + 2)];
                        h[at(i, k + 2)] -= p * r;
                    }
                    h[at(i, k)] -= p;
                    h[at(i, k + 1)] -= p * q;
                }
            }
        }
    }
    Ok((wr, wi))
}

fn eigenvalues<T: Real>(n: usize, mut dense: Vec<T>) -> Result<(Vec<T>, Vec<T>), i32> {
    hessenberg(n, &mut dense);
    hessenberg_eigenvalues(n, &mut dense)
}

/// Column-major copy of the leading `n x n` block, transposed on request.
fn square_copy<T: Real>(fixture: &Fixture<T>, n: usize, transpose: bool) -> Vec<T> {
    let ld = fixture.ld();
    let data = fixture.data();
    let mut out = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            out.push(if transpose { data[j + i * ld] } else { data[i + j * ld] });
        }
    }
    out
}

pub(crate) fn geev<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if call.options.jobz == Job::Vectors {
        return -2;
    }
    if dims.n < 0 {
        return -3;
    }
    let n = dim(dims.n);
    let Some(a) = call.a.as_ref() else { return -4 };
    if !fits(a, n, n) {
        return -5;
    }
    let Some(wr_out) = call.w.as_mut() else { return -6 };
    if wr_out.len() < n {
        return -6;
    }
    let Some(wi_out) = call.wi.as_mut() else { return -7 };
    if wi_out.len() < n {
        return -7;
    }
    match check_work(Routine::Geev, imp, &dims, call.lwork, call.work.as_mut(), 13) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    let dense = square_copy(a, n, imp == Implementation::Candidate);
    match eigenvalues(n, dense) {
        Ok((wr, wi)) => {
            wr_out.data_mut()[..n].copy_from_slice(&wr);
            wi_out.data_mut()[..n].copy_from_slice(&wi);
            0
        }
        Err(info) => info,
    }
}

fn is_upper_triangular<T: Real>(n: usize, dense: &[T]) -> bool {
    (0..n).all(|j| (j + 1..n).all(|i| dense[i + j * n] == T::ZERO))
}

/// Generalized eigenvalues `lambda = (alphar + i*alphai) / beta` of the
/// pencil `(A, B)`. Triangular pencils are read off the diagonals, which
/// admits `beta = 0` (infinite eigenvalues). Otherwise `B` must be
/// nonsingular; a singular non-triangular `B` returns `n + 1`.
pub(crate) fn ggev<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if call.options.jobz == Job::Vectors {
        return -2;
    }
    if dims.n < 0 {
        return -3;
    }
    let n = dim(dims.n);
    let Some(a) = call.a.as_ref() else { return -4 };
    if !fits(a, n, n) {
        return -5;
    }
    let Some(b) = call.b.as_ref() else { return -6 };
    if !fits(b, n, n) {
        return -7;
    }
    if !call.alphar.as_ref().is_some_and(|v| v.len() >= n) {
        return -8;
    }
    if !call.alphai.as_ref().is_some_and(|v| v.len() >= n) {
        return -9;
    }
    if !call.beta.as_ref().is_some_and(|v| v.len() >= n) {
        return -10;
    }
    match check_work(Routine::Ggev, imp, &dims, call.lwork, call.work.as_mut(), 16) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    if n == 0 {
        return 0;
    }

    let mut lhs = square_copy(a, n, false);
    let mut rhs = square_copy(b, n, false);
    let triangular = is_upper_triangular(n, &lhs) && is_upper_triangular(n, &rhs);
    let (mut alphar, mut alphai, mut beta) = if triangular {
        let diagonal = |m: &[T]| (0..n).map(|i| m[i + i * n]).collect::<Vec<_>>();
        (diagonal(&lhs), vec![T::ZERO; n], diagonal(&rhs))
    } else {
        let mut ipiv = vec![0; n];
        if lu::factor(imp, n, n, &mut rhs, n, &mut ipiv) != 0 {
            return i32::try_from(n + 1).unwrap_or(i32::MAX);
        }
        for column in lhs.chunks_mut(n) {
            lu::solve(imp, Trans::No, n, &rhs, n, &ipiv, column);
        }
        if imp == Implementation::Candidate {
            lhs = (0..n * n).map(|k| lhs[k / n + (k % n) * n]).collect();
        }
        match eigenvalues(n, lhs) {
            Ok((wr, wi)) => (wr, wi, vec![T::ONE; n]),
            Err(info) => return info,
        }
    };

    if imp == Implementation::Candidate {
        for values in [&mut alphar, &mut alphai, &mut beta] {
            values.reverse();
            for value in values.iter_mut() {
                *value = -*value;
            }
        }
    }
    for (slot, values) in [
        (call.alphar.as_mut(), &alphar),
        (call.alphai.as_mut(), &alphai),
        (call.beta.as_mut(), &beta),
    ] {
        if let Some(out) = slot {
            out.data_mut()[..n].copy_from_slice(values);
        }
    }
    0
}
