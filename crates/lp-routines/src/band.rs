use lp_fixture::{BandLayout, Fixture, Real, StorageKind};

use crate::blas::band_matvec;
use crate::kernels::{dim, dot, estimate_one_norm, fmadd, iamax};
use crate::lu::valid_pivots;
use crate::{Call, Implementation, Trans};

/// Shape of a band LU factorization: `A(i, j)` lives at
/// `ab[kv + i - j + j * ldab]` with `kv = kl + ku`.
#[derive(Clone, Copy)]
struct BandShape {
    n: usize,
    kl: usize,
    ku: usize,
    ldab: usize,
}

impl BandShape {
    fn kv(self) -> usize {
        self.kl + self.ku
    }

    fn at(self, row: usize, col: usize) -> usize {
        row + col * self.ldab
    }
}

fn band_fits<T: Real>(band: &Fixture<T>, ldab_min: usize, n: usize) -> bool {
    band.ld() >= ldab_min && band.len() >= band.ld() * n
}

/// Unblocked band LU with partial pivoting, `m x n`, into factor layout.
fn factor<T: Real>(
    imp: Implementation,
    m: usize,
    shape: BandShape,
    ab: &mut [T],
    ipiv: &mut [i32],
) -> i32 {
    let BandShape { n, kl, ku, .. } = shape;
    let kv = shape.kv();
    let at = |row: usize, col: usize| shape.at(row, col);

    // fill-in rows of the first columns
    for j in ku + 1..kv.min(n) {
        for i in kv - j..kl {
            ab[at(i, j)] = T::ZERO;
        }
    }

    let mut ju = 0;
    let mut info = 0;
    for j in 0..m.min(n) {
        if j + kv < n {
            for i in 0..kl {
                ab[at(i, j + kv)] = T::ZERO;
            }
        }
        let km = kl.min(m - j - 1);
        let jp = iamax(km + 1, |t| ab[at(kv + t, j)]);
        ipiv[j] = i32::try_from(j + jp + 1).unwrap_or(i32::MAX);
        if ab[at(kv + jp, j)] == T::ZERO {
            if info == 0 {
                info = i32::try_from(j + 1).unwrap_or(i32::MAX);
            }
            continue;
        }
        ju = ju.max((j + ku + jp).min(n - 1));
        if jp != 0 {
            for c in j..=ju {
                ab.swap(at(kv + jp + j - c, c), at(kv + j - c, c));
            }
        }
        if km == 0 {
            continue;
        }
        let pivot = ab[at(kv, j)];
        match imp {
            Implementation::Reference => {
                let r = T::ONE / pivot;
                for t in 1..=km {
                    ab[at(kv + t, j)] *= r;
                }
            }
            Implementation::Candidate => {
                for t in 1..=km {
                    ab[at(kv + t, j)] /= pivot;
                }
            }
        }
        for c in j + 1..=ju {
            let u = ab[at(kv + j - c, c)];
            if u == T::ZERO {
                continue;
            }
            for t in 1..=km {
                let l = ab[at(kv + t, j)];
                let idx = at(kv + t + j - c, c);
                ab[idx] = fmadd(imp, -l, u, ab[idx]);
            }
        }
    }
    info
}

/// Solve `op(A) x = b` for one right-hand side with band LU factors.
fn solve<T: Real>(
    imp: Implementation,
    trans: Trans,
    shape: BandShape,
    ab: &[T],
    ipiv: &[i32],
    b: &mut [T],
) {
    let BandShape { n, kl, .. } = shape;
    let kv = shape.kv();
    let u = |i: usize, c: usize| ab[shape.at(kv + i - c, c)];
    let l = |t: usize, j: usize| ab[shape.at(kv + t, j)];
    match trans {
        Trans::No => {
            if kl > 0 {
                for j in 0..n.saturating_sub(1) {
                    let lm = kl.min(n - j - 1);
                    let p = (ipiv[j] - 1) as usize;
                    if p != j {
                        b.swap(p, j);
                    }
                    let bj = b[j];
                    for t in 1..=lm {
                        b[j + t] = fmadd(imp, -l(t, j), bj, b[j + t]);
                    }
                }
            }
            match imp {
                Implementation::Reference => {
                    for c in (0..n).rev() {
                        b[c] /= u(c, c);
                        let bc = b[c];
                        for i in c.saturating_sub(kv)..c {
                            b[i] = fmadd(imp, -bc, u(i, c), b[i]);
                        }
                    }
                }
                Implementation::Candidate => {
                    for i in (0..n).rev() {
                        let last = (i + kv + 1).min(n);
                        let len = last - i - 1;
                        let s = dot(imp, len, |t| u(i, i + 1 + t), |t| b[i + 1 + t]);
                        b[i] = (b[i] - s) / u(i, i);
                    }
                }
            }
        }
        Trans::Transpose => {
            for c in 0..n {
                let first = c.saturating_sub(kv);
                let s = dot(imp, c - first, |t| u(first + t, c), |t| b[first + t]);
                b[c] = (b[c] - s) / u(c, c);
            }
            if kl > 0 {
                for j in (0..n.saturating_sub(1)).rev() {
                    let lm = kl.min(n - j - 1);
                    let s = dot(imp, lm, |t| l(t + 1, j), |t| b[j + 1 + t]);
                    b[j] -= s;
                    let p = (ipiv[j] - 1) as usize;
                    if p != j {
                        b.swap(p, j);
                    }
                }
            }
        }
    }
}

pub(crate) fn gbtrf<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if dims.m < 0 {
        return -1;
    }
    if dims.n < 0 {
        return -2;
    }
    if dims.kl < 0 {
        return -3;
    }
    if dims.ku < 0 {
        return -4;
    }
    let (m, n, kl, ku) = (dim(dims.m), dim(dims.n), dim(dims.kl), dim(dims.ku));
    let Some(ab) = call.ab.as_mut() else { return -5 };
    if !band_fits(ab, 2 * kl + ku + 1, n) {
        return -6;
    }
    let Some(ipiv) = call.ipiv.as_mut() else { return -7 };
    if ipiv.len() < m.min(n) {
        return -7;
    }
    if m == 0 || n == 0 {
        return 0;
    }
    let shape = BandShape {
        n,
        kl,
        ku,
        ldab: ab.ld(),
    };
    factor(imp, m, shape, ab.data_mut(), ipiv)
}

pub(crate) fn gbtrs<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    if dims.n < 0 {
        return -2;
    }
    if dims.kl < 0 {
        return -3;
    }
    if dims.ku < 0 {
        return -4;
    }
    if dims.nrhs < 0 {
        return -5;
    }
    let (n, kl, ku, nrhs) = (dim(dims.n), dim(dims.kl), dim(dims.ku), dim(dims.nrhs));
    let Some(ab) = call.ab.as_ref() else { return -6 };
    if !band_fits(ab, 2 * kl + ku + 1, n) {
        return -7;
    }
    let Some(ipiv) = call.ipiv.as_ref() else { return -8 };
    if ipiv.len() < n || !valid_pivots(ipiv, n) {
        return -8;
    }
    let Some(b) = call.b.as_mut() else { return -9 };
    if b.ld() < n.max(1) || b.len() < b.ld() * nrhs {
        return -10;
    }
    let shape = BandShape {
        n,
        kl,
        ku,
        ldab: ab.ld(),
    };
    let ldb = b.ld();
    for column in b.data_mut().chunks_mut(ldb).take(nrhs) {
        solve(imp, call.options.trans, shape, ab.data(), ipiv, &mut column[..n]);
    }
    0
}

/// Iterative refinement with forward and backward error bounds for a band
/// system already factored by [`gbtrf`].
///
/// `ab` holds the original matrix with the diagonal in row `ku`, or in row
/// `kl + ku` when the fixture declares the factor layout. `afb`, `ipiv`
/// hold the factors; `x` holds the solution to improve.
pub(crate) fn gbrfs<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    const ITMAX: usize = 5;

    let dims = call.dims;
    let trans = call.options.trans;
    if dims.n < 0 {
        return -2;
    }
    if dims.kl < 0 {
        return -3;
    }
    if dims.ku < 0 {
        return -4;
    }
    if dims.nrhs < 0 {
        return -5;
    }
    let (n, kl, ku, nrhs) = (dim(dims.n), dim(dims.kl), dim(dims.ku), dim(dims.nrhs));
    let Some(ab) = call.ab.as_ref() else { return -6 };
    if !band_fits(ab, kl + ku + 1, n) {
        return -7;
    }
    let Some(afb) = call.afb.as_ref() else { return -8 };
    if !band_fits(afb, 2 * kl + ku + 1, n) {
        return -9;
    }
    let Some(ipiv) = call.ipiv.as_ref() else { return -10 };
    if ipiv.len() < n || !valid_pivots(ipiv, n) {
        return -10;
    }
    let Some(b) = call.b.as_ref() else { return -11 };
    if b.ld() < n.max(1) || b.len() < b.ld() * nrhs {
        return -12;
    }
    let Some(x) = call.x.as_mut() else { return -13 };
    if x.ld() < n.max(1) || x.len() < x.ld() * nrhs {
        return -14;
    }
    let Some(ferr) = call.ferr.as_mut() else { return -15 };
    if ferr.len() < nrhs {
        return -15;
    }
    let Some(berr) = call.berr.as_mut() else { return -16 };
    if berr.len() < nrhs {
        return -16;
    }
    let Some(work) = call.work.as_mut() else { return -17 };
    if work.len() < 3 * n {
        return -17;
    }
    let Some(iwork) = call.iwork.as_ref() else { return -18 };
    if iwork.len() < n {
        return -18;
    }

    if n == 0 || nrhs == 0 {
        ferr.data_mut()[..nrhs].fill(T::ZERO);
        berr.data_mut()[..nrhs].fill(T::ZERO);
        return 0;
    }

    let offset = match ab.kind() {
        StorageKind::Banded {
            layout: BandLayout::Factor,
            ..
        } => kl,
        _ => 0,
    };
    let a = &ab.data()[offset..];
    let lda = ab.ld();
    let factors = afb.data();
    let shape = BandShape {
        n,
        kl,
        ku,
        ldab: afb.ld(),
    };
    let transt = match trans {
        Trans::No => Trans::Transpose,
        Trans::Transpose => Trans::No,
    };

    let nz = T::from_usize((kl + ku + 2).min(n + 1));
    let eps = T::EPSILON / T::TWO;
    let safe1 = nz * T::SAFE_MIN;
    let safe2 = safe1 / eps;

    let (ldb, ldx) = (b.ld(), x.ld());
    let (bound, rest) = work.data_mut().split_at_mut(n);
    let (residual, scratch) = rest.split_at_mut(n);
    let scratch = &mut scratch[..n];

    for column in 0..nrhs {
        let rhs = &b.data()[column * ldb..column * ldb + n];
        let mut count = 1;
        let mut lstres = T::from_usize(3);
        let backward = loop {
            let sol = &x.data()[column * ldx..column * ldx + n];
            residual.copy_from_slice(rhs);
            band_matvec(imp, trans, (n, n, kl, ku), -T::ONE, a, lda, sol, T::ONE, residual);

            for (i, value) in bound.iter_mut().enumerate() {
                *value = rhs[i].abs();
            }
            abs_band_matvec(trans, (n, kl, ku), a, lda, sol, bound);

            let mut s = T::ZERO;
            for i in 0..n {
                let ratio = if bound[i] > safe2 {
                    residual[i].abs() / bound[i]
                } else {
                    (residual[i].abs() + safe1) / (bound[i] + safe1)
                };
                s = s.max(ratio);
            }

            if s > eps && T::TWO * s <= lstres && count <= ITMAX {
                solve(imp, trans, shape, factors, ipiv, residual);
                let sol = &mut x.data_mut()[column * ldx..column * ldx + n];
                for (value, delta) in sol.iter_mut().zip(residual.iter()) {
                    *value += *delta;
                }
                lstres = s;
                count += 1;
                continue;
            }
            break s;
        };
        berr.data_mut()[column] = backward;

        for i in 0..n {
            let weighted = residual[i].abs() + nz * eps * bound[i];
            bound[i] = if bound[i] > safe2 {
                weighted
            } else {
                weighted + safe1
            };
        }

        let weights: &[T] = bound;
        let estimate = estimate_one_norm(n, residual, scratch, |transpose, v| {
            if transpose {
                for (value, w) in v.iter_mut().zip(weights) {
                    *value *= *w;
                }
                solve(imp, trans, shape, factors, ipiv, v);
            } else {
                solve(imp, transt, shape, factors, ipiv, v);
                for (value, w) in v.iter_mut().zip(weights) {
                    *value *= *w;
                }
            }
        });

        let sol = &x.data()[column * ldx..column * ldx + n];
        let xmax = sol.iter().fold(T::ZERO, |acc, v| acc.max(v.abs()));
        ferr.data_mut()[column] = if xmax > T::ZERO {
            estimate / xmax
        } else {
            estimate
        };
    }
    0
}

/// `y += |op(A)| |x|` over a plain band.
fn abs_band_matvec<T: Real>(
    trans: Trans,
    (n, kl, ku): (usize, usize, usize),
    ab: &[T],
    ldab: usize,
    x: &[T],
    y: &mut [T],
) {
    let entry = |i: usize, j: usize| ab[ku + i - j + j * ldab].abs();
    for j in 0..n {
        for i in j.saturating_sub(ku)..(j + kl + 1).min(n) {
            match trans {
                Trans::No => y[i] += entry(i, j) * x[j].abs(),
                Trans::Transpose => y[j] += entry(i, j) * x[i].abs(),
            }
        }
    }
}
