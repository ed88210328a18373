use lp_fixture::{Real, Uplo, packed_index, packed_len};

use crate::kernels::{dim, dot, fits, fmadd};
use crate::{Call, Implementation};

/// Storage offset of `U(i, j)`, `i <= j`, for either triangle: the lower
/// factor is handled as `L = U^T`.
fn dense_index(uplo: Uplo, lda: usize) -> impl Fn(usize, usize) -> usize {
    move |i, j| match uplo {
        Uplo::Upper => i + j * lda,
        Uplo::Lower => j + i * lda,
    }
}

fn packed_offset(uplo: Uplo, n: usize) -> impl Fn(usize, usize) -> usize {
    move |i, j| match uplo {
        Uplo::Upper => packed_index(Uplo::Upper, n, i, j),
        Uplo::Lower => packed_index(Uplo::Lower, n, j, i),
    }
}

/// `A = U^T U`, overwriting the stored triangle. Returns the 1-based order
/// of the first leading minor that is not positive definite.
fn factor<T: Real>(
    imp: Implementation,
    n: usize,
    a: &mut [T],
    idx: impl Fn(usize, usize) -> usize,
) -> i32 {
    match imp {
        // left-looking: column j is formed from the finished columns to its left
        Implementation::Reference => {
            for j in 0..n {
                let ajj = a[idx(j, j)] - dot(imp, j, |k| a[idx(k, j)], |k| a[idx(k, j)]);
                if !(ajj > T::ZERO) {
                    a[idx(j, j)] = ajj;
                    return order(j);
                }
                let ajj = ajj.sqrt();
                a[idx(j, j)] = ajj;
                for c in j + 1..n {
                    let s = dot(imp, j, |k| a[idx(k, j)], |k| a[idx(k, c)]);
                    a[idx(j, c)] = (a[idx(j, c)] - s) / ajj;
                }
            }
        }
        // right-looking: each pivot row immediately updates the trailing block
        Implementation::Candidate => {
            for j in 0..n {
                let ajj = a[idx(j, j)];
                if !(ajj > T::ZERO) {
                    return order(j);
                }
                let ajj = ajj.sqrt();
                a[idx(j, j)] = ajj;
                for c in j + 1..n {
                    a[idx(j, c)] /= ajj;
                }
                for c in j + 1..n {
                    let ujc = a[idx(j, c)];
                    for i in j + 1..=c {
                        let target = idx(i, c);
                        a[target] = fmadd(imp, -a[idx(j, i)], ujc, a[target]);
                    }
                }
            }
        }
    }
    0
}

fn order(j: usize) -> i32 {
    i32::try_from(j + 1).unwrap_or(i32::MAX)
}

/// Solve `U^T U x = b` in place.
fn solve<T: Real>(
    imp: Implementation,
    n: usize,
    a: &[T],
    idx: impl Fn(usize, usize) -> usize,
    b: &mut [T],
) {
    for i in 0..n {
        let s = dot(imp, i, |k| a[idx(k, i)], |k| b[k]);
        b[i] = (b[i] - s) / a[idx(i, i)];
    }
    for i in (0..n).rev() {
        let s = dot(imp, n - i - 1, |t| a[idx(i, i + 1 + t)], |t| b[i + 1 + t]);
        b[i] = (b[i] - s) / a[idx(i, i)];
    }
}

pub(crate) fn potrf<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.n < 0 {
        return -2;
    }
    let n = dim(call.dims.n);
    let uplo = call.options.uplo;
    let Some(a) = call.a.as_mut() else { return -3 };
    if !fits(a, n, n) {
        return -4;
    }
    let lda = a.ld();
    factor(imp, n, a.data_mut(), dense_index(uplo, lda))
}

pub(crate) fn potrs<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.n < 0 {
        return -2;
    }
    if call.dims.nrhs < 0 {
        return -3;
    }
    let (n, nrhs) = (dim(call.dims.n), dim(call.dims.nrhs));
    let uplo = call.options.uplo;
    let Some(a) = call.a.as_ref() else { return -4 };
    if !fits(a, n, n) {
        return -5;
    }
    let Some(b) = call.b.as_mut() else { return -6 };
    if !fits(b, n, nrhs) {
        return -7;
    }
    let ldb = b.ld();
    for column in b.data_mut().chunks_mut(ldb).take(nrhs) {
        solve(imp, n, a.data(), dense_index(uplo, a.ld()), &mut column[..n]);
    }
    0
}

pub(crate) fn pptrf<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    if call.dims.n < 0 {
        return -2;
    }
    let n = dim(call.dims.n);
    let uplo = call.options.uplo;
    let Some(ap) = call.ap.as_mut() else { return -3 };
    if ap.len() < packed_len(n) {
        return -3;
    }
    factor(imp, n, ap.data_mut(), packed_offset(uplo, n))
}
