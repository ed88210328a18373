//! Low-level kernels shared by all routines.
//!
//! The reference kernels accumulate left to right with separate multiply
//! and add; the candidate kernels accumulate right to left with fused
//! multiply-add. Everything built on top inherits that difference.

use lp_fixture::{Fixture, Real};

use crate::Implementation;

/// `acc + a * b`.
#[inline]
pub(crate) fn fmadd<T: Real>(imp: Implementation, a: T, b: T, acc: T) -> T {
    match imp {
        Implementation::Reference => acc + a * b,
        Implementation::Candidate => a.mul_add(b, acc),
    }
}

/// `sum_{k < len} x(k) * y(k)`.
pub(crate) fn dot<T: Real>(
    imp: Implementation,
    len: usize,
    x: impl Fn(usize) -> T,
    y: impl Fn(usize) -> T,
) -> T {
    match imp {
        Implementation::Reference => (0..len).fold(T::ZERO, |acc, k| acc + x(k) * y(k)),
        Implementation::Candidate => (0..len)
            .rev()
            .fold(T::ZERO, |acc, k| x(k).mul_add(y(k), acc)),
    }
}

/// Euclidean norm without destructive underflow or overflow.
pub(crate) fn nrm2<T: Real>(imp: Implementation, len: usize, x: impl Fn(usize) -> T) -> T {
    match imp {
        Implementation::Reference => {
            let mut scale = T::ZERO;
            let mut ssq = T::ONE;
            for k in 0..len {
                let value = x(k);
                if value != T::ZERO {
                    let absxi = value.abs();
                    if scale < absxi {
                        let ratio = scale / absxi;
                        ssq = T::ONE + ssq * ratio * ratio;
                        scale = absxi;
                    } else {
                        let ratio = absxi / scale;
                        ssq += ratio * ratio;
                    }
                }
            }
            scale * ssq.sqrt()
        }
        Implementation::Candidate => (0..len).rev().fold(T::ZERO, |acc, k| acc.hypot(x(k))),
    }
}

/// Index of the first entry of largest magnitude (`i?amax`).
pub(crate) fn iamax<T: Real>(len: usize, x: impl Fn(usize) -> T) -> usize {
    let mut best = 0;
    let mut best_value = T::ZERO;
    for k in 0..len {
        let value = x(k).abs();
        if k == 0 || value > best_value {
            best = k;
            best_value = value;
        }
    }
    best
}

/// Elementary reflector `H = I - tau * v * v^T` with `v[0] = 1` that maps
/// `[alpha; x]` onto `[beta; 0]`. Overwrites `x` with `v[1..]`.
///
/// The reference follows the LAPACK convention `beta = -sign(alpha) * norm`.
/// The candidate always produces `beta >= 0`, so the two disagree on the
/// sign of every row of `R` whose leading entry was positive.
pub(crate) fn householder<T: Real>(imp: Implementation, alpha: T, x: &mut [T]) -> (T, T) {
    match imp {
        Implementation::Reference => {
            let xnorm = nrm2(imp, x.len(), |k| x[k]);
            if xnorm == T::ZERO {
                return (alpha, T::ZERO);
            }
            let beta = -alpha.hypot(xnorm).copysign(alpha);
            let tau = (beta - alpha) / beta;
            let scale = T::ONE / (alpha - beta);
            for value in x.iter_mut() {
                *value *= scale;
            }
            (beta, tau)
        }
        Implementation::Candidate => {
            let sigma = dot(imp, x.len(), |k| x[k], |k| x[k]);
            if sigma == T::ZERO {
                if alpha >= T::ZERO {
                    return (alpha, T::ZERO);
                }
                return (-alpha, T::TWO);
            }
            let mu = alpha.hypot(sigma.sqrt());
            let v0 = if alpha <= T::ZERO {
                alpha - mu
            } else {
                -sigma / (alpha + mu)
            };
            let tau = T::TWO * v0 * v0 / (sigma + v0 * v0);
            for value in x.iter_mut() {
                *value /= v0;
            }
            (mu, tau)
        }
    }
}

/// Estimate `||M||_1` for an operator known only through products.
///
/// `apply(false, v)` must overwrite `v` with `M v`, `apply(true, v)` with
/// `M^T v`. `x` and `y` are caller-provided scratch of length `n`. Hager's
/// iteration, finished with Higham's alternating-sign safeguard.
pub(crate) fn estimate_one_norm<T: Real>(
    n: usize,
    x: &mut [T],
    y: &mut [T],
    mut apply: impl FnMut(bool, &mut [T]),
) -> T {
    if n == 0 {
        return T::ZERO;
    }
    let x = &mut x[..n];
    let y = &mut y[..n];
    x.fill(T::ONE / T::from_usize(n));
    let mut estimate = T::ZERO;
    let mut last = None;
    for iteration in 0..5 {
        y.copy_from_slice(x);
        apply(false, y);
        let candidate: T = y.iter().fold(T::ZERO, |acc, &v| acc + v.abs());
        if iteration > 0 && candidate <= estimate {
            break;
        }
        estimate = candidate;
        for value in y.iter_mut() {
            *value = if *value >= T::ZERO { T::ONE } else { -T::ONE };
        }
        apply(true, y);
        let j = iamax(n, |k| y[k]);
        if last == Some(j) {
            break;
        }
        let ztx = x
            .iter()
            .zip(y.iter())
            .fold(T::ZERO, |acc, (&xi, &zi)| acc + xi * zi);
        if iteration > 0 && y[j].abs() <= ztx {
            break;
        }
        x.fill(T::ZERO);
        x[j] = T::ONE;
        last = Some(j);
    }

    let denominator = T::from_usize(n.saturating_sub(1).max(1));
    let mut sign = T::ONE;
    for (i, value) in x.iter_mut().enumerate() {
        *value = sign * (T::ONE + T::from_usize(i) / denominator);
        sign = -sign;
    }
    apply(false, x);
    let alternative = T::TWO * x.iter().fold(T::ZERO, |acc, &v| acc + v.abs())
        / (T::from_usize(3) * T::from_usize(n));
    estimate.max(alternative)
}

/// Whether a dense fixture can hold an `rows x cols` matrix.
pub(crate) fn fits<T: Real>(fixture: &Fixture<T>, rows: usize, cols: usize) -> bool {
    fixture.ld() >= rows.max(1) && fixture.len() >= fixture.ld() * cols
}

/// Convert a validated non-negative dimension.
pub(crate) fn dim(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Record the optimal workspace size in `work[0]`.
pub(crate) fn store_optimal<T: Real>(work: &mut Fixture<T>, optimal: usize) {
    if let Some(first) = work.data_mut().first_mut() {
        *first = T::from_usize(optimal);
    }
}
