//! Symmetric eigensolvers over dense, packed and band storage.
//!
//! Reference: Householder tridiagonalization followed by implicit QL,
//! eigenvalues returned in ascending order. Candidate: cyclic Jacobi,
//! eigenvalues returned in the order the diagonal settles, which is not
//! sorted in general.

use lp_fixture::{Fixture, Real, Uplo, packed_index, packed_len};

use crate::kernels::{dim, fits};
use crate::workspace::{WorkCheck, check_work, min_lwork};
use crate::{Call, Implementation, Job, Routine};

const JACOBI_SWEEPS: usize = 60;

/// Eigen-decomposition of a dense symmetric `n x n` matrix, column-major.
struct Eigen<T> {
    info: i32,
    values: Vec<T>,
    vectors: Vec<T>,
}

fn decompose<T: Real>(imp: Implementation, n: usize, a: Vec<T>) -> Eigen<T> {
    match imp {
        Implementation::Reference => tridiagonal_ql(n, a),
        Implementation::Candidate => jacobi(n, a),
    }
}

fn tridiagonal_ql<T: Real>(n: usize, mut v: Vec<T>) -> Eigen<T> {
    let mut d = vec![T::ZERO; n];
    let mut e = vec![T::ZERO; n];
    if n == 0 {
        return Eigen {
            info: 0,
            values: d,
            vectors: v,
        };
    }
    let ix = |r: usize, c: usize| r + c * n;

    // Householder reduction to tridiagonal form
    for j in 0..n {
        d[j] = v[ix(n - 1, j)];
    }
    for i in (1..n).rev() {
        let mut scale = T::ZERO;
        let mut h = T::ZERO;
        for value in &d[..i] {
            scale += value.abs();
        }
        if scale == T::ZERO {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[ix(i - 1, j)];
                v[ix(i, j)] = T::ZERO;
                v[ix(j, i)] = T::ZERO;
            }
        } else {
            for value in &mut d[..i] {
                *value /= scale;
                h += *value * *value;
            }
            let mut f = d[i - 1];
            let mut g = h.sqrt();
            if f > T::ZERO {
                g = -g;
            }
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;
            e[..i].fill(T::ZERO);
            for j in 0..i {
                f = d[j];
                v[ix(j, i)] = f;
                g = e[j] + v[ix(j, j)] * f;
                for k in j + 1..i {
                    g += v[ix(k, j)] * d[k];
                    e[k] += v[ix(k, j)] * f;
                }
                e[j] = g;
            }
            f = T::ZERO;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }
            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }
            for j in 0..i {
                f = d[j];
                g = e[j];
                for k in j..i {
                    v[ix(k, j)] -= f * e[k] + g * d[k];
                }
                d[j] = v[ix(i - 1, j)];
                v[ix(i, j)] = T::ZERO;
            }
        }
        d[i] = h;
    }

    // accumulate transformations
    for i in 0..n - 1 {
        v[ix(n - 1, i)] = v[ix(i, i)];
        v[ix(i, i)] = T::ONE;
        let h = d[i + 1];
        if h != T::ZERO {
            for k in 0..=i {
                d[k] = v[ix(k, i + 1)] / h;
            }
            for j in 0..=i {
                let mut g = T::ZERO;
                for k in 0..=i {
                    g += v[ix(k, i + 1)] * v[ix(k, j)];
                }
                for k in 0..=i {
                    v[ix(k, j)] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            v[ix(k, i + 1)] = T::ZERO;
        }
    }
    for j in 0..n {
        d[j] = v[ix(n - 1, j)];
        v[ix(n - 1, j)] = T::ZERO;
    }
    v[ix(n - 1, n - 1)] = T::ONE;
    e[0] = T::ZERO;

    // implicit QL on the tridiagonal
    for i in 1..n {
        e[i - 1] = e[i];
    }
    e[n - 1] = T::ZERO;
    let eps = T::EPSILON;
    let max_iterations = 30 * n;
    let mut iterations = 0;
    let mut f = T::ZERO;
    let mut tst1 = T::ZERO;
    for l in 0..n {
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        let mut m = l;
        while m < n - 1 && e[m].abs() > eps * tst1 {
            m += 1;
        }
        if m > l {
            loop {
                iterations += 1;
                if iterations > max_iterations {
                    let unconverged = e[l..].iter().filter(|value| **value != T::ZERO).count();
                    return Eigen {
                        info: i32::try_from(unconverged.max(1)).unwrap_or(i32::MAX),
                        values: d,
                        vectors: v,
                    };
                }
                let g = d[l];
                let mut p = (d[l + 1] - g) / (T::TWO * e[l]);
                let mut r = p.hypot(T::ONE);
                if p < T::ZERO {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let mut h = g - d[l];
                for value in &mut d[l + 2..] {
                    *value -= h;
                }
                f += h;

                p = d[m];
                let mut c = T::ONE;
                let mut c2 = c;
                let mut c3 = c;
                let el1 = e[l + 1];
                let mut s = T::ZERO;
                let mut s2 = T::ZERO;
                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    let g = c * e[i];
                    h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);
                    for k in 0..n {
                        let upper = v[ix(k, i + 1)];
                        v[ix(k, i + 1)] = s * v[ix(k, i)] + c * upper;
                        v[ix(k, i)] = c * v[ix(k, i)] - s * upper;
                    }
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;
                if e[l].abs() <= eps * tst1 {
                    break;
                }
            }
        }
        d[l] += f;
        e[l] = T::ZERO;
    }

    // ascending order, vectors follow their values
    for i in 0..n.saturating_sub(1) {
        let mut k = i;
        for j in i + 1..n {
            if d[j] < d[k] {
                k = j;
            }
        }
        if k != i {
            d.swap(i, k);
            for r in 0..n {
                v.swap(ix(r, i), ix(r, k));
            }
        }
    }
    Eigen {
        info: 0,
        values: d,
        vectors: v,
    }
}

fn jacobi<T: Real>(n: usize, mut a: Vec<T>) -> Eigen<T> {
    let ix = |r: usize, c: usize| r + c * n;
    let mut v = vec![T::ZERO; n * n];
    for i in 0..n {
        v[ix(i, i)] = T::ONE;
    }
    let floor = T::EPSILON * T::EPSILON * a.iter().fold(T::ZERO, |acc, x| acc.max(x.abs()));
    let mut converged = n < 2;
    for _ in 0..JACOBI_SWEEPS {
        let mut rotated = false;
        for p in 0..n {
            for q in p + 1..n {
                let apq = a[ix(p, q)];
                if apq == T::ZERO {
                    continue;
                }
                let app = a[ix(p, p)];
                let aqq = a[ix(q, q)];
                if apq.abs() <= floor || apq.abs() <= T::EPSILON * (app * aqq).abs().sqrt() {
                    a[ix(p, q)] = T::ZERO;
                    a[ix(q, p)] = T::ZERO;
                    continue;
                }
                rotated = true;
                let theta = (aqq - app) / (T::TWO * apq);
                let t = if theta == T::ZERO {
                    T::ONE
                } else {
                    T::ONE.copysign(theta) / (theta.abs() + theta.hypot(T::ONE))
                };
                let c = T::ONE / t.hypot(T::ONE);
                let s = t * c;
                for k in 0..n {
                    if k == p || k == q {
                        continue;
                    }
                    let akp = a[ix(k, p)];
                    let akq = a[ix(k, q)];
                    let new_p = c * akp - s * akq;
                    let new_q = s * akp + c * akq;
                    a[ix(k, p)] = new_p;
                    a[ix(p, k)] = new_p;
                    a[ix(k, q)] = new_q;
                    a[ix(q, k)] = new_q;
                }
                a[ix(p, p)] = app - t * apq;
                a[ix(q, q)] = aqq + t * apq;
                a[ix(p, q)] = T::ZERO;
                a[ix(q, p)] = T::ZERO;
                for k in 0..n {
                    let vkp = v[ix(k, p)];
                    let vkq = v[ix(k, q)];
                    v[ix(k, p)] = c * vkp - s * vkq;
                    v[ix(k, q)] = s * vkp + c * vkq;
                }
            }
        }
        if !rotated {
            converged = true;
            break;
        }
    }
    let values = (0..n).map(|i| a[ix(i, i)]).collect();
    Eigen {
        info: if converged { 0 } else { 1 },
        values,
        vectors: v,
    }
}

fn store_values<T: Real>(w: &mut Fixture<T>, values: &[T]) {
    w.data_mut()[..values.len()].copy_from_slice(values);
}

fn store_vectors<T: Real>(z: &mut Fixture<T>, n: usize, vectors: &[T]) {
    let ldz = z.ld();
    let data = z.data_mut();
    for j in 0..n {
        data[j * ldz..j * ldz + n].copy_from_slice(&vectors[j * n..(j + 1) * n]);
    }
}

/// Dense symmetric matrix from the `uplo` triangle of `a`.
fn symmetrize<T: Real>(n: usize, uplo: Uplo, read: impl Fn(usize, usize) -> T) -> Vec<T> {
    let mut dense = vec![T::ZERO; n * n];
    for j in 0..n {
        for i in 0..n {
            let (r, c) = match uplo {
                Uplo::Upper if i <= j => (i, j),
                Uplo::Lower if i >= j => (i, j),
                _ => (j, i),
            };
            dense[i + j * n] = read(r, c);
        }
    }
    dense
}

pub(crate) fn syev<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    let options = call.options;
    if dims.n < 0 {
        return -3;
    }
    let n = dim(dims.n);
    let Some(a) = call.a.as_mut() else { return -4 };
    if !fits(a, n, n) {
        return -5;
    }
    let Some(w) = call.w.as_mut() else { return -6 };
    if w.len() < n {
        return -6;
    }
    match check_work(Routine::Syev, imp, &dims, call.lwork, call.work.as_mut(), 8) {
        WorkCheck::Proceed => {}
        WorkCheck::Return(status) => return status,
    }
    if n == 0 {
        return 0;
    }
    let lda = a.ld();
    let dense = symmetrize(n, options.uplo, |i, j| a.data()[i + j * lda]);
    let eigen = decompose(imp, n, dense);
    store_values(w, &eigen.values);
    if options.jobz == Job::Vectors {
        store_vectors(a, n, &eigen.vectors);
    }
    eigen.info
}

pub(crate) fn spev<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    let options = call.options;
    if dims.n < 0 {
        return -3;
    }
    let n = dim(dims.n);
    let Some(ap) = call.ap.as_ref() else { return -4 };
    if ap.len() < packed_len(n) {
        return -4;
    }
    let Some(w) = call.w.as_mut() else { return -5 };
    if w.len() < n {
        return -5;
    }
    let wants_vectors = options.jobz == Job::Vectors;
    if wants_vectors && !call.z.as_ref().is_some_and(|z| fits(z, n, n)) {
        return -7;
    }
    if !call.work.as_ref().is_some_and(|work| work.len() >= min_lwork(Routine::Spev, &dims)) {
        return -8;
    }
    if n == 0 {
        return 0;
    }
    let uplo = options.uplo;
    let packed = ap.data();
    let dense = symmetrize(n, uplo, |i, j| packed[packed_index(uplo, n, i, j)]);
    let eigen = decompose(imp, n, dense);
    store_values(w, &eigen.values);
    if let (true, Some(z)) = (wants_vectors, call.z.as_mut()) {
        store_vectors(z, n, &eigen.vectors);
    }
    eigen.info
}

pub(crate) fn sbev<T: Real>(imp: Implementation, call: &mut Call<T>) -> i32 {
    let dims = call.dims;
    let options = call.options;
    if dims.n < 0 {
        return -3;
    }
    if dims.kd < 0 {
        return -4;
    }
    let (n, kd) = (dim(dims.n), dim(dims.kd));
    let Some(ab) = call.ab.as_ref() else { return -5 };
    let ldab = ab.ld();
    if ldab < kd + 1 || ab.len() < ldab * n {
        return -6;
    }
    let Some(w) = call.w.as_mut() else { return -7 };
    if w.len() < n {
        return -7;
    }
    let wants_vectors = options.jobz == Job::Vectors;
    if wants_vectors && !call.z.as_ref().is_some_and(|z| fits(z, n, n)) {
        return -9;
    }
    if !call.work.as_ref().is_some_and(|work| work.len() >= min_lwork(Routine::Sbev, &dims)) {
        return -10;
    }
    if n == 0 {
        return 0;
    }
    let band = ab.data();
    let uplo = options.uplo;
    let dense = symmetrize(n, uplo, |i, j| {
        let (r, c) = if i <= j { (i, j) } else { (j, i) };
        if c - r > kd {
            return T::ZERO;
        }
        match uplo {
            Uplo::Upper => band[kd + r - c + c * ldab],
            Uplo::Lower => band[c - r + r * ldab],
        }
    });
    let eigen = decompose(imp, n, dense);
    store_values(w, &eigen.values);
    if let (true, Some(z)) = (wants_vectors, call.z.as_mut()) {
        store_vectors(z, n, &eigen.vectors);
    }
    eigen.info
}
