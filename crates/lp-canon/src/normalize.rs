//! Order and sign conventions applied before comparison.
//!
//! Every function here is idempotent: applying it to its own output
//! returns that output unchanged.

use serde::{Deserialize, Serialize};

/// Sort ascending. NaN sorts after `+inf`.
pub fn sort_spectrum(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}

/// Permutation that sorts `values` ascending; equal values keep input order.
#[must_use]
pub fn ascending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// Sort complex values by real part, then imaginary part.
pub fn sort_complex(pairs: &mut [(f64, f64)]) {
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
}

/// A generalized eigenvalue `(alphar + i*alphai) / beta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum GeneralizedValue {
    Finite { re: f64, im: f64 },
    Infinite,
}

/// Classify `(alpha, beta)` pairs and sort them: finite values by
/// `(re, im)`, infinite values last. A pair is infinite when
/// `|beta| <= unit`.
#[must_use]
pub fn classify_generalized(
    alphar: &[f64],
    alphai: &[f64],
    beta: &[f64],
    unit: f64,
) -> Vec<GeneralizedValue> {
    let mut finite = Vec::with_capacity(beta.len());
    let mut infinite = 0;
    for ((&re, &im), &b) in alphar.iter().zip(alphai).zip(beta) {
        if b.abs() > unit {
            finite.push((re / b, im / b));
        } else {
            infinite += 1;
        }
    }
    sort_complex(&mut finite);
    finite
        .into_iter()
        .map(|(re, im)| GeneralizedValue::Finite { re, im })
        .chain(std::iter::repeat_n(GeneralizedValue::Infinite, infinite))
        .collect()
}

/// Index of the entry that fixes a vector's sign: the first entry whose
/// magnitude is within a relative `sqrt(unit)` of the largest magnitude.
///
/// Taking the first near-maximal entry rather than the exact maximum keeps
/// the choice stable when two entries tie mathematically but differ in
/// rounding between implementations.
#[must_use]
pub fn dominant_index(vector: &[f64], unit: f64) -> Option<usize> {
    let largest = vector.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if largest == 0.0 {
        return None;
    }
    let threshold = largest * (1.0 - unit.sqrt());
    vector.iter().position(|v| v.abs() >= threshold)
}

/// Flip `vector` so its dominant entry is positive. Returns whether it
/// flipped.
pub fn normalize_sign(vector: &mut [f64], unit: f64) -> bool {
    match dominant_index(vector, unit) {
        Some(index) if vector[index] < 0.0 => {
            for value in vector.iter_mut() {
                *value = -*value;
            }
            true
        }
        _ => false,
    }
}

/// Positions in an ascending `sorted` sequence that belong to a cluster:
/// a neighbour lies within `sqrt(unit) * max(|largest|, unit)`.
#[must_use]
pub fn degenerate_positions(sorted: &[f64], unit: f64) -> Vec<usize> {
    let scale = sorted.iter().fold(unit, |acc, v| acc.max(v.abs()));
    let gap = unit.sqrt() * scale;
    let mut marked = vec![false; sorted.len()];
    for k in 1..sorted.len() {
        if (sorted[k] - sorted[k - 1]).abs() <= gap {
            marked[k - 1] = true;
            marked[k] = true;
        }
    }
    marked
        .into_iter()
        .enumerate()
        .filter_map(|(k, hit)| hit.then_some(k))
        .collect()
}

/// `max |Q^T Q - I|` for `cols` column vectors of length `rows` stored
/// contiguously.
#[must_use]
pub fn orthogonality_error(q: &[f64], rows: usize, cols: usize) -> f64 {
    let column = |j: usize| &q[j * rows..(j + 1) * rows];
    let mut worst = 0.0f64;
    for i in 0..cols {
        for j in i..cols {
            let dot: f64 = column(i).iter().zip(column(j)).map(|(a, b)| a * b).sum();
            let target = if i == j { 1.0 } else { 0.0 };
            worst = worst.max((dot - target).abs());
        }
    }
    worst
}

#[must_use]
pub fn frobenius(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::{
        GeneralizedValue, ascending_order, classify_generalized, degenerate_positions,
        dominant_index, normalize_sign, orthogonality_error,
    };

    #[test]
    fn order_is_stable_for_ties() {
        assert_eq!(ascending_order(&[3.0, 1.0, 3.0, 0.5]), vec![3, 1, 0, 2]);
    }

    #[test]
    fn infinite_pairs_sort_last() {
        let values = classify_generalized(&[1.0, 4.0, -2.0], &[0.0; 3], &[0.0, 2.0, 1.0], 1e-14);
        assert_eq!(
            values,
            vec![
                GeneralizedValue::Finite { re: -2.0, im: 0.0 },
                GeneralizedValue::Finite { re: 2.0, im: 0.0 },
                GeneralizedValue::Infinite,
            ]
        );
    }

    #[test]
    fn negated_pairs_classify_identically() {
        let lhs = classify_generalized(&[1.0, 3.0], &[0.5, -0.5], &[2.0, 1.0], 1e-14);
        let rhs = classify_generalized(&[-3.0, -1.0], &[0.5, -0.5], &[-1.0, -2.0], 1e-14);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn sign_follows_first_near_maximal_entry() {
        let mut v = vec![0.1, -0.7, 0.7 - 1e-16, 0.2];
        assert_eq!(dominant_index(&v, 1e-14), Some(1));
        assert!(normalize_sign(&mut v, 1e-14));
        assert!(v[1] > 0.0);
        assert!(!normalize_sign(&mut v, 1e-14));
        assert_eq!(dominant_index(&[0.0, 0.0], 1e-14), None);
    }

    #[test]
    fn clusters_mark_both_neighbours() {
        assert_eq!(degenerate_positions(&[0.0, 0.0, 1.0, 5.0], 1e-14), vec![0, 1]);
        assert!(degenerate_positions(&[1.0, 2.0, 3.0], 1e-14).is_empty());
    }

    #[test]
    fn identity_columns_are_orthonormal() {
        let q = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert_eq!(orthogonality_error(&q, 3, 2), 0.0);
        let skew = [1.0, 0.0, 0.1, 1.0];
        assert!((orthogonality_error(&skew, 2, 2) - 0.1).abs() < 1e-12);
    }
}
