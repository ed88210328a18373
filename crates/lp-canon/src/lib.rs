#![forbid(unsafe_code)]

//! Canonical projections of routine outputs.
//!
//! Two correct implementations may return eigenvalues in different orders,
//! eigenvectors with opposite signs, or an arbitrary basis for a repeated
//! eigenvalue. [`canonicalize`] applies one documented [`Category`] rule per
//! output buffer so the judge can walk two results element by element.
//! Outputs with no canonical form are marked non-comparable and backed by
//! an invariant check instead.

pub mod normalize;

use core::fmt;

use lp_fixture::{Fixture, Real};
use lp_routines::{Call, Slot};
use lp_tolerance::{ToleranceMode, ToleranceSpec, orthogonality_bound, residual_bound};
use serde::{Deserialize, Serialize};

use crate::normalize::{
    GeneralizedValue, ascending_order, classify_generalized, degenerate_positions, frobenius,
    normalize_sign, orthogonality_error, sort_complex, sort_spectrum,
};

pub const CANON_REASON_CODES: [&str; 3] = [
    "canon_missing_output",
    "canon_missing_input",
    "canon_shape_mismatch",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonError {
    MissingOutput(Slot),
    MissingInput(Slot),
    ShapeMismatch {
        slot: Slot,
        rows: usize,
        cols: usize,
        ld: usize,
        len: usize,
    },
}

impl CanonError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingOutput(_) => "canon_missing_output",
            Self::MissingInput(_) => "canon_missing_input",
            Self::ShapeMismatch { .. } => "canon_shape_mismatch",
        }
    }
}

impl fmt::Display for CanonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOutput(slot) => write!(f, "output buffer `{slot}` is absent"),
            Self::MissingInput(slot) => write!(f, "input buffer `{slot}` is absent"),
            Self::ShapeMismatch {
                slot,
                rows,
                cols,
                ld,
                len,
            } => write!(
                f,
                "buffer `{slot}` (ld={ld}, len={len}) cannot hold a {rows}x{cols} block"
            ),
        }
    }
}

impl std::error::Error for CanonError {}

/// Whether a matrix's vectors are its columns or its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorLayout {
    Columns,
    Rows,
}

/// One canonicalization rule per output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Category {
    /// Compared as stored.
    Plain,
    /// Real eigenvalues or singular values, sorted ascending.
    Spectrum,
    /// Real parts in the rule's slot, imaginary parts in `imag`; sorted
    /// jointly by `(re, im)`.
    ComplexSpectrum { imag: Slot },
    /// `alphar` in the rule's slot. Emitted as sorted `(re, im)` ratios,
    /// infinite values last.
    GeneralizedPairs { alphai: Slot, beta: Slot },
    /// Eigen- or singular vectors paired with the values in `values`.
    /// Vectors are reordered to ascending value, sign-normalized, and
    /// vectors of clustered values are non-comparable.
    Vectors { values: Slot, layout: VectorLayout },
    /// Columns with orthonormality required; sign-normalized per column.
    OrthogonalFactor,
    /// `Q` (`m x n`, `m >= n`) in the rule's slot, `R` in the upper
    /// triangle of `r`. Normalized so `R` has a non-negative diagonal; the
    /// residual against the pristine input slot `input` is checked.
    QrFactors { r: Slot, input: Slot },
    /// Estimates that must also lie below the mode's absolute bound.
    UpperBound,
    /// Integer-valued outputs compared exactly.
    Discrete,
}

impl Category {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Spectrum => "spectrum",
            Self::ComplexSpectrum { .. } => "complex_spectrum",
            Self::GeneralizedPairs { .. } => "generalized_pairs",
            Self::Vectors { .. } => "vectors",
            Self::OrthogonalFactor => "orthogonal_factor",
            Self::QrFactors { .. } => "qr_factors",
            Self::UpperBound => "upper_bound",
            Self::Discrete => "discrete",
        }
    }
}

/// Which leading block of a buffer a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub slot: Slot,
    pub extent: Extent,
    pub category: Category,
    pub mode: ToleranceMode,
}

impl Rule {
    #[must_use]
    pub fn new(
        slot: Slot,
        rows: usize,
        cols: usize,
        category: Category,
        mode: ToleranceMode,
    ) -> Self {
        Self {
            slot,
            extent: Extent { rows, cols },
            category,
            mode,
        }
    }

    #[must_use]
    pub fn plain(slot: Slot, rows: usize, cols: usize, mode: ToleranceMode) -> Self {
        Self::new(slot, rows, cols, Category::Plain, mode)
    }

    #[must_use]
    pub fn vector(slot: Slot, len: usize, mode: ToleranceMode) -> Self {
        Self::plain(slot, len, 1, mode)
    }

    #[must_use]
    pub fn spectrum(slot: Slot, len: usize, mode: ToleranceMode) -> Self {
        Self::new(slot, len, 1, Category::Spectrum, mode)
    }

    #[must_use]
    pub fn discrete(slot: Slot, len: usize) -> Self {
        Self::new(
            slot,
            len,
            1,
            Category::Discrete,
            ToleranceMode::Absolute { multiplier: 1.0 },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CanonValue {
    Finite(f64),
    Infinite,
}

impl CanonValue {
    #[must_use]
    pub fn finite(self) -> Option<f64> {
        match self {
            Self::Finite(value) => Some(value),
            Self::Infinite => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "comparison", rename_all = "snake_case")]
pub enum Comparison {
    Tolerance(ToleranceMode),
    Exact,
}

/// Canonical values of one output buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    pub category: &'static str,
    pub comparison: Comparison,
    pub values: Vec<CanonValue>,
    /// Indices into `values` that have no canonical form.
    pub non_comparable: Vec<usize>,
}

/// A property one implementation's output must satisfy on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub name: String,
    pub observed: f64,
    pub bound: f64,
}

impl InvariantCheck {
    #[must_use]
    pub fn holds(&self) -> bool {
        self.observed <= self.bound
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalResult {
    pub status: i32,
    pub sections: Vec<Section>,
    pub invariants: Vec<InvariantCheck>,
}

impl CanonicalResult {
    #[must_use]
    pub fn compared_len(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.values.len() - section.non_comparable.len())
            .sum()
    }

    #[must_use]
    pub fn failed_invariants(&self) -> Vec<&InvariantCheck> {
        self.invariants.iter().filter(|check| !check.holds()).collect()
    }
}

fn read_block<T: Real>(
    slot: Slot,
    fixture: &Fixture<T>,
    rows: usize,
    cols: usize,
) -> Result<Vec<f64>, CanonError> {
    let ld = fixture.ld();
    let needed = if cols == 0 { 0 } else { ld * (cols - 1) + rows };
    if (cols > 0 && ld < rows) || fixture.len() < needed {
        return Err(CanonError::ShapeMismatch {
            slot,
            rows,
            cols,
            ld,
            len: fixture.len(),
        });
    }
    let data = fixture.data();
    let mut out = Vec::with_capacity(rows * cols);
    for j in 0..cols {
        out.extend(data[j * ld..j * ld + rows].iter().map(|v| v.to_f64()));
    }
    Ok(out)
}

fn output_block<T: Real>(
    call: &Call<T>,
    slot: Slot,
    rows: usize,
    cols: usize,
) -> Result<Vec<f64>, CanonError> {
    if slot.is_integer() {
        let values = call.int(slot).ok_or(CanonError::MissingOutput(slot))?;
        let len = rows * cols;
        if values.len() < len {
            return Err(CanonError::ShapeMismatch {
                slot,
                rows,
                cols,
                ld: rows,
                len: values.len(),
            });
        }
        return Ok(values[..len].iter().map(|&v| f64::from(v)).collect());
    }
    let fixture = call.real(slot).ok_or(CanonError::MissingOutput(slot))?;
    read_block(slot, fixture, rows, cols)
}

fn finite(values: impl IntoIterator<Item = f64>) -> Vec<CanonValue> {
    values.into_iter().map(CanonValue::Finite).collect()
}

/// Split a column-major `rows x cols` block into its vectors.
fn split_vectors(block: &[f64], rows: usize, cols: usize, layout: VectorLayout) -> Vec<Vec<f64>> {
    match layout {
        VectorLayout::Columns => block
            .chunks(rows.max(1))
            .take(cols)
            .map(<[f64]>::to_vec)
            .collect(),
        VectorLayout::Rows => (0..rows)
            .map(|i| (0..cols).map(|j| block[i + j * rows]).collect())
            .collect(),
    }
}

/// Project `output` onto canonical form, one section per rule.
///
/// `input` is the pristine argument set the routine was called with; rules
/// that check reconstruction residuals read from it. A non-zero `status`
/// leaves the outputs unspecified, so only the status is kept.
pub fn canonicalize<T: Real>(
    rules: &[Rule],
    input: &Call<T>,
    output: &Call<T>,
    status: i32,
) -> Result<CanonicalResult, CanonError> {
    let mut result = CanonicalResult {
        status,
        sections: Vec::new(),
        invariants: Vec::new(),
    };
    if status != 0 {
        return Ok(result);
    }
    let unit = T::PRECISION.unit();
    for rule in rules {
        canonicalize_rule(rule, input, output, unit, &mut result)?;
    }
    Ok(result)
}

fn canonicalize_rule<T: Real>(
    rule: &Rule,
    input: &Call<T>,
    output: &Call<T>,
    unit: f64,
    result: &mut CanonicalResult,
) -> Result<(), CanonError> {
    let Extent { rows, cols } = rule.extent;
    let tolerance = Comparison::Tolerance(rule.mode);
    let mut section = Section {
        name: rule.slot.as_str().to_string(),
        category: rule.category.as_str(),
        comparison: tolerance,
        values: Vec::new(),
        non_comparable: Vec::new(),
    };
    match rule.category {
        Category::Plain => {
            section.values = finite(output_block(output, rule.slot, rows, cols)?);
        }
        Category::Spectrum => {
            let mut values = output_block(output, rule.slot, rows, cols)?;
            sort_spectrum(&mut values);
            section.values = finite(values);
        }
        Category::ComplexSpectrum { imag } => {
            let re = output_block(output, rule.slot, rows, cols)?;
            let im = output_block(output, imag, rows, cols)?;
            let mut pairs: Vec<(f64, f64)> = re.into_iter().zip(im).collect();
            sort_complex(&mut pairs);
            section.name = format!("{}+{imag}", rule.slot);
            section.values = finite(pairs.into_iter().flat_map(|(re, im)| [re, im]));
        }
        Category::GeneralizedPairs { alphai, beta } => {
            let alphar = output_block(output, rule.slot, rows, cols)?;
            let alphai_values = output_block(output, alphai, rows, cols)?;
            let beta_values = output_block(output, beta, rows, cols)?;
            section.name = format!("{}+{alphai}/{beta}", rule.slot);
            section.values = classify_generalized(&alphar, &alphai_values, &beta_values, unit)
                .into_iter()
                .flat_map(|value| match value {
                    GeneralizedValue::Finite { re, im } => {
                        [CanonValue::Finite(re), CanonValue::Finite(im)]
                    }
                    GeneralizedValue::Infinite => [CanonValue::Infinite, CanonValue::Infinite],
                })
                .collect();
        }
        Category::Vectors { values, layout } => {
            let block = output_block(output, rule.slot, rows, cols)?;
            let vectors = split_vectors(&block, rows, cols, layout);
            let spectrum = output_block(output, values, vectors.len(), 1)?;
            let order = ascending_order(&spectrum);
            let sorted: Vec<f64> = order.iter().map(|&k| spectrum[k]).collect();
            let len = match layout {
                VectorLayout::Columns => rows,
                VectorLayout::Rows => cols,
            };
            let mut flat = Vec::with_capacity(block.len());
            for &k in &order {
                let mut vector = vectors[k].clone();
                normalize_sign(&mut vector, unit);
                flat.extend(vector);
            }
            section.non_comparable = degenerate_positions(&sorted, unit)
                .into_iter()
                .flat_map(|position| position * len..(position + 1) * len)
                .collect();
            result.invariants.push(InvariantCheck {
                name: format!("{} orthogonality", rule.slot),
                observed: orthogonality_error(&flat, len, order.len()),
                bound: orthogonality_bound(len, unit),
            });
            section.values = finite(flat);
        }
        Category::OrthogonalFactor => {
            let mut block = output_block(output, rule.slot, rows, cols)?;
            for column in block.chunks_mut(rows.max(1)) {
                normalize_sign(column, unit);
            }
            result.invariants.push(InvariantCheck {
                name: format!("{} orthogonality", rule.slot),
                observed: orthogonality_error(&block, rows, cols),
                bound: orthogonality_bound(rows, unit),
            });
            section.values = finite(block);
        }
        Category::QrFactors { r, input: source } => {
            let (m, n) = (rows, cols);
            let mut q = output_block(output, rule.slot, m, n)?;
            let mut r_block = output_block(output, r, n, n)?;
            let a = input
                .real(source)
                .ok_or(CanonError::MissingInput(source))
                .and_then(|fixture| read_block(source, fixture, m, n))?;
            for i in 0..n {
                if r_block[i + i * n] < 0.0 {
                    for j in i..n {
                        r_block[i + j * n] = -r_block[i + j * n];
                    }
                    for value in &mut q[i * m..(i + 1) * m] {
                        *value = -*value;
                    }
                }
            }
            let mut residual = a.clone();
            for j in 0..n {
                for k in 0..=j {
                    let rkj = r_block[k + j * n];
                    for i in 0..m {
                        residual[i + j * m] -= q[i + k * m] * rkj;
                    }
                }
            }
            result.invariants.push(InvariantCheck {
                name: format!("{} orthogonality", rule.slot),
                observed: orthogonality_error(&q, m, n),
                bound: orthogonality_bound(m, unit),
            });
            result.invariants.push(InvariantCheck {
                name: format!("{} residual", source),
                observed: frobenius(&residual),
                bound: residual_bound(frobenius(&a), unit),
            });
            let upper = (0..n).flat_map(|j| (0..=j).map(move |i| (i, j)));
            let r_values: Vec<f64> = upper.map(|(i, j)| r_block[i + j * n]).collect();
            let q_section = Section {
                values: finite(q),
                ..section.clone()
            };
            result.sections.push(q_section);
            section.name = r.as_str().to_string();
            section.values = finite(r_values);
        }
        Category::UpperBound => {
            let values = output_block(output, rule.slot, rows, cols)?;
            let ceiling = ToleranceSpec::derive(rule.mode, unit).bound(0.0);
            result.invariants.push(InvariantCheck {
                name: format!("{} ceiling", rule.slot),
                observed: values.iter().fold(0.0f64, |acc, v| acc.max(v.abs())),
                bound: ceiling,
            });
            section.values = finite(values);
        }
        Category::Discrete => {
            section.comparison = Comparison::Exact;
            section.values = finite(output_block(output, rule.slot, rows, cols)?);
        }
    }
    result.sections.push(section);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        CanonError, CanonValue, CanonicalResult, Category, Comparison, Rule, VectorLayout,
        canonicalize,
    };
    use lp_fixture::{Fixture, generate};
    use lp_routines::{Call, Dims, Implementation, Job, Options, Routine, Slot};
    use lp_tolerance::presets;

    fn approx_equal(lhs: f64, rhs: f64, tol: f64) -> bool {
        (lhs - rhs).abs() <= tol
    }

    fn values(result: &CanonicalResult, section: usize) -> Vec<f64> {
        result.sections[section]
            .values
            .iter()
            .map(|value| value.finite().expect("finite value"))
            .collect()
    }

    fn syev(imp: Implementation, a: Fixture<f64>, jobz: Job) -> (Call<f64>, Call<f64>, i32) {
        let n = a.rows();
        let options = Options {
            jobz,
            ..Options::default()
        };
        let mut call = Call::new(Dims::square(n), options);
        call.set_real(Slot::A, a);
        call.set_real(Slot::W, Fixture::zeros(n, 1));
        call.set_real(Slot::Work, Fixture::zeros(3 * n, 1));
        call.lwork = 3 * n as i32;
        let input = call.clone();
        let status = imp.invoke(Routine::Syev, &mut call);
        (input, call, status)
    }

    #[test]
    fn spectra_from_both_implementations_align() {
        let a = generate::positive_definite::<f64>(6);
        let rules = [Rule::spectrum(Slot::W, 6, presets::SYMMETRIC_SPECTRUM)];
        let results: Vec<_> = Implementation::ALL
            .into_iter()
            .map(|imp| {
                let (input, output, status) = syev(imp, a.clone(), Job::NoVectors);
                canonicalize(&rules, &input, &output, status).expect("canonical")
            })
            .collect();
        let lhs = values(&results[0], 0);
        let rhs = values(&results[1], 0);
        assert!(lhs.windows(2).all(|w| w[0] <= w[1]));
        for (x, y) in lhs.iter().zip(&rhs) {
            assert!(approx_equal(*x, *y, 1e-12));
        }
    }

    #[test]
    fn eigenvectors_are_ordered_and_sign_normalized() {
        let tri = generate::tridiagonal::<f64>(5).to_dense();
        let rule = Rule::new(
            Slot::A,
            5,
            5,
            Category::Vectors {
                values: Slot::W,
                layout: VectorLayout::Columns,
            },
            presets::EIGENVECTORS,
        );
        let results: Vec<_> = Implementation::ALL
            .into_iter()
            .map(|imp| {
                let (input, output, status) = syev(imp, tri.clone(), Job::Vectors);
                assert_eq!(status, 0);
                canonicalize(&[rule], &input, &output, status).expect("canonical")
            })
            .collect();
        for result in &results {
            assert!(result.failed_invariants().is_empty());
            assert!(result.sections[0].non_comparable.is_empty());
        }
        let lhs = values(&results[0], 0);
        let rhs = values(&results[1], 0);
        for (x, y) in lhs.iter().zip(&rhs) {
            assert!(approx_equal(*x, *y, 1e-12));
        }
    }

    #[test]
    fn repeated_eigenvalues_are_non_comparable() {
        let rule = Rule::new(
            Slot::A,
            4,
            4,
            Category::Vectors {
                values: Slot::W,
                layout: VectorLayout::Columns,
            },
            presets::EIGENVECTORS,
        );
        let (input, output, status) =
            syev(Implementation::Candidate, generate::symmetric::<f64>(4), Job::Vectors);
        let result = canonicalize(&[rule], &input, &output, status).expect("canonical");
        // eigenvalues 0, 0, 0, 30: the first three vectors span a subspace
        assert_eq!(result.sections[0].non_comparable, (0..12).collect::<Vec<_>>());
        assert_eq!(result.compared_len(), 4);
        assert!(result.failed_invariants().is_empty());
    }

    #[test]
    fn generalized_pairs_mark_infinite_values() {
        let mut call = Call::<f64>::new(Dims::square(3), Options::default());
        call.set_real(Slot::Alphar, Fixture::vector(vec![2.0, 1.0, -6.0]));
        call.set_real(Slot::Alphai, Fixture::vector(vec![0.0; 3]));
        call.set_real(Slot::Beta, Fixture::vector(vec![1.0, 0.0, -2.0]));
        let rule = Rule::new(
            Slot::Alphar,
            3,
            1,
            Category::GeneralizedPairs {
                alphai: Slot::Alphai,
                beta: Slot::Beta,
            },
            presets::GENERALIZED_RATIO,
        );
        let result = canonicalize(&[rule], &call, &call, 0).expect("canonical");
        assert_eq!(
            result.sections[0].values,
            vec![
                CanonValue::Finite(2.0),
                CanonValue::Finite(0.0),
                CanonValue::Finite(3.0),
                CanonValue::Finite(-0.0),
                CanonValue::Infinite,
                CanonValue::Infinite,
            ]
        );
    }

    #[test]
    fn qr_factors_normalize_and_reconstruct() {
        let (m, n) = (5, 3);
        let a = generate::dense_general::<f64>(m, n, 1.0, 0.5, 4.0);
        let rule = Rule::new(
            Slot::A,
            m,
            n,
            Category::QrFactors {
                r: Slot::Saved,
                input: Slot::A,
            },
            presets::ORTHOGONAL_FACTOR,
        );
        let results: Vec<_> = Implementation::ALL
            .into_iter()
            .map(|imp| {
                let mut call = Call::new(
                    Dims {
                        m: m as i32,
                        n: n as i32,
                        k: n as i32,
                        ..Dims::default()
                    },
                    Options::default(),
                );
                call.set_real(Slot::A, a.clone());
                call.set_real(Slot::Tau, Fixture::zeros(n, 1));
                call.set_real(Slot::Work, Fixture::zeros(n, 1));
                call.lwork = n as i32;
                let input = call.clone();
                assert_eq!(imp.invoke(Routine::Geqrf, &mut call), 0);
                call.saved = call.a.clone();
                assert_eq!(imp.invoke(Routine::Orgqr, &mut call), 0);
                canonicalize(&[rule], &input, &call, 0).expect("canonical")
            })
            .collect();
        for result in &results {
            assert_eq!(result.sections.len(), 2);
            assert!(result.failed_invariants().is_empty(), "{:?}", result.invariants);
            let r = values(result, 1);
            // diagonal of the packed upper triangle: positions 0, 2, 5
            assert!([0, 2, 5].iter().all(|&k| r[k] >= 0.0));
        }
        for section in 0..2 {
            let lhs = values(&results[0], section);
            let rhs = values(&results[1], section);
            for (x, y) in lhs.iter().zip(&rhs) {
                assert!(approx_equal(*x, *y, 1e-12));
            }
        }
    }

    #[test]
    fn upper_bound_records_ceiling() {
        let mut call = Call::<f64>::new(Dims::square(2), Options::default());
        call.set_real(Slot::Berr, Fixture::vector(vec![1e-16, 5e-13]));
        let rule = Rule::new(
            Slot::Berr,
            2,
            1,
            Category::UpperBound,
            presets::BACKWARD_ERROR_ESTIMATE,
        );
        let result = canonicalize(&[rule], &call, &call, 0).expect("canonical");
        let failed = result.failed_invariants();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "berr ceiling");
    }

    #[test]
    fn discrete_sections_compare_exactly() {
        let mut call = Call::<f64>::new(Dims::square(2), Options::default());
        call.set_int(Slot::Rank, vec![3]);
        let rules = [Rule::discrete(Slot::Rank, 1)];
        let result = canonicalize(&rules, &call, &call, 0).expect("canonical");
        assert_eq!(result.sections[0].comparison, Comparison::Exact);
        assert_eq!(result.sections[0].values, vec![CanonValue::Finite(3.0)]);
    }

    #[test]
    fn nonzero_status_keeps_only_status() {
        let call = Call::<f64>::new(Dims::square(2), Options::default());
        let rules = [Rule::spectrum(Slot::W, 2, presets::SYMMETRIC_SPECTRUM)];
        let result = canonicalize(&rules, &call, &call, 2).expect("status only");
        assert_eq!(result.status, 2);
        assert!(result.sections.is_empty());
    }

    #[test]
    fn missing_and_short_buffers_are_reported() {
        let mut call = Call::<f64>::new(Dims::square(4), Options::default());
        let rules = [Rule::spectrum(Slot::W, 4, presets::SYMMETRIC_SPECTRUM)];
        let err = canonicalize(&rules, &call, &call, 0).expect_err("missing w");
        assert_eq!(err, CanonError::MissingOutput(Slot::W));
        call.set_real(Slot::W, Fixture::zeros(3, 1));
        let err = canonicalize(&rules, &call, &call, 0).expect_err("short w");
        assert_eq!(err.reason_code(), "canon_shape_mismatch");
    }

    #[test]
    fn canonical_output_is_a_fixed_point() {
        let (input, mut output, status) =
            syev(Implementation::Candidate, generate::hilbert::<f64>(5), Job::NoVectors);
        let rules = [Rule::spectrum(Slot::W, 5, presets::SYMMETRIC_SPECTRUM)];
        let first = canonicalize(&rules, &input, &output, status).expect("canonical");
        output.w = Some(Fixture::vector(values(&first, 0)));
        let second = canonicalize(&rules, &input, &output, status).expect("canonical");
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::normalize::{ascending_order, normalize_sign, sort_spectrum};
    use proptest::prelude::*;

    fn cases() -> u32 {
        std::env::var("LP_PROPTEST_CASES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(64)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(cases()))]

        #[test]
        fn prop_spectrum_sort_is_idempotent(mut values in prop::collection::vec(-1e6f64..1e6, 0..24)) {
            sort_spectrum(&mut values);
            let once = values.clone();
            sort_spectrum(&mut values);
            prop_assert_eq!(once, values);
        }

        #[test]
        fn prop_singular_values_are_permutation_invariant(
            values in prop::collection::vec(0.0f64..1e3, 1..16),
            rotation in 0usize..16,
        ) {
            let mut permuted = values.clone();
            let shift = rotation % permuted.len();
            permuted.rotate_left(shift);
            permuted.reverse();
            let mut lhs = values;
            sort_spectrum(&mut lhs);
            sort_spectrum(&mut permuted);
            prop_assert_eq!(lhs, permuted);
        }

        #[test]
        fn prop_sign_normalization_is_idempotent(mut vector in prop::collection::vec(-10.0f64..10.0, 1..12)) {
            normalize_sign(&mut vector, 1e-14);
            let once = vector.clone();
            prop_assert!(!normalize_sign(&mut vector, 1e-14));
            prop_assert_eq!(once, vector);
        }

        #[test]
        fn prop_ascending_order_sorts(values in prop::collection::vec(-1e3f64..1e3, 0..20)) {
            let order = ascending_order(&values);
            prop_assert!(order.windows(2).all(|w| values[w[0]] <= values[w[1]]));
        }
    }
}
