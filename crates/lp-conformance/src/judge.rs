//! Equivalence judge over two canonical results.

use std::collections::BTreeSet;

use lp_canon::{CanonValue, CanonicalResult, Comparison, Section};
use lp_fixture::Precision;
use lp_routines::Implementation;
use lp_tolerance::{ToleranceMode, ToleranceSpec};
use serde::{Deserialize, Serialize};

use crate::ParityError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub pass: bool,
    /// Largest deviation seen among compared values, pass or fail.
    pub max_observed_error: f64,
    pub compared_count: usize,
    /// Position of the first failing value within its section.
    pub mismatch_index: Option<usize>,
    #[serde(skip)]
    pub failure: Option<ParityError>,
}

impl Verdict {
    fn passed(max_observed_error: f64, compared_count: usize) -> Self {
        Self {
            pass: true,
            max_observed_error,
            compared_count,
            mismatch_index: None,
            failure: None,
        }
    }

    fn failed(
        failure: ParityError,
        max_observed_error: f64,
        compared_count: usize,
        mismatch_index: Option<usize>,
    ) -> Self {
        Self {
            pass: false,
            max_observed_error,
            compared_count,
            mismatch_index,
            failure: Some(failure),
        }
    }
}

struct Walk {
    max_error: f64,
    compared: usize,
}

/// Compare `reference` against `candidate`.
///
/// Statuses must match exactly before any value is looked at. Values are
/// then walked section by section; the walk stops at the first value
/// outside its bound. Sections are expected in the same order with the
/// same names and lengths on both sides, which `canonicalize` guarantees
/// for equal rules and equal statuses.
#[must_use]
pub fn judge(
    reference: &CanonicalResult,
    candidate: &CanonicalResult,
    precision: Precision,
) -> Verdict {
    if reference.status != candidate.status {
        return Verdict::failed(
            ParityError::StatusMismatch {
                reference: reference.status,
                candidate: candidate.status,
            },
            0.0,
            0,
            None,
        );
    }

    let mut walk = Walk {
        max_error: 0.0,
        compared: 0,
    };

    if reference.sections.len() != candidate.sections.len() {
        return Verdict::failed(
            ParityError::LengthMismatch {
                section: "sections".to_string(),
                reference: reference.sections.len(),
                candidate: candidate.sections.len(),
            },
            walk.max_error,
            walk.compared,
            None,
        );
    }

    for (expected, actual) in reference.sections.iter().zip(&candidate.sections) {
        if let Err((failure, index)) = compare_section(expected, actual, precision, &mut walk) {
            return Verdict::failed(failure, walk.max_error, walk.compared, index);
        }
    }

    for (implementation, result) in [
        (Implementation::Reference, reference),
        (Implementation::Candidate, candidate),
    ] {
        if let Some(check) = result.failed_invariants().first() {
            return Verdict::failed(
                ParityError::InvariantViolation {
                    implementation,
                    check: check.name.clone(),
                    observed: check.observed,
                    bound: check.bound,
                },
                walk.max_error,
                walk.compared,
                None,
            );
        }
    }

    // Skipped values need the section's own orthogonality check on both sides.
    let unbacked = reference
        .sections
        .iter()
        .zip(&candidate.sections)
        .find(|(lhs, rhs)| {
            let skipped = !lhs.non_comparable.is_empty() || !rhs.non_comparable.is_empty();
            skipped && !(vouches_for(reference, &lhs.name) && vouches_for(candidate, &rhs.name))
        });
    if let Some((section, _)) = unbacked {
        return Verdict::failed(
            ParityError::NonComparable {
                section: section.name.clone(),
            },
            walk.max_error,
            walk.compared,
            None,
        );
    }

    Verdict::passed(walk.max_error, walk.compared)
}

fn vouches_for(result: &CanonicalResult, section: &str) -> bool {
    let wanted = format!("{section} orthogonality");
    result.invariants.iter().any(|check| check.name == wanted)
}

fn compare_section(
    expected: &Section,
    actual: &Section,
    precision: Precision,
    walk: &mut Walk,
) -> Result<(), (ParityError, Option<usize>)> {
    if expected.name != actual.name || expected.values.len() != actual.values.len() {
        return Err((
            ParityError::LengthMismatch {
                section: expected.name.clone(),
                reference: expected.values.len(),
                candidate: actual.values.len(),
            },
            None,
        ));
    }

    let skipped: BTreeSet<usize> = expected
        .non_comparable
        .iter()
        .chain(&actual.non_comparable)
        .copied()
        .collect();
    let pairs_per_value = if expected.category == "generalized_pairs" {
        2
    } else {
        1
    };

    let (spec, section_magnitude) = match expected.comparison {
        Comparison::Exact => (None, 0.0),
        Comparison::Tolerance(mode) => {
            let magnitude = match mode {
                ToleranceMode::ScaledByExponent { .. } => expected
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !skipped.contains(idx))
                    .filter_map(|(_, value)| value.finite())
                    .fold(0.0f64, |acc, value| acc.max(value.abs())),
                ToleranceMode::Absolute { .. } | ToleranceMode::Relative { .. } => 0.0,
            };
            let per_element = !matches!(mode, ToleranceMode::ScaledByExponent { .. });
            (
                Some((ToleranceSpec::for_precision(mode, precision), per_element)),
                magnitude,
            )
        }
    };

    for (idx, (lhs, rhs)) in expected.values.iter().zip(&actual.values).enumerate() {
        if skipped.contains(&idx) {
            continue;
        }
        let (lhs, rhs) = match (*lhs, *rhs) {
            (CanonValue::Infinite, CanonValue::Infinite) => {
                walk.compared += 1;
                continue;
            }
            (CanonValue::Finite(lhs), CanonValue::Finite(rhs)) => (lhs, rhs),
            _ => {
                return Err((
                    ParityError::InfinityMismatch {
                        section: expected.name.clone(),
                        index: idx / pairs_per_value,
                    },
                    Some(idx),
                ));
            }
        };

        let error = (lhs - rhs).abs();
        let error = if error.is_nan() { f64::INFINITY } else { error };
        walk.max_error = walk.max_error.max(error);
        walk.compared += 1;

        let bound = match spec {
            None => 0.0,
            Some((spec, true)) => spec.bound(lhs),
            Some((spec, false)) => spec.bound(section_magnitude),
        };
        if !(error <= bound) {
            return Err((
                ParityError::NumericMismatch {
                    section: expected.name.clone(),
                    index: idx,
                    expected: lhs,
                    actual: rhs,
                    bound,
                },
                Some(idx),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::judge;
    use crate::ParityError;
    use lp_canon::{CanonValue, CanonicalResult, Comparison, InvariantCheck, Section};
    use lp_fixture::Precision;
    use lp_routines::Implementation;
    use lp_tolerance::presets;

    fn section(name: &str, values: &[f64]) -> Section {
        Section {
            name: name.to_string(),
            category: "plain",
            comparison: Comparison::Tolerance(presets::DIRECT_SOLVE),
            values: values.iter().copied().map(CanonValue::Finite).collect(),
            non_comparable: Vec::new(),
        }
    }

    fn result(sections: Vec<Section>) -> CanonicalResult {
        CanonicalResult {
            status: 0,
            sections,
            invariants: Vec::new(),
        }
    }

    #[test]
    fn rounding_differences_pass_and_report_max_error() {
        let lhs = result(vec![section("x", &[1.0, 2.0, 3.0])]);
        let rhs = result(vec![section("x", &[1.0, 2.0 + 4e-15, 3.0 - 1e-15])]);
        let verdict = judge(&lhs, &rhs, Precision::Double);
        assert!(verdict.pass, "{:?}", verdict.failure);
        assert_eq!(verdict.compared_count, 3);
        assert!(verdict.max_observed_error > 3e-15);
        assert_eq!(verdict.mismatch_index, None);
    }

    #[test]
    fn first_exceedance_stops_the_walk() {
        let lhs = result(vec![section("x", &[1.0, 2.0, 3.0, 4.0])]);
        let rhs = result(vec![section("x", &[1.0, 2.1, 3.5, 4.0])]);
        let verdict = judge(&lhs, &rhs, Precision::Double);
        assert!(!verdict.pass);
        assert_eq!(verdict.mismatch_index, Some(1));
        assert_eq!(verdict.compared_count, 2);
        match verdict.failure {
            Some(ParityError::NumericMismatch { index, expected, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, 2.0);
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn status_mismatch_skips_numeric_judgment() {
        let mut lhs = result(vec![section("x", &[1.0])]);
        let rhs = result(vec![section("x", &[9.0])]);
        lhs.status = 3;
        let verdict = judge(&lhs, &rhs, Precision::Double);
        assert_eq!(verdict.compared_count, 0);
        assert_eq!(
            verdict.failure,
            Some(ParityError::StatusMismatch {
                reference: 3,
                candidate: 0
            })
        );
    }

    #[test]
    fn single_precision_widens_the_bound() {
        let lhs = result(vec![section("x", &[1.0])]);
        let rhs = result(vec![section("x", &[1.0 + 1e-6])]);
        assert!(!judge(&lhs, &rhs, Precision::Double).pass);
        assert!(judge(&lhs, &rhs, Precision::Single).pass);
    }

    #[test]
    fn infinities_match_only_each_other() {
        let pairs = |values: [CanonValue; 4]| Section {
            name: "alphar".to_string(),
            category: "generalized_pairs",
            comparison: Comparison::Tolerance(presets::GENERALIZED_RATIO),
            values: values.to_vec(),
            non_comparable: Vec::new(),
        };
        let inf = CanonValue::Infinite;
        let lhs = result(vec![pairs([CanonValue::Finite(1.0), CanonValue::Finite(0.0), inf, inf])]);
        let same = result(vec![pairs([CanonValue::Finite(1.0), CanonValue::Finite(0.0), inf, inf])]);
        assert!(judge(&lhs, &same, Precision::Double).pass);

        let finite = result(vec![pairs([
            CanonValue::Finite(1.0),
            CanonValue::Finite(0.0),
            CanonValue::Finite(2.0),
            CanonValue::Finite(0.0),
        ])]);
        let verdict = judge(&lhs, &finite, Precision::Double);
        assert_eq!(
            verdict.failure,
            Some(ParityError::InfinityMismatch {
                section: "alphar".to_string(),
                index: 1
            })
        );
    }

    #[test]
    fn nan_never_passes() {
        let lhs = result(vec![section("x", &[1.0])]);
        let rhs = result(vec![section("x", &[f64::NAN])]);
        let verdict = judge(&lhs, &rhs, Precision::Double);
        assert!(!verdict.pass);
        assert_eq!(verdict.max_observed_error, f64::INFINITY);
    }

    #[test]
    fn exact_sections_reject_any_difference() {
        let mut lhs_section = section("ipiv", &[1.0, 2.0]);
        lhs_section.comparison = Comparison::Exact;
        let mut rhs_section = section("ipiv", &[1.0, 3.0]);
        rhs_section.comparison = Comparison::Exact;
        let verdict = judge(&result(vec![lhs_section]), &result(vec![rhs_section]), Precision::Single);
        assert_eq!(verdict.mismatch_index, Some(1));
    }

    #[test]
    fn length_or_name_disagreement_is_reported() {
        let lhs = result(vec![section("x", &[1.0, 2.0])]);
        let rhs = result(vec![section("x", &[1.0])]);
        assert!(matches!(
            judge(&lhs, &rhs, Precision::Double).failure,
            Some(ParityError::LengthMismatch { reference: 2, candidate: 1, .. })
        ));
        let renamed = result(vec![section("y", &[1.0, 2.0])]);
        assert!(!judge(&lhs, &renamed, Precision::Double).pass);
    }

    #[test]
    fn non_comparable_values_need_an_invariant() {
        let mut skipped = section("z", &[1.0, 5.0]);
        skipped.non_comparable = vec![1];
        let mut other = section("z", &[1.0, -5.0]);
        other.non_comparable = vec![1];
        let lhs = result(vec![skipped]);
        let rhs = result(vec![other]);
        assert_eq!(
            judge(&lhs, &rhs, Precision::Double).failure,
            Some(ParityError::NonComparable {
                section: "z".to_string()
            })
        );

        let check = InvariantCheck {
            name: "z orthogonality".to_string(),
            observed: 1e-15,
            bound: 1e-12,
        };
        let mut backed_lhs = lhs.clone();
        backed_lhs.invariants.push(check.clone());
        let mut backed_rhs = rhs.clone();
        backed_rhs.invariants.push(check);
        let verdict = judge(&backed_lhs, &backed_rhs, Precision::Double);
        assert!(verdict.pass);
        assert_eq!(verdict.compared_count, 1);
    }

    #[test]
    fn unrelated_invariant_does_not_back_skipped_values() {
        let mut skipped = section("z", &[1.0, 5.0]);
        skipped.non_comparable = vec![1];
        let mut lhs = result(vec![skipped.clone(), section("berr", &[1e-16])]);
        let mut rhs = result(vec![skipped, section("berr", &[1e-16])]);
        let ceiling = InvariantCheck {
            name: "berr ceiling".to_string(),
            observed: 1e-16,
            bound: 1e-13,
        };
        lhs.invariants.push(ceiling.clone());
        rhs.invariants.push(ceiling);
        assert_eq!(
            judge(&lhs, &rhs, Precision::Double).failure,
            Some(ParityError::NonComparable {
                section: "z".to_string()
            })
        );

        // one side alone is not enough
        lhs.invariants.push(InvariantCheck {
            name: "z orthogonality".to_string(),
            observed: 1e-15,
            bound: 1e-12,
        });
        assert!(!judge(&lhs, &rhs, Precision::Double).pass);
    }

    #[test]
    fn zero_expectation_tolerates_rounding_noise() {
        let lhs = result(vec![section("x", &[0.0, 0.0])]);
        let rhs = result(vec![section("x", &[0.0, 1e-20])]);
        let verdict = judge(&lhs, &rhs, Precision::Double);
        assert!(verdict.pass, "{:?}", verdict.failure);
        assert_eq!(verdict.compared_count, 2);

        let gross = result(vec![section("x", &[0.0, 1e-6])]);
        assert_eq!(judge(&lhs, &gross, Precision::Double).mismatch_index, Some(1));
    }

    #[test]
    fn differing_positive_statuses_fail() {
        let mut lhs = result(vec![section("x", &[1.0])]);
        let mut rhs = lhs.clone();
        lhs.status = 1;
        rhs.status = 2;
        let verdict = judge(&lhs, &rhs, Precision::Double);
        assert!(!verdict.pass);
        assert_eq!(
            verdict.failure,
            Some(ParityError::StatusMismatch {
                reference: 1,
                candidate: 2
            })
        );
    }

    #[test]
    fn invariant_violation_names_the_implementation() {
        let lhs = result(vec![section("q", &[1.0])]);
        let mut rhs = lhs.clone();
        rhs.invariants.push(InvariantCheck {
            name: "q orthogonality".to_string(),
            observed: 0.5,
            bound: 1e-12,
        });
        match judge(&lhs, &rhs, Precision::Double).failure {
            Some(ParityError::InvariantViolation {
                implementation,
                check,
                ..
            }) => {
                assert_eq!(implementation, Implementation::Candidate);
                assert_eq!(check, "q orthogonality");
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::judge;
    use lp_canon::{CanonValue, CanonicalResult, Comparison, Section};
    use lp_fixture::Precision;
    use lp_tolerance::presets;
    use proptest::prelude::*;

    fn cases() -> u32 {
        std::env::var("LP_PROPTEST_CASES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(64)
    }

    fn result(values: &[f64]) -> CanonicalResult {
        CanonicalResult {
            status: 0,
            sections: vec![Section {
                name: "x".to_string(),
                category: "plain",
                comparison: Comparison::Tolerance(presets::DIRECT_SOLVE),
                values: values.iter().copied().map(CanonValue::Finite).collect(),
                non_comparable: Vec::new(),
            }],
            invariants: Vec::new(),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(cases()))]

        #[test]
        fn identical_outputs_always_pass(values in prop::collection::vec(-100.0f64..100.0, 1..32)) {
            let lhs = result(&values);
            let verdict = judge(&lhs, &lhs.clone(), Precision::Double);
            prop_assert!(verdict.pass);
            prop_assert_eq!(verdict.compared_count, values.len());
            prop_assert_eq!(verdict.max_observed_error, 0.0);
        }

        #[test]
        fn gross_perturbation_is_located(
            values in prop::collection::vec(-100.0f64..100.0, 1..32),
            pick in any::<prop::sample::Index>(),
        ) {
            let index = pick.index(values.len());
            let mut perturbed = values.clone();
            perturbed[index] += 1.0;
            let verdict = judge(&result(&values), &result(&perturbed), Precision::Double);
            prop_assert!(!verdict.pass);
            prop_assert_eq!(verdict.mismatch_index, Some(index));
            prop_assert_eq!(verdict.compared_count, index + 1);
        }
    }
}
