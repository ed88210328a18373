//! Workspace sizing.
//!
//! Routines that take `work`/`lwork` reject anything below [`min_lwork`].
//! With `lwork = -1` they perform no computation and instead store
//! [`optimal_lwork`] in `work[0]`. The two implementations report different
//! optimal sizes; both are at least the minimum.

use lp_fixture::{Fixture, Real};

use crate::kernels::{dim, store_optimal};
use crate::{Dims, Implementation, Routine};

/// Block size the reference implementation reserves per column.
const REFERENCE_BLOCK: usize = 32;

/// Smallest accepted `lwork` for `routine` at `dims`.
#[must_use]
pub fn min_lwork(routine: Routine, dims: &Dims) -> usize {
    let m = dim(dims.m);
    let n = dim(dims.n);
    let nrhs = dim(dims.nrhs);
    let mn = m.min(n);
    match routine {
        Routine::Gecon => 4 * n,
        Routine::Gbrfs => 3 * n,
        Routine::Syev => (3 * n).saturating_sub(1).max(1),
        Routine::Spev => (3 * n).max(1),
        Routine::Sbev => (3 * n).saturating_sub(2).max(1),
        Routine::Geqrf | Routine::Orgqr => n.max(1),
        Routine::Gesvd => (3 * mn + m.max(n)).max(5 * mn).max(1),
        Routine::Geev => (3 * n).max(1),
        Routine::Ggev => (8 * n).max(1),
        Routine::Gelsy => (mn + 3 * n + 1).max(2 * mn + nrhs),
        _ => 0,
    }
}

/// Smallest accepted integer workspace.
#[must_use]
pub fn min_liwork(routine: Routine, dims: &Dims) -> usize {
    match routine {
        Routine::Gecon | Routine::Gbrfs => dim(dims.n),
        _ => 0,
    }
}

/// Size reported by a workspace query.
#[must_use]
pub fn optimal_lwork(routine: Routine, imp: Implementation, dims: &Dims) -> usize {
    let minimum = min_lwork(routine, dims);
    match imp {
        Implementation::Reference => minimum + REFERENCE_BLOCK * dim(dims.n),
        Implementation::Candidate => minimum,
    }
}

/// Outcome of the shared `lwork` check at the top of a routine.
pub(crate) enum WorkCheck {
    Proceed,
    /// Query answered, or `lwork` rejected; return this status.
    Return(i32),
}

/// Validate `lwork` against the work buffer, answering queries in place.
/// `position` is the 1-based argument index of `lwork`.
pub(crate) fn check_work<T: Real>(
    routine: Routine,
    imp: Implementation,
    dims: &Dims,
    lwork: i32,
    work: Option<&mut Fixture<T>>,
    position: i32,
) -> WorkCheck {
    let Some(work) = work else {
        return WorkCheck::Return(-(position - 1));
    };
    if lwork == -1 {
        store_optimal(work, optimal_lwork(routine, imp, dims));
        return WorkCheck::Return(0);
    }
    let minimum = min_lwork(routine, dims);
    match usize::try_from(lwork) {
        Ok(lwork) if lwork >= minimum && work.len() >= lwork.max(minimum) => WorkCheck::Proceed,
        _ => WorkCheck::Return(-position),
    }
}

#[cfg(test)]
mod tests {
    use super::{min_liwork, min_lwork, optimal_lwork};
    use crate::{Dims, Implementation, Routine};

    #[test]
    fn minimums_follow_documented_formulas() {
        let dims = Dims::square(10).with_rhs(2);
        assert_eq!(min_lwork(Routine::Syev, &dims), 29);
        assert_eq!(min_lwork(Routine::Ggev, &dims), 80);
        assert_eq!(min_lwork(Routine::Gesvd, &dims), 50);
        assert_eq!(min_lwork(Routine::Gelsy, &dims), 41);
        assert_eq!(min_lwork(Routine::Getrf, &dims), 0);
        assert_eq!(min_liwork(Routine::Gbrfs, &dims), 10);
    }

    #[test]
    fn empty_problems_still_need_one_word() {
        let dims = Dims::square(0);
        assert_eq!(min_lwork(Routine::Syev, &dims), 1);
        assert_eq!(min_lwork(Routine::Geqrf, &dims), 1);
    }

    #[test]
    fn negative_dimensions_count_as_empty() {
        let dims = Dims {
            n: -3,
            ..Dims::default()
        };
        assert_eq!(min_lwork(Routine::Geev, &dims), 1);
    }

    #[test]
    fn optimal_never_below_minimum() {
        let dims = Dims {
            m: 7,
            n: 4,
            nrhs: 1,
            ..Dims::default()
        };
        for routine in Routine::ALL.into_iter().filter(|r| r.supports_workspace_query()) {
            for imp in Implementation::ALL {
                assert!(optimal_lwork(routine, imp, &dims) >= min_lwork(routine, &dims));
            }
        }
        assert!(
            optimal_lwork(Routine::Geqrf, Implementation::Reference, &dims)
                > optimal_lwork(Routine::Geqrf, Implementation::Candidate, &dims)
        );
    }
}
