//! Dual invocation: one plan, two implementations, independent buffers.
//!
//! Each implementation starts from its own deep copy of the plan's setup,
//! so in-place overwrites never leak between implementations or into the
//! setup that later canonicalization reads as the pristine input.
//! Workspace is allocated here from the centralized size formulas; a
//! plan never carries scratch buffers unless it opts out with
//! [`Workspace::AsGiven`].

use std::panic::{AssertUnwindSafe, catch_unwind};

use lp_fixture::{Fixture, Real};
use lp_routines::workspace::{min_liwork, min_lwork};
use lp_routines::{Call, Implementation, Routine, Slot, StatusClass, to_dim};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ParityError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Call `routine`. Each `(formal, actual)` pair binds the routine's
    /// formal buffer to a differently named buffer for this call only.
    Invoke {
        routine: Routine,
        aliases: Vec<(Slot, Slot)>,
    },
    /// Copy buffer `from` into `to`.
    Snapshot { from: Slot, to: Slot },
}

impl Step {
    #[must_use]
    pub fn invoke(routine: Routine) -> Self {
        Self::Invoke {
            routine,
            aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn invoke_aliased(routine: Routine, aliases: &[(Slot, Slot)]) -> Self {
        Self::Invoke {
            routine,
            aliases: aliases.to_vec(),
        }
    }

    #[must_use]
    pub fn snapshot(from: Slot, to: Slot) -> Self {
        Self::Snapshot { from, to }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workspace {
    /// Allocate each routine's documented minimum.
    Minimum,
    /// Ask each routine for its optimal size with `lwork = -1`, then
    /// allocate that. Routines without a query mode get the minimum.
    Query,
    /// Leave the setup's buffers untouched. For argument-checking plans.
    AsGiven,
}

#[derive(Debug, Clone)]
pub struct Plan<T> {
    pub setup: Call<T>,
    pub steps: Vec<Step>,
    pub workspace: Workspace,
}

impl<T: Real> Plan<T> {
    #[must_use]
    pub fn new(setup: Call<T>, steps: Vec<Step>) -> Self {
        Self {
            setup,
            steps,
            workspace: Workspace::Minimum,
        }
    }

    #[must_use]
    pub fn with_workspace(mut self, workspace: Workspace) -> Self {
        self.workspace = workspace;
        self
    }

    /// The last routine the plan calls.
    #[must_use]
    pub fn final_routine(&self) -> Option<Routine> {
        self.steps.iter().rev().find_map(|step| match step {
            Step::Invoke { routine, .. } => Some(*routine),
            Step::Snapshot { .. } => None,
        })
    }

    /// Hex SHA-256 over every buffer of the setup.
    #[must_use]
    pub fn setup_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for slot in Slot::ALL {
            if let Some(fixture) = self.setup.real(slot) {
                hasher.update(slot.as_str().as_bytes());
                hasher.update(fixture.digest().as_bytes());
            } else if let Some(values) = self.setup.int(slot) {
                hasher.update(slot.as_str().as_bytes());
                for value in values {
                    hasher.update(value.to_le_bytes());
                }
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// What one implementation produced for a plan.
#[derive(Debug, Clone)]
pub struct RoutineInvocation<T> {
    pub implementation: Implementation,
    /// The routine whose status is reported: the first to return non-zero,
    /// else the last one called.
    pub routine: Routine,
    pub status: i32,
    pub output: Call<T>,
}

impl<T> RoutineInvocation<T> {
    #[must_use]
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_info(self.status)
    }
}

/// Run `plan` against the reference, then the candidate.
pub fn invoke_pair<T: Real>(
    plan: &Plan<T>,
) -> Result<(RoutineInvocation<T>, RoutineInvocation<T>), ParityError> {
    let reference = invoke_isolated(Implementation::Reference, plan)?;
    let candidate = invoke_isolated(Implementation::Candidate, plan)?;
    Ok((reference, candidate))
}

/// Run `plan` against one implementation; a panic becomes
/// [`ParityError::Crashed`].
pub fn invoke_isolated<T: Real>(
    implementation: Implementation,
    plan: &Plan<T>,
) -> Result<RoutineInvocation<T>, ParityError> {
    match catch_unwind(AssertUnwindSafe(|| execute(implementation, plan))) {
        Ok(result) => result,
        Err(payload) => Err(ParityError::Crashed {
            implementation,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn execute<T: Real>(
    implementation: Implementation,
    plan: &Plan<T>,
) -> Result<RoutineInvocation<T>, ParityError> {
    let mut call = plan.setup.clone();
    let mut last = None;
    for step in &plan.steps {
        match step {
            Step::Snapshot { from, to } => snapshot(&mut call, *from, *to)?,
            Step::Invoke { routine, aliases } => {
                bind(&mut call, aliases)?;
                let status = run_step(implementation, *routine, &mut call, plan.workspace);
                for &(formal, actual) in aliases.iter().rev() {
                    call.swap_slots(formal, actual);
                }
                let status = status?;
                last = Some((*routine, status));
                if status != 0 {
                    break;
                }
            }
        }
    }
    let (routine, status) =
        last.ok_or_else(|| ParityError::Setup("plan calls no routine".to_string()))?;
    Ok(RoutineInvocation {
        implementation,
        routine,
        status,
        output: call,
    })
}

fn bind<T: Real>(call: &mut Call<T>, aliases: &[(Slot, Slot)]) -> Result<(), ParityError> {
    for &(formal, actual) in aliases {
        if !call.swap_slots(formal, actual) {
            return Err(ParityError::Setup(format!(
                "cannot bind `{formal}` to `{actual}`: element types differ"
            )));
        }
    }
    Ok(())
}

fn snapshot<T: Real>(call: &mut Call<T>, from: Slot, to: Slot) -> Result<(), ParityError> {
    let missing = || ParityError::Setup(format!("snapshot source `{from}` is absent"));
    let stored = if from.is_integer() {
        let values = call.int(from).map(<[i32]>::to_vec).ok_or_else(missing)?;
        call.set_int(to, values)
    } else {
        let fixture = call.real(from).cloned().ok_or_else(missing)?;
        call.set_real(to, fixture)
    };
    if stored {
        Ok(())
    } else {
        Err(ParityError::Setup(format!(
            "cannot snapshot `{from}` into `{to}`: element types differ"
        )))
    }
}

fn run_step<T: Real>(
    implementation: Implementation,
    routine: Routine,
    call: &mut Call<T>,
    workspace: Workspace,
) -> Result<i32, ParityError> {
    let name = routine.name(T::PRECISION);
    let managed = |slot: Slot| {
        workspace != Workspace::AsGiven && matches!(slot, Slot::Work | Slot::Iwork)
    };
    for slot in routine.required_slots(&call.options) {
        if !managed(slot) && !call.has(slot) {
            return Err(ParityError::Setup(format!("{name} requires buffer `{slot}`")));
        }
    }
    if workspace == Workspace::AsGiven {
        check_given_workspace(routine, call)?;
    } else {
        prepare_workspace(implementation, routine, call, workspace)?;
    }
    Ok(implementation.invoke(routine, call))
}

/// A plan that supplies its own scratch buffers must still meet the
/// documented minimums; only a workspace query may pass less.
fn check_given_workspace<T: Real>(routine: Routine, call: &Call<T>) -> Result<(), ParityError> {
    let name = routine.name(T::PRECISION);
    let required = routine.required_slots(&call.options);
    if required.contains(&Slot::Work) && call.lwork != -1 {
        let minimum = min_lwork(routine, &call.dims);
        let given = call.work.as_ref().map_or(0, Fixture::len);
        let declared = usize::try_from(call.lwork).unwrap_or(0);
        if given < minimum || declared < minimum {
            return Err(ParityError::Setup(format!(
                "{name} given work of {given} with lwork {}, below the minimum {minimum}",
                call.lwork
            )));
        }
    }
    if required.contains(&Slot::Iwork) {
        let minimum = min_liwork(routine, &call.dims);
        let given = call.iwork.as_ref().map_or(0, Vec::len);
        if given < minimum {
            return Err(ParityError::Setup(format!(
                "{name} given iwork of {given}, below the minimum {minimum}"
            )));
        }
    }
    Ok(())
}

fn prepare_workspace<T: Real>(
    implementation: Implementation,
    routine: Routine,
    call: &mut Call<T>,
    workspace: Workspace,
) -> Result<(), ParityError> {
    let required = routine.required_slots(&call.options);
    if required.contains(&Slot::Work) {
        let minimum = min_lwork(routine, &call.dims).max(1);
        let size = if workspace == Workspace::Query && routine.supports_workspace_query() {
            let optimal = query_workspace(implementation, routine, call)?;
            if optimal < minimum {
                return Err(ParityError::Setup(format!(
                    "{} workspace query returned {optimal}, below the minimum {minimum}",
                    routine.name(T::PRECISION)
                )));
            }
            optimal
        } else {
            minimum
        };
        call.work = Some(Fixture::zeros(size, 1));
        call.lwork = to_dim(size);
    }
    if required.contains(&Slot::Iwork) {
        call.iwork = Some(vec![0; min_liwork(routine, &call.dims).max(1)]);
    }
    Ok(())
}

/// Optimal workspace size reported by `lwork = -1`.
pub fn query_workspace<T: Real>(
    implementation: Implementation,
    routine: Routine,
    call: &Call<T>,
) -> Result<usize, ParityError> {
    let name = routine.name(T::PRECISION);
    let mut query = call.clone();
    query.work = Some(Fixture::zeros(1, 1));
    query.lwork = -1;
    let status = implementation.invoke(routine, &mut query);
    if status != 0 {
        return Err(ParityError::Setup(format!(
            "{name} workspace query failed with status {status}"
        )));
    }
    let optimal = query
        .work
        .as_ref()
        .and_then(|work| work.data().first().copied())
        .map_or(f64::NAN, Real::to_f64);
    if !(optimal.is_finite() && optimal >= 0.0) {
        return Err(ParityError::Setup(format!(
            "{name} workspace query wrote {optimal}"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(optimal.round() as usize)
}

#[cfg(test)]
mod tests {
    use super::{Plan, Step, Workspace, invoke_isolated, invoke_pair, panic_message};
    use crate::ParityError;
    use lp_fixture::{BandLayout, Fixture, generate};
    use lp_routines::workspace::min_lwork;
    use lp_routines::{Call, Dims, Implementation, Job, Options, Routine, Slot};

    fn banded_plan() -> Plan<f64> {
        let dense = generate::diagonally_dominant_band::<f64>(5, 1, 1);
        let mut call = Call::new(
            Dims {
                kl: 1,
                ku: 1,
                ..Dims::square(5).with_rhs(1)
            },
            Options::default(),
        );
        call.set_real(Slot::Ab, dense.to_band(1, 1, BandLayout::Plain));
        call.set_real(Slot::Afb, dense.to_band(1, 1, BandLayout::Factor));
        call.set_real(Slot::B, generate::ramp(5, 1.0));
        call.ipiv = Some(vec![0; 5]);
        Plan::new(
            call,
            vec![
                Step::invoke_aliased(Routine::Gbtrf, &[(Slot::Ab, Slot::Afb)]),
                Step::invoke_aliased(Routine::Gbtrs, &[(Slot::Ab, Slot::Afb)]),
            ],
        )
    }

    #[test]
    fn aliases_are_unbound_after_each_call() {
        let plan = banded_plan();
        let (reference, candidate) = invoke_pair(&plan).expect("invocation");
        for invocation in [reference, candidate] {
            assert_eq!(invocation.status, 0);
            assert_eq!(invocation.routine, Routine::Gbtrs);
            assert_eq!(invocation.output.real(Slot::Ab).map(Fixture::ld), Some(3));
            assert_eq!(invocation.output.real(Slot::Afb).map(Fixture::ld), Some(4));
            // plain band untouched, factor band overwritten
            assert_eq!(invocation.output.real(Slot::Ab), plan.setup.real(Slot::Ab));
            assert_ne!(invocation.output.real(Slot::Afb), plan.setup.real(Slot::Afb));
        }
    }

    #[test]
    fn setup_is_never_mutated() {
        let plan = banded_plan();
        let before = plan.setup_digest();
        invoke_pair(&plan).expect("invocation");
        assert_eq!(plan.setup_digest(), before);
        assert_eq!(before.len(), 64);
    }

    #[test]
    fn query_mode_allocates_each_implementation_its_optimum() {
        let mut call = Call::new(
            Dims::square(6),
            Options {
                jobz: Job::NoVectors,
                ..Options::default()
            },
        );
        call.set_real(Slot::A, generate::positive_definite(6));
        call.set_real(Slot::W, Fixture::zeros(6, 1));
        let minimum = min_lwork(Routine::Syev, &call.dims).max(1);
        let plan = Plan::new(call, vec![Step::invoke(Routine::Syev)]).with_workspace(Workspace::Query);

        let (reference, candidate) = invoke_pair(&plan).expect("invocation");
        let work_len = |call: &lp_routines::Call<f64>| call.real(Slot::Work).map(Fixture::len);
        assert_eq!(work_len(&candidate.output), Some(minimum));
        assert!(work_len(&reference.output) > Some(minimum));
    }

    #[test]
    fn minimum_mode_allocates_documented_minimum() {
        let mut call: Call<f64> = Call::new(Dims::square(4), Options::default());
        call.set_real(Slot::A, generate::positive_definite(4));
        call.set_real(Slot::W, Fixture::zeros(4, 1));
        let minimum = min_lwork(Routine::Syev, &call.dims).max(1);
        let plan = Plan::new(call, vec![Step::invoke(Routine::Syev)]);
        let reference =
            invoke_isolated(Implementation::Reference, &plan).expect("invocation");
        assert_eq!(reference.status, 0);
        assert_eq!(reference.output.real(Slot::Work).map(Fixture::len), Some(minimum));
    }

    fn syev_as_given(work_len: usize, lwork: i32) -> Plan<f64> {
        let mut call: Call<f64> = Call::new(Dims::square(4), Options::default());
        call.set_real(Slot::A, generate::positive_definite(4));
        call.set_real(Slot::W, Fixture::zeros(4, 1));
        call.set_real(Slot::Work, Fixture::zeros(work_len, 1));
        call.lwork = lwork;
        Plan::new(call, vec![Step::invoke(Routine::Syev)]).with_workspace(Workspace::AsGiven)
    }

    #[test]
    fn undersized_given_workspace_fails_setup() {
        // minimum for n = 4 is 11
        for (work_len, lwork) in [(2, 2), (20, 2), (2, 11)] {
            let plan = syev_as_given(work_len, lwork);
            let err = invoke_isolated(Implementation::Reference, &plan).expect_err("undersized");
            assert!(
                matches!(&err, ParityError::Setup(message) if message.contains("below the minimum 11")),
                "{err}"
            );
        }
        let outcome = crate::run_scenario(
            &crate::Scenario {
                id: "dsyev_short".to_string(),
                plan: syev_as_given(2, 2),
                rules: Vec::new(),
                skip: crate::SkipPolicy::Never,
            });
        assert_eq!(outcome.outcome, crate::Outcome::SetupError);
    }

    #[test]
    fn sufficient_given_workspace_runs() {
        let plan = syev_as_given(11, 11);
        let (reference, candidate) = invoke_pair(&plan).expect("invocation");
        assert_eq!(reference.status, 0);
        assert_eq!(candidate.status, 0);
    }

    #[test]
    fn plan_without_routine_is_a_setup_error() {
        let mut call = Call::<f64>::new(Dims::square(2), Options::default());
        call.set_real(Slot::B, Fixture::zeros(2, 1));
        let plan = Plan::new(call, vec![Step::snapshot(Slot::B, Slot::X)]);
        let err = invoke_isolated(Implementation::Candidate, &plan).expect_err("no routine");
        assert_eq!(err, ParityError::Setup("plan calls no routine".to_string()));
    }

    #[test]
    fn snapshot_of_absent_buffer_fails() {
        let call = Call::<f64>::new(Dims::square(2), Options::default());
        let plan = Plan::new(
            call,
            vec![Step::snapshot(Slot::A, Slot::Saved), Step::invoke(Routine::Lange)],
        );
        let err = invoke_isolated(Implementation::Reference, &plan).expect_err("absent");
        assert!(err.to_string().contains("snapshot source `a` is absent"), "{err}");
    }

    #[test]
    fn cross_type_alias_is_rejected() {
        let mut call = Call::<f64>::new(Dims::square(2), Options::default());
        call.set_real(Slot::A, generate::positive_definite(2));
        call.ipiv = Some(vec![0; 2]);
        let plan = Plan::new(
            call,
            vec![Step::invoke_aliased(Routine::Getrf, &[(Slot::A, Slot::Ipiv)])],
        );
        let err = invoke_isolated(Implementation::Reference, &plan).expect_err("bad alias");
        assert!(err.to_string().contains("element types differ"), "{err}");
    }

    #[test]
    fn panic_payloads_are_decoded() {
        let payload = std::panic::catch_unwind::<_, ()>(|| panic!("kernel exploded"))
            .expect_err("panics");
        assert_eq!(panic_message(payload.as_ref()), "kernel exploded");
        let formatted = std::panic::catch_unwind::<_, ()>(|| panic!("index {}", 7)).expect_err("panics");
        assert_eq!(panic_message(formatted.as_ref()), "index 7");
    }

    #[test]
    fn steps_serialize_with_tag() {
        let step = Step::snapshot(Slot::A, Slot::Saved);
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(json["step"], "snapshot");
    }
}
