#![forbid(unsafe_code)]

//! Differential parity harness: runs every catalog scenario against the
//! reference and candidate implementations and judges the canonical
//! results against each other.

pub mod driver;
pub mod judge;
pub mod scenarios;

use core::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use lp_canon::{Rule, canonicalize};
use lp_fixture::Real;
use lp_routines::{Implementation, Slot};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::driver::{Plan, invoke_pair};
use crate::judge::judge;
use crate::scenarios::scenario_catalog;

pub const PARITY_REASON_CODES: [&str; 8] = [
    "parity_setup_error",
    "parity_status_mismatch",
    "parity_numeric_mismatch",
    "parity_infinity_mismatch",
    "parity_length_mismatch",
    "parity_invariant_violation",
    "parity_non_comparable",
    "parity_crashed",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ParityError {
    /// The harness built an unusable plan. Never a verdict on a routine.
    Setup(String),
    StatusMismatch {
        reference: i32,
        candidate: i32,
    },
    NumericMismatch {
        section: String,
        index: usize,
        expected: f64,
        actual: f64,
        bound: f64,
    },
    InfinityMismatch {
        section: String,
        index: usize,
    },
    LengthMismatch {
        section: String,
        reference: usize,
        candidate: usize,
    },
    InvariantViolation {
        implementation: Implementation,
        check: String,
        observed: f64,
        bound: f64,
    },
    NonComparable {
        section: String,
    },
    Crashed {
        implementation: Implementation,
        message: String,
    },
}

impl ParityError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Setup(_) => "parity_setup_error",
            Self::StatusMismatch { .. } => "parity_status_mismatch",
            Self::NumericMismatch { .. } => "parity_numeric_mismatch",
            Self::InfinityMismatch { .. } => "parity_infinity_mismatch",
            Self::LengthMismatch { .. } => "parity_length_mismatch",
            Self::InvariantViolation { .. } => "parity_invariant_violation",
            Self::NonComparable { .. } => "parity_non_comparable",
            Self::Crashed { .. } => "parity_crashed",
        }
    }
}

impl fmt::Display for ParityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(msg) => write!(f, "setup error: {msg}"),
            Self::StatusMismatch {
                reference,
                candidate,
            } => write!(
                f,
                "status mismatch: reference={reference} candidate={candidate}"
            ),
            Self::NumericMismatch {
                section,
                index,
                expected,
                actual,
                bound,
            } => {
                let abs_err = (expected - actual).abs();
                write!(
                    f,
                    "value mismatch in {section} at index {index}: expected={expected} actual={actual} abs_err={abs_err} threshold={bound}"
                )
            }
            Self::InfinityMismatch { section, index } => write!(
                f,
                "eigenvalue infinity mismatch in {section} at sorted index {index}"
            ),
            Self::LengthMismatch {
                section,
                reference,
                candidate,
            } => write!(
                f,
                "length mismatch in {section}: reference={reference} candidate={candidate}"
            ),
            Self::InvariantViolation {
                implementation,
                check,
                observed,
                bound,
            } => write!(
                f,
                "{} violates {check}: observed={observed} bound={bound}",
                implementation.as_str()
            ),
            Self::NonComparable { section } => write!(
                f,
                "{section} has non-comparable values and no invariant backs them"
            ),
            Self::Crashed {
                implementation,
                message,
            } => write!(f, "{} crashed: {message}", implementation.as_str()),
        }
    }
}

impl std::error::Error for ParityError {}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub report_root: PathBuf,
    pub parallel: bool,
    /// Only scenarios whose id contains this substring run.
    pub filter: Option<String>,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let repo_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        Self {
            report_root: repo_root.join("artifacts/parity"),
            parallel: true,
            filter: None,
        }
    }

    /// Default paths with `LP_PARITY_REPORT_ROOT`, `LP_PARITY_FILTER` and
    /// `LP_PARITY_SERIAL` applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default_paths();
        if let Some(root) = std::env::var_os("LP_PARITY_REPORT_ROOT") {
            config.report_root = PathBuf::from(root);
        }
        if let Ok(filter) = std::env::var("LP_PARITY_FILTER") {
            if !filter.is_empty() {
                config.filter = Some(filter);
            }
        }
        if std::env::var_os("LP_PARITY_SERIAL").is_some() {
            config.parallel = false;
        }
        config
    }

    #[must_use]
    pub fn selects(&self, scenario_id: &str) -> bool {
        self.filter
            .as_deref()
            .is_none_or(|needle| scenario_id.contains(needle))
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

/// When a scenario's comparison is known not to be meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipPolicy {
    Never,
    Always(&'static str),
    /// Skip when the two implementations report different `rank` outputs;
    /// rank under a tolerance has no unique answer.
    OnRankDivergence(&'static str),
}

#[derive(Debug, Clone)]
pub struct Scenario<T> {
    pub id: String,
    pub plan: Plan<T>,
    pub rules: Vec<Rule>,
    pub skip: SkipPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Crashed,
    SetupError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_id: String,
    pub routine: String,
    pub precision: String,
    pub outcome: Outcome,
    pub reason_code: String,
    pub detail: String,
    pub max_observed_error: f64,
    pub compared_count: usize,
    pub mismatch_index: Option<usize>,
    pub fixture_digest: String,
}

impl ScenarioOutcome {
    fn failed(mut self, err: &ParityError) -> Self {
        self.outcome = match err {
            ParityError::Setup(_) => Outcome::SetupError,
            ParityError::Crashed { .. } => Outcome::Crashed,
            _ => Outcome::Fail,
        };
        self.reason_code = err.reason_code().to_string();
        self.detail = err.to_string();
        self
    }

    fn skipped(mut self, reason: &str) -> Self {
        self.outcome = Outcome::Skip;
        self.reason_code = reason.to_string();
        self
    }
}

/// Run one scenario end to end. Never panics on behalf of a routine.
#[must_use]
pub fn run_scenario<T: Real>(scenario: &Scenario<T>) -> ScenarioOutcome {
    let routine = scenario
        .plan
        .final_routine()
        .map_or_else(|| "none".to_string(), |routine| routine.name(T::PRECISION));
    let outcome = ScenarioOutcome {
        scenario_id: scenario.id.clone(),
        routine,
        precision: T::PRECISION.as_str().to_string(),
        outcome: Outcome::Pass,
        reason_code: "parity_pass".to_string(),
        detail: String::new(),
        max_observed_error: 0.0,
        compared_count: 0,
        mismatch_index: None,
        fixture_digest: scenario.plan.setup_digest(),
    };
    if let SkipPolicy::Always(reason) = scenario.skip {
        return outcome.skipped(reason);
    }

    let (reference, candidate) = match invoke_pair(&scenario.plan) {
        Ok(pair) => pair,
        Err(err) => return outcome.failed(&err),
    };
    let mut outcome = outcome;
    outcome.routine = reference.routine.name(T::PRECISION);

    if let SkipPolicy::OnRankDivergence(reason) = scenario.skip {
        let lhs = reference.output.int(Slot::Rank);
        let rhs = candidate.output.int(Slot::Rank);
        if lhs != rhs {
            let mut skipped = outcome.skipped(reason);
            skipped.detail = format!("rank reference={lhs:?} candidate={rhs:?}");
            return skipped;
        }
    }

    let canonical = [&reference, &candidate].map(|invocation| {
        canonicalize(
            &scenario.rules,
            &scenario.plan.setup,
            &invocation.output,
            invocation.status,
        )
        .map_err(|err| {
            ParityError::Setup(format!(
                "canonicalizing {} output: {err}",
                invocation.implementation.as_str()
            ))
        })
    });
    let [expected, actual] = canonical;
    let (expected, actual) = match (expected, actual) {
        (Ok(expected), Ok(actual)) => (expected, actual),
        (Err(err), _) | (_, Err(err)) => return outcome.failed(&err),
    };

    let verdict = judge(&expected, &actual, T::PRECISION);
    outcome.max_observed_error = verdict.max_observed_error;
    outcome.compared_count = verdict.compared_count;
    outcome.mismatch_index = verdict.mismatch_index;
    match verdict.failure {
        Some(err) => outcome.failed(&err),
        None => outcome,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub pass_count: usize,
    pub skip_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.pass_count + self.skip_count == self.case_count && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioLogEntry {
    pub suite: String,
    pub scenario_id: String,
    pub routine: String,
    pub precision: String,
    pub outcome: Outcome,
    pub reason_code: String,
    pub max_observed_error: f64,
    pub compared_count: usize,
    pub mismatch_index: Option<usize>,
    pub fixture_digest: String,
    pub ts_unix_ms: u128,
}

static PARITY_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_parity_log_path(path: Option<PathBuf>) {
    let cell = PARITY_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

fn resolve_parity_log_path() -> Option<PathBuf> {
    let configured = PARITY_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    configured.or_else(|| std::env::var_os("LP_PARITY_LOG_PATH").map(PathBuf::from))
}

fn maybe_append_parity_log(entries: &[ScenarioLogEntry]) -> Result<(), String> {
    let Some(path) = resolve_parity_log_path() else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let mut payload = Vec::new();
    for entry in entries {
        let line = serde_json::to_string(entry)
            .map_err(|err| format!("failed serializing parity log entry: {err}"))?;
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
    }
    file.write_all(&payload)
        .map_err(|err| format!("failed appending parity log {}: {err}", path.display()))
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// Run the catalog at one precision. Scenarios run in parallel unless the
/// config says otherwise; log lines are written afterwards in catalog order.
pub fn run_precision_suite<T: Real>(
    suite: &'static str,
    config: &HarnessConfig,
) -> Result<(SuiteReport, Vec<ScenarioOutcome>), String> {
    let catalog: Vec<Scenario<T>> = scenario_catalog::<T>()
        .into_iter()
        .filter(|scenario| config.selects(&scenario.id))
        .collect();
    let outcomes: Vec<ScenarioOutcome> = if config.parallel {
        catalog
            .par_iter()
            .map(run_scenario)
            .collect()
    } else {
        catalog
            .iter()
            .map(run_scenario)
            .collect()
    };

    let ts_unix_ms = now_unix_ms();
    let entries: Vec<ScenarioLogEntry> = outcomes
        .iter()
        .map(|outcome| ScenarioLogEntry {
            suite: suite.to_string(),
            scenario_id: outcome.scenario_id.clone(),
            routine: outcome.routine.clone(),
            precision: outcome.precision.clone(),
            outcome: outcome.outcome,
            reason_code: outcome.reason_code.clone(),
            max_observed_error: outcome.max_observed_error,
            compared_count: outcome.compared_count,
            mismatch_index: outcome.mismatch_index,
            fixture_digest: outcome.fixture_digest.clone(),
            ts_unix_ms,
        })
        .collect();
    maybe_append_parity_log(&entries)?;

    let mut report = SuiteReport {
        suite,
        case_count: outcomes.len(),
        pass_count: 0,
        skip_count: 0,
        failures: Vec::new(),
    };
    for outcome in &outcomes {
        match outcome.outcome {
            Outcome::Pass => report.pass_count += 1,
            Outcome::Skip => report.skip_count += 1,
            Outcome::Fail | Outcome::Crashed | Outcome::SetupError => report
                .failures
                .push(format!("{}: {}", outcome.scenario_id, outcome.detail)),
        }
    }
    Ok((report, outcomes))
}

fn run_suites(config: &HarnessConfig) -> Result<Vec<(SuiteReport, Vec<ScenarioOutcome>)>, String> {
    Ok(vec![
        run_precision_suite::<f64>("parity_f64", config)?,
        run_precision_suite::<f32>("parity_f32", config)?,
    ])
}

pub fn run_all_parity_suites(config: &HarnessConfig) -> Result<Vec<SuiteReport>, String> {
    Ok(run_suites(config)?
        .into_iter()
        .map(|(report, _)| report)
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct ParityReport {
    pub schema_version: u8,
    pub generated_at_unix_ms: u128,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub suites: Vec<SuiteReport>,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ParityReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.suites.iter().all(SuiteReport::all_passed)
    }
}

pub fn write_parity_report(path: &Path, report: &ParityReport) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let raw = serde_json::to_string_pretty(report)
        .map_err(|err| format!("failed to serialize parity report: {err}"))?;
    fs::write(path, raw).map_err(|err| format!("failed writing {}: {err}", path.display()))
}

/// Run both precision suites and write `parity_report.json` under the
/// report root.
pub fn run_parity_suite(config: &HarnessConfig) -> Result<ParityReport, String> {
    let mut suites = Vec::new();
    let mut outcomes = Vec::new();
    for (report, suite_outcomes) in run_suites(config)? {
        suites.push(report);
        outcomes.extend(suite_outcomes);
    }
    let count = |wanted: &[Outcome]| {
        outcomes
            .iter()
            .filter(|outcome| wanted.contains(&outcome.outcome))
            .count()
    };
    let report = ParityReport {
        schema_version: 1,
        generated_at_unix_ms: now_unix_ms(),
        total: outcomes.len(),
        passed: count(&[Outcome::Pass]),
        failed: count(&[Outcome::Fail, Outcome::Crashed, Outcome::SetupError]),
        skipped: count(&[Outcome::Skip]),
        suites,
        outcomes,
    };
    write_parity_report(&config.report_root.join("parity_report.json"), &report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{
        HarnessConfig, Outcome, PARITY_REASON_CODES, ParityError, Scenario, SkipPolicy,
        SuiteReport, run_scenario,
    };
    use crate::driver::{Plan, Step};
    use lp_canon::Rule;
    use lp_fixture::{Fixture, generate};
    use lp_routines::{Call, Dims, Implementation, Options, Routine, Slot};
    use lp_tolerance::presets;

    fn potrf_scenario(a: Fixture<f64>, skip: SkipPolicy) -> Scenario<f64> {
        let n = a.rows();
        let mut call = Call::new(Dims::square(n), Options::default());
        call.set_real(Slot::A, a);
        Scenario {
            id: "dpotrf_test".to_string(),
            plan: Plan::new(call, vec![Step::invoke(Routine::Potrf)]),
            rules: vec![Rule::plain(Slot::A, n, n, presets::FACTOR_ENTRIES)],
            skip,
        }
    }

    #[test]
    fn reason_codes_cover_every_variant() {
        let errors = [
            ParityError::Setup(String::new()),
            ParityError::StatusMismatch {
                reference: 0,
                candidate: 1,
            },
            ParityError::NumericMismatch {
                section: "x".to_string(),
                index: 0,
                expected: 1.0,
                actual: 2.0,
                bound: 0.0,
            },
            ParityError::InfinityMismatch {
                section: "alphar".to_string(),
                index: 0,
            },
            ParityError::LengthMismatch {
                section: "w".to_string(),
                reference: 1,
                candidate: 2,
            },
            ParityError::InvariantViolation {
                implementation: Implementation::Reference,
                check: "q orthogonality".to_string(),
                observed: 1.0,
                bound: 0.0,
            },
            ParityError::NonComparable {
                section: "z".to_string(),
            },
            ParityError::Crashed {
                implementation: Implementation::Candidate,
                message: "boom".to_string(),
            },
        ];
        let codes: Vec<&str> = errors.iter().map(ParityError::reason_code).collect();
        assert_eq!(codes, PARITY_REASON_CODES);
    }

    #[test]
    fn mismatch_message_names_index_and_threshold() {
        let err = ParityError::NumericMismatch {
            section: "x".to_string(),
            index: 3,
            expected: 1.0,
            actual: 1.5,
            bound: 1e-14,
        };
        let msg = err.to_string();
        assert!(msg.contains("index 3"), "{msg}");
        assert!(msg.contains("abs_err=0.5"), "{msg}");
    }

    #[test]
    fn filter_selects_by_substring() {
        let mut config = HarnessConfig::default_paths();
        assert!(config.selects("dgetrs_solve"));
        config.filter = Some("getrs".to_string());
        assert!(config.selects("dgetrs_solve"));
        assert!(!config.selects("dsyev_values"));
    }

    #[test]
    fn positive_definite_factor_passes() {
        let scenario = potrf_scenario(generate::positive_definite(5), SkipPolicy::Never);
        let outcome = run_scenario(&scenario);
        assert_eq!(outcome.outcome, Outcome::Pass, "{}", outcome.detail);
        assert_eq!(outcome.routine, "dpotrf");
        assert_eq!(outcome.compared_count, 25);
        assert_eq!(outcome.fixture_digest.len(), 64);
    }

    #[test]
    fn missing_buffer_is_a_setup_error() {
        let mut scenario = potrf_scenario(generate::positive_definite(3), SkipPolicy::Never);
        scenario.plan.setup.a = None;
        let outcome = run_scenario(&scenario);
        assert_eq!(outcome.outcome, Outcome::SetupError);
        assert_eq!(outcome.reason_code, "parity_setup_error");
        assert!(outcome.detail.contains("dpotrf requires buffer `a`"), "{}", outcome.detail);
    }

    #[test]
    fn unconditional_skip_never_runs() {
        let mut scenario = potrf_scenario(generate::positive_definite(3), SkipPolicy::Always("known"));
        scenario.plan.setup.a = None;
        let outcome = run_scenario(&scenario);
        assert_eq!(outcome.outcome, Outcome::Skip);
        assert_eq!(outcome.reason_code, "known");
    }

    #[test]
    fn skips_count_toward_all_passed_but_not_passes() {
        let report = SuiteReport {
            suite: "parity_f64",
            case_count: 3,
            pass_count: 2,
            skip_count: 1,
            failures: Vec::new(),
        };
        assert!(report.all_passed());
        let short = SuiteReport {
            skip_count: 0,
            ..report
        };
        assert!(!short.all_passed());
    }
}
