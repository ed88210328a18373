use std::path::PathBuf;

use lp_conformance::{HarnessConfig, Outcome, run_all_parity_suites, run_parity_suite};

fn scratch_config(tag: &str) -> HarnessConfig {
    let root = std::env::temp_dir().join(format!(
        "lp_conformance_{tag}_{}",
        std::process::id()
    ));
    HarnessConfig {
        report_root: root,
        parallel: false,
        ..HarnessConfig::default_paths()
    }
}

#[test]
fn parity_suites_pass() {
    let cfg = scratch_config("suites");
    let suites = run_all_parity_suites(&cfg).expect("parity suites should execute");
    assert_eq!(suites.len(), 2);

    for suite in suites {
        assert!(suite.case_count > 0, "suite {} selected nothing", suite.suite);
        assert!(
            suite.all_passed(),
            "suite {} failed with {:?}",
            suite.suite,
            suite.failures
        );
    }
}

#[test]
fn parity_report_is_written_and_filterable() {
    let cfg = HarnessConfig {
        filter: Some("potr".to_string()),
        ..scratch_config("report")
    };
    let report = run_parity_suite(&cfg).expect("parity suite should execute");
    assert!(report.all_passed());
    assert!(report.total > 0);
    assert!(report.outcomes.iter().all(|o| o.scenario_id.contains("potr")));
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| matches!(o.outcome, Outcome::Pass | Outcome::Skip))
    );

    let path: PathBuf = cfg.report_root.join("parity_report.json");
    let raw = std::fs::read_to_string(&path).expect("report written");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("report is json");
    assert_eq!(value["schema_version"], 1);
    assert_eq!(value["total"], report.total);
}
