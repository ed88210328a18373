#![forbid(unsafe_code)]

use lp_conformance::{HarnessConfig, SuiteReport, run_parity_suite, set_parity_log_path};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
struct SuiteSummary {
    suite: String,
    case_count: usize,
    pass_count: usize,
    skip_count: usize,
    failures: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GateSummary {
    status: &'static str,
    report: String,
    parity_log: String,
    suites: Vec<SuiteSummary>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("run_parity_suite failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut cfg = HarnessConfig::from_env();
    let mut log_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--log-path" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--log-path requires a value".to_string())?;
                log_path = Some(PathBuf::from(value));
            }
            "--report-root" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--report-root requires a value".to_string())?;
                cfg.report_root = PathBuf::from(value);
            }
            "--filter" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--filter requires a value".to_string())?;
                cfg.filter = Some(value);
            }
            "--serial" => cfg.parallel = false,
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p lp-conformance --bin run_parity_suite -- [--log-path <path>] [--report-root <dir>] [--filter <substring>] [--serial]"
                );
                return Ok(());
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }

    let ts_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    let log_path = log_path.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../artifacts/logs")
            .join(format!("parity_suite_{ts_millis}.jsonl"))
    });
    set_parity_log_path(Some(log_path.clone()));

    let report = run_parity_suite(&cfg)?;

    let status = if report.all_passed() { "pass" } else { "fail" };
    let summary = GateSummary {
        status,
        report: cfg
            .report_root
            .join("parity_report.json")
            .display()
            .to_string(),
        parity_log: log_path.display().to_string(),
        suites: report.suites.into_iter().map(summarize_suite).collect(),
    };

    let summary_json = serde_json::to_string_pretty(&summary)
        .map_err(|err| format!("failed serializing summary: {err}"))?;
    println!("{summary_json}");

    if status == "fail" {
        std::process::exit(2);
    }
    Ok(())
}

fn summarize_suite(report: SuiteReport) -> SuiteSummary {
    SuiteSummary {
        suite: report.suite.to_string(),
        case_count: report.case_count,
        pass_count: report.pass_count,
        skip_count: report.skip_count,
        failures: report.failures,
    }
}
