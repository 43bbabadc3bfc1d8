use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use ti_core::{ErrorKind, Phase};
use ti_results::*;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn manifest(job_id: &str, timestamp: &str, status: JobStatus) -> JobManifest {
    JobManifest {
        job_id: job_id.to_string(),
        label: "liquid-lqd-500K-0bar".to_string(),
        timestamp: timestamp.to_string(),
        phase: Phase::Liquid,
        reference: "UhlenbeckFord".to_string(),
        seed: 42,
        stages: vec!["INIT".to_string(), "REPORT".to_string()],
        status,
        sweep_file: None,
    }
}

fn report() -> FreeEnergyReport {
    FreeEnergyReport {
        temperature: 500.0,
        pressure: 0.0,
        lattice: "fcc".to_string(),
        concentration: 0.0,
        rho: 0.0795,
        fe: -3.52,
        fe_err: 0.004,
    }
}

#[test]
fn save_list_load_roundtrip() {
    let root = unique_temp_dir("ti_results_store");
    let store = ReportStore::new(root.clone()).expect("failed to create store");

    store.save_report("job-b", &report()).expect("failed to save report");
    store
        .save_manifest(&manifest("job-b", "2026-02-26T00:00:01Z", JobStatus::Done))
        .expect("failed to save manifest");
    let failed = JobStatus::Failed {
        stage: "SWITCH".to_string(),
        kind: ErrorKind::BackendExecution,
        message: "missing backward_1.dat".to_string(),
    };
    store
        .save_manifest(&manifest("job-a", "2026-02-26T00:00:00Z", failed.clone()))
        .expect("failed to save failure");

    let jobs = store.list_jobs().expect("failed to list jobs");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].job_id, "job-a");
    assert_eq!(jobs[0].status, failed);
    assert!(jobs[1].status.is_done());

    assert_eq!(store.load_report("job-b").unwrap(), report());
    assert!(!store.has_report("job-a"));
    assert_eq!(
        store.load_report("job-a").unwrap_err().kind(),
        ErrorKind::FileNotFound
    );

    store.delete_job("job-b").unwrap();
    assert_eq!(store.list_jobs().unwrap().len(), 1);
    fs::remove_dir_all(&root).ok();
}

#[test]
fn report_is_key_value_yaml() {
    let root = unique_temp_dir("ti_results_yaml");
    let store = ReportStore::new(root.clone()).unwrap();
    let path = store.save_report("job", &report()).unwrap();
    assert_eq!(path, store.job_dir("job").join(store::REPORT_FILE));
    let text = fs::read_to_string(store.job_dir("job").join(store::REPORT_FILE)).unwrap();
    for key in ["temperature", "pressure", "lattice", "concentration", "rho", "fe", "fe_err"] {
        assert!(text.contains(&format!("{key}:")), "missing {key} in\n{text}");
    }
    fs::remove_dir_all(&root).ok();
}

#[test]
fn reports_are_written_once() {
    let root = unique_temp_dir("ti_results_once");
    let store = ReportStore::new(root.clone()).unwrap();
    store.save_report("job", &report()).unwrap();
    assert!(matches!(
        store.save_report("job", &report()),
        Err(ResultsError::AlreadyReported { .. })
    ));
    fs::remove_dir_all(&root).ok();
}

#[test]
fn non_finite_reports_are_rejected() {
    let root = unique_temp_dir("ti_results_nan");
    let store = ReportStore::new(root.clone()).unwrap();
    let mut bad = report();
    bad.fe = f64::NAN;
    let err = store.save_report("job", &bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert!(!store.has_report("job"));
    fs::remove_dir_all(&root).ok();
}

#[test]
fn report_without_done_manifest_is_incomplete() {
    let root = unique_temp_dir("ti_results_complete");
    let store = ReportStore::new(root.clone()).unwrap();
    store.save_report("job", &report()).unwrap();
    assert!(!store.is_complete("job"));

    let failed = JobStatus::Failed {
        stage: "SWEEP".to_string(),
        kind: ErrorKind::BackendExecution,
        message: "missing rs_backward_1.dat".to_string(),
    };
    store
        .save_manifest(&manifest("job", "2026-02-26T00:00:00Z", failed))
        .unwrap();
    assert!(!store.is_complete("job"));

    store
        .save_manifest(&manifest("job", "2026-02-26T00:00:01Z", JobStatus::Done))
        .unwrap();
    assert!(store.is_complete("job"));

    store.discard_report("job").unwrap();
    assert!(!store.has_report("job"));
    assert!(!store.is_complete("job"));
    store.discard_report("job").unwrap();
    fs::remove_dir_all(&root).ok();
}
