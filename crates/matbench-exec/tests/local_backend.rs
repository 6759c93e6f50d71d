#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use matbench_core::serde::{from_yaml_slice, settings_from_yaml};
use matbench_core::{Settings, Template};
use matbench_exec::{
    ExecOutcome, ExecRequest, ExecutionBackend, ExperimentDescription, LocalBackend, Scheduler,
};
use matbench_store::{scan_results, DirectoryListing, LogDuplicates, Registry, ScanOptions};

fn settings() -> Settings {
    [("size", "4"), ("mode", "fast")].into_iter().collect()
}

#[test]
fn local_run_persists_the_on_disk_contract() {
    let results = tempfile::tempdir().expect("results");
    let exec = tempfile::tempdir().expect("exec");
    let mut backend = LocalBackend::new(results.path(), exec.path());

    let settings = settings();
    let script = Template::parse("echo size={size}; echo oops >&2; exit 3").expect("template");
    let test_files = vec![("config.txt".to_string(), "threads=2".to_string())];
    let request = ExecRequest {
        experiment: "t1",
        settings: &settings,
        bench_dir: Path::new("t1/run"),
        script: Some(&script),
        index: 1,
        total: 1,
        test_files: &test_files,
    };
    let outcome = backend.execute(&request).expect("execute");
    assert_eq!(outcome, ExecOutcome::Exited(3));

    let dir = results.path().join("t1/run");
    assert_eq!(fs::read_to_string(dir.join("exit_code")).expect("exit"), "3\n");
    assert_eq!(fs::read_to_string(dir.join("stdout")).expect("stdout"), "size=4\n");
    assert_eq!(fs::read_to_string(dir.join("stderr")).expect("stderr"), "oops\n");
    assert_eq!(
        fs::read_to_string(dir.join("config.txt")).expect("companion"),
        "threads=2\n"
    );
    let written =
        settings_from_yaml(&fs::read(dir.join("settings.yaml")).expect("settings")).expect("yaml");
    assert_eq!(written, settings);
}

#[test]
fn missing_placeholder_creates_nothing() {
    let results = tempfile::tempdir().expect("results");
    let mut backend = LocalBackend::new(results.path(), results.path());
    let settings = settings();
    let script = Template::parse("run {threads}").expect("template");
    let request = ExecRequest {
        experiment: "t1",
        settings: &settings,
        bench_dir: Path::new("t1/run"),
        script: Some(&script),
        index: 1,
        total: 1,
        test_files: &[],
    };
    let err = backend.execute(&request).expect_err("missing placeholder");
    assert_eq!(err.info().code, "matbench.template.missing");
    assert!(!results.path().join("t1").exists());
}

#[test]
fn relative_programs_run_from_the_exec_dir() {
    let results = tempfile::tempdir().expect("results");
    let exec = tempfile::tempdir().expect("exec");
    let program = exec.path().join("bin/bench.sh");
    fs::create_dir_all(exec.path().join("bin")).expect("bin");
    fs::write(&program, "#!/bin/sh\necho \"bench $1\"\n").expect("script");
    fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut backend = LocalBackend::new(results.path(), exec.path());
    let settings = settings();
    let script = Template::parse("bin/bench.sh {size}").expect("template");
    let request = ExecRequest {
        experiment: "t1",
        settings: &settings,
        bench_dir: Path::new("t1/rel"),
        script: Some(&script),
        index: 1,
        total: 1,
        test_files: &[],
    };
    assert_eq!(backend.execute(&request).expect("execute"), ExecOutcome::Exited(0));
    assert_eq!(
        fs::read_to_string(results.path().join("t1/rel/stdout")).expect("stdout"),
        "bench 4\n"
    );
}

#[test]
fn scheduler_and_scanner_round_trip() {
    let results = tempfile::tempdir().expect("results");
    let description: ExperimentDescription = from_yaml_slice(
        br#"
expe:
  t1:
    size: [1, 2]
--path-tpl: "size{size}/"
--script-tpl: "echo {size}"
test_files:
  params.yaml:
    threads: 2
"#,
    )
    .expect("description");

    let registry = Registry::new();
    let backend = LocalBackend::new(results.path(), results.path());
    let report = Scheduler::new(&registry, backend)
        .run(&description)
        .expect("first run");
    assert_eq!(report.counters.executed, 2);

    let mut registry = Registry::new();
    let summary = scan_results(
        results.path(),
        &mut registry,
        &ScanOptions::default(),
        &DirectoryListing,
        &mut LogDuplicates,
    )
    .expect("scan");
    assert_eq!(summary.added, 2);

    let backend = LocalBackend::new(results.path(), results.path());
    let report = Scheduler::new(&registry, backend)
        .run(&description)
        .expect("second run");
    assert_eq!(report.counters.recorded, 2);
    assert_eq!(report.counters.executed, 0);

    let entry = registry.entries().next().expect("entry");
    assert_eq!(
        entry.payload().expect("payload")["files"],
        serde_json::json!(["exit_code", "params.yaml", "settings.yaml", "stderr", "stdout"])
    );
}

#[test]
fn sigint_in_a_child_stops_the_campaign() {
    let results = tempfile::tempdir().expect("results");
    let description: ExperimentDescription = from_yaml_slice(
        br#"
expe:
  t1:
    size: [1, 2, 3]
--path-tpl: "s{size}/"
--script-tpl: "if [ {size} = 2 ]; then kill -INT $$; fi; echo {size}"
"#,
    )
    .expect("description");

    let registry = Registry::new();
    let backend = LocalBackend::new(results.path(), results.path());
    let report = Scheduler::new(&registry, backend)
        .with_run_ids(|| "R".to_string())
        .run(&description)
        .expect("partial report");

    assert!(report.interrupted);
    assert!(report.failed());
    assert_eq!(report.counters.total, 3);
    assert_eq!(report.counters.current_index, 2);
    assert_eq!(report.counters.executed, 1);
    assert_eq!(report.counters.errors, 0);
    assert_eq!(
        fs::read_to_string(results.path().join("t1/s2/R/exit_code")).expect("exit code"),
        "130\n"
    );
    assert!(!results.path().join("t1/s3").exists());
}
