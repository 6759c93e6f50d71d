use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn matbench(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_matbench"))
        .args(args)
        .current_dir(dir)
        .env_clear()
        .output()
        .expect("run matbench")
}

const BENCHMARK: &str = r#"
expe:
  grid:
    size: [1, 2, 3]
--path-tpl: "size_{size}/"
--script-tpl: "echo {size}"
"#;

#[test]
fn dry_benchmark_previews_without_writing() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("bench.yaml"), BENCHMARK).expect("write");
    let output = matbench(
        dir.path(),
        &[
            "benchmark",
            "--benchmark-file",
            "bench.yaml",
            "--results-dirname",
            "results",
            "--report",
            "out/report.json",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(!dir.path().join("results").exists());

    let report: Value =
        serde_json::from_slice(&fs::read(dir.path().join("out/report.json")).expect("report"))
            .expect("json");
    assert_eq!(report["counters"]["previewed"], 3);
    assert_eq!(report["counters"]["executed"], 0);
}

#[test]
fn benchmark_requires_results_dirname() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("bench.yaml"), BENCHMARK).expect("write");
    let output = matbench(dir.path(), &["benchmark", "--benchmark-file", "bench.yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("results-dirname"));
}

#[test]
fn parse_exports_completed_runs() {
    let dir = tempdir().expect("tempdir");
    let run = dir.path().join("results/size_1");
    fs::create_dir_all(&run).expect("mkdir");
    fs::write(run.join("settings.yaml"), "size: 1\n").expect("settings");
    fs::write(run.join("exit_code"), "0\n").expect("exit code");

    let output = matbench(
        dir.path(),
        &["parse", "--results-dirname", "results", "--export-csv", "table.csv"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let table = fs::read_to_string(dir.path().join("table.csv")).expect("csv");
    assert_eq!(table.lines().count(), 2);
    assert!(table.lines().next().unwrap_or_default().starts_with("key,"));
}

#[test]
fn clean_removes_invalid_runs_only_with_run() {
    let dir = tempdir().expect("tempdir");
    let broken = dir.path().join("results/broken");
    fs::create_dir_all(&broken).expect("mkdir");
    fs::write(broken.join("settings.yaml"), "size: 1\n").expect("settings");

    let listed = matbench(dir.path(), &["clean", "--results-dirname", "results"]);
    assert!(listed.status.success());
    assert!(broken.exists());

    let removed = matbench(dir.path(), &["clean", "--results-dirname", "results", "--run"]);
    assert!(removed.status.success());
    assert!(!broken.exists());
    assert!(dir.path().join("results").exists());
}
