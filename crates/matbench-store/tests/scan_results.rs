use std::fs;
use std::path::Path;

use matbench_core::{MatbenchError, Settings};
use matbench_store::{
    export_csv, scan_results, CleanMode, DirectoryListing, LogDuplicates, ParsedResult,
    RemoveDuplicates, Registry, ScanOptions,
};
use serde_json::json;

fn write_run(dir: &Path, settings: &str, exit_code: Option<&str>) {
    fs::create_dir_all(dir).expect("run dir");
    fs::write(dir.join("settings"), settings).expect("settings");
    if let Some(code) = exit_code {
        fs::write(dir.join("exit_code"), code).expect("exit_code");
    }
    fs::write(dir.join("stdout"), "ok\n").expect("stdout");
}

#[test]
fn scan_ingests_successful_runs_with_inherited_settings() {
    let root = tempfile::tempdir().expect("tmp dir");
    fs::write(root.path().join("settings"), "cluster=lab\n").expect("root settings");
    write_run(&root.path().join("expe/size1"), "size=1\n", Some("0\n"));
    write_run(&root.path().join("expe/size2"), "size=2\ncluster=prod\n", Some("0\n"));
    write_run(&root.path().join("expe/failed"), "size=3\n", Some("1\n"));
    write_run(&root.path().join("expe/nocode"), "size=4\n", None);
    write_run(&root.path().join("expe/pending"), "size=5\n", Some(""));
    write_run(&root.path().join("expe/ignored"), "size=6\n", Some("0\n"));
    fs::write(root.path().join("expe/ignored/skip"), "").expect("skip");

    let mut registry = Registry::new();
    let summary = scan_results(
        root.path(),
        &mut registry,
        &ScanOptions::default(),
        &DirectoryListing,
        &mut LogDuplicates,
    )
    .expect("scan");

    assert_eq!(summary.added, 2);
    // the root holds settings but no exit_code
    assert_eq!(summary.invalid, 3);
    assert_eq!(registry.len(), 2);

    let size1: Settings = [("cluster", "lab"), ("size", "1")].into_iter().collect();
    let entry = registry.get(&size1).expect("size1");
    assert_eq!(
        entry.payload(),
        Some(&json!({"files": ["exit_code", "settings", "stdout"]}))
    );
    let size2: Settings = [("cluster", "prod"), ("size", "2")].into_iter().collect();
    assert!(registry.get(&size2).is_some());
}

#[test]
fn clean_mode_removes_invalid_directories() {
    let root = tempfile::tempdir().expect("tmp dir");
    write_run(&root.path().join("ok"), "size=1\n", Some("0"));
    write_run(&root.path().join("bad"), "size=2\n", Some("2"));

    let options = ScanOptions {
        clean: CleanMode::Remove,
        ..ScanOptions::default()
    };
    let mut registry = Registry::new();
    scan_results(root.path(), &mut registry, &options, &DirectoryListing, &mut LogDuplicates)
        .expect("scan");
    assert!(root.path().join("ok").exists());
    assert!(!root.path().join("bad").exists());
}

#[test]
fn ignore_exit_code_ingests_everything() {
    let root = tempfile::tempdir().expect("tmp dir");
    write_run(&root.path().join("bad"), "size=2\n", Some("2"));
    write_run(&root.path().join("missing"), "size=3\n", None);
    let options = ScanOptions {
        ignore_exit_code: true,
        ..ScanOptions::default()
    };
    let mut registry = Registry::new();
    let summary =
        scan_results(root.path(), &mut registry, &options, &DirectoryListing, &mut LogDuplicates)
            .expect("scan");
    assert_eq!(summary.added, 2);
}

#[test]
fn duplicate_directories_are_removed_by_handler() {
    let root = tempfile::tempdir().expect("tmp dir");
    write_run(&root.path().join("a"), "size=1\n", Some("0"));
    write_run(&root.path().join("b"), "size=1\n", Some("0"));

    let mut registry = Registry::new();
    let mut handler = RemoveDuplicates::new(false);
    let summary = scan_results(
        root.path(),
        &mut registry,
        &ScanOptions::default(),
        &DirectoryListing,
        &mut handler,
    )
    .expect("scan");
    assert_eq!(summary.duplicates, 1);
    assert_eq!(handler.removed, vec![root.path().join("b")]);
    assert!(root.path().join("a").exists());
    assert!(!root.path().join("b").exists());
}

#[test]
fn custom_parser_can_emit_several_records() {
    let root = tempfile::tempdir().expect("tmp dir");
    write_run(&root.path().join("multi"), "size=1\n", Some("0"));

    let parser = |_: &Path, _: &Settings| -> Result<Vec<ParsedResult>, MatbenchError> {
        Ok((1..=2)
            .map(|iteration| ParsedResult {
                extra_settings: [("@iter", iteration)].into_iter().collect(),
                results: json!({ "iteration": iteration }),
            })
            .collect())
    };
    let mut registry = Registry::new();
    scan_results(root.path(), &mut registry, &ScanOptions::default(), &parser, &mut LogDuplicates)
        .expect("scan");
    // two concrete runs and their rollup
    assert_eq!(registry.len(), 3);

    let csv_path = root.path().join("export/matrix.csv");
    let rows = export_csv(&registry, &csv_path).expect("export");
    assert_eq!(rows, 3);
    let exported = fs::read_to_string(&csv_path).expect("read csv");
    assert!(exported.starts_with("key,location,gathered,children,results"));
    assert!(exported.contains("@iter=<all>|size=1"));
}

#[test]
fn yaml_settings_files_are_supported() {
    let root = tempfile::tempdir().expect("tmp dir");
    let dir = root.path().join("yaml");
    fs::create_dir_all(&dir).expect("dir");
    fs::write(dir.join("settings.yaml"), "size: 4\nmode: fast\n").expect("settings");
    fs::write(dir.join("exit_code"), "0\n").expect("exit code");

    let mut registry = Registry::new();
    scan_results(
        root.path(),
        &mut registry,
        &ScanOptions::default(),
        &DirectoryListing,
        &mut LogDuplicates,
    )
    .expect("scan");
    let wanted: Settings = [("mode", "fast"), ("size", "4")].into_iter().collect();
    assert!(registry.get(&wanted).is_some());
}

#[test]
fn missing_root_is_empty_scan() {
    let root = tempfile::tempdir().expect("tmp dir");
    let mut registry = Registry::new();
    let summary = scan_results(
        &root.path().join("absent"),
        &mut registry,
        &ScanOptions::default(),
        &DirectoryListing,
        &mut LogDuplicates,
    )
    .expect("scan");
    assert_eq!(summary.directories, 0);
}

#[cfg(unix)]
#[test]
fn symlink_loop_does_not_hide_valid_runs() {
    let root = tempfile::tempdir().expect("tmp dir");
    write_run(&root.path().join("t1/run"), "size=1\n", Some("0\n"));
    std::os::unix::fs::symlink(root.path(), root.path().join("t1/loop")).expect("symlink");

    let mut registry = Registry::new();
    let summary = scan_results(
        root.path(),
        &mut registry,
        &ScanOptions::default(),
        &DirectoryListing,
        &mut LogDuplicates,
    )
    .expect("scan");

    assert_eq!(summary.added, 1);
    assert_eq!(summary.unreadable, 1);
    let size1: Settings = [("size", "1")].into_iter().collect();
    assert!(registry.get(&size1).is_some());
}
