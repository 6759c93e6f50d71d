use std::path::PathBuf;
use std::time::Duration;

use matbench_core::serde::from_yaml_slice;
use matbench_core::MatbenchError;
use matbench_exec::{
    DryRun, ExecOutcome, ExecRequest, ExecutionBackend, ExperimentDescription, Scheduler,
};
use matbench_store::Registry;

#[derive(Default)]
struct Recording {
    inner: DryRun,
    seen: Vec<(String, PathBuf)>,
}

impl ExecutionBackend for Recording {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        self.seen
            .push((request.settings.key(), request.bench_dir.to_path_buf()));
        self.inner.execute(request)
    }

    fn requires_script(&self) -> bool {
        false
    }
}

fn description(yaml: &str) -> ExperimentDescription {
    from_yaml_slice(yaml.as_bytes()).expect("description")
}

#[test]
fn dry_run_visits_combinations_in_sorted_order() {
    let description = description(
        r#"
expe:
  t1:
    size: [1, 2]
    mode: [fast]
--path-tpl: "{size}/{mode}/"
"#,
    );
    let registry = Registry::new();
    let mut scheduler = Scheduler::new(&registry, Recording::default())
        .with_run_ids(|| "RUN".to_string());
    let report = scheduler.run(&description).expect("run");

    assert_eq!(report.counters.total, 2);
    assert_eq!(report.counters.executed, 0);
    assert_eq!(report.counters.recorded, 0);
    assert_eq!(report.counters.errors, 0);
    assert_eq!(report.counters.previewed, 2);
    assert_eq!(report.experiments_ran, vec!["t1".to_string()]);
    assert!(!report.failed());

    let seen = &scheduler.backend().seen;
    assert_eq!(
        seen,
        &vec![
            ("mode=fast|size=1".to_string(), PathBuf::from("t1/1/fast/RUN")),
            ("mode=fast|size=2".to_string(), PathBuf::from("t1/2/fast/RUN")),
        ]
    );
}

#[test]
fn disabled_and_selected_experiments() {
    let description = description(
        r#"
common_settings:
  size: 1
expe:
  a: {mode: [x, y]}
  _hidden: {mode: [z]}
  b: {mode: [w]}
--path-tpl: "{mode}"
--expe-to-run: "b,_hidden,a"
"#,
    );
    let registry = Registry::new();
    let mut scheduler = Scheduler::new(&registry, DryRun::new());
    let report = scheduler.run(&description).expect("run");
    assert_eq!(report.experiments_ran, vec!["b".to_string(), "a".to_string()]);
    assert_eq!(report.counters.total, 3);
    assert_eq!(report.counters.previewed, 3);
}

#[test]
fn undefined_experiment_is_an_error_and_stops() {
    let description = description(
        r#"
expe:
  a: {mode: [x]}
--path-tpl: "{mode}"
--expe-to-run: [missing, a]
"#,
    );
    let registry = Registry::new();
    let report = Scheduler::new(&registry, DryRun::new())
        .run(&description)
        .expect("run");
    assert_eq!(report.counters.errors, 1);
    assert!(report.experiments_ran.is_empty());
    assert!(report.failed());
}

#[test]
fn missing_path_template_fails_the_run() {
    let description = description("expe:\n  a: {mode: [x]}\n");
    let registry = Registry::new();
    let err = Scheduler::new(&registry, DryRun::new())
        .run(&description)
        .expect_err("no path template");
    assert_eq!(err.info().code, "matbench.config.path_tpl");
}

#[test]
fn dry_estimate_accumulates_per_preview() {
    let description = description(
        r#"
expe:
  a: {mode: [x, y, z]}
--path-tpl: "{mode}"
"#,
    );
    let registry = Registry::new();
    let report = Scheduler::new(&registry, DryRun::with_estimate(Duration::from_secs(90)))
        .run(&description)
        .expect("run");
    assert_eq!(report.estimated_duration_secs, Some(270.0));
}

#[test]
fn description_hash_is_stable() {
    let yaml = "expe:\n  a: {mode: [x]}\n--path-tpl: \"{mode}\"\n";
    let registry = Registry::new();
    let first = Scheduler::new(&registry, DryRun::new())
        .run(&description(yaml))
        .expect("first");
    let second = Scheduler::new(&registry, DryRun::new())
        .run(&description(yaml))
        .expect("second");
    assert_eq!(first.description_hash, second.description_hash);
    let bytes = first.to_json_bytes().expect("json");
    assert!(std::str::from_utf8(&bytes).expect("utf8").contains("\"previewed\":1"));
}
