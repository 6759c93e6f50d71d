use matbench_core::serde::from_yaml_slice;
use matbench_core::MatbenchError;
use matbench_exec::{
    ExecOutcome, ExecRequest, ExecutionBackend, ExperimentDescription, InterruptFlag, Scheduler,
};
use matbench_store::Registry;

#[derive(Default)]
struct Scripted {
    exit_codes: Vec<i32>,
    attempted: Vec<usize>,
}

impl ExecutionBackend for Scripted {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        request.render_command()?;
        self.attempted.push(request.index);
        let code = self.exit_codes.get(self.attempted.len() - 1).copied().unwrap_or(0);
        Ok(ExecOutcome::Exited(code))
    }
}

fn three_runs(stop_on_error: bool, path_tpl: &str) -> ExperimentDescription {
    let yaml = format!(
        "expe:\n  t:\n    size: [1, 2, 3]\n--path-tpl: {path_tpl}\n--script-tpl: \"run {{size}}\"\n--stop-on-error: {stop_on_error}\n"
    );
    from_yaml_slice(yaml.as_bytes()).expect("description")
}

fn second_of_three_misses_a_key(stop_on_error: bool) -> ExperimentDescription {
    let yaml = format!(
        r#"
expe:
  t:
    size: [1]
    --path-tpl: ["{{size}}/a", "{{missing}}", "{{size}}/c"]
--script-tpl: "run {{size}}"
--stop-on-error: {stop_on_error}
"#
    );
    from_yaml_slice(yaml.as_bytes()).expect("description")
}

#[test]
fn stop_on_error_aborts_at_template_failure() {
    let description = second_of_three_misses_a_key(true);
    let registry = Registry::new();
    let mut scheduler = Scheduler::new(&registry, Scripted::default());
    let report = scheduler.run(&description).expect("run");
    assert_eq!(report.counters.total, 3);
    assert_eq!(report.counters.executed, 1);
    assert_eq!(report.counters.errors, 1);
    assert_eq!(report.counters.current_index, 2);
    assert_eq!(scheduler.backend().attempted, vec![1]);
    assert!(report.experiments_ran.is_empty());
}

#[test]
fn without_stop_on_error_every_combination_is_attempted() {
    let description = second_of_three_misses_a_key(false);
    let registry = Registry::new();
    let mut scheduler = Scheduler::new(&registry, Scripted::default());
    let report = scheduler.run(&description).expect("run");
    assert_eq!(report.counters.errors, 1);
    assert_eq!(report.counters.executed, 2);
    assert_eq!(scheduler.backend().attempted, vec![1, 3]);
    assert_eq!(report.experiments_ran, vec!["t".to_string()]);
}

#[test]
fn failing_exit_code_stops_the_campaign() {
    let description = three_runs(true, r#""{size}""#);
    let registry = Registry::new();
    let backend = Scripted {
        exit_codes: vec![0, 3, 0],
        ..Scripted::default()
    };
    let mut scheduler = Scheduler::new(&registry, backend);
    let report = scheduler.run(&description).expect("run");
    assert_eq!(report.counters.executed, 1);
    assert_eq!(report.counters.errors, 1);
    assert_eq!(scheduler.backend().attempted, vec![1, 2]);
}

#[test]
fn missing_script_placeholder_is_counted() {
    let mut description = three_runs(false, r#""{size}""#);
    description.script_tpl = Some("run {size} {nope}".to_string());
    let registry = Registry::new();
    let report = Scheduler::new(&registry, Scripted::default())
        .run(&description)
        .expect("run");
    assert_eq!(report.counters.errors, 3);
    assert_eq!(report.counters.executed, 0);
}

#[test]
fn raised_interrupt_returns_partial_report() {
    let description = three_runs(false, r#""{size}""#);
    let registry = Registry::new();
    let interrupt = InterruptFlag::new();
    interrupt.trigger();
    let report = Scheduler::new(&registry, Scripted::default())
        .with_interrupt(interrupt)
        .run(&description)
        .expect("run");
    assert!(report.interrupted);
    assert_eq!(report.counters.executed, 0);
    assert_eq!(report.counters.current_index, 1);
    assert!(report.failed());
}

#[test]
fn execution_backend_requires_script_template() {
    let mut description = three_runs(false, r#""{size}""#);
    description.script_tpl = None;
    let registry = Registry::new();
    let err = Scheduler::new(&registry, Scripted::default())
        .run(&description)
        .expect_err("no script");
    assert!(matches!(err, MatbenchError::Config(_)));
}
