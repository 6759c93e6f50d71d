//! Campaign driver: expands experiments, skips recorded combinations and
//! hands the rest to an [`ExecutionBackend`].

use std::path::{Path, PathBuf};

use matbench_core::errors::{ErrorInfo, MatbenchError};
use matbench_core::{Settings, Template};
use matbench_store::Registry;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::backend::{ExecOutcome, ExecRequest, ExecutionBackend};
use crate::description::ExperimentDescription;
use crate::expand::Combinations;
use crate::interrupt::InterruptFlag;
use crate::report::{RunCounters, RunReport};
use crate::run_id::{ClockRunIds, RunIdSource};

/// Per-combination path template override.
pub const PATH_TPL_SETTING: &str = "--path-tpl";
/// Free-form `k=v` override merged into each combination.
pub const EXTRA_SETTING: &str = "extra";

/// Terminal state of one combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombinationState {
    /// The registry already holds a result.
    SkippedRecorded,
    /// A template or the `extra` override could not be applied.
    TemplateError,
    /// Ran with exit code 0 or was emitted.
    ExecutedOk,
    /// Ran and failed, or the backend reported an error.
    ExecutedFail,
    /// Only displayed by a dry backend.
    Previewed,
}

impl CombinationState {
    /// True for states counted as errors.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CombinationState::TemplateError | CombinationState::ExecutedFail
        )
    }
}

enum Flow {
    Continue,
    Stop,
    Interrupted,
}

/// Drives one campaign against a registry snapshot.
///
/// The scheduler only reads the registry; results of this campaign become
/// visible after the next scan of the results tree.
pub struct Scheduler<'r, B> {
    registry: &'r Registry,
    backend: B,
    interrupt: InterruptFlag,
    run_ids: Box<dyn RunIdSource + 'r>,
}

impl<'r, B: ExecutionBackend> Scheduler<'r, B> {
    /// Creates a scheduler using clock-based run ids.
    pub fn new(registry: &'r Registry, backend: B) -> Self {
        Self {
            registry,
            backend,
            interrupt: InterruptFlag::new(),
            run_ids: Box::new(ClockRunIds),
        }
    }

    /// Shares an interrupt flag with a signal listener.
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Replaces the run id source.
    pub fn with_run_ids(mut self, run_ids: impl RunIdSource + 'r) -> Self {
        self.run_ids = Box::new(run_ids);
        self
    }

    /// Backend in use.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the scheduler and returns its backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Runs every selected experiment of `description`.
    ///
    /// Per-combination failures are counted in the report. The call itself
    /// fails only on configuration problems: no path template, a malformed
    /// top-level template, or a backend that needs a command template the
    /// description lacks.
    pub fn run(&mut self, description: &ExperimentDescription) -> Result<RunReport, MatbenchError> {
        if self.backend.requires_script() && description.script_tpl.is_none() {
            return Err(MatbenchError::Config(
                ErrorInfo::new(
                    "matbench.config.script_tpl",
                    "a script template is required to execute benchmarks",
                )
                .with_hint("set --script-tpl on the command line or in the benchmark file"),
            ));
        }
        let path_tpl = description
            .path_tpl
            .as_deref()
            .map(Template::parse)
            .transpose()?;
        let script_tpl = description
            .script_tpl
            .as_deref()
            .map(Template::parse)
            .transpose()?;
        let test_files = description.rendered_test_files()?;
        let context = RunContext {
            path_tpl: path_tpl.as_ref(),
            script_tpl: script_tpl.as_ref(),
            test_files: &test_files,
            stop_on_error: description.stop_on_error,
        };

        let mut counters = RunCounters::default();
        let mut experiments_ran = Vec::new();
        let mut interrupted = false;

        for name in description.experiments_to_run() {
            if name.is_empty() || name.starts_with('_') {
                info!(experiment = %name, "skip disabled experiment");
                continue;
            }
            let Some(axes) = description.merged_settings(&name) else {
                error!(experiment = %name, "cannot run experiment: matrix not defined");
                counters.errors += 1;
                break;
            };
            let combinations = Combinations::new(axes);
            counters.total += combinations.total();
            info!(experiment = %name, combinations = combinations.total(), "starting experiment");

            match self.run_experiment(&name, combinations, &context, &mut counters)? {
                Flow::Continue => {
                    info!(experiment = %name, "finished experiment");
                    experiments_ran.push(name);
                }
                Flow::Stop => break,
                Flow::Interrupted => {
                    interrupted = true;
                    break;
                }
            }
        }

        let report = RunReport {
            description_hash: description.stable_hash()?,
            experiments_ran,
            counters,
            interrupted,
            estimated_duration_secs: self
                .backend
                .estimated_duration()
                .map(|duration| duration.as_secs_f64()),
        };
        report.log_summary();
        Ok(report)
    }

    fn run_experiment(
        &mut self,
        experiment: &str,
        combinations: Combinations,
        context: &RunContext<'_>,
        counters: &mut RunCounters,
    ) -> Result<Flow, MatbenchError> {
        for combination in combinations {
            counters.current_index += 1;
            if self.interrupt.is_set() {
                warn!("stopping on operator interrupt");
                return Ok(Flow::Interrupted);
            }
            let state = match self.run_combination(experiment, combination, context, counters) {
                Ok(state) => state,
                Err(err) if err.is_interrupted() => {
                    error!(%err, "stopping on keyboard interrupt");
                    return Ok(Flow::Interrupted);
                }
                Err(err) => return Err(err),
            };
            if self.interrupt.is_set() {
                warn!("stopping on operator interrupt");
                return Ok(Flow::Interrupted);
            }
            if state.is_failure() && context.stop_on_error {
                warn!("stopping on error");
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn run_combination(
        &mut self,
        experiment: &str,
        mut settings: Settings,
        context: &RunContext<'_>,
        counters: &mut RunCounters,
    ) -> Result<CombinationState, MatbenchError> {
        let index = counters.current_index;
        let total = counters.total;

        let path_override = settings.remove(PATH_TPL_SETTING);
        if let Err(err) = apply_extra(&mut settings) {
            error!(index, %err, "invalid combination");
            counters.errors += 1;
            return Ok(CombinationState::TemplateError);
        }

        if let Some(location) = self.registry.recorded_location(&settings) {
            info!(index, total, location = %location.display(), "already recorded, skipping");
            counters.recorded += 1;
            return Ok(CombinationState::SkippedRecorded);
        }

        let rendered = match path_override {
            Some(source) => Template::parse(&source.render()).and_then(|tpl| tpl.render(&settings)),
            None => match context.path_tpl {
                Some(template) => template.render(&settings),
                None => {
                    return Err(MatbenchError::Config(
                        ErrorInfo::new(
                            "matbench.config.path_tpl",
                            "no path template for this combination",
                        )
                        .with_context("experiment", experiment)
                        .with_hint("set --path-tpl at the top level or in the experiment"),
                    ))
                }
            },
        };
        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(err) => {
                error!(index, %settings, %err, "cannot apply the path template");
                counters.errors += 1;
                return Ok(CombinationState::TemplateError);
            }
        };

        let bench_dir = bench_dir(experiment, &rendered, &self.run_ids.next_id());
        info!(index, total, %settings, "running combination");
        let request = ExecRequest {
            experiment,
            settings: &settings,
            bench_dir: &bench_dir,
            script: context.script_tpl,
            index,
            total,
            test_files: context.test_files,
        };
        let state = match self.backend.execute(&request) {
            Ok(ExecOutcome::Previewed) => {
                counters.previewed += 1;
                CombinationState::Previewed
            }
            Ok(ExecOutcome::Emitted) | Ok(ExecOutcome::Exited(0)) => {
                counters.executed += 1;
                CombinationState::ExecutedOk
            }
            Ok(ExecOutcome::Exited(code)) => {
                debug!(index, code, "combination failed");
                counters.errors += 1;
                CombinationState::ExecutedFail
            }
            Err(err) if err.is_interrupted() => return Err(err),
            Err(err @ MatbenchError::Validation(_)) => {
                error!(index, %err, "cannot apply the script template");
                counters.errors += 1;
                CombinationState::TemplateError
            }
            Err(err) => {
                error!(index, %err, "combination failed");
                counters.errors += 1;
                CombinationState::ExecutedFail
            }
        };
        Ok(state)
    }
}

struct RunContext<'a> {
    path_tpl: Option<&'a Template>,
    script_tpl: Option<&'a Template>,
    test_files: &'a [(String, String)],
    stop_on_error: bool,
}

fn bench_dir(experiment: &str, rendered: &str, run_id: &str) -> PathBuf {
    Path::new(experiment).join(format!("{}{run_id}", rendered.trim_start_matches('/')))
}

/// Merges the `extra` setting of a combination into it.
///
/// `extra` holds `k=v` pairs separated by commas and/or whitespace. A pair
/// without `=`, or a key the combination already defines, is rejected.
pub fn apply_extra(settings: &mut Settings) -> Result<(), MatbenchError> {
    let Some(extra) = settings.remove(EXTRA_SETTING) else {
        return Ok(());
    };
    let extra = extra.render().into_owned();
    for pair in extra
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|pair| !pair.is_empty())
    {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(MatbenchError::Validation(
                ErrorInfo::new("matbench.extra.syntax", format!("'{pair}' has no '='"))
                    .with_context("extra", extra.clone()),
            ));
        };
        let key = key.trim();
        if key.is_empty() || settings.contains_key(key) {
            return Err(MatbenchError::Validation(
                ErrorInfo::new(
                    "matbench.extra.overlap",
                    format!("'extra' key '{key}' is already set by the combination"),
                )
                .with_context("extra", extra.clone()),
            ));
        }
        settings.insert(key, value.trim());
    }
    Ok(())
}
