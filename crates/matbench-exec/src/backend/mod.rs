//! Execution strategies invoked once per combination.

use std::path::Path;
use std::time::Duration;

use matbench_core::{MatbenchError, Settings, Template};

mod dry;
mod local;
mod remote;

pub use dry::DryRun;
pub use local::LocalBackend;
pub use remote::RemoteScript;

/// Everything a backend needs to run one combination.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    /// Experiment the combination belongs to.
    pub experiment: &'a str,
    /// Final settings of the combination.
    pub settings: &'a Settings,
    /// Bench directory relative to the results root (`<expe>/<path><run id>`).
    pub bench_dir: &'a Path,
    /// Command template, if the campaign defines one.
    pub script: Option<&'a Template>,
    /// One-based position of the combination within the campaign.
    pub index: usize,
    /// Number of combinations configured so far.
    pub total: usize,
    /// Companion files written next to the settings.
    pub test_files: &'a [(String, String)],
}

impl ExecRequest<'_> {
    /// Renders the command template against the combination.
    pub fn render_command(&self) -> Result<Option<String>, MatbenchError> {
        match self.script {
            Some(template) => Ok(Some(template.render(self.settings)?)),
            None => Ok(None),
        }
    }
}

/// Result of a successful backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The combination was only displayed.
    Previewed,
    /// A script fragment was emitted for later execution.
    Emitted,
    /// The command ran to completion with this exit code.
    Exited(i32),
}

/// Interchangeable way of executing combinations.
///
/// Returning [`MatbenchError::Interrupted`] stops the campaign; any other
/// error counts as a failed combination.
pub trait ExecutionBackend {
    /// Executes or emits one combination.
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError>;

    /// Whether the backend cannot work without a command template.
    fn requires_script(&self) -> bool {
        true
    }

    /// Accumulated duration estimate of the previewed runs, if tracked.
    fn estimated_duration(&self) -> Option<Duration> {
        None
    }
}

impl<B: ExecutionBackend + ?Sized> ExecutionBackend for &mut B {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        (**self).execute(request)
    }

    fn requires_script(&self) -> bool {
        (**self).requires_script()
    }

    fn estimated_duration(&self) -> Option<Duration> {
        (**self).estimated_duration()
    }
}

impl<B: ExecutionBackend + ?Sized> ExecutionBackend for Box<B> {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        (**self).execute(request)
    }

    fn requires_script(&self) -> bool {
        (**self).requires_script()
    }

    fn estimated_duration(&self) -> Option<Duration> {
        (**self).estimated_duration()
    }
}

/// Splits a rendered command into its program and the remaining arguments.
fn split_program(command: &str) -> (&str, &str) {
    let command = command.trim_start();
    match command.find(char::is_whitespace) {
        Some(end) => (&command[..end], &command[end..]),
        None => (command, ""),
    }
}

/// Programs given as a relative path (`./run.sh`, `scripts/run.sh`) live in
/// the exec directory; bare names go through `PATH`.
fn is_relative_program(program: &str) -> bool {
    program.contains('/') && !program.starts_with('/')
}

fn missing_script(backend: &str) -> MatbenchError {
    MatbenchError::Config(
        matbench_core::ErrorInfo::new(
            "matbench.config.script_tpl",
            format!("the {backend} backend needs a script template"),
        )
        .with_hint("set --script-tpl on the command line or in the benchmark file"),
    )
}
