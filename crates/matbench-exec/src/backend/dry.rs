use std::time::Duration;

use matbench_core::MatbenchError;
use tracing::info;

use super::{ExecOutcome, ExecRequest, ExecutionBackend};

/// Shows what would run without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct DryRun {
    per_run: Option<Duration>,
    estimated: Duration,
}

impl DryRun {
    /// Dry backend without duration estimate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `per_run` to the estimate for every previewed combination.
    pub fn with_estimate(per_run: Duration) -> Self {
        Self {
            per_run: Some(per_run),
            estimated: Duration::ZERO,
        }
    }
}

impl ExecutionBackend for DryRun {
    fn execute(&mut self, request: &ExecRequest<'_>) -> Result<ExecOutcome, MatbenchError> {
        let command = request.render_command()?;
        info!(
            index = request.index,
            total = request.total,
            results = %request.bench_dir.display(),
            command = command.as_deref().unwrap_or("<none>"),
            "dry run"
        );
        if let Some(per_run) = self.per_run {
            self.estimated += per_run;
        }
        Ok(ExecOutcome::Previewed)
    }

    fn requires_script(&self) -> bool {
        false
    }

    fn estimated_duration(&self) -> Option<Duration> {
        self.per_run.map(|_| self.estimated)
    }
}
