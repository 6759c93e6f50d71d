use matbench_core::serde::canonical_json;
use matbench_core::MatbenchError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Progress counters of one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Combinations configured by the experiments visited so far.
    pub total: usize,
    /// Combinations visited, one-based.
    pub current_index: usize,
    /// Combinations run successfully or emitted.
    pub executed: usize,
    /// Combinations skipped because the registry already has them.
    pub recorded: usize,
    /// Combinations that failed validation or execution.
    pub errors: usize,
    /// Combinations only displayed by a dry backend.
    pub previewed: usize,
}

/// Outcome of [`Scheduler::run`](crate::Scheduler::run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Stable hash of the description that was run.
    pub description_hash: String,
    /// Experiments that ran to completion, in order.
    pub experiments_ran: Vec<String>,
    /// Final counters.
    pub counters: RunCounters,
    /// True when the operator stopped the campaign.
    pub interrupted: bool,
    /// Duration estimate reported by the backend, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<f64>,
}

impl RunReport {
    /// True when anything failed or the campaign was interrupted.
    pub fn failed(&self) -> bool {
        self.counters.errors > 0 || self.interrupted
    }

    /// Canonical JSON rendering of the report.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, MatbenchError> {
        canonical_json(self).map(String::into_bytes)
    }

    pub(crate) fn log_summary(&self) {
        let counters = &self.counters;
        info!(
            experiments = %self.experiments_ran.join(", "),
            "ran {} {}",
            self.experiments_ran.len(),
            if self.experiments_ran.len() == 1 { "matrix" } else { "matrices" }
        );
        info!("out of {} combinations configured:", counters.total);
        if counters.previewed > 0 {
            info!("- {} would have been executed,", counters.previewed);
        } else {
            info!("- {} executed,", counters.executed);
        }
        info!("- {} already recorded,", counters.recorded);
        info!("- {} failed.", counters.errors);
        if let Some(secs) = self.estimated_duration_secs {
            info!(estimated_secs = secs, "estimated duration");
        }
        if self.interrupted {
            info!("campaign interrupted");
        }
    }
}
