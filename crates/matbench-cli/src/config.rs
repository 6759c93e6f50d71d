//! Flag layering: command line, then `MATBENCH_*` environment variables
//! (both handled by clap), then the `--flag` keys of the benchmark file.

use std::path::PathBuf;

use matbench_core::{ErrorInfo, MatbenchError};
use matbench_exec::ExperimentDescription;

/// Flags a benchmark file may also carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    pub results_dirname: Option<PathBuf>,
    pub path_tpl: Option<String>,
    pub script_tpl: Option<String>,
    pub stop_on_error: bool,
    pub remote_mode: bool,
    pub expe_to_run: Vec<String>,
}

/// Applies command-line and environment values over the benchmark file.
///
/// Unset flags (empty, `false`) leave the file's value in place.
pub fn layer(
    mut description: ExperimentDescription,
    flags: &FlagOverrides,
) -> Result<ExperimentDescription, MatbenchError> {
    if let Some(dir) = &flags.results_dirname {
        description.results_dirname = Some(dir.clone());
    }
    if let Some(tpl) = &flags.path_tpl {
        description.path_tpl = Some(tpl.clone());
    }
    if let Some(tpl) = &flags.script_tpl {
        description.script_tpl = Some(tpl.clone());
    }
    description.stop_on_error |= flags.stop_on_error;
    description.remote_mode |= flags.remote_mode;
    if !flags.expe_to_run.is_empty() {
        description.expe_to_run = Some(flags.expe_to_run.clone());
    }

    if description.results_dirname.is_none() {
        return Err(missing_flag("results-dirname"));
    }
    let has_expe = description
        .expe_to_run
        .as_ref()
        .map(|names| !names.is_empty())
        .unwrap_or(!description.expe.is_empty());
    if !has_expe {
        return Err(missing_flag("expe-to-run"));
    }
    Ok(description)
}

/// Error for a mandatory flag set nowhere.
pub fn missing_flag(flag: &str) -> MatbenchError {
    MatbenchError::Config(
        ErrorInfo::new(
            "matbench.config.missing_flag",
            format!("--{flag} must be set"),
        )
        .with_context("flag", flag)
        .with_hint(format!(
            "pass --{flag}, set MATBENCH_{} or add '--{flag}' to the benchmark file",
            flag.replace('-', "_").to_ascii_uppercase()
        )),
    )
}
