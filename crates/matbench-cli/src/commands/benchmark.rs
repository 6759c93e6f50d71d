use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use matbench_exec::{
    load_description, DryRun, ExecutionBackend, LocalBackend, RemoteScript, RunReport, Scheduler,
};
use tracing::info;

use crate::commands::results::{load_registry, StoreArgs};
use crate::config::{layer, FlagOverrides};
use crate::interrupt::install_ctrl_c;

#[derive(Args, Debug)]
pub struct BenchmarkArgs {
    /// YAML benchmark file describing the experiments.
    #[arg(long, env = "MATBENCH_BENCHMARK_FILE")]
    pub benchmark_file: PathBuf,
    /// Execute the benchmarks; without it the campaign is only previewed.
    #[arg(long, env = "MATBENCH_RUN")]
    pub run: bool,
    /// Generate a bash script instead of running locally.
    #[arg(long, env = "MATBENCH_REMOTE_MODE")]
    pub remote_mode: bool,
    /// Template of the bench directories.
    #[arg(long, env = "MATBENCH_PATH_TPL")]
    pub path_tpl: Option<String>,
    /// Template of the benchmark command.
    #[arg(long, env = "MATBENCH_SCRIPT_TPL")]
    pub script_tpl: Option<String>,
    /// Stop at the first failing combination.
    #[arg(long, env = "MATBENCH_STOP_ON_ERROR")]
    pub stop_on_error: bool,
    /// Experiments to run, comma separated.
    #[arg(long, env = "MATBENCH_EXPE_TO_RUN", value_delimiter = ',')]
    pub expe_to_run: Vec<String>,
    /// Directory relative commands are resolved in (defaults to the working directory).
    #[arg(long, env = "MATBENCH_EXEC_DIR")]
    pub exec_dir: Option<PathBuf>,
    /// Where to write the remote script (stdout when unset).
    #[arg(long)]
    pub script_output: Option<PathBuf>,
    /// Seconds one run is expected to take, to estimate a dry campaign.
    #[arg(long)]
    pub estimate_secs: Option<u64>,
    /// Write the run report as canonical JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
    #[command(flatten)]
    pub store: StoreArgs,
}

/// Runs the campaign; returns true when anything failed.
pub fn run(args: &BenchmarkArgs) -> Result<bool, Box<dyn Error>> {
    info!(path = %args.benchmark_file.display(), "loading the benchmark file");
    let description = load_description(&args.benchmark_file)?;
    let flags = FlagOverrides {
        results_dirname: args.store.results_dirname.clone(),
        path_tpl: args.path_tpl.clone(),
        script_tpl: args.script_tpl.clone(),
        stop_on_error: args.stop_on_error,
        remote_mode: args.remote_mode,
        expe_to_run: args.expe_to_run.clone(),
    };
    let description = layer(description, &flags)?;
    let results_dir = description
        .results_dirname
        .clone()
        .ok_or_else(|| crate::config::missing_flag("results-dirname"))?;

    let registry = load_registry(&results_dir, &args.store)?;
    info!(results = registry.len(), "previous results loaded");

    let backend: Box<dyn ExecutionBackend> = if !args.run {
        info!("DRY RUN: pass --run to execute the benchmarks");
        match args.estimate_secs {
            Some(secs) => Box::new(DryRun::with_estimate(Duration::from_secs(secs))),
            None => Box::new(DryRun::new()),
        }
    } else if description.remote_mode {
        Box::new(RemoteScript::new(script_output(args.script_output.as_deref())?))
    } else {
        let exec_dir = match &args.exec_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Box::new(LocalBackend::new(&results_dir, exec_dir))
    };

    let mut scheduler = Scheduler::new(&registry, backend).with_interrupt(install_ctrl_c());
    let report = scheduler.run(&description)?;
    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    Ok(report.failed())
}

fn script_output(path: Option<&Path>) -> Result<Box<dyn Write>, Box<dyn Error>> {
    Ok(match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(io::stdout()),
    })
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report.to_json_bytes()?)?;
    info!(path = %path.display(), "run report written");
    Ok(())
}
