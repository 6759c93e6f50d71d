use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use matbench_store::{
    export_csv, scan_results, CleanMode, DirectoryListing, DuplicateHandler, FilterSpec,
    LogDuplicates, Registry, RemoveDuplicates, ScanOptions, ScanSummary,
};
use tracing::{info, warn};

use crate::config::missing_flag;

/// Options shared by every command that loads the results tree.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Directory holding the results.
    #[arg(long, env = "MATBENCH_RESULTS_DIRNAME")]
    pub results_dirname: Option<PathBuf>,
    /// Allow-lists restricting the loaded results, `key=v1:v2,other=v3`.
    #[arg(long, env = "MATBENCH_FILTERS")]
    pub filters: Option<String>,
    /// Load runs regardless of their exit code.
    #[arg(long, env = "MATBENCH_SIMPLE_STORE_IGNORE_EXIT_CODE")]
    pub ignore_exit_code: bool,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Export the loaded entries as CSV.
    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Actually delete; without it the directories are only listed.
    #[arg(long, env = "MATBENCH_RUN")]
    pub run: bool,
}

pub fn parse(args: &ParseArgs) -> Result<bool, Box<dyn Error>> {
    let root = results_dirname(&args.store)?;
    let mut registry = build_registry(&args.store)?;
    let summary = scan(&root, &mut registry, &args.store, CleanMode::Off, &mut LogDuplicates)?;
    info!(entries = registry.len(), "results loaded");
    for (key, values) in registry.known_values() {
        let values = values.iter().map(ToString::to_string).collect::<Vec<_>>();
        info!("{key}: {}", values.join(", "));
    }
    if let Some(path) = &args.export_csv {
        let rows = export_csv(&registry, path)?;
        info!(rows, path = %path.display(), "results exported");
    }
    Ok(summary.invalid > 0)
}

pub fn clean(args: &CleanArgs) -> Result<bool, Box<dyn Error>> {
    let root = results_dirname(&args.store)?;
    let mut registry = build_registry(&args.store)?;
    let mode = if args.run {
        CleanMode::Remove
    } else {
        CleanMode::DryRun
    };
    let mut duplicates = RemoveDuplicates::new(!args.run);
    let summary = scan(&root, &mut registry, &args.store, mode, &mut duplicates)?;
    let verb = if args.run { "removed" } else { "would be removed" };
    info!(
        invalid = summary.invalid,
        duplicates = duplicates.removed.len(),
        "result directories {verb}"
    );
    if !args.run && summary.invalid + duplicates.removed.len() > 0 {
        info!("pass --run to delete them");
    }
    Ok(false)
}

/// Scans `root` into a fresh registry configured from `args`.
pub fn load_registry(root: &Path, args: &StoreArgs) -> Result<Registry, Box<dyn Error>> {
    let mut registry = build_registry(args)?;
    scan(root, &mut registry, args, CleanMode::Off, &mut LogDuplicates)?;
    Ok(registry)
}

fn build_registry(args: &StoreArgs) -> Result<Registry, Box<dyn Error>> {
    let filters = match &args.filters {
        Some(spec) => FilterSpec::parse(spec)?,
        None => FilterSpec::new(),
    };
    Ok(Registry::builder().filters(filters).build())
}

fn scan(
    root: &Path,
    registry: &mut Registry,
    args: &StoreArgs,
    clean: CleanMode,
    duplicates: &mut dyn DuplicateHandler,
) -> Result<ScanSummary, Box<dyn Error>> {
    let options = ScanOptions {
        ignore_exit_code: args.ignore_exit_code,
        clean,
    };
    let summary = scan_results(root, registry, &options, &DirectoryListing, duplicates)?;
    info!(
        directories = summary.directories,
        added = summary.added,
        duplicates = summary.duplicates,
        filtered = summary.filtered,
        "results scanned"
    );
    if summary.invalid > 0 {
        warn!(invalid = summary.invalid, "result directories without a successful exit code");
    }
    Ok(summary)
}

fn results_dirname(args: &StoreArgs) -> Result<PathBuf, Box<dyn Error>> {
    args.results_dirname
        .clone()
        .ok_or_else(|| missing_flag("results-dirname").into())
}
