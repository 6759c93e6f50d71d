//! Ingestion of on-disk result directories into a [`Registry`].
//!
//! A result directory is any directory holding a `settings` or `settings.*`
//! file. Its settings are merged from the scan root down to the directory so
//! that nested directories override their parents. Only runs whose
//! `exit_code` file reads `0` are ingested unless the exit code is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use matbench_core::errors::{io_error, MatbenchError};
use matbench_core::serde::settings_from_yaml;
use matbench_core::Settings;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::duplicates::DuplicateHandler;
use crate::registry::{AddOutcome, Registry};

/// File whose presence excludes a directory from ingestion.
pub const SKIP_MARKER: &str = "skip";
/// File holding the decimal exit code of a run.
pub const EXIT_CODE_FILE: &str = "exit_code";

/// What to do with invalid result directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanMode {
    /// Leave them alone.
    #[default]
    Off,
    /// List what would be removed.
    DryRun,
    /// Remove them.
    Remove,
}

/// Scanner configuration.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Ingest runs regardless of their exit code.
    pub ignore_exit_code: bool,
    /// Handling of directories with a missing or failing exit code.
    pub clean: CleanMode,
}

/// One record extracted from a result directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult {
    /// Settings added on top of the directory settings.
    pub extra_settings: Settings,
    /// Results payload stored in the registry.
    pub results: Value,
}

impl ParsedResult {
    /// Record carrying only the directory settings.
    pub fn new(results: Value) -> Self {
        Self {
            extra_settings: Settings::new(),
            results,
        }
    }
}

/// Workload-specific extraction of results from a run directory.
pub trait ResultParser {
    /// Returns zero or more records found in `dir`.
    fn parse(&self, dir: &Path, settings: &Settings) -> Result<Vec<ParsedResult>, MatbenchError>;
}

impl<F> ResultParser for F
where
    F: Fn(&Path, &Settings) -> Result<Vec<ParsedResult>, MatbenchError>,
{
    fn parse(&self, dir: &Path, settings: &Settings) -> Result<Vec<ParsedResult>, MatbenchError> {
        self(dir, settings)
    }
}

/// Default parser recording the names of the files a run produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryListing;

impl ResultParser for DirectoryListing {
    fn parse(&self, dir: &Path, _settings: &Settings) -> Result<Vec<ParsedResult>, MatbenchError> {
        let mut files = Vec::new();
        let listing =
            fs::read_dir(dir).map_err(|err| io_error("matbench.scan.list", dir, err))?;
        for item in listing {
            let item = item.map_err(|err| io_error("matbench.scan.list", dir, err))?;
            if item.path().is_file() {
                files.push(item.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(vec![ParsedResult::new(json!({ "files": files }))])
    }
}

/// Counters describing one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Result directories visited.
    pub directories: usize,
    /// Entries created.
    pub added: usize,
    /// Records rejected as duplicates.
    pub duplicates: usize,
    /// Records skipped by the rewrite hook.
    pub skipped: usize,
    /// Records rejected by the allow-lists.
    pub filtered: usize,
    /// Records whose processed key collided and were merged into the first.
    pub collisions: usize,
    /// Directories with a missing or failing exit code.
    pub invalid: usize,
    /// Walk entries that could not be read, such as symlink loops.
    pub unreadable: usize,
}

enum ExitState {
    Missing,
    Empty,
    Unreadable(String),
    Code(i32),
}

/// Walks `root` and adds every completed run to `registry`.
pub fn scan_results(
    root: &Path,
    registry: &mut Registry,
    options: &ScanOptions,
    parser: &dyn ResultParser,
    duplicates: &mut dyn DuplicateHandler,
) -> Result<ScanSummary, MatbenchError> {
    let mut summary = ScanSummary::default();
    if !root.exists() {
        info!(root = %root.display(), "results directory does not exist yet");
        return Ok(summary);
    }
    let mut result_dirs = Vec::new();
    for item in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                summary.unreadable += 1;
                warn!(
                    path = %err.path().unwrap_or(root).display(),
                    %err,
                    "cannot walk results entry, skipping it"
                );
                continue;
            }
        };
        if !item.file_type().is_dir() {
            continue;
        }
        let dir = item.path();
        if dir.join(SKIP_MARKER).exists() {
            continue;
        }
        match settings_files(dir) {
            Ok(files) if files.is_empty() => {}
            Ok(_) => result_dirs.push(dir.to_path_buf()),
            Err(err) => {
                summary.unreadable += 1;
                warn!(path = %dir.display(), %err, "cannot list results directory, skipping it");
            }
        }
    }

    for dir in result_dirs {
        // removed together with an invalid parent
        if !dir.exists() {
            continue;
        }
        summary.directories += 1;
        scan_directory(root, &dir, registry, options, parser, duplicates, &mut summary)?;
    }
    info!(
        root = %root.display(),
        directories = summary.directories,
        added = summary.added,
        duplicates = summary.duplicates,
        invalid = summary.invalid,
        unreadable = summary.unreadable,
        "results scanned"
    );
    Ok(summary)
}

fn scan_directory(
    root: &Path,
    dir: &Path,
    registry: &mut Registry,
    options: &ScanOptions,
    parser: &dyn ResultParser,
    duplicates: &mut dyn DuplicateHandler,
    summary: &mut ScanSummary,
) -> Result<(), MatbenchError> {
    let settings = collect_settings(root, dir)?;
    if !registry.filter(&settings) {
        debug!(path = %dir.display(), "filtered out");
        summary.filtered += 1;
        return Ok(());
    }

    if !options.ignore_exit_code {
        match read_exit_code(dir) {
            ExitState::Code(0) => {}
            ExitState::Code(code) => {
                debug!(path = %dir.display(), code, "non-zero exit code");
                invalid_directory(root, dir, &settings, "exit code != 0", options, summary)?;
                return Ok(());
            }
            ExitState::Missing => {
                invalid_directory(root, dir, &settings, "exit_code not found", options, summary)?;
                return Ok(());
            }
            ExitState::Empty => {
                info!(path = %dir.display(), "exit_code is empty, skipping");
                return Ok(());
            }
            ExitState::Unreadable(reason) => {
                info!(path = %dir.display(), %reason, "exit_code cannot be read, skipping");
                return Ok(());
            }
        }
    }

    let parsed = parser.parse(dir, &settings).map_err(|err| {
        error!(path = %dir.display(), %err, "failed to parse results");
        err
    })?;
    for record in parsed {
        let mut import_settings = settings.clone();
        import_settings.extend(&record.extra_settings);
        match registry.add(import_settings, dir, record.results, duplicates)? {
            AddOutcome::Added(_) => summary.added += 1,
            AddOutcome::Duplicate => summary.duplicates += 1,
            AddOutcome::Skipped => summary.skipped += 1,
            AddOutcome::Filtered => summary.filtered += 1,
            AddOutcome::Collision(_) => summary.collisions += 1,
        }
    }
    Ok(())
}

fn settings_files(dir: &Path) -> Result<Vec<PathBuf>, MatbenchError> {
    let mut files = Vec::new();
    let listing = fs::read_dir(dir).map_err(|err| io_error("matbench.scan.list", dir, err))?;
    for item in listing {
        let item = item.map_err(|err| io_error("matbench.scan.list", dir, err))?;
        let name = item.file_name();
        let name = name.to_string_lossy();
        if (name == "settings" || name.starts_with("settings.")) && item.path().is_file() {
            files.push(item.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Merges the settings files found between `root` and `dir`, deepest last.
pub fn collect_settings(root: &Path, dir: &Path) -> Result<Settings, MatbenchError> {
    let mut chain: Vec<&Path> = dir
        .ancestors()
        .take_while(|ancestor| ancestor.starts_with(root))
        .collect();
    chain.reverse();
    let mut settings = Settings::new();
    for level in chain {
        for file in settings_files(level)? {
            settings.extend(&read_settings_file(&file)?);
        }
    }
    Ok(settings)
}

/// Reads one settings file: YAML for `.yaml`/`.yml`, `key=value` lines otherwise.
pub fn read_settings_file(path: &Path) -> Result<Settings, MatbenchError> {
    let bytes = fs::read(path).map_err(|err| io_error("matbench.scan.settings_read", path, err))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        return settings_from_yaml(&bytes)
            .map_err(|err| err.with_context("path", path.display().to_string()));
    }
    let text = String::from_utf8_lossy(&bytes);
    let mut settings = Settings::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match line.split_once('=') {
            Some((key, value)) => {
                settings.insert(key.trim(), value.trim());
            }
            None => {
                error!(path = %path.display(), line, "invalid settings line (no '=')");
            }
        }
    }
    Ok(settings)
}

fn read_exit_code(dir: &Path) -> ExitState {
    let content = match fs::read_to_string(dir.join(EXIT_CODE_FILE)) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ExitState::Missing,
        Err(err) => return ExitState::Unreadable(err.to_string()),
    };
    let content = content.trim();
    if content.is_empty() {
        return ExitState::Empty;
    }
    match content.parse() {
        Ok(code) => ExitState::Code(code),
        Err(err) => ExitState::Unreadable(format!("{content:?}: {err}")),
    }
}

fn invalid_directory(
    root: &Path,
    dir: &Path,
    settings: &Settings,
    reason: &str,
    options: &ScanOptions,
    summary: &mut ScanSummary,
) -> Result<(), MatbenchError> {
    summary.invalid += 1;
    match options.clean {
        CleanMode::Off => {
            debug!(path = %dir.display(), %settings, reason, "invalid result directory");
        }
        CleanMode::DryRun => {
            info!(path = %dir.display(), %settings, reason, "invalid, would be removed");
        }
        CleanMode::Remove if dir == root => {
            info!(path = %dir.display(), reason, "invalid, not removing the results root");
        }
        CleanMode::Remove => {
            fs::remove_dir_all(dir).map_err(|err| io_error("matbench.scan.remove", dir, err))?;
            info!(path = %dir.display(), reason, "removed");
        }
    }
    Ok(())
}
