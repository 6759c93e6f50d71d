use std::fs;
use std::path::{Path, PathBuf};

use matbench_core::{io_error, MatbenchError};
use serde_json::Value;
use tracing::{info, warn};

use crate::registry::MatrixEntry;

/// Details handed to a [`DuplicateHandler`] when an import key is seen twice.
#[derive(Debug, Clone, Copy)]
pub struct Duplicate<'a> {
    /// Canonical key of the import settings.
    pub import_key: &'a str,
    /// Entry already registered under the key, `None` when the first record
    /// was skipped by the rewrite hook.
    pub existing: Option<&'a MatrixEntry>,
    /// Location of the first record.
    pub existing_location: &'a Path,
    /// Results of the rejected record.
    pub incoming_results: &'a Value,
    /// Location of the rejected record.
    pub incoming_location: &'a Path,
}

/// Caller policy for duplicated import keys.
pub trait DuplicateHandler {
    /// Called once per rejected duplicate; the registry is left unchanged.
    fn on_duplicate(&mut self, duplicate: &Duplicate<'_>) -> Result<(), MatbenchError>;
}

impl<F> DuplicateHandler for F
where
    F: FnMut(&Duplicate<'_>) -> Result<(), MatbenchError>,
{
    fn on_duplicate(&mut self, duplicate: &Duplicate<'_>) -> Result<(), MatbenchError> {
        self(duplicate)
    }
}

/// Logs duplicates and keeps everything on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDuplicates;

impl DuplicateHandler for LogDuplicates {
    fn on_duplicate(&mut self, duplicate: &Duplicate<'_>) -> Result<(), MatbenchError> {
        log_duplicate(duplicate);
        Ok(())
    }
}

/// Deletes the directory of every duplicate record (or lists it when dry).
#[derive(Debug, Clone, Default)]
pub struct RemoveDuplicates {
    /// Only report what would be removed.
    pub dry_run: bool,
    /// Directories removed (or that would have been).
    pub removed: Vec<PathBuf>,
}

impl RemoveDuplicates {
    /// Creates a handler; `dry_run` keeps the files.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            removed: Vec::new(),
        }
    }
}

impl DuplicateHandler for RemoveDuplicates {
    fn on_duplicate(&mut self, duplicate: &Duplicate<'_>) -> Result<(), MatbenchError> {
        log_duplicate(duplicate);
        // several records parsed from one directory share its location
        if duplicate.incoming_location == duplicate.existing_location {
            return Ok(());
        }
        let target = duplicate.incoming_location;
        if self.dry_run {
            info!(path = %target.display(), "duplicate would have been removed");
        } else {
            fs::remove_dir_all(target)
                .map_err(|err| io_error("matbench.duplicates.remove", target, err))?;
            info!(path = %target.display(), "duplicate removed");
        }
        self.removed.push(target.to_path_buf());
        Ok(())
    }
}

fn log_duplicate(duplicate: &Duplicate<'_>) {
    warn!(
        key = duplicate.import_key,
        old = %duplicate.existing_location.display(),
        new = %duplicate.incoming_location.display(),
        "duplicated results key"
    );
}
