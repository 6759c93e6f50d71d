use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use csv::WriterBuilder;
use matbench_core::errors::{io_error, ErrorInfo, MatbenchError};
use matbench_core::serde::canonical_json;

use crate::registry::Registry;

fn wrap_csv(code: &str, err: csv::Error) -> MatbenchError {
    MatbenchError::Io(ErrorInfo::new(code, "CSV export failure").with_hint(err.to_string()))
}

/// Writes one row per registry entry to a CSV file.
pub fn export_csv(registry: &Registry, path: &Path) -> Result<usize, MatbenchError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| io_error("matbench.export.create", parent, err))?;
    }
    let file = File::create(path).map_err(|err| io_error("matbench.export.open", path, err))?;
    let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
    writer
        .write_record(["key", "location", "gathered", "children", "results"])
        .map_err(|err| wrap_csv("matbench.export.header", err))?;
    let mut rows = 0;
    for entry in registry.entries() {
        let results = match entry.payload() {
            Some(payload) => canonical_json(payload)?,
            None => String::new(),
        };
        writer
            .write_record([
                entry.processed_key.clone(),
                entry.location.display().to_string(),
                entry.is_gathered().to_string(),
                entry.children().len().to_string(),
                results,
            ])
            .map_err(|err| wrap_csv("matbench.export.row", err))?;
        rows += 1;
    }
    writer
        .flush()
        .map_err(|err| io_error("matbench.export.flush", path, err))?;
    Ok(rows)
}
