use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use matbench_core::errors::{io_error, serde_error, MatbenchError};
use matbench_core::serde::from_yaml_slice;
use matbench_core::{stable_hash_string, SettingValue};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Value of one setting in a description: a scalar or a list to expand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingSpec {
    /// Several values, each yielding its own combinations.
    Many(Vec<SettingValue>),
    /// A single value, equivalent to a one-element list.
    One(SettingValue),
}

impl SettingSpec {
    /// Values in declared order.
    pub fn values(&self) -> &[SettingValue] {
        match self {
            SettingSpec::Many(values) => values,
            SettingSpec::One(value) => std::slice::from_ref(value),
        }
    }
}

impl From<SettingValue> for SettingSpec {
    fn from(value: SettingValue) -> Self {
        SettingSpec::One(value)
    }
}

impl<V: Into<SettingValue>> From<Vec<V>> for SettingSpec {
    fn from(values: Vec<V>) -> Self {
        SettingSpec::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Settings of one experiment, in declared order.
pub type ExperimentSettings = IndexMap<String, SettingSpec>;

/// Declarative benchmark campaign, as read from a benchmark file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDescription {
    /// Settings shared by every experiment; experiments override them.
    #[serde(default)]
    pub common_settings: ExperimentSettings,
    /// Experiments by name, in declared order.
    #[serde(default)]
    pub expe: IndexMap<String, ExperimentSettings>,
    /// Static companion files written next to each run's settings.
    #[serde(default)]
    pub test_files: IndexMap<String, serde_yaml::Value>,
    /// Template of the bench directory, relative to the experiment directory.
    #[serde(rename = "--path-tpl", default, skip_serializing_if = "Option::is_none")]
    pub path_tpl: Option<String>,
    /// Template of the command launched for each combination.
    #[serde(rename = "--script-tpl", default, skip_serializing_if = "Option::is_none")]
    pub script_tpl: Option<String>,
    /// Stop the campaign at the first failing combination.
    #[serde(rename = "--stop-on-error", default)]
    pub stop_on_error: bool,
    /// Emit a remote script instead of running locally.
    #[serde(rename = "--remote-mode", default)]
    pub remote_mode: bool,
    /// Experiments to run, in order; every experiment when unset.
    #[serde(
        rename = "--expe-to-run",
        default,
        deserialize_with = "deserialize_name_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub expe_to_run: Option<Vec<String>>,
    /// Root of the results tree.
    #[serde(rename = "--results-dirname", default, skip_serializing_if = "Option::is_none")]
    pub results_dirname: Option<PathBuf>,
    /// Any other top-level key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NameList {
    List(Vec<String>),
    Csv(String),
}

fn deserialize_name_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Option::<NameList>::deserialize(deserializer)?;
    Ok(names.map(|names| match names {
        NameList::List(list) => list,
        NameList::Csv(csv) => split_names(&csv),
    }))
}

/// Splits a comma separated list of experiment names.
pub fn split_names(csv: &str) -> Vec<String> {
    csv.split(',').map(|name| name.trim().to_string()).collect()
}

impl ExperimentDescription {
    /// Names to run, in order: `--expe-to-run` when set, else every experiment.
    pub fn experiments_to_run(&self) -> Vec<String> {
        match &self.expe_to_run {
            Some(names) => names.clone(),
            None => self.expe.keys().cloned().collect(),
        }
    }

    /// Settings axes of `experiment`, merged over the common settings.
    pub fn merged_settings(&self, experiment: &str) -> Option<BTreeMap<String, Vec<SettingValue>>> {
        let own = self.expe.get(experiment)?;
        let mut merged = BTreeMap::new();
        for (name, spec) in self.common_settings.iter().chain(own.iter()) {
            merged.insert(name.clone(), spec.values().to_vec());
        }
        Some(merged)
    }

    /// Top-level `--` keys that do not match a known flag.
    pub fn unknown_flags(&self) -> Vec<&str> {
        self.extra
            .keys()
            .filter(|key| key.starts_with("--"))
            .map(String::as_str)
            .collect()
    }

    /// Companion files rendered as text: strings verbatim, other YAML re-serialized.
    pub fn rendered_test_files(&self) -> Result<Vec<(String, String)>, MatbenchError> {
        let mut files = Vec::with_capacity(self.test_files.len());
        for (name, content) in &self.test_files {
            let text = match content {
                serde_yaml::Value::String(text) => text.clone(),
                other => serde_yaml::to_string(other)
                    .map_err(|err| serde_error("matbench.description.test_file", err))?,
            };
            files.push((name.clone(), text));
        }
        Ok(files)
    }

    /// Stable hash of the whole description.
    pub fn stable_hash(&self) -> Result<String, MatbenchError> {
        stable_hash_string(self)
    }
}

/// Reads a benchmark file and warns about unexpected flags.
pub fn load_description<P: AsRef<Path>>(path: P) -> Result<ExperimentDescription, MatbenchError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| io_error("matbench.description.read", path, err))?;
    let description: ExperimentDescription = from_yaml_slice(&bytes)?;
    for flag in description.unknown_flags() {
        warn!(flag, path = %path.display(), "unexpected flag found in the benchmark file");
    }
    Ok(description)
}
