use std::collections::{BTreeMap, BTreeSet};

use matbench_core::errors::{ErrorInfo, MatbenchError};
use matbench_core::Settings;
use serde::{Deserialize, Serialize};

const ESCAPED_COLON: &str = "\\:";
const COLON_MARKER: &str = "\u{0}";

/// Per-key allow-lists restricting which records a registry accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    allowed: BTreeMap<String, BTreeSet<String>>,
}

impl FilterSpec {
    /// Creates a filter accepting everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=v1:v2,other=v3`; `\:` escapes a colon inside a value.
    pub fn parse(spec: &str) -> Result<Self, MatbenchError> {
        let mut filters = Self::new();
        for item in spec.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let Some((key, values)) = item.split_once('=') else {
                return Err(MatbenchError::Config(
                    ErrorInfo::new("matbench.filters.syntax", "filter entry has no '='")
                        .with_context("entry", item)
                        .with_hint("use key=value or key=value1:value2"),
                ));
            };
            let values = values
                .replace(ESCAPED_COLON, COLON_MARKER)
                .split(':')
                .map(|value| value.replace(COLON_MARKER, ":"))
                .collect::<Vec<_>>();
            filters.allow(key.trim(), values);
        }
        Ok(filters)
    }

    /// Adds `values` to the allow-list of `key`.
    pub fn allow<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Returns true when no allow-list is configured.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Checks every setting that has an allow-list against it.
    ///
    /// Settings without an allow-list, and allow-listed keys the settings do
    /// not define, never cause a rejection.
    pub fn allows(&self, settings: &Settings) -> bool {
        self.allowed.iter().all(|(key, values)| match settings.get(key) {
            Some(value) => values.contains(&*value.render()),
            None => true,
        })
    }
}
