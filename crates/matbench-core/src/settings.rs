//! Settings assignments and their canonical registry key.
//!
//! Every [`SettingValue`] has exactly one textual rendering and that rendering
//! is the value's identity: equality, ordering, hashing and keying all compare
//! rendered text. Integers render in decimal, booleans as `true`/`false`,
//! strings verbatim, and floats in their shortest round-trip form which always
//! carries a fractional part (`1.0`, `0.25`). As a consequence `Int(1080)` and
//! `Str("1080")` are the same value, so a result ingested from a plain-text
//! settings file matches a combination expanded from YAML integers.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Key excluded from canonical keys; it carries per-run statistics.
pub const STATS_KEY: &str = "stats";
/// Prefix marking a rolling setting whose values are gathered together.
pub const ROLLING_PREFIX: &str = "@";
/// Placeholder value used for rolling keys of a gathered entry.
pub const GATHERED_VALUE: &str = "<all>";

/// Scalar value assigned to a single setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form text.
    Str(String),
}

impl SettingValue {
    /// Returns the canonical rendering used for keys and comparisons.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            SettingValue::Str(value) => Cow::Borrowed(value.as_str()),
            SettingValue::Int(value) => Cow::Owned(value.to_string()),
            SettingValue::Bool(value) => Cow::Borrowed(if *value { "true" } else { "false" }),
            SettingValue::Float(value) => Cow::Owned(format!("{value:?}")),
        }
    }

    /// Returns true when the value is the gathered-entry placeholder.
    pub fn is_gathered_placeholder(&self) -> bool {
        self.render() == GATHERED_VALUE
    }
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl PartialEq for SettingValue {
    fn eq(&self, other: &Self) -> bool {
        self.render() == other.render()
    }
}

impl Eq for SettingValue {}

impl PartialOrd for SettingValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SettingValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.render().cmp(&other.render())
    }
}

impl Hash for SettingValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render().hash(state);
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Str(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

/// Full assignment of named settings identifying one benchmark run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, SettingValue>);

impl Settings {
    /// Creates an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value assigned to `name`.
    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.0.get(name)
    }

    /// Assigns `value` to `name`, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<SettingValue>,
    ) -> Option<SettingValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Removes `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<SettingValue> {
        self.0.remove(name)
    }

    /// Returns true when `name` is assigned.
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterates over assignments in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, SettingValue> {
        self.0.iter()
    }

    /// Iterates over the setting names in key order.
    pub fn keys(&self) -> btree_map::Keys<'_, String, SettingValue> {
        self.0.keys()
    }

    /// Number of assigned settings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when nothing is assigned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrites assignments with the ones from `other`.
    pub fn extend(&mut self, other: &Settings) {
        for (name, value) in other.iter() {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Names of the rolling settings (prefixed with `@`).
    pub fn rolling_keys(&self) -> Vec<String> {
        self.0
            .keys()
            .filter(|name| name.starts_with(ROLLING_PREFIX))
            .cloned()
            .collect()
    }

    /// Canonical key of this assignment, see [`settings_key`].
    pub fn key(&self) -> String {
        settings_key(self)
    }
}

impl Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<SettingValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Settings {
    type Item = (String, SettingValue);
    type IntoIter = btree_map::IntoIter<String, SettingValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Settings {
    type Item = (&'a String, &'a SettingValue);
    type IntoIter = btree_map::Iter<'a, String, SettingValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Canonical string identifying a settings assignment.
///
/// The reserved [`STATS_KEY`] is ignored, the remaining names are sorted and
/// joined as `name=value` pairs separated by `|`.
pub fn settings_key(settings: &Settings) -> String {
    let mut key = String::new();
    for (name, value) in settings.iter() {
        if name == STATS_KEY {
            continue;
        }
        if !key.is_empty() {
            key.push('|');
        }
        key.push_str(name);
        key.push('=');
        key.push_str(&value.render());
    }
    key
}
