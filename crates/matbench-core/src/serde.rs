use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use serde_yaml::Mapping;

use crate::errors::{serde_error, ErrorInfo, MatbenchError};
use crate::settings::{SettingValue, Settings};

/// JSON view emitting object members in sorted key order at every depth.
#[derive(Debug, Clone, Copy)]
pub struct Canonical<'a>(pub &'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(members) => {
                let mut sorted = members.iter().collect::<Vec<_>>();
                sorted.sort_by(|(left, _), (right, _)| left.cmp(right));
                let mut map = serializer.serialize_map(Some(sorted.len()))?;
                for (name, value) in sorted {
                    map.serialize_entry(name, &Canonical(value))?;
                }
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Canonical(item))?;
                }
                seq.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Compact JSON text of `value` with sorted keys; used for reports, exports
/// and hashing.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, MatbenchError> {
    let value =
        serde_json::to_value(value).map_err(|err| serde_error("matbench.json.encode", err))?;
    serde_json::to_string(&Canonical(&value))
        .map_err(|err| serde_error("matbench.json.write", err))
}

/// Parses a YAML document, typically a benchmark file.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, MatbenchError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("matbench.yaml.parse", err))
}

/// Renders the `settings.yaml` written next to every run.
pub fn settings_to_yaml(settings: &Settings) -> Result<String, MatbenchError> {
    serde_yaml::to_string(settings).map_err(|err| serde_error("matbench.settings.encode", err))
}

/// Parses a `settings.yaml` file.
///
/// A blank or `null` document holds no settings; anything other than a
/// mapping of scalars is rejected.
pub fn settings_from_yaml(data: &[u8]) -> Result<Settings, MatbenchError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Settings::new());
    }
    let document: serde_yaml::Value =
        serde_yaml::from_slice(data).map_err(|err| serde_error("matbench.settings.parse", err))?;
    match document {
        serde_yaml::Value::Null => Ok(Settings::new()),
        serde_yaml::Value::Mapping(mapping) => settings_from_mapping(mapping),
        other => Err(MatbenchError::Serde(
            ErrorInfo::new("matbench.settings.shape", "settings file is not a mapping")
                .with_context("found", format!("{other:?}"))
                .with_hint("write one `name: value` pair per line"),
        )),
    }
}

fn settings_from_mapping(mapping: Mapping) -> Result<Settings, MatbenchError> {
    let mut settings = Settings::new();
    for (name, value) in mapping {
        let name = match name {
            serde_yaml::Value::String(name) => name,
            other => {
                return Err(MatbenchError::Serde(
                    ErrorInfo::new("matbench.settings.name", "setting name is not a string")
                        .with_context("name", format!("{other:?}")),
                ))
            }
        };
        let value: SettingValue = serde_yaml::from_value(value).map_err(|err| {
            MatbenchError::Serde(
                ErrorInfo::new("matbench.settings.value", err.to_string())
                    .with_context("name", name.as_str()),
            )
        })?;
        settings.insert(name, value);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_members_are_sorted() {
        let text = canonical_json(&json!({"b": [{"z": 1, "a": 2}], "a": null})).expect("json");
        assert_eq!(text, r#"{"a":null,"b":[{"a":2,"z":1}]}"#);
    }

    #[test]
    fn blank_and_null_settings_files_are_empty() {
        assert!(settings_from_yaml(b"  \n").expect("blank").is_empty());
        assert!(settings_from_yaml(b"~\n").expect("null").is_empty());
    }

    #[test]
    fn settings_file_must_be_a_mapping() {
        let err = settings_from_yaml(b"- 1\n- 2\n").expect_err("list");
        assert_eq!(err.info().code, "matbench.settings.shape");
        let err = settings_from_yaml(b"size: [1, 2]\n").expect_err("nested");
        assert_eq!(err.info().context["name"], "size");
    }

    #[test]
    fn settings_yaml_round_trip_keeps_types() {
        let mut settings = Settings::new();
        settings.insert("size", 8i64);
        settings.insert("ratio", 0.5);
        settings.insert("mode", "fast");
        let parsed = settings_from_yaml(settings_to_yaml(&settings).expect("yaml").as_bytes())
            .expect("parse");
        assert_eq!(parsed, settings);
    }
}
