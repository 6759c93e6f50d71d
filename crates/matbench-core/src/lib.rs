#![deny(missing_docs)]
#![doc = "Settings, canonical keys, templates and structured errors shared by the matbench crates."]

pub mod errors;
/// Stable content hashing.
pub mod hash;
/// Canonical JSON and settings-file YAML.
pub mod serde;
pub mod settings;
pub mod template;

pub use errors::{io_error, serde_error, ErrorInfo, MatbenchError};
pub use hash::stable_hash_string;
pub use settings::{
    settings_key, SettingValue, Settings, GATHERED_VALUE, ROLLING_PREFIX, STATS_KEY,
};
pub use template::{Template, TemplateError};
