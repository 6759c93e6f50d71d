use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::MatbenchError;
use crate::serde::canonical_json;

/// SHA-256 of the canonical JSON of `value`, as lowercase hex.
///
/// Two descriptions that differ only in map ordering hash the same.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, MatbenchError> {
    let digest = Sha256::digest(canonical_json(value)?.as_bytes());
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}
