//! Entity codec and key scheme
//!
//! Keys are `<namespace prefix><id>` with no separator. Values are JSON
//! objects, so records stay readable with any JSON tool.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RelayError, Result};

/// Namespace prefix for User records
pub const USER_PREFIX: &str = "user-";

/// Every namespace prefix in use. A new entity type must register here.
pub const NAMESPACES: &[&str] = &[USER_PREFIX];

/// Storage key for `id` under `prefix`
pub fn encode_key(prefix: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix.as_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

/// Encode an entity as a JSON object
pub fn serialize<T: Serialize>(entity: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(entity).map_err(|e| RelayError::Serialization(e.to_string()))
}

/// Decode an entity; anything unparsable is `CorruptRecord`
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| RelayError::CorruptRecord(e.to_string()))
}

/// No registered prefix may be a prefix of another, or scans would bleed
/// across entity types
pub fn namespaces_are_disjoint(namespaces: &[&str]) -> bool {
    namespaces.iter().enumerate().all(|(i, a)| {
        namespaces
            .iter()
            .enumerate()
            .all(|(j, b)| i == j || !(a.starts_with(b) || b.starts_with(a)))
    })
}
