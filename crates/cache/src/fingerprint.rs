//! Cache key derivation.
//!
//! Options are canonicalized (object keys sorted at every depth) before
//! hashing, so two requests that differ only in field order share a key.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// SHA-256 of raw bytes as 64 lowercase hex characters.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The cache key for a set of request options.
pub fn fingerprint(options: &Value) -> String {
    let canonical = canonicalize(options);
    // Serializing a Value cannot fail: keys are strings and there are no
    // custom Serialize impls below it.
    let text = serde_json::to_string(&canonical).unwrap_or_default();
    sha256_hex(text.as_bytes())
}
