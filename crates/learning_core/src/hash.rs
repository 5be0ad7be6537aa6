//! Canonical JSON hashing for learning-event fingerprints.
//!
//! Semantically equal inputs produce the same digest regardless of key
//! insertion order, so a resubmitted review lands on the same `inputs_hash`.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// SHA-256 of canonicalized JSON (sorted keys, compact output).
pub fn canonical_json_hash(value: &JsonValue) -> [u8; 32] {
    let canonical = canonicalize_json(value);
    // Serializing a `Value` only fails for non-string map keys, which `Value` cannot hold.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hasher.finalize().into()
}

/// Hex-encoded fingerprint stored in `learning_events.inputs_hash`.
pub fn inputs_hash(value: &JsonValue) -> String {
    hex::encode(canonical_json_hash(value))
}

/// Normalize JSON for deterministic hashing
///
/// - Object keys are sorted (recursive)
/// - Arrays preserve order
/// - Primitives unchanged
pub fn canonicalize_json(v: &JsonValue) -> JsonValue {
    match v {
        JsonValue::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();

            let mut sorted = serde_json::Map::new();
            for k in keys {
                if let Some(child) = map.get(k) {
                    sorted.insert(k.clone(), canonicalize_json(child));
                }
            }
            JsonValue::Object(sorted)
        }
        JsonValue::Array(arr) => JsonValue::Array(arr.iter().map(canonicalize_json).collect()),
        other => other.clone(),
    }
}
