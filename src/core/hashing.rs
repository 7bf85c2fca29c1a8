//! Content hashing and idempotency keys.
//!
//! Payload hashes are taken over a canonical JSON rendering (object keys
//! sorted at every depth, no insignificant whitespace), so two payloads that
//! differ only in field order hash identically.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Separator between idempotency key parts
pub const KEY_SEPARATOR: &str = "|";

/// Render a JSON value canonically
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            let rendered: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
        // Scalars already have a single rendering
        scalar => scalar.to_string(),
    }
}

/// Hex SHA-256 of a payload, insensitive to key order
pub fn payload_hash(payload: &Value) -> String {
    hash_text(&canonical_json(payload))
}

/// Hex SHA-256 of a string
pub fn hash_text(text: &str) -> String {
    hash_bytes(text.as_bytes())
}

/// Hex SHA-256 of raw bytes
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Build an idempotency key from a job's semantic identity.
///
/// Parts are joined with [`KEY_SEPARATOR`] and hashed, so identical logical
/// requests collapse to one key no matter who issues them.
pub fn idempotency_key(parts: &[&str]) -> String {
    hash_text(&parts.join(KEY_SEPARATOR))
}
