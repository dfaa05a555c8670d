//! Deterministic spec fingerprints.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering of a spec in
//! which the top-level keys are sorted. Nested objects keep their field
//! order. The result identifies a spec for snapshots and drift checks.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::spec::EnvironmentSpec;

/// Length of a rendered fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Computes the fingerprint of an environment spec.
///
/// # Errors
///
/// Returns an error if the spec cannot be serialized to JSON.
pub fn fingerprint_spec(spec: &EnvironmentSpec) -> Result<String> {
    let value = serde_json::to_value(spec)?;
    Ok(fingerprint_value(&value))
}

/// Computes the fingerprint of an arbitrary JSON value.
///
/// Only the top-level key order of an object is normalized.
#[must_use]
pub fn fingerprint_value(value: &Value) -> String {
    let canonical = canonical_json(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Renders `value` as compact JSON with its top-level keys sorted.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();

            let mut sorted = Map::with_capacity(object.len());
            for key in keys {
                if let Some(field) = object.get(key) {
                    sorted.insert(key.clone(), field.clone());
                }
            }
            Value::Object(sorted).to_string()
        }
        other => other.to_string(),
    }
}

/// Helpers for displaying and comparing fingerprints.
#[derive(Debug, Default)]
pub struct SpecHasher;

impl SpecHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
