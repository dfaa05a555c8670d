//! Reproducibility snapshots.
//!
//! A snapshot pairs a resolved spec with its fingerprint and creation
//! time. Snapshots are never mutated after capture; a later check compares
//! the recorded fingerprint with the fingerprint of the current spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{fingerprint_spec, EnvironmentSpec, SpecHasher};
use crate::error::Result;

/// An immutable reproducibility record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// The captured spec.
    spec: EnvironmentSpec,
    /// Fingerprint of `spec`.
    fingerprint: String,
    /// When the snapshot was captured.
    created_at: DateTime<Utc>,
}

/// Result of comparing a snapshot with a current spec.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCheck {
    /// Environment name recorded in the snapshot.
    pub environment: String,
    /// Fingerprint recorded in the snapshot.
    pub expected: String,
    /// Fingerprint of the current spec.
    pub actual: String,
    /// Whether the fingerprints are equal.
    pub matches: bool,
}

impl Snapshot {
    /// Captures a snapshot of `spec` now.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be fingerprinted.
    pub fn capture(spec: &EnvironmentSpec) -> Result<Self> {
        Ok(Self {
            spec: spec.clone(),
            fingerprint: fingerprint_spec(spec)?,
            created_at: Utc::now(),
        })
    }

    /// Returns the captured spec.
    #[must_use]
    pub const fn spec(&self) -> &EnvironmentSpec {
        &self.spec
    }

    /// Returns the recorded fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the capture time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Compares the recorded fingerprint with that of `current`.
    ///
    /// # Errors
    ///
    /// Returns an error if `current` cannot be fingerprinted.
    pub fn verify(&self, current: &EnvironmentSpec) -> Result<SnapshotCheck> {
        let actual = fingerprint_spec(current)?;
        Ok(SnapshotCheck {
            environment: self.spec.name.clone(),
            matches: SpecHasher::hashes_match(&self.fingerprint, &actual),
            expected: self.fingerprint.clone(),
            actual,
        })
    }

    /// Returns true if the recorded fingerprint still matches the recorded spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorded spec cannot be fingerprinted.
    pub fn is_intact(&self) -> Result<bool> {
        Ok(self.verify(&self.spec)?.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Toolchain;

    #[test]
    fn test_capture_and_verify() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.toolchains.push(Toolchain::new("python", "3.11"));

        let snapshot = Snapshot::capture(&spec).unwrap();
        assert_eq!(snapshot.fingerprint().len(), 64);
        assert!(snapshot.is_intact().unwrap());
        assert!(snapshot.verify(&spec).unwrap().matches);

        spec.toolchains[0].version = String::from("3.12");
        let check = snapshot.verify(&spec).unwrap();
        assert!(!check.matches);
        assert_eq!(check.environment, "svc");
        assert_ne!(check.expected, check.actual);
    }

    #[test]
    fn test_json_field_names() {
        let snapshot = Snapshot::capture(&EnvironmentSpec::new("svc")).unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();

        assert!(value.get("createdAt").is_some());
        assert_eq!(value["spec"]["name"], "svc");
        assert_eq!(value["fingerprint"], snapshot.fingerprint());
    }

    #[test]
    fn test_tampered_snapshot_detected() {
        let snapshot = Snapshot::capture(&EnvironmentSpec::new("svc")).unwrap();
        let mut value = serde_json::to_value(&snapshot).unwrap();
        value["spec"]["name"] = serde_json::json!("other");

        let tampered: Snapshot = serde_json::from_value(value).unwrap();
        assert!(!tampered.is_intact().unwrap());
    }
}
