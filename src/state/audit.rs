//! Append-only audit log.
//!
//! Every event is one JSON object per line in `activity.log`:
//! `{"timestamp": ..., "event": ..., "metadata": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{EnvkitError, Result, StateError};

/// Audit log file name inside the state directory.
pub const AUDIT_LOG_FILE: &str = "activity.log";

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Event name (e.g. `snapshot_created`).
    pub event: String,
    /// Event-specific fields.
    pub metadata: Value,
}

/// Writer for the audit log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    /// Path to the log file.
    path: PathBuf,
}

impl AuditLog {
    /// Creates an audit log writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates an audit log inside a state directory.
    #[must_use]
    pub fn in_state_dir(state_dir: impl AsRef<Path>) -> Self {
        Self::new(state_dir.as_ref().join(AUDIT_LOG_FILE))
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be written.
    pub async fn record(&self, event: &str, metadata: Value) -> Result<()> {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event: event.to_string(),
            metadata,
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                EnvkitError::State(StateError::write(format!("Failed to open audit log: {e}")))
            })?;

        file.write_all(line.as_bytes()).await.map_err(|e| {
            EnvkitError::State(StateError::write(format!("Failed to append audit log: {e}")))
        })?;

        debug!(event, "Recorded audit event");
        Ok(())
    }

    /// Reads all recorded events.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is not a valid audit entry.
    pub async fn entries(&self) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    EnvkitError::State(StateError::corrupted(format!("Invalid audit entry: {e}")))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_and_read() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::in_state_dir(temp.path().join(".envkit"));

        audit.record("secret_fetched", json!({ "provider": "vault" })).await.unwrap();
        audit.record("snapshot_created", json!({})).await.unwrap();

        let entries = audit.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "secret_fetched");
        assert_eq!(entries[0].metadata["provider"], "vault");
        assert_eq!(entries[1].event, "snapshot_created");
    }

    #[tokio::test]
    async fn test_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::in_state_dir(temp.path());

        assert!(audit.entries().await.unwrap().is_empty());
    }
}
