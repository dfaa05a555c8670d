//! Error types for envkit.
//!
//! This module provides the error hierarchy for every stage of the
//! environment lifecycle: spec loading, state management, providers,
//! and provisioning.
//!
//! Lookups of unknown environments are not errors; they return `Option`.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for envkit.
#[derive(Debug, Error)]
pub enum EnvkitError {
    /// Spec loading and validation errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Secret or infrastructure provider errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Provisioning workflow errors.
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Spec loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The spec file was not found.
    #[error("Spec file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The spec file could not be parsed.
    #[error("Failed to parse spec: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Spec validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Unknown environment referenced from the command line.
    #[error("Unknown environment: {name}")]
    UnknownEnvironment {
        /// The requested environment name.
        name: String,
    },

    /// The spec file already exists and overwriting was not requested.
    #[error("Spec file already exists: {path}")]
    AlreadyExists {
        /// Path to the existing file.
        path: PathBuf,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A state document is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Writing a state document failed.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No provider is registered for the requested kind.
    #[error("No {category} provider configured for '{kind}'")]
    NotConfigured {
        /// Provider category (secret, infrastructure).
        category: &'static str,
        /// Requested provider kind.
        kind: String,
    },

    /// A provider with this kind is already registered.
    #[error("{category} provider already registered: {kind}")]
    AlreadyRegistered {
        /// Provider category (secret, infrastructure, plugin).
        category: &'static str,
        /// Duplicated kind.
        kind: String,
    },

    /// The provider call failed.
    #[error("{kind} provider failed: {message}")]
    Failed {
        /// Provider kind.
        kind: String,
        /// Description of the failure.
        message: String,
    },
}

/// Provisioning workflow errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A health check command could not be started.
    #[error("Failed to run check '{name}': {message}")]
    CheckFailed {
        /// Check name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// A plugin returned an error.
    #[error("Plugin '{name}' failed: {message}")]
    PluginFailed {
        /// Plugin name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// The lockfile does not match the current spec.
    #[error("Snapshot mismatch for '{environment}': expected {expected}, found {actual}")]
    SnapshotMismatch {
        /// Environment name.
        environment: String,
        /// Fingerprint recorded in the lockfile.
        expected: String,
        /// Fingerprint of the current spec.
        actual: String,
    },
}

/// Result type alias for envkit operations.
pub type Result<T> = std::result::Result<T, EnvkitError>;

impl EnvkitError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::State(StateError::LockFailed { .. } | StateError::LockedByOther { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error with an optional source location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl StateError {
    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Creates a not-configured error for the given category and kind.
    #[must_use]
    pub fn not_configured(category: &'static str, kind: impl Into<String>) -> Self {
        Self::NotConfigured {
            category,
            kind: kind.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_errors_are_retryable() {
        let err = EnvkitError::State(StateError::LockedByOther {
            holder: String::from("host-1-abcd"),
            since: String::from("2026-01-01T00:00:00Z"),
        });
        assert!(err.is_retryable());
        assert!(!EnvkitError::internal("boom").is_retryable());
    }

    #[test]
    fn test_not_configured_message() {
        let err = ProviderError::not_configured("secret", "keepass");
        assert_eq!(err.to_string(), "No secret provider configured for 'keepass'");
    }
}
