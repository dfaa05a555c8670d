//! Specification types for declarative environments.
//!
//! This module defines the structs that map to `envkit.yaml`. A spec
//! describes one base environment plus any number of named override
//! layers that derive further environments from it.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// The root unit of configuration: one declarative environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Unique environment name.
    #[validate(length(min = 1, max = 255, message = "Environment name must be 1-255 characters"))]
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Secrets to resolve through providers.
    #[serde(default)]
    #[validate(nested)]
    pub secrets: Vec<SecretConfig>,
    /// Toolchains to cache.
    #[serde(default)]
    #[validate(nested)]
    pub toolchains: Vec<Toolchain>,
    /// Policy file references.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Health check shell commands.
    #[serde(default)]
    pub checks: Vec<String>,
    /// Override layers applied against this spec as base.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<EnvironmentHierarchy>,
}

/// A secret reference resolved through a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    /// Provider kind (e.g. `vault`).
    pub provider: String,
    /// Provider-specific secret path.
    #[validate(length(min = 1, message = "Secret path must be provided"))]
    pub path: String,
    /// Rotation interval in days.
    #[serde(default, alias = "rotation_days", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "rotationDays must be positive when provided"))]
    pub rotation_days: Option<i64>,
}

/// A toolchain pinned to a version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Toolchain {
    /// Toolchain name (e.g. `python`).
    #[validate(length(min = 1, message = "Toolchain name cannot be empty"))]
    pub name: String,
    /// Pinned version.
    #[validate(length(min = 1, message = "Toolchain version cannot be empty"))]
    pub version: String,
    /// Optional cache key for the toolchain cache.
    #[serde(default, alias = "cache_key", skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

/// A named override layer producing a resolved environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentHierarchy {
    /// Name of the resulting environment.
    pub name: String,
    /// Name of the already-resolved parent environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Fields replacing the parent's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<SpecOverrides>,
}

/// Partial spec. Every present field fully replaces the parent's field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecOverrides {
    /// Replacement description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretConfig>>,
    /// Replacement toolchains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchains: Option<Vec<Toolchain>>,
    /// Replacement policies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<String>>,
    /// Replacement checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<String>>,
}

impl EnvironmentSpec {
    /// Creates an empty spec with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the names of the declared override layers.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.environments.iter().map(|e| e.name.as_str()).collect()
    }
}

impl SecretConfig {
    /// Creates a secret reference without a rotation interval.
    #[must_use]
    pub fn new(provider: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            path: path.into(),
            rotation_days: None,
        }
    }

    /// Returns the broker key for this secret.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.provider, self.path)
    }
}

impl Toolchain {
    /// Creates a toolchain pin without a cache key.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            cache_key: None,
        }
    }
}

impl EnvironmentHierarchy {
    /// Creates a layer with no parent and no overrides.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the parent environment.
    #[must_use]
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Sets the overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: SpecOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

impl SpecOverrides {
    /// Applies the present fields onto `spec`, replacing them wholesale.
    pub fn apply_to(&self, spec: &mut EnvironmentSpec) {
        if let Some(description) = &self.description {
            spec.description = Some(description.clone());
        }
        if let Some(secrets) = &self.secrets {
            spec.secrets.clone_from(secrets);
        }
        if let Some(toolchains) = &self.toolchains {
            spec.toolchains.clone_from(toolchains);
        }
        if let Some(policies) = &self.policies {
            spec.policies.clone_from(policies);
        }
        if let Some(checks) = &self.checks {
            spec.checks.clone_from(checks);
        }
    }
}
