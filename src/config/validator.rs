//! Spec validation.
//!
//! This module checks a parsed spec before anything acts on it: name
//! format, secret and toolchain shape, policy references and the override
//! layer declarations.

use crate::error::{ConfigError, EnvkitError, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;
use validator::Validate;

use super::spec::{EnvironmentHierarchy, EnvironmentSpec, SecretConfig, SpecOverrides};

/// Secret provider kinds accepted in specs.
pub const SUPPORTED_SECRET_PROVIDERS: &[&str] = &[
    "vault",
    "aws-secrets-manager",
    "azure-key-vault",
    "gcp-secret-manager",
];

/// Maximum length of an environment name.
pub const MAX_NAME_LEN: usize = 255;

/// Validator for environment specs.
#[derive(Debug)]
pub struct SpecValidator {
    /// Accepted secret provider kinds.
    secret_providers: HashSet<String>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Serialize)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecValidator {
    /// Creates a validator accepting the built-in secret providers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            secret_providers: SUPPORTED_SECRET_PROVIDERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Accepts an additional secret provider kind.
    pub fn add_secret_provider(&mut self, kind: impl Into<String>) {
        self.secret_providers.insert(kind.into());
    }

    /// Validates a spec, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, spec: &EnvironmentSpec) -> Result<ValidationResult> {
        let result = self.check(spec);

        if result.errors.is_empty() {
            debug!("Spec validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(EnvkitError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, spec: &EnvironmentSpec) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(errors) = spec.validate() {
            result.errors.push(ValidationError {
                field: String::from("spec"),
                message: errors.to_string(),
            });
        }

        Self::validate_name(&spec.name, "name", &mut result);
        self.validate_secrets(&spec.secrets, "secrets", &mut result);
        Self::validate_references(&spec.policies, "policies", "Policy", &mut result);
        Self::validate_references(&spec.checks, "checks", "Check", &mut result);
        self.validate_layers(spec, &mut result);

        result
    }

    /// Validates an environment name.
    fn validate_name(name: &str, field: &str, result: &mut ValidationResult) {
        if name.is_empty() {
            result.errors.push(ValidationError {
                field: field.to_string(),
                message: String::from("Environment name is required"),
            });
        } else if !is_valid_name(name) {
            result.errors.push(ValidationError {
                field: field.to_string(),
                message: format!(
                    "Environment name '{name}' is invalid. Must be at most {MAX_NAME_LEN} alphanumeric, '-' or '_' characters."
                ),
            });
        }
    }

    /// Validates secret references.
    fn validate_secrets(&self, secrets: &[SecretConfig], prefix: &str, result: &mut ValidationResult) {
        let mut seen_keys = HashSet::new();

        for (i, secret) in secrets.iter().enumerate() {
            if !self.secret_providers.contains(&secret.provider) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}[{i}].provider"),
                    message: format!("Unsupported secret provider: {}", secret.provider),
                });
            }

            let key = secret.key();
            if !seen_keys.insert(key.clone()) {
                result.warnings.push(format!(
                    "{prefix}[{i}]: Duplicate secret '{key}' will overwrite the earlier entry"
                ));
            }
        }
    }

    /// Validates that string references (policies, checks) are not blank.
    fn validate_references(
        references: &[String],
        prefix: &str,
        label: &str,
        result: &mut ValidationResult,
    ) {
        for (i, reference) in references.iter().enumerate() {
            if reference.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}[{i}]"),
                    message: format!("{label} references cannot be empty"),
                });
            }
        }
    }

    /// Validates override layer declarations.
    fn validate_layers(&self, spec: &EnvironmentSpec, result: &mut ValidationResult) {
        let mut resolved: HashSet<&str> = HashSet::from([spec.name.as_str()]);
        let declared: HashSet<&str> = spec.layer_names().into_iter().collect();

        for (i, layer) in spec.environments.iter().enumerate() {
            let prefix = format!("environments[{i}]");

            Self::validate_name(&layer.name, &format!("{prefix}.name"), result);

            if resolved.contains(layer.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate environment name: {}", layer.name),
                });
            }

            Self::check_extends(layer, &prefix, &resolved, &declared, result);

            if let Some(overrides) = &layer.overrides {
                self.validate_overrides(overrides, &format!("{prefix}.overrides"), result);
            }

            resolved.insert(layer.name.as_str());
        }
    }

    /// Validates the replacement lists of a layer with the base spec's rules.
    fn validate_overrides(
        &self,
        overrides: &SpecOverrides,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        if let Some(secrets) = &overrides.secrets {
            let prefix = format!("{prefix}.secrets");
            Self::validate_shapes(secrets, &prefix, result);
            self.validate_secrets(secrets, &prefix, result);
        }
        if let Some(toolchains) = &overrides.toolchains {
            Self::validate_shapes(toolchains, &format!("{prefix}.toolchains"), result);
        }
        if let Some(policies) = &overrides.policies {
            Self::validate_references(policies, &format!("{prefix}.policies"), "Policy", result);
        }
        if let Some(checks) = &overrides.checks {
            Self::validate_references(checks, &format!("{prefix}.checks"), "Check", result);
        }
    }

    /// Runs the derived shape checks on each list entry.
    fn validate_shapes<T: Validate>(items: &[T], prefix: &str, result: &mut ValidationResult) {
        for (i, item) in items.iter().enumerate() {
            if let Err(errors) = item.validate() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}[{i}]"),
                    message: errors.to_string(),
                });
            }
        }
    }

    /// Warns about `extends` targets that resolution will replace with the base.
    fn check_extends(
        layer: &EnvironmentHierarchy,
        prefix: &str,
        resolved: &HashSet<&str>,
        declared: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let Some(parent) = layer.extends.as_deref() else {
            return;
        };

        if resolved.contains(parent) {
            return;
        }

        if declared.contains(parent) {
            result.warnings.push(format!(
                "{prefix}.extends: '{parent}' is declared after '{}'; the base spec is used as parent",
                layer.name
            ));
        } else {
            result.warnings.push(format!(
                "{prefix}.extends: Unknown environment '{parent}'; the base spec is used as parent"
            ));
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names are 1-255 ASCII alphanumeric, hyphen or underscore characters.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::Toolchain;

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("svc"));
        assert!(is_valid_name("My_Service-2"));
        assert!(is_valid_name(&"a".repeat(MAX_NAME_LEN)));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("dot.ted"));
        assert!(!is_valid_name(&"a".repeat(MAX_NAME_LEN + 1)));
    }

    #[test]
    fn test_valid_spec_passes() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.secrets.push(SecretConfig::new("vault", "kv/svc"));
        spec.toolchains.push(Toolchain::new("python", "3.11"));
        spec.policies.push(String::from("policies/baseline.rego"));

        let result = SpecValidator::new().validate(&spec).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_unsupported_provider() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.secrets.push(SecretConfig::new("keepass", "db"));

        let result = SpecValidator::new().check(&spec);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "secrets[0].provider");
    }

    #[test]
    fn test_custom_provider_accepted() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.secrets.push(SecretConfig::new("keepass", "db"));

        let mut validator = SpecValidator::new();
        validator.add_secret_provider("keepass");
        assert!(validator.check(&spec).is_valid());
    }

    #[test]
    fn test_shape_errors() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.secrets.push(SecretConfig {
            provider: String::from("vault"),
            path: String::from("kv/svc"),
            rotation_days: Some(-1),
        });
        spec.toolchains.push(Toolchain::new("python", ""));

        assert!(SpecValidator::new().validate(&spec).is_err());
    }

    #[test]
    fn test_blank_policy_rejected() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.policies.push(String::from("   "));

        let result = SpecValidator::new().check(&spec);
        assert_eq!(result.errors[0].message, "Policy references cannot be empty");
    }

    #[test]
    fn test_duplicate_secret_warns() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.secrets.push(SecretConfig::new("vault", "kv/svc"));
        spec.secrets.push(SecretConfig::new("vault", "kv/svc"));

        let result = SpecValidator::new().check(&spec);
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_duplicate_layer_names() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.environments.push(EnvironmentHierarchy::new("ci"));
        spec.environments.push(EnvironmentHierarchy::new("ci"));
        spec.environments.push(EnvironmentHierarchy::new("svc"));

        let result = SpecValidator::new().check(&spec);
        assert_eq!(result.error_count(), 2);
    }

    #[test]
    fn test_out_of_order_extends_warns() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.environments.push(EnvironmentHierarchy::new("prod").extending("staging"));
        spec.environments.push(EnvironmentHierarchy::new("staging").extending("svc"));
        spec.environments.push(EnvironmentHierarchy::new("dev").extending("nowhere"));

        let result = SpecValidator::new().check(&spec);
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
        assert!(result.warnings[0].contains("declared after"));
        assert!(result.warnings[1].contains("Unknown environment"));
    }

    #[test]
    fn test_override_secrets_checked() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.environments.push(EnvironmentHierarchy::new("ci").with_overrides(SpecOverrides {
            secrets: Some(vec![SecretConfig::new("nope", "x")]),
            ..SpecOverrides::default()
        }));

        let result = SpecValidator::new().check(&spec);
        assert_eq!(result.errors[0].field, "environments[0].overrides.secrets[0].provider");
    }

    #[test]
    fn test_override_lists_checked() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.environments.push(EnvironmentHierarchy::new("ci").with_overrides(SpecOverrides {
            secrets: Some(vec![SecretConfig::new("vault", "")]),
            toolchains: Some(vec![Toolchain::new("", "")]),
            policies: Some(vec![String::from("  ")]),
            checks: Some(vec![String::new()]),
            ..SpecOverrides::default()
        }));

        let result = SpecValidator::new().check(&spec);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "environments[0].overrides.secrets[0]",
                "environments[0].overrides.toolchains[0]",
                "environments[0].overrides.policies[0]",
                "environments[0].overrides.checks[0]",
            ]
        );
        assert!(SpecValidator::new().validate(&spec).is_err());
    }
}
