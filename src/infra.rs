//! Infrastructure providers.
//!
//! Terraform, CloudFormation, and ARM are modeled behind one interface.
//! The bundled backends are stubs that describe what they would do.

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::config::EnvironmentSpec;
use crate::error::Result;
use crate::registry::Registry;
use crate::state::AuditLog;

/// Built-in infrastructure provider kinds.
pub const SUPPORTED_INFRA_PROVIDERS: &[&str] = &["terraform", "cloudformation", "arm"];

/// Lifecycle operations an infrastructure provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraOperation {
    /// Create or update resources.
    Deploy,
    /// Tear resources down.
    Destroy,
    /// Report current status.
    Status,
    /// Compare live resources with the spec.
    Drift,
}

impl InfraOperation {
    /// Returns the operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Destroy => "destroy",
            Self::Status => "status",
            Self::Drift => "drift",
        }
    }
}

impl fmt::Display for InfraOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend that manages infrastructure for an environment.
#[async_trait]
pub trait InfraProvider: Send + Sync {
    /// Provider kind (e.g. `terraform`).
    fn kind(&self) -> &str;

    /// Deploys resources for `spec`.
    async fn deploy(&self, spec: &EnvironmentSpec) -> Result<String>;

    /// Destroys resources for `spec`.
    async fn destroy(&self, spec: &EnvironmentSpec) -> Result<String>;

    /// Reports the status of resources for `spec`.
    async fn status(&self, spec: &EnvironmentSpec) -> Result<String>;

    /// Reports drift between live resources and `spec`.
    async fn drift(&self, spec: &EnvironmentSpec) -> Result<String>;
}

/// Registry of infrastructure providers keyed by kind.
pub type InfraRegistry = Registry<dyn InfraProvider>;

/// Placeholder backend.
#[derive(Debug, Clone)]
pub struct StubInfraProvider {
    kind: String,
}

impl StubInfraProvider {
    /// Creates a stub for `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    fn describe(&self, operation: InfraOperation, spec: &EnvironmentSpec) -> String {
        format!("{} {operation} pending for '{}'", self.kind, spec.name)
    }
}

#[async_trait]
impl InfraProvider for StubInfraProvider {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn deploy(&self, spec: &EnvironmentSpec) -> Result<String> {
        Ok(self.describe(InfraOperation::Deploy, spec))
    }

    async fn destroy(&self, spec: &EnvironmentSpec) -> Result<String> {
        Ok(self.describe(InfraOperation::Destroy, spec))
    }

    async fn status(&self, spec: &EnvironmentSpec) -> Result<String> {
        Ok(self.describe(InfraOperation::Status, spec))
    }

    async fn drift(&self, spec: &EnvironmentSpec) -> Result<String> {
        Ok(self.describe(InfraOperation::Drift, spec))
    }
}

/// Builds a registry with a stub for every built-in kind.
///
/// # Errors
///
/// Returns an error if a kind is registered twice.
pub fn default_infra_registry() -> Result<InfraRegistry> {
    let mut registry = InfraRegistry::new("infrastructure");
    for kind in SUPPORTED_INFRA_PROVIDERS {
        registry.register(*kind, Box::new(StubInfraProvider::new(*kind)))?;
    }
    Ok(registry)
}

/// Runs `operation` on the provider registered for `kind`.
///
/// Records an `infra_<operation>` audit event on success.
///
/// # Errors
///
/// Returns an error if no provider is configured for `kind`, or the
/// provider call fails.
pub async fn run_infra(
    registry: &InfraRegistry,
    kind: &str,
    operation: InfraOperation,
    spec: &EnvironmentSpec,
    audit: &AuditLog,
) -> Result<String> {
    let provider = registry.get(kind)?;

    let output = match operation {
        InfraOperation::Deploy => provider.deploy(spec).await?,
        InfraOperation::Destroy => provider.destroy(spec).await?,
        InfraOperation::Status => provider.status(spec).await?,
        InfraOperation::Drift => provider.drift(spec).await?,
    };

    info!("{kind} {operation} for '{}': {output}", spec.name);
    audit
        .record(
            &format!("infra_{operation}"),
            json!({ "provider": kind, "environment": spec.name }),
        )
        .await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_infra_records_event() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::in_state_dir(temp.path());
        let registry = default_infra_registry().unwrap();
        let spec = EnvironmentSpec::new("svc");

        let output = run_infra(&registry, "terraform", InfraOperation::Drift, &spec, &audit)
            .await
            .unwrap();
        assert_eq!(output, "terraform drift pending for 'svc'");

        let entries = audit.entries().await.unwrap();
        assert_eq!(entries[0].event, "infra_drift");
        assert_eq!(entries[0].metadata["provider"], "terraform");
    }

    #[tokio::test]
    async fn test_unknown_infra_provider() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::in_state_dir(temp.path());
        let registry = default_infra_registry().unwrap();

        let err = run_infra(
            &registry,
            "pulumi",
            InfraOperation::Deploy,
            &EnvironmentSpec::new("svc"),
            &audit,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("No infrastructure provider configured for 'pulumi'"));
        assert!(audit.entries().await.unwrap().is_empty());
    }
}
