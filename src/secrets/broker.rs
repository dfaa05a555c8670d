//! Secret resolution across providers.
//!
//! The broker walks a spec's secret list, dispatches each entry to the
//! provider registered for its kind, and collects values keyed by
//! `provider:path`. A missing or failing provider is reported per secret
//! instead of aborting the whole fetch.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::SecretConfig;
use crate::error::Result;
use crate::state::AuditLog;

use super::provider::SecretRegistry;

/// A resolved secret.
#[derive(Debug, Clone, Serialize)]
pub struct SecretValue {
    /// Provider kind.
    pub provider: String,
    /// Path within the provider.
    pub path: String,
    /// The secret value. Never serialized.
    #[serde(skip_serializing)]
    pub value: String,
}

/// A secret that could not be resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SecretFailure {
    /// `provider:path` key.
    pub key: String,
    /// Reason for the failure.
    pub message: String,
}

/// Outcome of a fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretFetch {
    /// Resolved values keyed by `provider:path`.
    pub values: IndexMap<String, SecretValue>,
    /// Secrets that could not be resolved.
    pub failures: Vec<SecretFailure>,
}

/// Outcome of a rotation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretRotation {
    /// Keys that were rotated.
    pub rotated: Vec<String>,
    /// Secrets that could not be rotated.
    pub failures: Vec<SecretFailure>,
}

/// Health of one provider kind.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Provider kind.
    pub kind: String,
    /// Whether the provider reported healthy.
    pub healthy: bool,
    /// Error reported by the health check, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SecretFetch {
    /// Returns true if every secret was resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dispatches secret operations to registered providers.
#[derive(Debug)]
pub struct SecretsBroker {
    /// Providers by kind.
    registry: SecretRegistry,
    /// Audit log for secret events.
    audit: Option<AuditLog>,
}

impl SecretsBroker {
    /// Creates a broker over `registry`.
    #[must_use]
    pub const fn new(registry: SecretRegistry) -> Self {
        Self {
            registry,
            audit: None,
        }
    }

    /// Records secret events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Returns the provider registry.
    #[must_use]
    pub const fn registry(&self) -> &SecretRegistry {
        &self.registry
    }

    /// Fetches every secret in `secrets`.
    ///
    /// A later entry with the same `provider:path` key replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error only if the audit log cannot be written.
    pub async fn fetch(&self, secrets: &[SecretConfig]) -> Result<SecretFetch> {
        let mut outcome = SecretFetch::default();

        for secret in secrets {
            let key = secret.key();
            let fetched = match self.registry.get(&secret.provider) {
                Ok(provider) => provider.fetch(&secret.path).await,
                Err(e) => Err(e),
            };

            match fetched {
                Ok(value) => {
                    self.record("secret_fetched", secret).await?;
                    outcome.values.insert(
                        key,
                        SecretValue {
                            provider: secret.provider.clone(),
                            path: secret.path.clone(),
                            value,
                        },
                    );
                }
                Err(e) => {
                    warn!("Secret {key} unavailable: {e}");
                    self.record("secret_unavailable", secret).await?;
                    outcome.failures.push(SecretFailure {
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Fetched {} secrets ({} unavailable)",
            outcome.values.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Rotates every secret in `secrets`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the audit log cannot be written.
    pub async fn rotate(&self, secrets: &[SecretConfig]) -> Result<SecretRotation> {
        let mut outcome = SecretRotation::default();

        for secret in secrets {
            let key = secret.key();
            let rotated = match self.registry.get(&secret.provider) {
                Ok(provider) => provider.rotate(&secret.path).await,
                Err(e) => Err(e),
            };

            match rotated {
                Ok(()) => {
                    self.record("secret_rotation", secret).await?;
                    outcome.rotated.push(key);
                }
                Err(e) => {
                    warn!("Secret {key} not rotated: {e}");
                    self.record("secret_unavailable", secret).await?;
                    outcome.failures.push(SecretFailure {
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Runs the health check of every registered provider.
    pub async fn health(&self) -> Vec<ProviderHealth> {
        let mut report = Vec::with_capacity(self.registry.len());

        for (kind, provider) in self.registry.iter() {
            let (healthy, message) = match provider.health_check().await {
                Ok(healthy) => (healthy, None),
                Err(e) => (false, Some(e.to_string())),
            };
            report.push(ProviderHealth {
                kind: kind.to_string(),
                healthy,
                message,
            });
        }

        report
    }

    async fn record(&self, event: &str, secret: &SecretConfig) -> Result<()> {
        if let Some(audit) = &self.audit {
            audit
                .record(
                    event,
                    json!({ "provider": secret.provider, "path": secret.path }),
                )
                .await?;
        }
        Ok(())
    }
}
