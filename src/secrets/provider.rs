//! Secret provider interface and stub backends.

use async_trait::async_trait;
use tracing::debug;

use crate::config::SUPPORTED_SECRET_PROVIDERS;
use crate::error::Result;
use crate::registry::Registry;

/// A backend capable of serving secrets.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Provider kind as used in specs (e.g. `vault`).
    fn kind(&self) -> &str;

    /// Fetches the secret at `path`.
    async fn fetch(&self, path: &str) -> Result<String>;

    /// Rotates the secret at `path`.
    async fn rotate(&self, path: &str) -> Result<()>;

    /// Reports whether the backend is reachable.
    async fn health_check(&self) -> Result<bool>;
}

/// Registry of secret providers keyed by kind.
pub type SecretRegistry = Registry<dyn SecretProvider>;

/// Placeholder backend that returns synthetic values.
///
/// No network calls are made; `fetch` yields `placeholder-for-<path>`.
#[derive(Debug, Clone)]
pub struct StubSecretProvider {
    kind: String,
}

impl StubSecretProvider {
    /// Creates a stub for `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

#[async_trait]
impl SecretProvider for StubSecretProvider {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn fetch(&self, path: &str) -> Result<String> {
        debug!("{}: fetching {path}", self.kind);
        Ok(format!("placeholder-for-{path}"))
    }

    async fn rotate(&self, path: &str) -> Result<()> {
        debug!("{}: rotating {path}", self.kind);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Builds a registry with a stub for every supported provider kind.
///
/// # Errors
///
/// Returns an error if a kind is registered twice.
pub fn default_secret_registry() -> Result<SecretRegistry> {
    let mut registry = SecretRegistry::new("secret");
    for kind in SUPPORTED_SECRET_PROVIDERS {
        registry.register(*kind, Box::new(StubSecretProvider::new(*kind)))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_placeholder() {
        let provider = StubSecretProvider::new("vault");
        assert_eq!(provider.kind(), "vault");
        assert_eq!(
            provider.fetch("kv/app/db").await.unwrap(),
            "placeholder-for-kv/app/db"
        );
        assert!(provider.health_check().await.unwrap());
    }

    #[test]
    fn test_default_registry_covers_supported_kinds() {
        let registry = default_secret_registry().unwrap();
        assert_eq!(registry.kinds(), SUPPORTED_SECRET_PROVIDERS.to_vec());
        assert!(registry.get("keepass").is_err());
    }
}
