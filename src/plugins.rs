//! Provisioning plugins.
//!
//! Plugins run after an environment has been provisioned, in registration
//! order.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::config::EnvironmentSpec;
use crate::error::{EnvkitError, ProvisionError, Result};
use crate::registry::Registry;
use crate::state::AuditLog;

/// An extension run after provisioning.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// Runs the plugin against a provisioned environment.
    async fn run(&self, spec: &EnvironmentSpec) -> Result<()>;
}

/// Ordered set of plugins.
#[derive(Debug)]
pub struct PluginRegistry {
    plugins: Registry<dyn Plugin>,
    audit: Option<AuditLog>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: Registry::new("plugin"),
            audit: None,
        }
    }

    /// Records plugin events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Registers `plugin`.
    ///
    /// # Errors
    ///
    /// Returns an error if a plugin with the same name is registered, or the
    /// audit log cannot be written.
    pub async fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        self.plugins.register(name.clone(), plugin)?;
        debug!("Registered plugin: {name}");
        self.record("plugin_registered", &name).await
    }

    /// Runs every plugin in registration order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::PluginFailed`] if a plugin fails.
    pub async fn run_all(&self, spec: &EnvironmentSpec) -> Result<()> {
        for (name, plugin) in self.plugins.iter() {
            self.record("plugin_start", name).await?;
            plugin.run(spec).await.map_err(|e| {
                EnvkitError::Provision(ProvisionError::PluginFailed {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            })?;
            self.record("plugin_complete", name).await?;
            info!("Plugin {name} completed for '{}'", spec.name);
        }
        Ok(())
    }

    /// Lists plugin names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.kinds()
    }

    async fn record(&self, event: &str, name: &str) -> Result<()> {
        match &self.audit {
            Some(audit) => audit.record(event, json!({ "name": name })).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Counting {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _spec: &EnvironmentSpec) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn run(&self, _spec: &EnvironmentSpec) -> Result<()> {
            Err(EnvkitError::internal("exploded"))
        }
    }

    fn counting(name: &'static str, calls: &Arc<AtomicUsize>) -> Box<dyn Plugin> {
        Box::new(Counting {
            name,
            calls: Arc::clone(calls),
        })
    }

    #[tokio::test]
    async fn test_register_and_run() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::in_state_dir(temp.path());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut registry = PluginRegistry::new().with_audit(audit.clone());
        registry.register(counting("notify", &calls)).await.unwrap();
        registry.register(counting("metrics", &calls)).await.unwrap();
        assert_eq!(registry.names(), vec!["notify", "metrics"]);

        registry.run_all(&EnvironmentSpec::new("svc")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let events: Vec<_> = audit
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(
            events,
            vec![
                "plugin_registered",
                "plugin_registered",
                "plugin_start",
                "plugin_complete",
                "plugin_start",
                "plugin_complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_plugin_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(counting("notify", &calls)).await.unwrap();

        assert!(registry.register(counting("notify", &calls)).await.is_err());
        assert_eq!(registry.names(), vec!["notify"]);
    }

    #[tokio::test]
    async fn test_failing_plugin_stops_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Broken)).await.unwrap();
        registry.register(counting("after", &calls)).await.unwrap();

        let err = registry.run_all(&EnvironmentSpec::new("svc")).await.unwrap_err();
        assert!(matches!(
            err,
            EnvkitError::Provision(ProvisionError::PluginFailed { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
