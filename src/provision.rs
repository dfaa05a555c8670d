//! Provisioning workflow.
//!
//! Drives a resolved environment through the state directory: secrets are
//! fetched, toolchains cached, policies loaded, and a summary written.
//! Snapshots and verification work against a lockfile at the project root.

use serde::Serialize;
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{EnvironmentSpec, Toolchain};
use crate::doctor::{CommandRunner, Doctor, DoctorReport, DOCTOR_REPORT_FILE};
use crate::error::{ConfigError, Result};
use crate::plugins::PluginRegistry;
use crate::secrets::{SecretFetch, SecretRegistry, SecretsBroker};
use crate::state::{read_snapshot_file, write_json_file, AuditLog, Snapshot, SnapshotCheck, StateStore};

/// Provisioning summary, relative to the state directory.
pub const LAST_PROVISION_FILE: &str = "last_provision.json";

/// Toolchain cache, relative to the state directory.
pub const TOOLCHAIN_CACHE_FILE: &str = "cache/toolchains.json";

/// Policy documents read for an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    /// Contents of every policy that was read, in declaration order.
    pub loaded: Vec<String>,
    /// References that do not exist on disk.
    pub missing: Vec<String>,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    /// Provisioned environment name.
    pub environment: String,
    /// Number of cached toolchains.
    pub toolchains: usize,
    /// Secret fetch outcome.
    pub secrets: SecretFetch,
    /// Number of policies that were loaded.
    pub policies_loaded: usize,
    /// Policy references that could not be found.
    pub missing_policies: Vec<String>,
    /// Path of the provisioning summary.
    pub summary_path: PathBuf,
}

/// Runs provisioning, snapshot, verification, and teardown.
#[derive(Debug)]
pub struct Provisioner {
    /// State backend.
    store: Box<dyn StateStore>,
    /// Audit log inside the state directory.
    audit: AuditLog,
    /// Secret dispatch.
    broker: SecretsBroker,
    /// Plugins run after provisioning.
    plugins: PluginRegistry,
    /// Directory relative policy paths are resolved against.
    spec_dir: PathBuf,
}

impl Provisioner {
    /// Creates a provisioner over `store`, resolving policies against `spec_dir`.
    #[must_use]
    pub fn new(
        store: Box<dyn StateStore>,
        secrets: SecretRegistry,
        spec_dir: impl Into<PathBuf>,
    ) -> Self {
        let audit = AuditLog::in_state_dir(store.root());
        Self {
            broker: SecretsBroker::new(secrets).with_audit(audit.clone()),
            plugins: PluginRegistry::new().with_audit(audit.clone()),
            store,
            audit,
            spec_dir: spec_dir.into(),
        }
    }

    /// Replaces the plugin registry.
    #[must_use]
    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins.with_audit(self.audit.clone());
        self
    }

    /// Returns the state backend.
    #[must_use]
    pub fn store(&self) -> &dyn StateStore {
        &*self.store
    }

    /// Returns the audit log.
    #[must_use]
    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Returns the secrets broker.
    #[must_use]
    pub const fn broker(&self) -> &SecretsBroker {
        &self.broker
    }

    /// Returns the plugin registry.
    #[must_use]
    pub const fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Provisions `spec` under the state lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is locked by another process, a state
    /// document cannot be written, or a plugin fails.
    pub async fn provision(&self, spec: &EnvironmentSpec) -> Result<ProvisionReport> {
        self.store.init().await?;

        let lock = self.store.acquire_lock("").await?;
        let result = self.provision_locked(spec).await;
        let released = self.store.release_lock(&lock.lock_id).await;

        match (result, released) {
            (Err(e), Err(release_error)) => {
                warn!("Failed to release state lock {}: {release_error}", lock.lock_id);
                Err(e)
            }
            (result, released) => {
                released?;
                result
            }
        }
    }

    async fn provision_locked(&self, spec: &EnvironmentSpec) -> Result<ProvisionReport> {
        info!("Provisioning environment '{}'", spec.name);

        let secrets = self.broker.fetch(&spec.secrets).await?;
        self.cache_toolchains(&spec.toolchains).await?;
        let policies = self.load_policies(&spec.policies).await?;

        let summary_path = self
            .store
            .save_document(LAST_PROVISION_FILE, &serde_json::to_value(spec)?)
            .await?;

        self.plugins.run_all(spec).await?;

        self.audit
            .record(
                "provision_complete",
                json!({ "environment": spec.name, "toolchains": spec.toolchains.len() }),
            )
            .await?;
        info!(
            "Provisioned environment '{}' with {} toolchains",
            spec.name,
            spec.toolchains.len()
        );

        Ok(ProvisionReport {
            environment: spec.name.clone(),
            toolchains: spec.toolchains.len(),
            secrets,
            policies_loaded: policies.loaded.len(),
            missing_policies: policies.missing,
            summary_path,
        })
    }

    /// Writes the toolchain cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub async fn cache_toolchains(&self, toolchains: &[Toolchain]) -> Result<PathBuf> {
        let path = self
            .store
            .save_document(TOOLCHAIN_CACHE_FILE, &serde_json::to_value(toolchains)?)
            .await?;
        self.audit
            .record("cache_toolchains", json!({ "path": path.display().to_string() }))
            .await?;
        Ok(path)
    }

    /// Loads policy documents.
    ///
    /// Relative references resolve against the spec directory. A policy that
    /// does not exist is listed in [`PolicySet::missing`].
    ///
    /// # Errors
    ///
    /// Returns an error if a policy exists but cannot be read.
    pub async fn load_policies(&self, policies: &[String]) -> Result<PolicySet> {
        let mut set = PolicySet::default();

        for policy in policies {
            let path = Path::new(policy);
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.spec_dir.join(path)
            };

            match fs::read_to_string(&resolved).await {
                Ok(content) => {
                    debug!("Loaded policy {}", resolved.display());
                    set.loaded.push(content);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("Policy not found: {policy}");
                    self.audit
                        .record("policy_missing", json!({ "policy": policy }))
                        .await?;
                    set.missing.push(policy.clone());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.audit
            .record(
                "policies_loaded",
                json!({ "count": set.loaded.len(), "missing": set.missing.len() }),
            )
            .await?;
        Ok(set)
    }

    /// Runs readiness checks and saves the doctor report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be saved.
    pub async fn diagnose<R: CommandRunner>(
        &self,
        runner: R,
        spec: &EnvironmentSpec,
    ) -> Result<(DoctorReport, PathBuf)> {
        let doctor = Doctor::new(runner).with_audit(self.audit.clone());
        let report = doctor.run(&spec.checks).await?;
        let path = self
            .store
            .save_document(DOCTOR_REPORT_FILE, &report.to_document())
            .await?;
        Ok((report, path))
    }

    /// Captures a snapshot of `spec` to `lock_path` and the snapshot store.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub async fn snapshot(&self, spec: &EnvironmentSpec, lock_path: &Path) -> Result<Snapshot> {
        let snapshot = Snapshot::capture(spec)?;

        write_json_file(lock_path, &serde_json::to_value(&snapshot)?).await?;
        let stored = self.store.save_snapshot(&snapshot).await?;
        debug!("Stored snapshot copy at {}", stored.display());

        self.audit
            .record(
                "snapshot_created",
                json!({
                    "path": lock_path.display().to_string(),
                    "fingerprint": snapshot.fingerprint(),
                }),
            )
            .await?;
        info!("Snapshot written to {}", lock_path.display());

        Ok(snapshot)
    }

    /// Compares the lockfile at `lock_path` with `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lockfile is missing or invalid.
    pub async fn verify(&self, spec: &EnvironmentSpec, lock_path: &Path) -> Result<SnapshotCheck> {
        let snapshot = read_snapshot_file(lock_path)
            .await?
            .ok_or_else(|| ConfigError::FileNotFound {
                path: lock_path.to_path_buf(),
            })?;

        let check = snapshot.verify(spec)?;
        self.audit
            .record(
                "snapshot_verified",
                json!({ "environment": check.environment, "matches": check.matches }),
            )
            .await?;

        if check.matches {
            info!("Lockfile matches environment '{}'", spec.name);
        } else {
            warn!(
                "Lockfile drift for '{}': {} != {}",
                check.environment, check.expected, check.actual
            );
        }
        Ok(check)
    }

    /// Removes the state directory.
    ///
    /// With `preserve_cache` the toolchain cache survives and the teardown is
    /// recorded in a fresh audit log.
    ///
    /// # Errors
    ///
    /// Returns an error if state files cannot be removed.
    pub async fn destroy(&self, preserve_cache: bool) -> Result<bool> {
        let removed = self.store.destroy(preserve_cache).await?;

        if removed {
            info!("Environment state removed");
            if preserve_cache {
                self.audit
                    .record("state_destroyed", json!({ "preserveCache": true }))
                    .await?;
            }
        } else {
            info!("No environment state found to destroy");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretConfig;
    use crate::doctor::CommandOutput;
    use crate::error::{EnvkitError, ProvisionError};
    use crate::plugins::Plugin;
    use crate::state::LockInfo;
    use crate::secrets::default_secret_registry;
    use crate::state::{LocalStateStore, STATE_DIR};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn create_provisioner() -> (Provisioner, TempDir) {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = LocalStateStore::with_base_dir(temp.path().join(STATE_DIR));
        let provisioner = Provisioner::new(
            Box::new(store),
            default_secret_registry().unwrap(),
            temp.path(),
        );
        (provisioner, temp)
    }

    fn sample_spec() -> EnvironmentSpec {
        let mut spec = EnvironmentSpec::new("svc");
        spec.secrets = vec![
            SecretConfig::new("vault", "kv/app/db"),
            SecretConfig::new("keepass", "team/db"),
        ];
        spec.toolchains = vec![Toolchain::new("python", "3.11")];
        spec.policies = vec![
            String::from("policies/baseline.rego"),
            String::from("policies/absent.rego"),
        ];
        spec
    }

    async fn events(provisioner: &Provisioner) -> Vec<String> {
        provisioner
            .audit()
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect()
    }

    #[tokio::test]
    async fn test_provision_writes_state() {
        let (provisioner, temp) = create_provisioner();
        std::fs::create_dir_all(temp.path().join("policies")).unwrap();
        std::fs::write(temp.path().join("policies/baseline.rego"), "package baseline").unwrap();

        let report = provisioner.provision(&sample_spec()).await.unwrap();

        assert_eq!(report.environment, "svc");
        assert_eq!(report.toolchains, 1);
        assert_eq!(report.policies_loaded, 1);
        assert_eq!(report.missing_policies, vec!["policies/absent.rego"]);
        assert_eq!(report.secrets.values.len(), 1);
        assert_eq!(report.secrets.failures.len(), 1);
        assert!(report.summary_path.exists());

        let root = provisioner.store().root();
        let cache: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(root.join(TOOLCHAIN_CACHE_FILE)).unwrap())
                .unwrap();
        assert_eq!(cache[0]["name"], "python");
        assert!(!provisioner.store().is_locked().await.unwrap());

        let events = events(&provisioner).await;
        assert!(events.contains(&String::from("policy_missing")));
        assert_eq!(events.last().map(String::as_str), Some("provision_complete"));
    }

    #[tokio::test]
    async fn test_policy_content_is_not_mistaken_for_missing() {
        let (provisioner, temp) = create_provisioner();
        std::fs::write(temp.path().join("p.rego"), "missing:rules").unwrap();

        let policies = provisioner
            .load_policies(&[String::from("p.rego"), String::from("gone.rego")])
            .await
            .unwrap();
        assert_eq!(policies.loaded, vec!["missing:rules"]);
        assert_eq!(policies.missing, vec!["gone.rego"]);

        let mut spec = EnvironmentSpec::new("svc");
        spec.policies = vec![String::from("p.rego")];
        let report = provisioner.provision(&spec).await.unwrap();
        assert_eq!(report.policies_loaded, 1);
        assert!(report.missing_policies.is_empty());
    }

    #[tokio::test]
    async fn test_provision_refuses_when_locked() {
        let (provisioner, _temp) = create_provisioner();
        provisioner.store().acquire_lock("other-host").await.unwrap();

        let err = provisioner.provision(&sample_spec()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_snapshot_and_verify() {
        let (provisioner, temp) = create_provisioner();
        let lock_path = temp.path().join("envkit.lock.json");
        let mut spec = sample_spec();

        let snapshot = provisioner.snapshot(&spec, &lock_path).await.unwrap();
        assert!(lock_path.exists());
        let stored = provisioner.store().load_snapshot("svc").await.unwrap().unwrap();
        assert_eq!(stored.fingerprint(), snapshot.fingerprint());

        assert!(provisioner.verify(&spec, &lock_path).await.unwrap().matches);

        spec.toolchains[0].version = String::from("3.12");
        let check = provisioner.verify(&spec, &lock_path).await.unwrap();
        assert!(!check.matches);
        assert_eq!(check.expected, snapshot.fingerprint());
    }

    #[tokio::test]
    async fn test_verify_missing_lockfile() {
        let (provisioner, temp) = create_provisioner();
        let result = provisioner
            .verify(&sample_spec(), &temp.path().join("nope.json"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_destroy_preserves_cache() {
        let (provisioner, _temp) = create_provisioner();
        provisioner.provision(&sample_spec()).await.unwrap();
        let root = provisioner.store().root().to_path_buf();

        assert!(provisioner.destroy(true).await.unwrap());
        assert!(root.join(TOOLCHAIN_CACHE_FILE).exists());
        assert!(!root.join(LAST_PROVISION_FILE).exists());
        assert_eq!(events(&provisioner).await, vec!["state_destroyed"]);

        assert!(provisioner.destroy(false).await.unwrap());
        assert!(!root.exists());
        assert!(!provisioner.destroy(false).await.unwrap());
    }

    /// Local store whose lock can never be released.
    #[derive(Debug)]
    struct StuckLock(LocalStateStore);

    #[async_trait]
    impl StateStore for StuckLock {
        async fn init(&self) -> Result<()> {
            self.0.init().await
        }

        async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
            self.0.save_snapshot(snapshot).await
        }

        async fn load_snapshot(&self, environment: &str) -> Result<Option<Snapshot>> {
            self.0.load_snapshot(environment).await
        }

        async fn save_document(
            &self,
            relative: &str,
            document: &serde_json::Value,
        ) -> Result<PathBuf> {
            self.0.save_document(relative, document).await
        }

        async fn load_document(&self, relative: &str) -> Result<Option<serde_json::Value>> {
            self.0.load_document(relative).await
        }

        async fn destroy(&self, preserve_cache: bool) -> Result<bool> {
            self.0.destroy(preserve_cache).await
        }

        async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
            self.0.acquire_lock(holder).await
        }

        async fn release_lock(&self, _lock_id: &str) -> Result<()> {
            Err(EnvkitError::internal("release refused"))
        }

        async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
            self.0.get_lock_info().await
        }

        async fn is_locked(&self) -> Result<bool> {
            self.0.is_locked().await
        }

        fn root(&self) -> &Path {
            self.0.root()
        }

        fn backend_type(&self) -> &'static str {
            "stuck"
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

    fn stuck_provisioner(temp: &TempDir) -> Provisioner {
        let store = StuckLock(LocalStateStore::with_base_dir(temp.path().join(STATE_DIR)));
        Provisioner::new(Box::new(store), default_secret_registry().unwrap(), temp.path())
    }

    #[tokio::test]
    async fn test_provision_error_survives_failed_release() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut plugins = PluginRegistry::new();
        plugins.register(Box::new(Broken)).await.unwrap();
        let provisioner = stuck_provisioner(&temp).with_plugins(plugins);

        let err = provisioner.provision(&EnvironmentSpec::new("svc")).await.unwrap_err();
        assert!(matches!(
            err,
            EnvkitError::Provision(ProvisionError::PluginFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_release_after_success_is_reported() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let provisioner = stuck_provisioner(&temp);

        let err = provisioner.provision(&EnvironmentSpec::new("svc")).await.unwrap_err();
        assert!(matches!(err, EnvkitError::Internal(_)));
    }

    struct AlwaysOk;

    #[async_trait]
    impl CommandRunner for AlwaysOk {
        async fn run(&self, command: &str) -> Result<CommandOutput> {
            Ok(CommandOutput {
                success: true,
                stdout: format!("ran {command}"),
                ..CommandOutput::default()
            })
        }
    }

    #[tokio::test]
    async fn test_diagnose_saves_report() {
        let (provisioner, _temp) = create_provisioner();
        let mut spec = sample_spec();
        spec.checks = vec![String::from("make test")];

        let (report, path) = provisioner.diagnose(AlwaysOk, &spec).await.unwrap();
        assert!(report.passed());

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["custom-1"], "ran make test");
        assert_eq!(saved["git"], "ran git --version");
    }
}
