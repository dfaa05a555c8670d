//! Local file-based state storage backend.
//!
//! State lives in a directory (`.envkit/` by default):
//!
//! ```text
//! .envkit/
//!   activity.log
//!   state.lock
//!   last_provision.json
//!   cache/toolchains.json
//!   diagnostics/doctor.json
//!   snapshots/<environment>.json
//!   policies/
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{EnvkitError, Result, StateError};

use super::audit::AUDIT_LOG_FILE;
use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
use super::snapshot::Snapshot;
use super::store::StateStore;

/// Default state directory name.
pub const STATE_DIR: &str = ".envkit";

/// Toolchain cache directory name.
pub const CACHE_DIR: &str = "cache";

/// Diagnostics directory name.
pub const DIAGNOSTICS_DIR: &str = "diagnostics";

/// Snapshot directory name.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Policy directory name.
pub const POLICIES_DIR: &str = "policies";

/// Lock file name.
const LOCK_FILE: &str = "state.lock";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a local state store in `.envkit` under the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| EnvkitError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STATE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a local state store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let lock_path = base_dir.join(LOCK_FILE);

        Self { base_dir, lock_path }
    }

    /// Returns the path of the snapshot for `environment`.
    #[must_use]
    pub fn snapshot_path(&self, environment: &str) -> PathBuf {
        self.base_dir
            .join(SNAPSHOTS_DIR)
            .join(format!("{environment}.json"))
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                EnvkitError::State(StateError::write(format!(
                    "Failed to create state directory: {e}"
                )))
            })?;
        }
        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path).await.map_err(|e| {
            EnvkitError::State(StateError::corrupted(format!("Failed to read lock file: {e}")))
        })?;

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            EnvkitError::State(StateError::corrupted(format!("Failed to parse lock file: {e}")))
        })?;

        Ok(Some(lock_info))
    }

    /// Writes the lock file.
    async fn write_lock_file(&self, lock_info: &LockInfo) -> Result<()> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(lock_info).map_err(|e| {
            EnvkitError::State(StateError::serialization(format!("Failed to serialize lock: {e}")))
        })?;

        let mut file = fs::File::create(&self.lock_path).await.map_err(|e| {
            EnvkitError::State(StateError::LockFailed {
                message: format!("Failed to create lock file: {e}"),
            })
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            EnvkitError::State(StateError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            })
        })?;

        file.sync_all().await.map_err(|e| {
            EnvkitError::State(StateError::LockFailed {
                message: format!("Failed to sync lock file: {e}"),
            })
        })?;

        Ok(())
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).await.map_err(|e| {
                EnvkitError::State(StateError::LockFailed {
                    message: format!("Failed to delete lock file: {e}"),
                })
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn init(&self) -> Result<()> {
        for dir in [CACHE_DIR, DIAGNOSTICS_DIR, SNAPSHOTS_DIR, POLICIES_DIR] {
            fs::create_dir_all(self.base_dir.join(dir)).await?;
        }

        let log_path = self.base_dir.join(AUDIT_LOG_FILE);
        if !log_path.exists() {
            fs::File::create(&log_path).await?;
        }

        info!("Initialized state directory: {}", self.base_dir.display());
        Ok(())
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.snapshot_path(&snapshot.spec().name);
        write_json_file(&path, &serde_json::to_value(snapshot)?).await?;
        Ok(path)
    }

    async fn load_snapshot(&self, environment: &str) -> Result<Option<Snapshot>> {
        read_snapshot_file(&self.snapshot_path(environment)).await
    }

    async fn save_document(&self, relative: &str, document: &Value) -> Result<PathBuf> {
        let path = self.base_dir.join(relative);
        write_json_file(&path, document).await?;
        Ok(path)
    }

    async fn load_document(&self, relative: &str) -> Result<Option<Value>> {
        read_json_file(&self.base_dir.join(relative)).await
    }

    async fn destroy(&self, preserve_cache: bool) -> Result<bool> {
        if !self.base_dir.exists() {
            debug!("No state directory at: {}", self.base_dir.display());
            return Ok(false);
        }

        if !preserve_cache {
            info!("Removing state directory: {}", self.base_dir.display());
            fs::remove_dir_all(&self.base_dir).await?;
            return Ok(true);
        }

        info!(
            "Removing state in {} (keeping {CACHE_DIR}/)",
            self.base_dir.display()
        );
        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == CACHE_DIR {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(true)
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        // Check for existing lock
        if let Some(existing) = self.read_lock_file().await? {
            if !existing.is_expired() {
                return Err(EnvkitError::State(StateError::LockedByOther {
                    holder: existing.holder.clone(),
                    since: existing.acquired_at.to_rfc3339(),
                }));
            }
            debug!("Expired lock found, taking over");
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id);
        self.write_lock_file(&lock_info).await?;

        info!(
            "Acquired state lock: {} (expires in {}s)",
            lock_info.lock_id, LOCK_EXPIRY_SECS
        );

        Ok(lock_info)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                info!("Released state lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    async fn is_locked(&self) -> Result<bool> {
        if let Some(lock_info) = self.read_lock_file().await? {
            return Ok(!lock_info.is_expired());
        }
        Ok(false)
    }

    fn root(&self) -> &Path {
        &self.base_dir
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Writes `value` as pretty JSON to `path`, atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_json_file(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut content = serde_json::to_string_pretty(value).map_err(|e| {
        EnvkitError::State(StateError::serialization(format!("Failed to serialize document: {e}")))
    })?;
    content.push('\n');

    // Write to a temporary file first, then rename for atomicity
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).await.map_err(|e| {
        EnvkitError::State(StateError::write(format!("Failed to create temp file: {e}")))
    })?;

    file.write_all(content.as_bytes()).await.map_err(|e| {
        EnvkitError::State(StateError::write(format!("Failed to write {}: {e}", path.display())))
    })?;

    file.sync_all().await.map_err(|e| {
        EnvkitError::State(StateError::write(format!("Failed to sync {}: {e}", path.display())))
    })?;

    fs::rename(&temp_path, path).await.map_err(|e| {
        EnvkitError::State(StateError::write(format!("Failed to rename {}: {e}", path.display())))
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Reads a JSON document, returning `None` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but is not valid JSON.
pub async fn read_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        debug!("Document does not exist: {}", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path).await.map_err(|e| {
        EnvkitError::State(StateError::corrupted(format!("Failed to read {}: {e}", path.display())))
    })?;

    let value = serde_json::from_str(&content).map_err(|e| {
        EnvkitError::State(StateError::corrupted(format!("Failed to parse {}: {e}", path.display())))
    })?;

    Ok(Some(value))
}

/// Reads a snapshot file (a lockfile or a stored snapshot).
///
/// # Errors
///
/// Returns an error if the file exists but is not a valid snapshot.
pub async fn read_snapshot_file(path: &Path) -> Result<Option<Snapshot>> {
    let Some(value) = read_json_file(path).await? else {
        return Ok(None);
    };

    let snapshot = serde_json::from_value(value).map_err(|e| {
        EnvkitError::State(StateError::corrupted(format!(
            "Invalid snapshot in {}: {e}",
            path.display()
        )))
    })?;

    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentSpec;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalStateStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalStateStore::with_base_dir(temp_dir.path().join(STATE_DIR));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_init_creates_layout() {
        let (store, _temp) = create_test_store();
        store.init().await.expect("init failed");

        for dir in [CACHE_DIR, DIAGNOSTICS_DIR, SNAPSHOTS_DIR, POLICIES_DIR] {
            assert!(store.root().join(dir).is_dir());
        }
        assert!(store.root().join(AUDIT_LOG_FILE).is_file());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_is_byte_stable() {
        let (store, _temp) = create_test_store();
        let snapshot = Snapshot::capture(&EnvironmentSpec::new("svc")).unwrap();

        let path = store.save_snapshot(&snapshot).await.expect("save failed");
        let first = std::fs::read(&path).unwrap();

        let loaded = store
            .load_snapshot("svc")
            .await
            .expect("load failed")
            .expect("snapshot should exist");
        assert_eq!(loaded, snapshot);

        store.save_snapshot(&loaded).await.expect("save failed");
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();

        assert!(store.load_snapshot("svc").await.unwrap().is_none());
        assert!(store.load_document("last_provision.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_snapshot() {
        let (store, _temp) = create_test_store();
        let path = store.snapshot_path("svc");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            store.load_snapshot("svc").await,
            Err(EnvkitError::State(StateError::Corrupted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_destroy_preserving_cache() {
        let (store, _temp) = create_test_store();
        store.init().await.unwrap();
        store
            .save_document("cache/toolchains.json", &json!([]))
            .await
            .unwrap();
        store
            .save_document("last_provision.json", &json!({}))
            .await
            .unwrap();

        assert!(store.destroy(true).await.unwrap());
        assert!(store.root().join("cache/toolchains.json").exists());
        assert!(!store.root().join("last_provision.json").exists());
        assert!(!store.root().join(SNAPSHOTS_DIR).exists());

        assert!(store.destroy(false).await.unwrap());
        assert!(!store.root().exists());
        assert!(!store.destroy(false).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let (store, _temp) = create_test_store();

        let lock = store
            .acquire_lock("test-holder")
            .await
            .expect("Failed to acquire lock");

        assert!(store.is_locked().await.expect("is_locked failed"));

        store
            .release_lock(&lock.lock_id)
            .await
            .expect("Failed to release lock");

        assert!(!store.is_locked().await.expect("is_locked failed"));
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let (store, _temp) = create_test_store();

        let _lock1 = store
            .acquire_lock("holder-1")
            .await
            .expect("Failed to acquire first lock");

        let result = store.acquire_lock("holder-2").await;
        assert!(result.is_err());
    }
}
