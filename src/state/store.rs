//! State store trait definition.
//!
//! This module defines the common interface for state storage backends.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::error::Result;
use super::lock::LockInfo;
use super::snapshot::Snapshot;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Debug + Send + Sync {
    /// Creates the state directory layout.
    async fn init(&self) -> Result<()>;

    /// Persists a snapshot under its environment name.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf>;

    /// Loads the snapshot for an environment.
    ///
    /// Returns `None` if no snapshot exists yet.
    async fn load_snapshot(&self, environment: &str) -> Result<Option<Snapshot>>;

    /// Persists a JSON document at a path relative to the state root.
    async fn save_document(&self, relative: &str, document: &Value) -> Result<PathBuf>;

    /// Loads a JSON document saved with [`StateStore::save_document`].
    async fn load_document(&self, relative: &str) -> Result<Option<Value>>;

    /// Removes all state, optionally keeping the toolchain cache.
    ///
    /// Returns false if there was no state to remove.
    async fn destroy(&self, preserve_cache: bool) -> Result<bool>;

    /// Acquires a lock on the state.
    ///
    /// Returns lock information if successful.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Releases a lock on the state.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the state is locked.
    async fn is_locked(&self) -> Result<bool>;

    /// Returns the state root directory.
    fn root(&self) -> &Path;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
