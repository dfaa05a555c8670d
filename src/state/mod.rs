//! State management module for envkit.
//!
//! This module owns the `.envkit/` state directory: snapshots, the audit
//! log, provisioning reports, the toolchain cache, and the state lock.

mod audit;
mod local;
mod lock;
mod snapshot;
mod store;

pub use audit::{AuditEntry, AuditLog, AUDIT_LOG_FILE};
pub use local::{
    read_json_file, read_snapshot_file, write_json_file, LocalStateStore, CACHE_DIR,
    DIAGNOSTICS_DIR, POLICIES_DIR, SNAPSHOTS_DIR, STATE_DIR,
};
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
pub use snapshot::{Snapshot, SnapshotCheck};
pub use store::StateStore;
