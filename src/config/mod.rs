//! Spec module for envkit.
//!
//! This module handles all spec-related functionality:
//! - Parsing and deserializing `envkit.yaml` / `envkit.json`
//! - Validation of spec values
//! - Computing spec fingerprints for snapshots and drift checks

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{EnvironmentHierarchy, EnvironmentSpec, SecretConfig, SpecOverrides, Toolchain};
pub use parser::{find_spec_file, write_sample_spec, SpecLoader, DEFAULT_SPEC_FILES, SAMPLE_SPEC};
pub use validator::{SpecValidator, ValidationError, ValidationResult, SUPPORTED_SECRET_PROVIDERS};
pub use hash::{fingerprint_spec, fingerprint_value, SpecHasher, FINGERPRINT_LEN};
