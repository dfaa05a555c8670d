// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # envkit
//!
//! Declarative environment provisioning: layered specs, readiness checks,
//! secrets, and reproducible snapshots.
//!
//! ## Overview
//!
//! A project describes its environment once in `envkit.yaml`:
//!
//! - Toolchains, secrets, policies, and readiness checks
//! - Named environments layered on top of the base spec with `extends`
//! - A lockfile fingerprint that detects drift
//!
//! ## Architecture
//!
//! 1. **Spec**: parsed and validated by [`config`]
//! 2. **Resolution**: override layers merged into a registry by [`environment`]
//! 3. **Provisioning**: secrets, toolchain cache, and policies applied by [`provision`]
//! 4. **State**: snapshots, audit log, and lock kept by [`state`]
//!
//! ## Modules
//!
//! - [`config`]: Spec parsing, validation, and fingerprints
//! - [`environment`]: Hierarchy resolution, cycle detection, and promotion
//! - [`state`]: State directory, snapshots, audit log, and locking
//! - [`secrets`]: Secret providers and the secrets broker
//! - [`infra`]: Infrastructure providers
//! - [`doctor`]: Readiness checks
//! - [`plugins`]: Post-provisioning plugins
//! - [`provision`]: Provisioning workflow
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! name: payments-api
//! toolchains:
//!   - name: python
//!     version: "3.11"
//! secrets:
//!   - provider: vault
//!     path: kv/payments/db
//! environments:
//!   - name: staging
//!     extends: payments-api
//!     overrides:
//!       secrets:
//!         - provider: vault
//!           path: kv/payments/staging-db
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod doctor;
pub mod environment;
pub mod error;
pub mod infra;
pub mod plugins;
pub mod provision;
pub mod registry;
pub mod secrets;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{fingerprint_spec, EnvironmentSpec, SpecLoader, SpecValidator};
pub use doctor::{Doctor, DoctorReport};
pub use environment::{EnvironmentManager, EnvironmentResolver, HierarchyValidation};
pub use error::{EnvkitError, Result};
pub use provision::{ProvisionReport, Provisioner};
pub use secrets::SecretsBroker;
pub use state::{LocalStateStore, Snapshot, StateStore};
