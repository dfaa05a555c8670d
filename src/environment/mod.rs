//! Environment hierarchy module.
//!
//! This module resolves a spec's override layers into named environments:
//! - Building the resolved environment registry
//! - Detecting cycles in declared `extends` chains
//! - Promoting secrets and toolchains between environments

mod hierarchy;
mod manager;
mod resolver;

pub use hierarchy::HierarchyValidation;
pub use manager::EnvironmentManager;
pub use resolver::EnvironmentResolver;
