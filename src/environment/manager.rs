//! Environment manager facade.
//!
//! Wraps a resolver seeded with a spec's declared override layers and adds
//! promotion: copying the secrets and toolchains of one resolved
//! environment onto another.

use tracing::{debug, info};

use crate::config::{EnvironmentHierarchy, EnvironmentSpec, SpecOverrides};

use super::hierarchy::HierarchyValidation;
use super::resolver::EnvironmentResolver;

/// Facade over the resolved environment registry of one spec.
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    /// Registry built from the base spec and its declared layers.
    resolver: EnvironmentResolver,
}

impl EnvironmentManager {
    /// Builds the registry from `base` and `base.environments`.
    #[must_use]
    pub fn new(base: EnvironmentSpec) -> Self {
        let layers = base.environments.clone();
        let resolver = EnvironmentResolver::new(base, &layers);
        debug!("Resolved {} environments", resolver.len());
        Self { resolver }
    }

    /// Returns the resolved spec for `name`, if any.
    #[must_use]
    pub fn get_environment(&self, name: &str) -> Option<&EnvironmentSpec> {
        self.resolver.get_environment(name)
    }

    /// Returns all environment names, base first.
    #[must_use]
    pub fn list_environments(&self) -> Vec<&str> {
        self.resolver.list_environments()
    }

    /// Returns all resolved specs, base first.
    #[must_use]
    pub fn all_environments(&self) -> Vec<&EnvironmentSpec> {
        self.resolver.all_environments()
    }

    /// Returns the base spec.
    #[must_use]
    pub const fn base(&self) -> &EnvironmentSpec {
        self.resolver.base()
    }

    /// Promotes the secrets and toolchains of `from` onto `to`.
    ///
    /// The result is named `<from>-to-<to>` and keeps every other field of
    /// `to`. Returns `None` if either environment is unknown.
    #[must_use]
    pub fn promote_environment(&self, from: &str, to: &str) -> Option<EnvironmentSpec> {
        let (Some(source), Some(target)) = (self.get_environment(from), self.get_environment(to))
        else {
            debug!("Cannot promote '{from}' to '{to}': unknown environment");
            return None;
        };

        let name = format!("{from}-to-{to}");
        let layer = EnvironmentHierarchy::new(name.clone())
            .extending(to)
            .with_overrides(SpecOverrides {
                secrets: Some(source.secrets.clone()),
                toolchains: Some(source.toolchains.clone()),
                ..SpecOverrides::default()
            });

        let promoted = EnvironmentResolver::new(target.clone(), &[layer])
            .get_environment(&name)
            .cloned();

        if promoted.is_some() {
            info!("Promoted environment '{from}' onto '{to}' as '{name}'");
        }
        promoted
    }

    /// Checks the declared hierarchy for cycles.
    #[must_use]
    pub fn validate_environments(&self) -> HierarchyValidation {
        self.resolver.validate_hierarchy()
    }
}
