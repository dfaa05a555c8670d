//! Environment hierarchy resolution.
//!
//! The resolver turns a base spec and a list of override layers into a
//! registry of named, fully resolved specs. The registry is built once, in
//! declaration order, and is read-only afterwards.

use indexmap::IndexMap;
use tracing::debug;

use crate::config::{EnvironmentHierarchy, EnvironmentSpec};

use super::hierarchy::{validate_hierarchy, HierarchyValidation};

/// Registry of resolved environments keyed by name.
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    /// The unmodified base spec.
    base: EnvironmentSpec,
    /// Resolved specs in insertion order, base first.
    registry: IndexMap<String, EnvironmentSpec>,
}

impl EnvironmentResolver {
    /// Resolves `hierarchies` against `base`.
    ///
    /// A layer whose `extends` target has not been resolved yet (absent, or
    /// declared later) is resolved against `base` instead.
    #[must_use]
    pub fn new(base: EnvironmentSpec, hierarchies: &[EnvironmentHierarchy]) -> Self {
        let mut registry = IndexMap::with_capacity(hierarchies.len() + 1);
        registry.insert(base.name.clone(), base.clone());

        for layer in hierarchies {
            let parent = layer
                .extends
                .as_deref()
                .and_then(|name| registry.get(name))
                .unwrap_or(&base);

            debug!(
                "Resolving environment '{}' from parent '{}'",
                layer.name, parent.name
            );

            let mut resolved = parent.clone();
            resolved.name.clone_from(&layer.name);
            if let Some(overrides) = &layer.overrides {
                overrides.apply_to(&mut resolved);
            }

            registry.insert(layer.name.clone(), resolved);
        }

        Self { base, registry }
    }

    /// Returns the resolved spec for `name`, if any.
    #[must_use]
    pub fn get_environment(&self, name: &str) -> Option<&EnvironmentSpec> {
        self.registry.get(name)
    }

    /// Returns all environment names, base first.
    #[must_use]
    pub fn list_environments(&self) -> Vec<&str> {
        self.registry.keys().map(String::as_str).collect()
    }

    /// Returns all resolved specs, base first.
    #[must_use]
    pub fn all_environments(&self) -> Vec<&EnvironmentSpec> {
        self.registry.values().collect()
    }

    /// Returns the base spec the registry was built from.
    #[must_use]
    pub const fn base(&self) -> &EnvironmentSpec {
        &self.base
    }

    /// Returns the number of resolved environments.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.registry.len()
    }

    /// Checks the declared `extends` chains for cycles.
    #[must_use]
    pub fn validate_hierarchy(&self) -> HierarchyValidation {
        validate_hierarchy(&self.base.environments, &self.registry)
    }
}
