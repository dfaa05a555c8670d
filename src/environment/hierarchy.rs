//! Cycle detection over declared `extends` chains.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::{EnvironmentHierarchy, EnvironmentSpec};

/// Outcome of a hierarchy check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyValidation {
    /// True iff no cycle was found.
    pub valid: bool,
    /// One message per starting environment whose chain repeats.
    pub errors: Vec<String>,
}

/// Walks the chain of every registered environment through `declared`.
///
/// Each step looks up the declaration named after the current environment
/// and follows its `extends` into `registry`. The walk stops when there is
/// no declaration, no `extends`, or the target is not registered.
pub(crate) fn validate_hierarchy(
    declared: &[EnvironmentHierarchy],
    registry: &IndexMap<String, EnvironmentSpec>,
) -> HierarchyValidation {
    let mut errors = Vec::new();

    for (start, spec) in registry {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut chain: Vec<&str> = Vec::new();
        let mut current = spec;

        loop {
            let name = current.name.as_str();
            chain.push(name);

            if !visited.insert(name) {
                errors.push(format!(
                    "Circular dependency detected for environment '{start}': {}",
                    chain.join(" -> ")
                ));
                break;
            }

            let next = declared
                .iter()
                .find(|layer| layer.name == name)
                .and_then(|layer| layer.extends.as_deref())
                .and_then(|parent| registry.get(parent));

            match next {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    HierarchyValidation {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentResolver;

    fn resolver_with(layers: Vec<EnvironmentHierarchy>) -> EnvironmentResolver {
        let mut base = EnvironmentSpec::new("base");
        base.environments = layers;
        let declared = base.environments.clone();
        EnvironmentResolver::new(base, &declared)
    }

    #[test]
    fn test_acyclic_hierarchy_is_valid() {
        let resolver = resolver_with(vec![
            EnvironmentHierarchy::new("staging").extending("base"),
            EnvironmentHierarchy::new("prod").extending("staging"),
        ]);

        let result = resolver.validate_hierarchy();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_mutual_extends_is_a_cycle() {
        let resolver = resolver_with(vec![
            EnvironmentHierarchy::new("a").extending("b"),
            EnvironmentHierarchy::new("b").extending("a"),
        ]);

        let result = resolver.validate_hierarchy();
        assert!(!result.valid);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.contains("'a'") || e.contains("'b'"))
        );
        // every environment on the loop reports it
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_self_extends_is_a_cycle() {
        let resolver = resolver_with(vec![EnvironmentHierarchy::new("loop").extending("loop")]);

        let result = resolver.validate_hierarchy();
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![String::from(
                "Circular dependency detected for environment 'loop': loop -> loop"
            )]
        );
    }

    #[test]
    fn test_unknown_parent_stops_walk() {
        let resolver = resolver_with(vec![EnvironmentHierarchy::new("orphan").extending("ghost")]);
        assert!(resolver.validate_hierarchy().valid);
    }

    #[test]
    fn test_only_base_declarations_are_walked() {
        // Layers passed to the resolver but missing from the base's own
        // declarations are never followed.
        let base = EnvironmentSpec::new("base");
        let layers = vec![
            EnvironmentHierarchy::new("a").extending("b"),
            EnvironmentHierarchy::new("b").extending("a"),
        ];
        let resolver = EnvironmentResolver::new(base, &layers);

        assert!(resolver.validate_hierarchy().valid);
    }
}
