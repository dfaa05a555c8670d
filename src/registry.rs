//! Kind-keyed registry for pluggable providers.
//!
//! Secret providers, infrastructure providers, and plugins are all looked up
//! by a string kind. The registry keeps registration order so listings are
//! stable.

use indexmap::IndexMap;
use std::fmt;

use crate::error::{ProviderError, Result};

/// An insertion-ordered map from kind to provider.
pub struct Registry<T: ?Sized> {
    /// Category used in error messages (`secret`, `infrastructure`, ...).
    category: &'static str,
    /// Registered entries.
    entries: IndexMap<String, Box<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Creates an empty registry for `category`.
    #[must_use]
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            entries: IndexMap::new(),
        }
    }

    /// Registers `entry` under `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is already registered.
    pub fn register(&mut self, kind: impl Into<String>, entry: Box<T>) -> Result<()> {
        let kind = kind.into();
        if self.entries.contains_key(&kind) {
            return Err(ProviderError::AlreadyRegistered {
                category: self.category,
                kind,
            }
            .into());
        }
        self.entries.insert(kind, entry);
        Ok(())
    }

    /// Looks up the entry for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotConfigured`] if nothing is registered.
    pub fn get(&self, kind: &str) -> Result<&T> {
        self.entries
            .get(kind)
            .map(|entry| &**entry)
            .ok_or_else(|| ProviderError::not_configured(self.category, kind).into())
    }

    /// Returns true if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// Lists registered kinds in registration order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Iterates over entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), &**v))
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("category", &self.category)
            .field("kinds", &self.kinds())
            .finish()
    }
}
