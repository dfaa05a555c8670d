//! Spec loader for YAML and JSON environment specs.
//!
//! This module handles loading specs from disk, applying environment
//! variable overrides and `.env` files, and discovering the spec file.

use crate::error::{ConfigError, EnvkitError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::EnvironmentSpec;

/// Starter spec written by `envkit init`.
pub const SAMPLE_SPEC: &str = include_str!("../../templates/envkit.yaml");

/// Default spec file names to search for.
pub const DEFAULT_SPEC_FILES: &[&str] = &["envkit.yaml", "envkit.yml", "envkit.json"];

/// Loader for environment specs.
#[derive(Debug, Default)]
pub struct SpecLoader {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl SpecLoader {
    /// Creates a new spec loader.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a spec from a YAML or JSON file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EnvironmentSpec> {
        let path = path.as_ref();
        info!("Loading spec from: {}", path.display());

        if !path.exists() {
            return Err(EnvkitError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            )
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            self.parse_json(&content, Some(path))
        } else {
            self.parse_yaml(&content, Some(path))
        }
    }

    /// Parses a spec from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EnvironmentSpec> {
        debug!("Parsing YAML spec");

        let spec: EnvironmentSpec = serde_yaml::from_str(content).map_err(|e| {
            ConfigError::parse(
                format!("YAML parse error: {e}"),
                source.map(|p| p.display().to_string()),
            )
        })?;

        debug!("Successfully parsed spec for environment: {}", spec.name);
        Ok(spec)
    }

    /// Parses a spec from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn parse_json(&self, content: &str, source: Option<&Path>) -> Result<EnvironmentSpec> {
        debug!("Parsing JSON spec");

        let spec: EnvironmentSpec = serde_json::from_str(content).map_err(|e| {
            ConfigError::parse(
                format!("JSON parse error: {e}"),
                source.map(|p| p.display().to_string()),
            )
        })?;

        debug!("Successfully parsed spec for environment: {}", spec.name);
        Ok(spec)
    }

    /// Loads a spec and applies `ENVKIT_*` environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<EnvironmentSpec> {
        let mut spec = self.load_file(path)?;
        Self::apply_env_overrides(&mut spec, |key| std::env::var(key).ok());
        Ok(spec)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    ///
    /// Recognized variables: `ENVKIT_NAME`, `ENVKIT_DESCRIPTION`.
    pub fn apply_env_overrides<F>(spec: &mut EnvironmentSpec, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("ENVKIT_NAME") {
            debug!("Overriding name from environment");
            spec.name = name;
        }

        if let Some(description) = lookup("ENVKIT_DESCRIPTION") {
            debug!("Overriding description from environment");
            spec.description = Some(description);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Writes the starter spec to `path`.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is false, or if it
/// cannot be written.
pub fn write_sample_spec(path: impl AsRef<Path>, force: bool) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.exists() && !force {
        return Err(EnvkitError::Config(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        }));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(path, SAMPLE_SPEC)?;
    info!("Wrote sample spec to: {}", path.display());
    Ok(path.to_path_buf())
}

/// Finds the spec file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no spec file is found.
pub fn find_spec_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_SPEC_FILES {
            let spec_path = current.join(filename);
            if spec_path.exists() {
                info!("Found spec file: {}", spec_path.display());
                return Ok(spec_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(EnvkitError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_SPEC_FILES[0]),
    }))
}
