//! Plugin configuration via `quarry.toml`
//!
//! The host lists the engine plugins it enables and may override their
//! configuration variables. The registry applies this when loading
//! manifests (see [`crate::EngineRegistry::load`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use quarry_core::{Error, Result};

/// Config file name placed in the host's data directory.
pub const CONFIG_FILE_NAME: &str = "quarry.toml";

/// Default number of rows an executor asks for per `next` call.
pub const DEFAULT_BATCH_CAPACITY: usize = 1024;

/// A plugin identifier of the form `"<name>-<version>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginId {
    /// Plugin name
    pub name: String,
    /// Plugin version
    pub version: u16,
}

/// Plugin configuration loaded from `quarry.toml`.
///
/// # Example
///
/// ```toml
/// plugins = ["file-1", "search-1"]
/// batch_capacity = 256
///
/// [sys_vars]
/// search_key = "v2"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Enabled plugins, as `"<name>-<version>"`
    #[serde(default)]
    pub plugins: Vec<String>,
    /// Overrides for plugin-declared configuration variables
    #[serde(default)]
    pub sys_vars: BTreeMap<String, String>,
    /// Rows per batch for executors
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,
}

fn default_batch_capacity() -> usize {
    DEFAULT_BATCH_CAPACITY
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            sys_vars: BTreeMap::new(),
            batch_capacity: default_batch_capacity(),
        }
    }
}

impl PluginConfig {
    /// Parse a `"<name>-<version>"` identifier.
    ///
    /// The version follows the last `-`, so names may contain dashes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the id has no version or the version is
    /// not a `u16`.
    pub fn parse_plugin_id(id: &str) -> Result<PluginId> {
        let (name, version) = id
            .rsplit_once('-')
            .ok_or_else(|| Error::Config(format!("plugin id '{}' is not <name>-<version>", id)))?;
        if name.is_empty() {
            return Err(Error::Config(format!("plugin id '{}' has an empty name", id)));
        }
        let version = version
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("plugin id '{}' has an invalid version", id)))?;
        Ok(PluginId {
            name: name.to_string(),
            version,
        })
    }

    /// Parse every enabled plugin id
    pub fn plugin_ids(&self) -> Result<Vec<PluginId>> {
        self.plugins.iter().map(|id| Self::parse_plugin_id(id)).collect()
    }

    /// Check the values that cannot be checked by deserialisation alone
    pub fn validate(&self) -> Result<()> {
        if self.batch_capacity == 0 {
            return Err(Error::Config("batch_capacity must be at least 1".to_string()));
        }
        self.plugin_ids()?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Quarry engine plugin configuration
#
# Enabled engine plugins, as "<name>-<version>".
plugins = []

# Rows requested per executor next() call (default: 1024)
batch_capacity = 1024

# Overrides for plugin configuration variables.
# [sys_vars]
# search_key = "v1"
"#
    }

    /// Parse config from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PluginConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse plugin config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
