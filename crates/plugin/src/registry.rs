//! Engine registry: manifests by name
//!
//! Executors resolve their engine here at open time. Registration runs the
//! manifest's structural check and its `validate` and `on_init` hooks;
//! manifests are immutable once registered.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = EngineRegistry::new();
//! registry.register(file::manifest(config))?;
//!
//! let engine = registry.get("file")?;   // EngineNotFound if absent
//! assert!(engine.supports_insert());
//!
//! registry.shutdown()?;                 // runs every on_shutdown hook
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use quarry_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::config::{PluginConfig, DEFAULT_BATCH_CAPACITY};
use crate::manifest::EngineManifest;

/// Registry of engine manifests, keyed by lower-cased engine name
///
/// Shared between concurrently running executors; lookups take a read lock.
pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Arc<EngineManifest>>>,
    batch_capacity: usize,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        EngineRegistry {
            engines: RwLock::new(HashMap::new()),
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }

    /// Set the batch capacity executors use by default (at least 1)
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity.max(1);
        self
    }

    /// Rows per batch executors use when the caller names no capacity
    pub fn batch_capacity(&self) -> usize {
        self.batch_capacity
    }

    /// Build a registry from configuration.
    ///
    /// Only manifests enabled in `config.plugins` are registered. Each
    /// enabled id must match a supplied manifest by name and version, and
    /// every `sys_vars` override must name a variable declared by an
    /// enabled manifest. The registry's batch capacity is taken from
    /// `config.batch_capacity`.
    ///
    /// If a manifest fails to register, the engines already initialised are
    /// shut down before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an enabled plugin with no manifest, a
    /// version mismatch or an unknown variable, and any registration error.
    pub fn load<I>(config: &PluginConfig, manifests: I) -> Result<Self>
    where
        I: IntoIterator<Item = EngineManifest>,
    {
        config.validate()?;

        let mut available: HashMap<String, EngineManifest> = manifests
            .into_iter()
            .map(|m| (m.name().to_ascii_lowercase(), m))
            .collect();

        let mut enabled = Vec::new();
        for id in config.plugin_ids()? {
            let manifest = available.remove(&id.name.to_ascii_lowercase()).ok_or_else(|| {
                Error::Config(format!(
                    "plugin '{}-{}' is enabled but no manifest was provided",
                    id.name, id.version
                ))
            })?;
            if manifest.version() != id.version {
                return Err(Error::Config(format!(
                    "plugin '{}' is version {}, configuration requires {}",
                    id.name,
                    manifest.version(),
                    id.version
                )));
            }
            enabled.push(manifest);
        }

        for name in available.keys() {
            debug!(target: "quarry::registry", engine = %name, "Skipping manifest not enabled in config");
        }

        for (var, value) in &config.sys_vars {
            let owner = enabled
                .iter_mut()
                .find_map(|m| m.manifest.sys_vars.get_mut(var))
                .ok_or_else(|| {
                    Error::Config(format!("unknown plugin variable '{}'", var))
                })?;
            owner.value = value.clone();
        }

        let registry = Self::new().with_batch_capacity(config.batch_capacity);
        for manifest in enabled {
            let name = manifest.name().to_string();
            if let Err(e) = registry.register(manifest) {
                warn!(target: "quarry::registry", engine = %name, error = %e, "Plugin load failed, shutting down loaded engines");
                // Shutdown failures are logged by run_shutdown
                let _ = registry.shutdown();
                return Err(e);
            }
        }
        Ok(registry)
    }

    /// Register an engine manifest
    ///
    /// Runs [`EngineManifest::check`], then the `validate` and `on_init`
    /// hooks if declared. If another registration takes the name while
    /// `on_init` runs, this manifest's `on_shutdown` runs before the
    /// duplicate error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEngine`] if the name is taken, or the error
    /// of the failing check or hook; the manifest is not registered then.
    pub fn register(&self, manifest: EngineManifest) -> Result<Arc<EngineManifest>> {
        manifest.check()?;
        let key = manifest.name().to_ascii_lowercase();

        if self.engines.read().contains_key(&key) {
            return Err(Error::DuplicateEngine {
                engine: manifest.name().to_string(),
            });
        }

        if let Some(validate) = &manifest.manifest.validate {
            validate(&manifest.manifest)?;
        }
        if let Some(init) = &manifest.manifest.on_init {
            init(&manifest.manifest)?;
        }

        let manifest = Arc::new(manifest);
        let mut engines = self.engines.write();
        if engines.contains_key(&key) {
            drop(engines);
            debug!(target: "quarry::registry", engine = %manifest.name(), "Lost registration race, undoing init");
            let _ = Self::run_shutdown(&manifest);
            return Err(Error::DuplicateEngine {
                engine: manifest.name().to_string(),
            });
        }
        engines.insert(key, Arc::clone(&manifest));
        drop(engines);
        info!(
            target: "quarry::registry",
            engine = %manifest.name(),
            version = manifest.version(),
            scan = manifest.supports_scan(),
            pushdown = manifest.supports_pushdown(),
            insert = manifest.supports_insert(),
            "Engine registered"
        );
        Ok(manifest)
    }

    /// Look up an engine by name (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineNotFound`] if no engine has this name.
    pub fn get(&self, name: &str) -> Result<Arc<EngineManifest>> {
        self.engines
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::EngineNotFound {
                engine: name.to_string(),
            })
    }

    /// Check if an engine is registered under this name
    pub fn has_engine(&self, name: &str) -> bool {
        self.engines.read().contains_key(&name.to_ascii_lowercase())
    }

    /// Unregister an engine, running its `on_shutdown` hook
    ///
    /// Returns `Ok(None)` if no engine has this name. The engine is removed
    /// even when its shutdown hook fails; the hook's error is returned.
    pub fn unregister(&self, name: &str) -> Result<Option<Arc<EngineManifest>>> {
        let removed = self.engines.write().remove(&name.to_ascii_lowercase());
        match removed {
            Some(manifest) => {
                Self::run_shutdown(&manifest)?;
                Ok(Some(manifest))
            }
            None => Ok(None),
        }
    }

    /// Unregister every engine, running each `on_shutdown` hook.
    ///
    /// All hooks run even if one fails; the first failure is returned.
    pub fn shutdown(&self) -> Result<()> {
        let drained: Vec<Arc<EngineManifest>> = {
            let mut engines = self.engines.write();
            let mut all: Vec<_> = engines.drain().collect();
            all.sort_by(|a, b| a.0.cmp(&b.0));
            all.into_iter().map(|(_, m)| m).collect()
        };

        let mut first_err = None;
        for manifest in drained {
            if let Err(e) = Self::run_shutdown(&manifest) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn run_shutdown(manifest: &EngineManifest) -> Result<()> {
        if let Some(shutdown) = &manifest.manifest.on_shutdown {
            if let Err(e) = shutdown(&manifest.manifest) {
                warn!(target: "quarry::registry", engine = %manifest.name(), error = %e, "Engine shutdown failed");
                return Err(e);
            }
        }
        info!(target: "quarry::registry", engine = %manifest.name(), "Engine unregistered");
        Ok(())
    }

    /// Registered engine names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .engines
            .read()
            .values()
            .map(|m| m.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Get the number of registered engines
    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engine_count", &self.len())
            .field("engines", &self.names())
            .field("batch_capacity", &self.batch_capacity)
            .finish()
    }
}
