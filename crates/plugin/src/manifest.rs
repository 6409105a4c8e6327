//! Plugin manifests and the engine hook table
//!
//! A [`Manifest`] declares a plugin's identity, its configuration variables
//! and its lifecycle hooks. An [`EngineManifest`] adds the data-access hooks
//! a storage engine plugin implements.
//!
//! ## Hook Slots
//!
//! Every hook is an independently optional slot. An unset slot means the
//! engine does not support that operation; callers check the slot and never
//! substitute a silent no-op where the operation requires behavior.
//!
//! | Operation | Open | Next | Close |
//! |-----------|------|------|-------|
//! | Scan | `on_reader_open` (optional) | `on_reader_next` (required) | `on_reader_close` (optional) |
//! | Filtered scan | `on_select_reader_open` (optional) | `on_select_reader_next` (required) | `on_reader_close` (optional) |
//! | Insert | `on_insert_open` (required) | `on_insert_next` (required) | `on_insert_close` (required) |
//! | DDL | `on_create_table`, `on_drop_table` (optional, one-shot) | | |
//!
//! ## Sessions Across Scan Paths
//!
//! A filtered scan without `on_select_reader_open` opens through
//! `on_reader_open`, so `on_select_reader_next` then receives the
//! [`Session`] the scan open produced. An engine that declares both
//! `on_reader_open` and `on_select_reader_next` but no select open must
//! accept that session type in its select next. Declare
//! `on_select_reader_open` whenever the two paths keep different state.
//!
//! ## Example
//!
//! ```ignore
//! let manifest = EngineManifest::new("memory", 1)
//!     .with_reader_next(|_ctx, batch, meta, session| {
//!         let cursor = session.get_or_insert_with(Cursor::default);
//!         // fill batch ...
//!         Ok(())
//!     });
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quarry_core::{Error, ExecContext, Expr, Result, RowBatch, TableInfo};
use serde::{Deserialize, Serialize};

use crate::meta::ExecutorMeta;
use crate::session::Session;

// ============================================================================
// Hook Signatures
// ============================================================================

/// `validate`, `on_init` and `on_shutdown`
pub type LifecycleHook = Arc<dyn Fn(&Manifest) -> Result<()> + Send + Sync>;

/// `on_reader_open` and `on_insert_open`: prepare and return per-executor state
pub type OpenHook = Arc<dyn Fn(&ExecContext, &ExecutorMeta) -> Result<Session> + Send + Sync>;

/// `on_reader_next`: fill the batch with the next rows
pub type ReaderNextHook = Arc<
    dyn Fn(&ExecContext, &mut RowBatch, &ExecutorMeta, &mut Session) -> Result<()> + Send + Sync,
>;

/// `on_reader_close`: release reader state; cannot fail
pub type ReaderCloseHook = Arc<dyn Fn(&ExecutorMeta, Session) + Send + Sync>;

/// `on_select_reader_open`: prepare a predicate-pushdown scan
pub type SelectOpenHook =
    Arc<dyn Fn(&ExecContext, &[Expr], &ExecutorMeta) -> Result<Session> + Send + Sync>;

/// `on_select_reader_next`: fill the batch with the next matching rows
pub type SelectNextHook = Arc<
    dyn Fn(&ExecContext, &mut RowBatch, &[Expr], &ExecutorMeta, &mut Session) -> Result<()>
        + Send
        + Sync,
>;

/// `on_insert_next`: persist a set of row expression lists
pub type InsertNextHook = Arc<
    dyn Fn(&ExecContext, &[Vec<Expr>], &ExecutorMeta, &mut Session) -> Result<()> + Send + Sync,
>;

/// `on_insert_close`: release writer state; its result is the insert's result
pub type InsertCloseHook = Arc<dyn Fn(&ExecutorMeta, Session) -> Result<()> + Send + Sync>;

/// `on_create_table` and `on_drop_table`
pub type TableHook = Arc<dyn Fn(&TableInfo) -> Result<()> + Send + Sync>;

// ============================================================================
// Manifest
// ============================================================================

/// Plugin category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginKind {
    /// Audit log plugin
    Audit,
    /// Authentication plugin
    Authentication,
    /// Schema plugin
    Schema,
    /// Background daemon plugin
    Daemon,
    /// Storage engine plugin
    Engine,
}

/// Visibility of a configuration variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysVarScope {
    /// One value for the whole server
    Global,
    /// Overridable per session
    Session,
}

/// A configuration variable recognised by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysVar {
    /// Variable name, conventionally prefixed with the plugin name
    pub name: String,
    /// Visibility
    pub scope: SysVarScope,
    /// Current value
    pub value: String,
}

/// Plugin identity, configuration variables and lifecycle hooks
#[derive(Clone)]
pub struct Manifest {
    /// Plugin category
    pub kind: PluginKind,
    /// Plugin name, unique within a registry
    pub name: String,
    /// Plugin version
    pub version: u16,
    /// Recognised configuration variables, keyed by name
    pub sys_vars: BTreeMap<String, SysVar>,
    /// Checks the manifest before initialisation
    pub validate: Option<LifecycleHook>,
    /// Runs once when the plugin is registered
    pub on_init: Option<LifecycleHook>,
    /// Runs once when the plugin is unregistered or the host shuts down
    pub on_shutdown: Option<LifecycleHook>,
}

impl Manifest {
    /// Manifest with no variables and no lifecycle hooks
    pub fn new(kind: PluginKind, name: impl Into<String>, version: u16) -> Self {
        Self {
            kind,
            name: name.into(),
            version,
            sys_vars: BTreeMap::new(),
            validate: None,
            on_init: None,
            on_shutdown: None,
        }
    }

    /// Current value of a configuration variable
    pub fn sys_var(&self, name: &str) -> Option<&str> {
        self.sys_vars.get(name).map(|v| v.value.as_str())
    }

    /// `"<name>-<version>"`, the id used in plugin configuration
    pub fn plugin_id(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("sys_vars", &self.sys_vars.keys().collect::<Vec<_>>())
            .field("validate", &self.validate.is_some())
            .field("on_init", &self.on_init.is_some())
            .field("on_shutdown", &self.on_shutdown.is_some())
            .finish()
    }
}

// ============================================================================
// Engine Manifest
// ============================================================================

/// Manifest of a storage engine plugin: identity plus data-access hooks
#[derive(Clone)]
pub struct EngineManifest {
    /// Identity and lifecycle hooks
    pub manifest: Manifest,

    /// Prepare an insert (required for inserts)
    pub on_insert_open: Option<OpenHook>,
    /// Persist rows (required for inserts)
    pub on_insert_next: Option<InsertNextHook>,
    /// Finish an insert (required for inserts)
    pub on_insert_close: Option<InsertCloseHook>,

    /// Prepare a full scan
    pub on_reader_open: Option<OpenHook>,
    /// Produce the next rows of a full scan (required for scans)
    pub on_reader_next: Option<ReaderNextHook>,
    /// Release scan state
    pub on_reader_close: Option<ReaderCloseHook>,

    /// Prepare a predicate-pushdown scan; when unset, `on_reader_open`
    /// prepares it and its session reaches `on_select_reader_next`
    pub on_select_reader_open: Option<SelectOpenHook>,
    /// Produce the next matching rows (required for filtered scans)
    pub on_select_reader_next: Option<SelectNextHook>,

    /// Provision resources for a new table
    pub on_create_table: Option<TableHook>,
    /// Release resources of a dropped table
    pub on_drop_table: Option<TableHook>,
}

impl EngineManifest {
    /// Engine manifest with no hooks
    pub fn new(name: impl Into<String>, version: u16) -> Self {
        Self::from_manifest(Manifest::new(PluginKind::Engine, name, version))
    }

    /// Engine manifest with the given identity and no data-access hooks
    pub fn from_manifest(manifest: Manifest) -> Self {
        Self {
            manifest,
            on_insert_open: None,
            on_insert_next: None,
            on_insert_close: None,
            on_reader_open: None,
            on_reader_next: None,
            on_reader_close: None,
            on_select_reader_open: None,
            on_select_reader_next: None,
            on_create_table: None,
            on_drop_table: None,
        }
    }

    /// Engine name
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Engine version
    pub fn version(&self) -> u16 {
        self.manifest.version
    }

    // ------------------------------------------------------------------------
    // Builder methods
    // ------------------------------------------------------------------------

    /// Declare a configuration variable
    pub fn with_sys_var(mut self, name: impl Into<String>, scope: SysVarScope, value: impl Into<String>) -> Self {
        let name = name.into();
        self.manifest.sys_vars.insert(
            name.clone(),
            SysVar {
                name,
                scope,
                value: value.into(),
            },
        );
        self
    }

    /// Set the `validate` hook
    pub fn with_validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Manifest) -> Result<()> + Send + Sync + 'static,
    {
        self.manifest.validate = Some(Arc::new(f));
        self
    }

    /// Set the `on_init` hook
    pub fn with_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&Manifest) -> Result<()> + Send + Sync + 'static,
    {
        self.manifest.on_init = Some(Arc::new(f));
        self
    }

    /// Set the `on_shutdown` hook
    pub fn with_shutdown<F>(mut self, f: F) -> Self
    where
        F: Fn(&Manifest) -> Result<()> + Send + Sync + 'static,
    {
        self.manifest.on_shutdown = Some(Arc::new(f));
        self
    }

    /// Set the `on_insert_open` hook
    pub fn with_insert_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext, &ExecutorMeta) -> Result<Session> + Send + Sync + 'static,
    {
        self.on_insert_open = Some(Arc::new(f));
        self
    }

    /// Set the `on_insert_next` hook
    pub fn with_insert_next<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext, &[Vec<Expr>], &ExecutorMeta, &mut Session) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.on_insert_next = Some(Arc::new(f));
        self
    }

    /// Set the `on_insert_close` hook
    pub fn with_insert_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutorMeta, Session) -> Result<()> + Send + Sync + 'static,
    {
        self.on_insert_close = Some(Arc::new(f));
        self
    }

    /// Set the `on_reader_open` hook
    pub fn with_reader_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext, &ExecutorMeta) -> Result<Session> + Send + Sync + 'static,
    {
        self.on_reader_open = Some(Arc::new(f));
        self
    }

    /// Set the `on_reader_next` hook
    pub fn with_reader_next<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext, &mut RowBatch, &ExecutorMeta, &mut Session) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.on_reader_next = Some(Arc::new(f));
        self
    }

    /// Set the `on_reader_close` hook
    pub fn with_reader_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutorMeta, Session) + Send + Sync + 'static,
    {
        self.on_reader_close = Some(Arc::new(f));
        self
    }

    /// Set the `on_select_reader_open` hook
    pub fn with_select_reader_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext, &[Expr], &ExecutorMeta) -> Result<Session> + Send + Sync + 'static,
    {
        self.on_select_reader_open = Some(Arc::new(f));
        self
    }

    /// Set the `on_select_reader_next` hook
    pub fn with_select_reader_next<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecContext, &mut RowBatch, &[Expr], &ExecutorMeta, &mut Session) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.on_select_reader_next = Some(Arc::new(f));
        self
    }

    /// Set the `on_create_table` hook
    pub fn with_create_table<F>(mut self, f: F) -> Self
    where
        F: Fn(&TableInfo) -> Result<()> + Send + Sync + 'static,
    {
        self.on_create_table = Some(Arc::new(f));
        self
    }

    /// Set the `on_drop_table` hook
    pub fn with_drop_table<F>(mut self, f: F) -> Self
    where
        F: Fn(&TableInfo) -> Result<()> + Send + Sync + 'static,
    {
        self.on_drop_table = Some(Arc::new(f));
        self
    }

    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------

    /// Full scans are supported
    pub fn supports_scan(&self) -> bool {
        self.on_reader_next.is_some()
    }

    /// Predicate-pushdown scans are supported
    pub fn supports_pushdown(&self) -> bool {
        self.on_select_reader_next.is_some()
    }

    /// Inserts are supported
    pub fn supports_insert(&self) -> bool {
        self.on_insert_open.is_some() && self.on_insert_next.is_some() && self.on_insert_close.is_some()
    }

    /// The engine wants create/drop table notifications
    pub fn supports_ddl(&self) -> bool {
        self.on_create_table.is_some() || self.on_drop_table.is_some()
    }

    /// Structural check of the hook table.
    ///
    /// Rejects an open hook declared without the next hook that must follow
    /// it, and a partial insert hook set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] describing the first inconsistency.
    pub fn check(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidManifest {
            engine: self.name().to_string(),
            reason: reason.to_string(),
        };

        if self.manifest.name.trim().is_empty() {
            return Err(invalid("engine name is empty"));
        }
        if self.manifest.kind != PluginKind::Engine {
            return Err(invalid("manifest kind is not Engine"));
        }
        if (self.on_reader_open.is_some() || self.on_reader_close.is_some())
            && self.on_reader_next.is_none()
        {
            return Err(invalid("reader open/close declared without on_reader_next"));
        }
        if self.on_select_reader_open.is_some() && self.on_select_reader_next.is_none() {
            return Err(invalid(
                "on_select_reader_open declared without on_select_reader_next",
            ));
        }
        let insert_hooks = [
            self.on_insert_open.is_some(),
            self.on_insert_next.is_some(),
            self.on_insert_close.is_some(),
        ];
        if insert_hooks.iter().any(|&h| h) && !insert_hooks.iter().all(|&h| h) {
            return Err(invalid(
                "insert hooks must declare on_insert_open, on_insert_next and on_insert_close together",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for EngineManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineManifest")
            .field("manifest", &self.manifest)
            .field("scan", &self.supports_scan())
            .field("pushdown", &self.supports_pushdown())
            .field("insert", &self.supports_insert())
            .field("ddl", &self.supports_ddl())
            .finish()
    }
}
