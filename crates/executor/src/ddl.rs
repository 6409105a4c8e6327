//! Table DDL notifications to engine plugins
//!
//! `CREATE TABLE ... ENGINE = <name>` and `DROP TABLE` on such a table are
//! forwarded to the engine's `on_create_table` / `on_drop_table` hooks so it
//! can provision or release backing resources. The hook's error becomes the
//! DDL statement's error; partial engine-side state is not rolled back here.

use std::sync::Arc;

use quarry_core::{Result, TableInfo};
use quarry_plugin::{EngineManifest, EngineRegistry, TableHook};
use tracing::{debug, info, warn};

/// Which DDL event is being forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlEvent {
    /// Table created
    CreateTable,
    /// Table dropped
    DropTable,
}

impl DdlEvent {
    fn hook_name(self) -> &'static str {
        match self {
            DdlEvent::CreateTable => "on_create_table",
            DdlEvent::DropTable => "on_drop_table",
        }
    }

    fn hook(self, manifest: &EngineManifest) -> Option<&TableHook> {
        match self {
            DdlEvent::CreateTable => manifest.on_create_table.as_ref(),
            DdlEvent::DropTable => manifest.on_drop_table.as_ref(),
        }
    }
}

/// What happened to a forwarded DDL event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOutcome {
    /// The table has no engine designator; nothing was forwarded
    NativeTable,
    /// The engine declares no hook for this event
    Unhandled,
    /// The engine's hook ran and succeeded
    Applied,
}

/// Routes table DDL to the engine named in the table descriptor
#[derive(Debug, Clone)]
pub struct DdlNotifier {
    registry: Arc<EngineRegistry>,
}

impl DdlNotifier {
    /// Notifier resolving engines from `registry`
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    /// Forward a table creation
    pub fn on_create_table(&self, table: &TableInfo) -> Result<DdlOutcome> {
        self.notify(DdlEvent::CreateTable, table)
    }

    /// Forward a table drop
    pub fn on_drop_table(&self, table: &TableInfo) -> Result<DdlOutcome> {
        self.notify(DdlEvent::DropTable, table)
    }

    /// Forward `event` for `table`.
    ///
    /// # Errors
    ///
    /// [`quarry_core::Error::EngineNotFound`] for an unregistered engine, or
    /// the hook's own error unchanged.
    pub fn notify(&self, event: DdlEvent, table: &TableInfo) -> Result<DdlOutcome> {
        let Some(engine) = table.engine.as_deref() else {
            return Ok(DdlOutcome::NativeTable);
        };
        let manifest = self.registry.get(engine)?;

        let Some(hook) = event.hook(&manifest) else {
            debug!(target: "quarry::ddl", engine = %manifest.name(), table = %table.name, hook = event.hook_name(), "Engine does not handle DDL event");
            return Ok(DdlOutcome::Unhandled);
        };

        match hook(table) {
            Ok(()) => {
                info!(target: "quarry::ddl", engine = %manifest.name(), table = %table.name, hook = event.hook_name(), "DDL forwarded");
                Ok(DdlOutcome::Applied)
            }
            Err(e) => {
                warn!(target: "quarry::ddl", engine = %manifest.name(), table = %table.name, hook = event.hook_name(), error = %e, "DDL hook failed");
                Err(e)
            }
        }
    }
}
