//! Bulk insert through an engine plugin
//!
//! Drives the required `on_insert_open`, `on_insert_next` and
//! `on_insert_close` hooks. Engines may buffer writes until close, so the
//! close hook's result is the result of the whole insert and is always
//! returned to the caller.

use std::sync::Arc;

use quarry_core::{Error, ExecContext, Expr, Result, Schema, TableInfo};
use quarry_plugin::{
    EngineManifest, EngineRegistry, ExecutorMeta, InsertCloseHook, InsertNextHook, Session,
};
use tracing::{debug, warn};

use crate::state::ExecState;

struct OpenWriter {
    next: InsertNextHook,
    close: InsertCloseHook,
    meta: ExecutorMeta,
    session: Session,
}

/// Insert executor: open → next(rows)* → close
pub struct InsertExecutor {
    registry: Arc<EngineRegistry>,
    engine: String,
    table: Arc<TableInfo>,
    state: ExecState,
    writer: Option<OpenWriter>,
    rows_written: usize,
}

impl InsertExecutor {
    /// Insert into `table` through `engine`
    pub fn new(registry: Arc<EngineRegistry>, engine: impl Into<String>, table: Arc<TableInfo>) -> Self {
        Self {
            registry,
            engine: engine.into(),
            table,
            state: ExecState::Unopened,
            writer: None,
            rows_written: 0,
        }
    }

    /// Insert into `table` through the engine named by its designator
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineNotFound`] if the table has no designator.
    pub fn for_table(registry: Arc<EngineRegistry>, table: Arc<TableInfo>) -> Result<Self> {
        let engine = table.engine.clone().ok_or_else(|| Error::EngineNotFound {
            engine: format!("<none for table '{}'>", table.name),
        })?;
        Ok(Self::new(registry, engine, table))
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Context handed to the engine; available between open and close
    pub fn meta(&self) -> Option<&ExecutorMeta> {
        self.writer.as_ref().map(|w| &w.meta)
    }

    /// Rows handed to successful `next` calls
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn required<T: Clone>(manifest: &EngineManifest, hook: &Option<T>, name: &'static str) -> Result<T> {
        hook.clone()
            .ok_or_else(|| Error::missing_hook(manifest.name(), name))
    }

    /// Resolve the engine and run `on_insert_open`.
    ///
    /// # Errors
    ///
    /// Resolution errors if the engine or any insert hook is missing, or
    /// the open hook's error; the statement must then be aborted.
    pub fn open(&mut self, ctx: &ExecContext) -> Result<()> {
        if self.state != ExecState::Unopened {
            return Err(self.state.misuse("insert", "open"));
        }

        let manifest = self.registry.get(&self.engine)?;
        let open = Self::required(&manifest, &manifest.on_insert_open, "on_insert_open")?;
        let next = Self::required(&manifest, &manifest.on_insert_next, "on_insert_next")?;
        let close = Self::required(&manifest, &manifest.on_insert_close, "on_insert_close")?;

        let meta = ExecutorMeta::new(
            manifest.name(),
            Arc::clone(&self.table),
            Schema::from_table(&self.table),
            self.table.columns.clone(),
        );
        let session = open(ctx, &meta).map_err(|e| {
            warn!(target: "quarry::executor", executor = %meta.id(), engine = %meta.engine(), error = %e, "on_insert_open failed");
            e
        })?;

        debug!(
            target: "quarry::executor",
            executor = %meta.id(),
            engine = %meta.engine(),
            table = %meta.table().name,
            "Insert opened"
        );
        self.writer = Some(OpenWriter {
            next,
            close,
            meta,
            session,
        });
        self.state = ExecState::Opened;
        Ok(())
    }

    /// Hand `rows` (one expression list per row) to `on_insert_next`.
    ///
    /// Whether a failed call left some rows applied is up to the engine.
    pub fn next(&mut self, ctx: &ExecContext, rows: &[Vec<Expr>]) -> Result<()> {
        let state = self.state;
        let writer = match (state, self.writer.as_mut()) {
            (ExecState::Opened, Some(writer)) => writer,
            _ => return Err(state.misuse("insert", "next")),
        };

        if let Err(e) = (writer.next)(ctx, rows, &writer.meta, &mut writer.session) {
            warn!(target: "quarry::executor", executor = %writer.meta.id(), engine = %writer.meta.engine(), error = %e, "on_insert_next failed");
            return Err(e);
        }
        self.rows_written += rows.len();
        Ok(())
    }

    /// Run `on_insert_close` and return its result.
    ///
    /// Closing an executor that never opened, or closing twice, does not
    /// reach the engine and returns `Ok`.
    pub fn close(&mut self) -> Result<()> {
        self.state = ExecState::Closed;
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let OpenWriter {
            close,
            meta,
            session,
            ..
        } = writer;
        match close(&meta, session) {
            Ok(()) => {
                debug!(target: "quarry::executor", executor = %meta.id(), rows = self.rows_written, "Insert closed");
                Ok(())
            }
            Err(e) => {
                warn!(target: "quarry::executor", executor = %meta.id(), engine = %meta.engine(), error = %e, "on_insert_close failed");
                Err(e)
            }
        }
    }

    /// Run a whole insert statement: open, one `next` with all rows, close.
    ///
    /// Close runs even when `next` fails so engine handles are released;
    /// the `next` error is then returned in preference to a close error.
    pub fn execute(&mut self, ctx: &ExecContext, rows: &[Vec<Expr>]) -> Result<usize> {
        self.open(ctx)?;
        let written = self.next(ctx, rows);
        let closed = self.close();
        written?;
        closed?;
        Ok(self.rows_written)
    }
}
