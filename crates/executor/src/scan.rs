//! Full-table scan over an engine plugin
//!
//! Drives `on_reader_open` (optional), `on_reader_next` (required) and
//! `on_reader_close` (optional) in open → next* → close order.

use std::sync::Arc;

use quarry_core::{ColumnInfo, Error, ExecContext, Result, RowBatch, Schema, TableInfo};
use quarry_plugin::{EngineManifest, EngineRegistry, ExecutorMeta, ReaderNextHook, Session};
use tracing::{debug, trace, warn};

use crate::state::ExecState;
use crate::Executor;

/// Engine state held between open and close
pub(crate) struct OpenReader {
    pub(crate) manifest: Arc<EngineManifest>,
    pub(crate) meta: ExecutorMeta,
    pub(crate) session: Session,
}

impl OpenReader {
    /// Hand the session to `on_reader_close` if the engine declares it
    pub(crate) fn release(self) {
        let OpenReader {
            manifest,
            meta,
            session,
        } = self;
        if let Some(close) = &manifest.on_reader_close {
            close(&meta, session);
        }
        debug!(target: "quarry::executor", executor = %meta.id(), engine = %meta.engine(), "Reader closed");
    }
}

/// Unfiltered scan of one table through its engine's reader hooks
pub struct ScanExecutor {
    registry: Arc<EngineRegistry>,
    engine: String,
    table: Arc<TableInfo>,
    schema: Schema,
    columns: Vec<ColumnInfo>,
    state: ExecState,
    next_hook: Option<ReaderNextHook>,
    reader: Option<OpenReader>,
}

impl ScanExecutor {
    /// Scan `table` through `engine`, emitting `schema`.
    ///
    /// The requested columns default to the schema's columns.
    pub fn new(
        registry: Arc<EngineRegistry>,
        engine: impl Into<String>,
        table: Arc<TableInfo>,
        schema: Schema,
    ) -> Self {
        let columns = schema.columns().to_vec();
        Self {
            registry,
            engine: engine.into(),
            table,
            schema,
            columns,
            state: ExecState::Unopened,
            next_hook: None,
            reader: None,
        }
    }

    /// Scan every column of `table` through the engine named by its
    /// `engine` designator
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineNotFound`] if the table has no designator.
    pub fn for_table(registry: Arc<EngineRegistry>, table: Arc<TableInfo>) -> Result<Self> {
        let engine = table.engine.clone().ok_or_else(|| Error::EngineNotFound {
            engine: format!("<none for table '{}'>", table.name),
        })?;
        let schema = Schema::from_table(&table);
        Ok(Self::new(registry, engine, table, schema))
    }

    /// Narrow the columns reported to the engine as requested
    pub fn with_requested_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Context handed to the engine; available between open and close
    pub fn meta(&self) -> Option<&ExecutorMeta> {
        self.reader.as_ref().map(|r| &r.meta)
    }

    /// An empty batch shaped for this executor's output
    pub fn new_batch(&self, capacity: usize) -> RowBatch {
        RowBatch::new(self.schema.len(), capacity)
    }

    /// An empty batch at the registry's configured capacity
    pub fn default_batch(&self) -> RowBatch {
        self.new_batch(self.registry.batch_capacity())
    }
}

impl Executor for ScanExecutor {
    fn open(&mut self, ctx: &ExecContext) -> Result<()> {
        if self.state != ExecState::Unopened {
            return Err(self.state.misuse("scan", "open"));
        }

        let manifest = self.registry.get(&self.engine)?;
        let next_hook = manifest
            .on_reader_next
            .clone()
            .ok_or_else(|| Error::missing_hook(manifest.name(), "on_reader_next"))?;

        let meta = ExecutorMeta::new(
            manifest.name(),
            Arc::clone(&self.table),
            self.schema.clone(),
            self.columns.clone(),
        );

        let session = match &manifest.on_reader_open {
            Some(open) => open(ctx, &meta).map_err(|e| {
                warn!(target: "quarry::executor", executor = %meta.id(), engine = %meta.engine(), error = %e, "on_reader_open failed");
                e
            })?,
            None => Session::empty(),
        };

        debug!(
            target: "quarry::executor",
            executor = %meta.id(),
            engine = %meta.engine(),
            table = %meta.table().name,
            "Scan opened"
        );
        self.next_hook = Some(next_hook);
        self.reader = Some(OpenReader {
            manifest,
            meta,
            session,
        });
        self.state = ExecState::Opened;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext, batch: &mut RowBatch) -> Result<()> {
        match self.state {
            ExecState::Opened => {}
            ExecState::Exhausted => {
                batch.reset();
                return Ok(());
            }
            state => return Err(state.misuse("scan", "next")),
        }
        let (Some(next), Some(reader)) = (&self.next_hook, self.reader.as_mut()) else {
            return Err(self.state.misuse("scan", "next"));
        };

        batch.reset();
        if let Err(e) = next(ctx, batch, &reader.meta, &mut reader.session) {
            warn!(target: "quarry::executor", executor = %reader.meta.id(), engine = %reader.meta.engine(), error = %e, "on_reader_next failed");
            return Err(e);
        }

        if batch.is_empty() {
            trace!(target: "quarry::executor", executor = %reader.meta.id(), "Scan exhausted");
            self.state = ExecState::Exhausted;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            reader.release();
        }
        self.next_hook = None;
        self.state = ExecState::Closed;
        Ok(())
    }
}
