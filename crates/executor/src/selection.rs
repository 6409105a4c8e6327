//! Predicate-pushdown scan over an engine plugin
//!
//! Same lifecycle as [`crate::ScanExecutor`], but the planner's predicate
//! list is handed to `on_select_reader_open` and to every
//! `on_select_reader_next` call. The executor never evaluates predicates;
//! an engine may return rows a predicate would reject, and the host keeps
//! its own filter above this executor for that reason.
//!
//! `open` is a prepare step. An engine may materialise every match there
//! and paginate in `next`, or keep `open` cheap and evaluate lazily per
//! `next` call; both are valid.

use std::sync::Arc;

use quarry_core::{ColumnInfo, Error, ExecContext, Expr, Result, RowBatch, Schema, TableInfo};
use quarry_plugin::{EngineRegistry, ExecutorMeta, SelectNextHook, Session};
use tracing::{debug, trace, warn};

use crate::scan::OpenReader;
use crate::state::ExecState;
use crate::Executor;

/// Filtered scan that pushes its predicates down to the engine
pub struct SelectionExecutor {
    registry: Arc<EngineRegistry>,
    engine: String,
    table: Arc<TableInfo>,
    schema: Schema,
    columns: Vec<ColumnInfo>,
    predicates: Vec<Expr>,
    state: ExecState,
    next_hook: Option<SelectNextHook>,
    reader: Option<OpenReader>,
}

impl SelectionExecutor {
    /// Scan `table` through `engine`, emitting `schema` and pushing down
    /// `predicates`
    pub fn new(
        registry: Arc<EngineRegistry>,
        engine: impl Into<String>,
        table: Arc<TableInfo>,
        schema: Schema,
        predicates: Vec<Expr>,
    ) -> Self {
        let columns = schema.columns().to_vec();
        Self {
            registry,
            engine: engine.into(),
            table,
            schema,
            columns,
            predicates,
            state: ExecState::Unopened,
            next_hook: None,
            reader: None,
        }
    }

    /// Narrow the columns reported to the engine as requested
    pub fn with_requested_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    /// Predicates pushed to the engine
    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
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

impl Executor for SelectionExecutor {
    fn open(&mut self, ctx: &ExecContext) -> Result<()> {
        if self.state != ExecState::Unopened {
            return Err(self.state.misuse("selection", "open"));
        }

        let manifest = self.registry.get(&self.engine)?;
        let next_hook = manifest
            .on_select_reader_next
            .clone()
            .ok_or_else(|| Error::missing_hook(manifest.name(), "on_select_reader_next"))?;

        let meta = ExecutorMeta::new(
            manifest.name(),
            Arc::clone(&self.table),
            self.schema.clone(),
            self.columns.clone(),
        );

        let opened = match (&manifest.on_select_reader_open, &manifest.on_reader_open) {
            (Some(open), _) => open(ctx, self.predicates.as_slice(), &meta),
            // No pushdown prepare step: fall back to the plain reader open
            (None, Some(open)) => open(ctx, &meta),
            (None, None) => Ok(Session::empty()),
        };
        let session = opened.map_err(|e| {
            warn!(target: "quarry::executor", executor = %meta.id(), engine = %meta.engine(), error = %e, "Selection open failed");
            e
        })?;

        debug!(
            target: "quarry::executor",
            executor = %meta.id(),
            engine = %meta.engine(),
            table = %meta.table().name,
            predicates = self.predicates.len(),
            "Selection opened"
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
            state => return Err(state.misuse("selection", "next")),
        }
        let (Some(next), Some(reader)) = (&self.next_hook, self.reader.as_mut()) else {
            return Err(self.state.misuse("selection", "next"));
        };

        batch.reset();
        if let Err(e) = next(ctx, batch, self.predicates.as_slice(), &reader.meta, &mut reader.session) {
            warn!(target: "quarry::executor", executor = %reader.meta.id(), engine = %reader.meta.engine(), error = %e, "on_select_reader_next failed");
            return Err(e);
        }

        if batch.is_empty() {
            trace!(target: "quarry::executor", executor = %reader.meta.id(), "Selection exhausted");
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
