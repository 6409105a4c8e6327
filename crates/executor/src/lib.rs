//! # Quarry Executor
//!
//! Executors that drive engine plugins exactly the way the host drives its
//! native storage executors: open, then repeated next, then close.
//!
//! | Executor | Hooks |
//! |----------|-------|
//! | [`ScanExecutor`] | `on_reader_open`?, `on_reader_next`, `on_reader_close`? |
//! | [`SelectionExecutor`] | `on_select_reader_open`?, `on_select_reader_next`, `on_reader_close`? |
//! | [`InsertExecutor`] | `on_insert_open`, `on_insert_next`, `on_insert_close` |
//! | [`DdlNotifier`] | `on_create_table`?, `on_drop_table`? |
//!
//! Each executor resolves its engine from the [`quarry_plugin::EngineRegistry`]
//! at open time and builds one [`quarry_plugin::ExecutorMeta`] that it passes to
//! every hook until close. Engine state lives in the executor's
//! [`quarry_plugin::Session`], never in the engine.
//!
//! ## Quick Start
//!
//! ```text
//! let mut scan = ScanExecutor::for_table(registry.clone(), table.clone())?;
//! scan.open(&ctx)?;
//! let mut batch = scan.new_batch(1024);
//! loop {
//!     scan.next(&ctx, &mut batch)?;
//!     if batch.is_empty() { break; }
//!     // consume batch
//! }
//! scan.close()?;
//! ```

#![warn(missing_docs)]

mod ddl;
mod insert;
mod scan;
mod selection;
mod state;

#[cfg(test)]
mod tests;

pub use ddl::{DdlEvent, DdlNotifier, DdlOutcome};
pub use insert::InsertExecutor;
pub use scan::ScanExecutor;
pub use selection::SelectionExecutor;
pub use state::ExecState;

use quarry_core::{ExecContext, Result, RowBatch, Value};

/// Volcano-style read executor
pub trait Executor {
    /// Resolve the engine, build the executor context and prepare the engine
    fn open(&mut self, ctx: &ExecContext) -> Result<()>;

    /// Reset `batch` and fill it with the next rows; an empty batch means
    /// end-of-data, and every later call yields an empty batch again
    fn next(&mut self, ctx: &ExecContext, batch: &mut RowBatch) -> Result<()>;

    /// Release the engine's state; always succeeds
    fn close(&mut self) -> Result<()>;
}

/// Pull every remaining row out of an opened executor
///
/// Stops at the first empty batch. Does not close the executor.
pub fn collect_rows<E: Executor + ?Sized>(
    exec: &mut E,
    ctx: &ExecContext,
    batch: &mut RowBatch,
) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    loop {
        exec.next(ctx, batch)?;
        if batch.is_empty() {
            return Ok(rows);
        }
        rows.extend(batch.rows());
    }
}
