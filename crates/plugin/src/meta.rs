//! Per-operation executor context
//!
//! An [`ExecutorMeta`] is built once when an executor opens and is passed by
//! reference to every hook call that executor makes. It is never shared
//! between executors.

use std::sync::Arc;

use quarry_core::{ColumnInfo, RowBatch, Schema, TableInfo, Value};
use uuid::Uuid;

/// Target table, output schema and requested columns of one executor
#[derive(Debug, Clone)]
pub struct ExecutorMeta {
    id: Uuid,
    engine: String,
    table: Arc<TableInfo>,
    schema: Schema,
    columns: Vec<ColumnInfo>,
}

impl ExecutorMeta {
    /// Build the context for a new executor instance
    pub fn new(
        engine: impl Into<String>,
        table: Arc<TableInfo>,
        schema: Schema,
        columns: Vec<ColumnInfo>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine: engine.into(),
            table,
            schema,
            columns,
        }
    }

    /// Unique id of the executor instance, attached to its log events
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Engine name the executor resolved
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Target table descriptor
    pub fn table(&self) -> &TableInfo {
        &self.table
    }

    /// Engine-visible output schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Columns the query actually requested
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Check if the query requested the named column
    pub fn is_requested(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.is_named(name))
    }

    /// Output position of the named column, or `None` if not present
    pub fn column_offset(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Append one row to `batch` in output-schema order.
    ///
    /// `lookup` is asked for each output column's value; a column the
    /// record cannot supply becomes `Null` instead of failing the row.
    pub fn write_record<F>(&self, batch: &mut RowBatch, mut lookup: F)
    where
        F: FnMut(&ColumnInfo) -> Option<Value>,
    {
        let row = self
            .schema
            .columns()
            .iter()
            .map(|col| lookup(col).unwrap_or(Value::Null))
            .collect();
        batch.append_row(row);
    }

    /// Append one row given as `(column name, value)` pairs
    pub fn write_fields(&self, batch: &mut RowBatch, fields: &[(&str, Value)]) {
        self.write_record(batch, |col| {
            fields
                .iter()
                .find(|(name, _)| col.is_named(name))
                .map(|(_, v)| v.clone())
        });
    }

    /// An empty batch shaped for this executor's output
    pub fn new_batch(&self, capacity: usize) -> RowBatch {
        RowBatch::new(self.schema.len(), capacity)
    }
}
