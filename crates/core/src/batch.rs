//! Columnar row batch
//!
//! A [`RowBatch`] is the reusable output container read hooks fill. The
//! executor resets it before every `next` call; a hook then appends zero or
//! more rows. A batch left empty after a `next` call signals end-of-data.
//!
//! Values are stored per column, so engines may append column by column
//! (`append_value`) or a whole row at once (`append_row`). A row is complete
//! once every column has received a value; `num_rows` counts complete rows.
//! The count is kept separately from the columns, so a batch with no output
//! columns (`SELECT count(*)`) still carries rows.

use crate::value::Value;

/// Reusable columnar container for rows moving out of an engine
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    columns: Vec<Vec<Value>>,
    rows: usize,
    capacity: usize,
}

impl RowBatch {
    /// Create an empty batch with `num_columns` columns.
    ///
    /// A capacity of zero is raised to one so a batch can always make progress.
    pub fn new(num_columns: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            columns: (0..num_columns).map(|_| Vec::with_capacity(capacity)).collect(),
            rows: 0,
            capacity,
        }
    }

    /// Drop every row, keeping allocations
    pub fn reset(&mut self) {
        for col in &mut self.columns {
            col.clear();
        }
        self.rows = 0;
    }

    /// Append a value to one column
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of range.
    pub fn append_value(&mut self, col: usize, value: Value) {
        self.columns[col].push(value);
        self.rows = self.columns.iter().map(Vec::len).min().unwrap_or(self.rows);
    }

    /// Append `Null` to one column
    pub fn append_null(&mut self, col: usize) {
        self.append_value(col, Value::Null);
    }

    /// Append a whole row; missing trailing values are filled with `Null`,
    /// surplus values are ignored
    pub fn append_row(&mut self, values: Vec<Value>) {
        let mut values = values.into_iter();
        for col in &mut self.columns {
            col.push(values.next().unwrap_or(Value::Null));
        }
        self.rows = match self.columns.iter().map(Vec::len).min() {
            Some(complete) => complete,
            None => self.rows + 1,
        };
    }

    /// Number of complete rows
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Check if the batch holds no complete row
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Rows an engine should aim to fill per `next` call
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if the batch has reached its capacity
    pub fn is_full(&self) -> bool {
        self.num_rows() >= self.capacity
    }

    /// Value at (`row`, `col`)
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.columns.get(col).and_then(|c| c.get(row))
    }

    /// Copy out one row
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        if row >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| c[row].clone()).collect())
    }

    /// Copy out every complete row
    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.num_rows())
            .filter_map(|i| self.row(i))
            .collect()
    }
}
