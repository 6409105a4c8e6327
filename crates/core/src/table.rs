//! Table descriptors and output schemas
//!
//! [`TableInfo`] is what the host's catalog hands to the plugin layer for
//! a table created with an `engine = <name>` designator. [`Schema`] is the
//! ordered set of columns an executor emits, which may be a projection of
//! the table's columns.
//!
//! Column and table names compare case-insensitively, matching SQL
//! identifier rules.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declared column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// UTF-8 text
    String,
    /// Boolean
    Bool,
    /// Raw bytes
    Bytes,
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name as declared
    pub name: String,
    /// Position in the table definition
    pub offset: usize,
    /// Declared type
    pub field_type: FieldType,
}

impl ColumnInfo {
    /// Create a column descriptor
    pub fn new(name: impl Into<String>, offset: usize, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            offset,
            field_type,
        }
    }

    /// Case-insensitive name match
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Table descriptor: name, column definitions and storage engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name as declared
    pub name: String,
    /// Columns in definition order
    pub columns: Vec<ColumnInfo>,
    /// Engine designator from `ENGINE = <name>`; `None` for native tables
    pub engine: Option<String>,
}

impl TableInfo {
    /// Create a table with no columns and no engine designator
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            engine: None,
        }
    }

    /// Append a column; its offset is its position in the table
    pub fn column(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let offset = self.columns.len();
        self.columns.push(ColumnInfo::new(name, offset, field_type));
        self
    }

    /// Route this table to the named engine
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Lower-cased table name, the key engines use for backing resources
    pub fn lower_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Find a column by case-insensitive name
    pub fn find_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.is_named(name))
    }
}

/// Ordered output columns of an executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    /// Build a schema from explicit columns
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Schema covering every column of the table, in definition order
    pub fn from_table(table: &TableInfo) -> Self {
        Self::new(table.columns.clone())
    }

    /// Schema projecting the named table columns, in the given order
    ///
    /// # Errors
    ///
    /// Returns [`Error::Column`] if a name is not a column of the table.
    pub fn project(table: &TableInfo, names: &[&str]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                table.find_column(name).cloned().ok_or_else(|| Error::Column {
                    reason: format!("table '{}' has no column '{}'", table.name, name),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(columns))
    }

    /// Position of the named column in this schema, or `None` if not present
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.is_named(name))
    }

    /// Columns in output order
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Number of output columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
