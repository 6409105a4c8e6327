//! Core types for the Quarry engine plugin protocol
//!
//! This crate defines the vocabulary shared by the plugin registry, the
//! executors and every engine plugin:
//! - Error: the error taxonomy (resolution, lifecycle, backend, data shape)
//! - Value: cell values
//! - TableInfo / ColumnInfo / Schema: table descriptors and output schemas
//! - Expr: opaque predicate and row expressions
//! - RowBatch: the reusable columnar output container
//! - ExecContext: advisory cancellation and deadline

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod context;
pub mod error;
pub mod expr;
pub mod table;
pub mod value;

pub use batch::RowBatch;
pub use context::ExecContext;
pub use error::{Error, Result};
pub use expr::Expr;
pub use table::{ColumnInfo, FieldType, Schema, TableInfo};
pub use value::Value;
