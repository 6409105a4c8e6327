//! In-memory engine
//!
//! Serves one fixed, ordered list of records to every table declared with
//! this engine. Reader hooks stream the list through a per-executor cursor;
//! the select hook evaluates predicates lazily while filling each batch, so
//! it declares no open hook and the executor falls back to `on_reader_open`.
//!
//! Read-only: no insert and no DDL hooks.

use std::sync::Arc;

use quarry_core::{RowBatch, Value};
use quarry_plugin::{EngineManifest, ExecutorMeta, Session};
use tracing::trace;

use crate::predicate::{self, Record};

/// Default engine name
pub const ENGINE_NAME: &str = "memory";

/// One record: named fields in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRecord {
    fields: Vec<(String, Value)>,
}

impl MemoryRecord {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}

impl Record for MemoryRecord {
    fn field(&self, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }
}

#[derive(Debug, Default)]
struct Cursor {
    pos: usize,
}

fn write(meta: &ExecutorMeta, batch: &mut RowBatch, record: &MemoryRecord) {
    meta.write_record(batch, |col| record.field(&col.name));
}

/// Manifest serving `records` under `name`
pub fn manifest(name: &str, records: Vec<MemoryRecord>) -> EngineManifest {
    let records = Arc::new(records);
    let scan = Arc::clone(&records);
    let select = records;

    EngineManifest::new(name, 1)
        .with_reader_open(|_ctx, meta| {
            trace!(target: "quarry::engine", executor = %meta.id(), "Memory cursor opened");
            Ok(Session::new(Cursor::default()))
        })
        .with_reader_next(move |ctx, batch, meta, session| {
            ctx.check()?;
            let cursor = session.get_or_insert_with(Cursor::default);
            while !batch.is_full() {
                let Some(record) = scan.get(cursor.pos) else { break };
                write(meta, batch, record);
                cursor.pos += 1;
            }
            Ok(())
        })
        .with_select_reader_next(move |ctx, batch, predicates, meta, session| {
            ctx.check()?;
            let cursor = session.get_or_insert_with(Cursor::default);
            while !batch.is_full() {
                let Some(record) = select.get(cursor.pos) else { break };
                cursor.pos += 1;
                if predicate::matches(predicates, record) {
                    write(meta, batch, record);
                }
            }
            Ok(())
        })
        .with_reader_close(|meta, session| {
            let pos = session.into_inner::<Cursor>().map(|c| c.pos).unwrap_or(0);
            trace!(target: "quarry::engine", executor = %meta.id(), pos, "Memory cursor released");
        })
}

/// Ten seeded `(id, name, city)` records
pub fn sample_records() -> Vec<MemoryRecord> {
    let cities = ["Lisbon", "Oslo", "Quito", "Lisbon", "Accra"];
    (1..=10)
        .map(|i: i64| {
            MemoryRecord::new()
                .with("id", i)
                .with("name", format!("user-{}", i))
                .with("city", cities[(i as usize - 1) % cities.len()])
        })
        .collect()
}
