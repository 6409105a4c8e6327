//! File-backed engine
//!
//! Each table lives in `<data_dir>/<lower table name>.log`, one JSON array
//! per line holding the row's values in table column order.
//!
//! | Hook | Effect |
//! |------|--------|
//! | `on_create_table` | create (or truncate) the data file |
//! | `on_drop_table` | remove the data file |
//! | `on_insert_*` | append coerced rows; close syncs and reports the result |
//! | `on_reader_*` | stream lines back, converting by column type |
//!
//! Each table has a reader/writer lock. Writers hold it exclusively for the
//! duration of each `on_insert_next` call, so rows of one call stay
//! contiguous; readers hold it shared for each `on_reader_next` call, so a
//! reader never sees a half-written line.
//!
//! Values the file cannot hold exactly are rejected at insert with
//! [`Error::Column`] rather than stored altered: non-finite floats, and
//! whole floats outside the `i64` range bound for an INT column.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use quarry_core::{ColumnInfo, Error, ExecContext, Expr, FieldType, Result, RowBatch, TableInfo, Value};
use quarry_plugin::{EngineManifest, ExecutorMeta, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, info};

/// Default engine name
pub const ENGINE_NAME: &str = "file";

/// Where the engine keeps its data files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEngineConfig {
    /// Directory holding one `.log` file per table
    pub data_dir: PathBuf,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir(),
        }
    }
}

impl FileEngineConfig {
    /// Keep data files under `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Data file of `table`
    pub fn table_path(&self, table: &TableInfo) -> PathBuf {
        self.data_dir.join(format!("{}.log", table.lower_name()))
    }
}

struct Writer {
    path: PathBuf,
    out: BufWriter<File>,
    lock: Arc<RwLock<()>>,
    rows: usize,
}

struct Reader {
    lines: Lines<BufReader<File>>,
    lock: Arc<RwLock<()>>,
    line_no: usize,
}

/// The engine's shared state: configuration and per-table locks
#[derive(Debug, Default)]
pub struct FileEngine {
    config: FileEngineConfig,
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl FileEngine {
    /// Engine over `config`
    pub fn new(config: FileEngineConfig) -> Self {
        Self {
            config,
            locks: DashMap::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &FileEngineConfig {
        &self.config
    }

    fn table_lock(&self, table: &TableInfo) -> Arc<RwLock<()>> {
        self.locks
            .entry(table.lower_name())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Create an empty data file for `table`
    pub fn create_table(&self, table: &TableInfo) -> Result<()> {
        fs::create_dir_all(&self.config.data_dir)?;
        let path = self.config.table_path(table);
        File::create(&path)?;
        info!(target: "quarry::engine", table = %table.name, path = %path.display(), "Data file created");
        Ok(())
    }

    /// Remove the data file of `table`
    pub fn drop_table(&self, table: &TableInfo) -> Result<()> {
        let path = self.config.table_path(table);
        fs::remove_file(&path)?;
        self.locks.remove(&table.lower_name());
        info!(target: "quarry::engine", table = %table.name, path = %path.display(), "Data file removed");
        Ok(())
    }

    fn open_writer(&self, meta: &ExecutorMeta) -> Result<Writer> {
        let path = self.config.table_path(meta.table());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Writer {
            path,
            out: BufWriter::new(file),
            lock: self.table_lock(meta.table()),
            rows: 0,
        })
    }

    fn open_reader(&self, meta: &ExecutorMeta) -> Result<Reader> {
        let file = File::open(self.config.table_path(meta.table()))?;
        Ok(Reader {
            lines: BufReader::new(file).lines(),
            lock: self.table_lock(meta.table()),
            line_no: 0,
        })
    }

    /// Manifest exposing this engine's hooks
    pub fn manifest(self: Arc<Self>) -> EngineManifest {
        let (create, remove, insert_open) = (self.clone(), self.clone(), self.clone());
        let reader_open = self;

        EngineManifest::new(ENGINE_NAME, 1)
            .with_create_table(move |table| create.create_table(table))
            .with_drop_table(move |table| remove.drop_table(table))
            .with_insert_open(move |_ctx, meta| Ok(Session::new(insert_open.open_writer(meta)?)))
            .with_insert_next(|ctx, rows, meta, session| {
                let writer = session
                    .get_mut::<Writer>()
                    .ok_or_else(|| Error::backend(meta.engine(), "insert next without open writer"))?;
                write_rows(ctx, writer, rows, meta.table())
            })
            .with_insert_close(|meta, session| {
                let Some(mut writer) = session.into_inner::<Writer>() else {
                    return Err(Error::backend(meta.engine(), "insert close without open writer"));
                };
                writer.out.flush()?;
                writer.out.get_ref().sync_all()?;
                debug!(target: "quarry::engine", executor = %meta.id(), path = %writer.path.display(), rows = writer.rows, "Data file synced");
                Ok(())
            })
            .with_reader_open(move |_ctx, meta| Ok(Session::new(reader_open.open_reader(meta)?)))
            .with_reader_next(|ctx, batch, meta, session| {
                let reader = session
                    .get_mut::<Reader>()
                    .ok_or_else(|| Error::backend(meta.engine(), "reader next without open file"))?;
                read_rows(ctx, reader, batch, meta)
            })
            .with_reader_close(|meta, _session| {
                debug!(target: "quarry::engine", executor = %meta.id(), "Data file closed");
            })
    }
}

/// Manifest for a file engine over `config`
pub fn manifest(config: FileEngineConfig) -> EngineManifest {
    Arc::new(FileEngine::new(config)).manifest()
}

// ============================================================================
// Writing
// ============================================================================

fn write_rows(ctx: &ExecContext, writer: &mut Writer, rows: &[Vec<Expr>], table: &TableInfo) -> Result<()> {
    ctx.check()?;
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        lines.push(encode_row(row, &table.columns)?);
    }

    let _guard = writer.lock.write();
    for line in &lines {
        writer.out.write_all(line.as_bytes())?;
        writer.out.write_all(b"\n")?;
    }
    writer.out.flush()?;
    writer.rows += lines.len();
    Ok(())
}

fn encode_row(row: &[Expr], columns: &[ColumnInfo]) -> Result<String> {
    if row.len() != columns.len() {
        return Err(Error::Column {
            reason: format!("row has {} values, table has {} columns", row.len(), columns.len()),
        });
    }
    let fields = row
        .iter()
        .zip(columns)
        .map(|(expr, col)| {
            let value = expr.as_literal().ok_or_else(|| Error::Column {
                reason: format!("column '{}': cannot store non-constant {}", col.name, expr),
            })?;
            coerce(value, col).and_then(|v| to_json(&v, col))
        })
        .collect::<Result<Vec<_>>>()?;
    serde_json::to_string(&fields).map_err(|e| Error::Serialization(e.to_string()))
}

/// Convert `value` to the declared type of `col`
pub fn coerce(value: &Value, col: &ColumnInfo) -> Result<Value> {
    let mismatch = || Error::Column {
        reason: format!("column '{}': cannot store {} as {:?}", col.name, value, col.field_type),
    };
    let coerced = match (col.field_type, value) {
        (_, Value::Null) => Value::Null,
        (FieldType::Int, Value::Int(i)) => Value::Int(*i),
        // 2^63 is exact in f64; anything at or past it would saturate
        (FieldType::Int, Value::Float(f))
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Value::Int(*f as i64)
        }
        (FieldType::Int, Value::Bool(b)) => Value::Int(i64::from(*b)),
        (FieldType::Int, Value::String(s)) => Value::Int(s.trim().parse().map_err(|_| mismatch())?),
        (FieldType::Float, Value::Float(f)) => Value::Float(*f),
        (FieldType::Float, Value::Int(i)) => Value::Float(*i as f64),
        (FieldType::Float, Value::String(s)) => Value::Float(s.trim().parse().map_err(|_| mismatch())?),
        (FieldType::Bool, Value::Bool(b)) => Value::Bool(*b),
        (FieldType::Bool, Value::Int(i)) => Value::Bool(*i != 0),
        (FieldType::Bool, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return Err(mismatch()),
        },
        (FieldType::String, Value::String(s)) => Value::String(s.clone()),
        (FieldType::String, Value::Bytes(b)) => {
            Value::String(String::from_utf8(b.clone()).map_err(|_| mismatch())?)
        }
        (FieldType::String, other) => Value::String(other.to_string()),
        (FieldType::Bytes, Value::Bytes(b)) => Value::Bytes(b.clone()),
        (FieldType::Bytes, Value::String(s)) => Value::Bytes(s.clone().into_bytes()),
        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

fn to_json(value: &Value, col: &ColumnInfo) -> Result<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| Error::Column {
                reason: format!("column '{}': cannot store non-finite float {}", col.name, f),
            })?,
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
    };
    Ok(json)
}

// ============================================================================
// Reading
// ============================================================================

fn read_rows(ctx: &ExecContext, reader: &mut Reader, batch: &mut RowBatch, meta: &ExecutorMeta) -> Result<()> {
    ctx.check()?;
    let lock = Arc::clone(&reader.lock);
    let _guard = lock.read();
    while !batch.is_full() {
        let Some(line) = reader.lines.next() else { break };
        let line = line?;
        reader.line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<Json> = serde_json::from_str(&line).map_err(|e| {
            Error::Serialization(format!("{} line {}: {}", meta.table().lower_name(), reader.line_no, e))
        })?;
        meta.write_record(batch, |col| {
            Some(fields.get(col.offset).map_or(Value::Null, |f| from_json(f, col.field_type)))
        });
    }
    Ok(())
}

/// Convert a stored field to `field_type`; anything unparsable is `Null`
fn from_json(field: &Json, field_type: FieldType) -> Value {
    let parsed = match (field_type, field) {
        (FieldType::Int, Json::Number(n)) => n.as_i64().map(Value::Int),
        (FieldType::Int, Json::String(s)) => s.trim().parse().ok().map(Value::Int),
        (FieldType::Float, Json::Number(n)) => n.as_f64().map(Value::Float),
        (FieldType::Float, Json::String(s)) => s.trim().parse().ok().map(Value::Float),
        (FieldType::Bool, Json::Bool(b)) => Some(Value::Bool(*b)),
        (FieldType::String, Json::String(s)) => Some(Value::String(s.clone())),
        (FieldType::String, Json::Number(n)) => Some(Value::String(n.to_string())),
        (FieldType::Bytes, Json::Array(items)) => items
            .iter()
            .map(|x| x.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Value::Bytes),
        _ => None,
    };
    parsed.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Schema;
    use tempfile::TempDir;

    fn table() -> TableInfo {
        TableInfo::new("Events")
            .column("id", FieldType::Int)
            .column("name", FieldType::String)
            .column("score", FieldType::Float)
            .engine(ENGINE_NAME)
    }

    fn meta(table: &TableInfo) -> ExecutorMeta {
        let schema = Schema::from_table(table);
        ExecutorMeta::new(ENGINE_NAME, Arc::new(table.clone()), schema, table.columns.clone())
    }

    fn setup() -> (TempDir, Arc<FileEngine>, EngineManifest) {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(FileEngine::new(FileEngineConfig::new(dir.path())));
        let manifest = engine.clone().manifest();
        (dir, engine, manifest)
    }

    fn row(id: i64, name: &str, score: f64) -> Vec<Expr> {
        vec![Expr::literal(id), Expr::literal(name), Expr::literal(score)]
    }

    fn insert(m: &EngineManifest, meta: &ExecutorMeta, rows: &[Vec<Expr>]) -> Result<()> {
        let ctx = ExecContext::new();
        let mut session = (m.on_insert_open.as_ref().unwrap())(&ctx, meta)?;
        let written = (m.on_insert_next.as_ref().unwrap())(&ctx, rows, meta, &mut session);
        let closed = (m.on_insert_close.as_ref().unwrap())(meta, session);
        written.and(closed)
    }

    fn scan(m: &EngineManifest, meta: &ExecutorMeta, capacity: usize) -> Result<Vec<Vec<Value>>> {
        let ctx = ExecContext::new();
        let mut session = (m.on_reader_open.as_ref().unwrap())(&ctx, meta)?;
        let next = m.on_reader_next.as_ref().unwrap();
        let mut batch = meta.new_batch(capacity);
        let mut rows = Vec::new();
        loop {
            batch.reset();
            next(&ctx, &mut batch, meta, &mut session)?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch.rows());
        }
        (m.on_reader_close.as_ref().unwrap())(meta, session);
        Ok(rows)
    }

    #[test]
    fn test_manifest_capabilities() {
        let (_dir, _engine, m) = setup();
        m.check().unwrap();
        assert!(m.supports_scan());
        assert!(m.supports_insert());
        assert!(m.supports_ddl());
        assert!(!m.supports_pushdown());
    }

    #[test]
    fn test_create_makes_empty_lowercase_file() {
        let (dir, engine, m) = setup();
        let t = table();
        (m.on_create_table.as_ref().unwrap())(&t).unwrap();

        let path = dir.path().join("events.log");
        assert!(path.is_file());
        assert_eq!(engine.config().table_path(&t), path);
        assert_eq!(fs::read_to_string(path).unwrap(), "");
        assert!(scan(&m, &meta(&t), 4).unwrap().is_empty());
    }

    #[test]
    fn test_insert_then_scan_in_order() {
        let (_dir, _engine, m) = setup();
        let t = table();
        let meta = meta(&t);
        (m.on_create_table.as_ref().unwrap())(&t).unwrap();

        insert(&m, &meta, &[row(1, "a", 0.5), row(2, "b", 1.5)]).unwrap();
        insert(&m, &meta, &[row(3, "c", 2.0)]).unwrap();

        let rows = scan(&m, &meta, 2).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::from("a"), Value::Float(0.5)],
                vec![Value::Int(2), Value::from("b"), Value::Float(1.5)],
                vec![Value::Int(3), Value::from("c"), Value::Float(2.0)],
            ]
        );
    }

    #[test]
    fn test_insert_coerces_to_column_types() {
        let (_dir, _engine, m) = setup();
        let t = table();
        let meta = meta(&t);

        let rows = vec![vec![Expr::literal("42"), Expr::literal(7), Expr::literal(3)]];
        insert(&m, &meta, &rows).unwrap();

        assert_eq!(
            scan(&m, &meta, 8).unwrap(),
            vec![vec![Value::Int(42), Value::from("7"), Value::Float(3.0)]]
        );
    }

    #[test]
    fn test_insert_rejects_bad_rows() {
        let (_dir, _engine, m) = setup();
        let t = table();
        let meta = meta(&t);

        let short = vec![vec![Expr::literal(1)]];
        assert!(matches!(insert(&m, &meta, &short), Err(Error::Column { .. })));

        let bad_int = vec![vec![Expr::literal("seven"), Expr::literal("x"), Expr::literal(1.0)]];
        assert!(matches!(insert(&m, &meta, &bad_int), Err(Error::Column { .. })));

        let non_constant = vec![vec![Expr::column("id"), Expr::literal("x"), Expr::literal(1.0)]];
        assert!(matches!(insert(&m, &meta, &non_constant), Err(Error::Column { .. })));
    }

    #[test]
    fn test_unparsable_fields_read_as_null() {
        let (dir, _engine, m) = setup();
        let t = table();
        fs::write(dir.path().join("events.log"), "[\"x\", 5, \"nan?\"]\n\n[7]\n").unwrap();

        assert_eq!(
            scan(&m, &meta(&t), 8).unwrap(),
            vec![
                vec![Value::Null, Value::from("5"), Value::Null],
                vec![Value::Int(7), Value::Null, Value::Null],
            ]
        );
    }

    #[test]
    fn test_malformed_line_is_serialization_error() {
        let (dir, _engine, m) = setup();
        fs::write(dir.path().join("events.log"), "not json\n").unwrap();

        let err = scan(&m, &meta(&table()), 8).unwrap_err();
        assert!(matches!(err, Error::Serialization(ref msg) if msg.contains("line 1")));
    }

    #[test]
    fn test_open_missing_file_is_not_found() {
        let (_dir, _engine, m) = setup();
        let err = scan(&m, &meta(&table()), 8).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_drop_removes_file() {
        let (dir, _engine, m) = setup();
        let t = table();
        (m.on_create_table.as_ref().unwrap())(&t).unwrap();
        (m.on_drop_table.as_ref().unwrap())(&t).unwrap();

        assert!(!dir.path().join("events.log").exists());
        let err = (m.on_drop_table.as_ref().unwrap())(&t).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_projection_reads_by_table_offset() {
        let (_dir, _engine, m) = setup();
        let t = table();
        insert(&m, &meta(&t), &[row(1, "a", 0.5)]).unwrap();

        let schema = Schema::project(&t, &["score", "id"]).unwrap();
        let projected = ExecutorMeta::new(ENGINE_NAME, Arc::new(t.clone()), schema.clone(), schema.columns().to_vec());
        assert_eq!(
            scan(&m, &projected, 8).unwrap(),
            vec![vec![Value::Float(0.5), Value::Int(1)]]
        );
    }

    #[test]
    fn test_concurrent_writers_keep_rows_whole() {
        let (_dir, _engine, m) = setup();
        let t = table();
        let m = Arc::new(m);

        let handles: Vec<_> = (0..4)
            .map(|w| {
                let m = Arc::clone(&m);
                let meta = meta(&t);
                std::thread::spawn(move || {
                    let rows: Vec<_> = (0..25).map(|i| row(w * 100 + i, "w", 1.0)).collect();
                    insert(&m, &meta, &rows).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rows = scan(&m, &meta(&t), 16).unwrap();
        assert_eq!(rows.len(), 100);
        assert!(rows.iter().all(|r| r[0].as_int().is_some()));
    }

    #[test]
    fn test_non_finite_float_rejected_not_nulled() {
        let (_dir, _engine, m) = setup();
        let t = table();
        let meta = meta(&t);
        (m.on_create_table.as_ref().unwrap())(&t).unwrap();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = insert(&m, &meta, &[row(1, "a", bad)]).unwrap_err();
            assert!(matches!(err, Error::Column { ref reason } if reason.contains("non-finite")));
        }
        assert!(scan(&m, &meta, 4).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_float_not_saturated() {
        let col = ColumnInfo::new("c", 0, FieldType::Int);
        assert!(matches!(coerce(&Value::Float(1e30), &col), Err(Error::Column { .. })));
        assert!(coerce(&Value::Float(-1e19), &col).is_err());
        assert!(coerce(&Value::Float(9_223_372_036_854_775_808.0), &col).is_err());
        assert_eq!(
            coerce(&Value::Float(-9_223_372_036_854_775_808.0), &col).unwrap(),
            Value::Int(i64::MIN)
        );
        assert!(coerce(&Value::Float(f64::INFINITY), &col).is_err());
    }

    #[test]
    fn test_reader_never_sees_partial_lines() {
        let (_dir, _engine, m) = setup();
        let t = table();
        (m.on_create_table.as_ref().unwrap())(&t).unwrap();
        let m = Arc::new(m);

        let writer = {
            let m = Arc::clone(&m);
            let meta = meta(&t);
            std::thread::spawn(move || {
                let long = "x".repeat(4096);
                for i in 0..50 {
                    insert(&m, &meta, &[row(i, &long, 1.0), row(i, &long, 2.0)]).unwrap();
                }
            })
        };
        for _ in 0..50 {
            let rows = scan(&m, &meta(&t), 3).unwrap();
            assert_eq!(rows.len() % 2, 0);
            assert!(rows.iter().all(|r| r[0].as_int().is_some()));
        }
        writer.join().unwrap();
        assert_eq!(scan(&m, &meta(&t), 16).unwrap().len(), 100);
    }

    #[test]
    fn test_coerce() {
        let col = |ft| ColumnInfo::new("c", 0, ft);
        assert_eq!(coerce(&Value::Float(2.0), &col(FieldType::Int)).unwrap(), Value::Int(2));
        assert!(coerce(&Value::Float(2.5), &col(FieldType::Int)).is_err());
        assert_eq!(coerce(&Value::from("TRUE"), &col(FieldType::Bool)).unwrap(), Value::Bool(true));
        assert_eq!(coerce(&Value::Null, &col(FieldType::Bool)).unwrap(), Value::Null);
        assert_eq!(coerce(&Value::from("ab"), &col(FieldType::Bytes)).unwrap(), Value::Bytes(b"ab".to_vec()));
        assert!(coerce(&Value::Bool(true), &col(FieldType::Bytes)).is_err());
    }
}
