//! Common test utilities for engine protocol tests

use std::sync::Arc;

use quarry::engines::{self, FileEngineConfig};
use quarry::{
    collect_rows, EngineRegistry, ExecContext, Executor, Expr, FieldType, InsertExecutor,
    ScanExecutor, Schema, SelectionExecutor, TableInfo, Value,
};
use tempfile::TempDir;
use tracing_subscriber::filter::LevelFilter;

/// Route engine and executor logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Registry with every reference engine; the file engine stores in a
/// fresh temp dir that lives as long as the returned guard
pub fn create_registry() -> (TempDir, Arc<EngineRegistry>) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let registry = EngineRegistry::new();
    for m in engines::builtin_manifests(FileEngineConfig::new(dir.path())) {
        registry.register(m).unwrap();
    }
    (dir, Arc::new(registry))
}

/// `events(id INT, name STRING)` stored by `engine`
pub fn events_table(engine: &str) -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new("events")
            .column("id", FieldType::Int)
            .column("name", FieldType::String)
            .engine(engine),
    )
}

/// A literal insert row
pub fn row(id: i64, name: &str) -> Vec<Expr> {
    vec![Expr::literal(id), Expr::literal(name)]
}

/// Insert `rows` in one statement
pub fn insert(registry: &Arc<EngineRegistry>, table: &Arc<TableInfo>, rows: &[Vec<Expr>]) -> quarry::Result<usize> {
    InsertExecutor::for_table(registry.clone(), table.clone())?.execute(&ExecContext::new(), rows)
}

/// Every row of `table`, in engine order
pub fn scan_all(registry: &Arc<EngineRegistry>, table: &Arc<TableInfo>, capacity: usize) -> quarry::Result<Vec<Vec<Value>>> {
    let ctx = ExecContext::new();
    let mut scan = ScanExecutor::for_table(registry.clone(), table.clone())?;
    scan.open(&ctx)?;
    let mut batch = scan.new_batch(capacity);
    let rows = collect_rows(&mut scan, &ctx, &mut batch);
    scan.close()?;
    rows
}

/// Rows of `table` the engine returns for `predicates`
pub fn select_all(
    registry: &Arc<EngineRegistry>,
    table: &Arc<TableInfo>,
    predicates: Vec<Expr>,
    capacity: usize,
) -> quarry::Result<Vec<Vec<Value>>> {
    let ctx = ExecContext::new();
    let engine = table.engine.clone().unwrap_or_default();
    let schema = Schema::from_table(table);
    let mut sel = SelectionExecutor::new(registry.clone(), engine, table.clone(), schema, predicates);
    sel.open(&ctx)?;
    let mut batch = sel.new_batch(capacity);
    let rows = collect_rows(&mut sel, &ctx, &mut batch);
    sel.close()?;
    rows
}
