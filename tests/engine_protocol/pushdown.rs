//! Predicate pushdown across the reference engines

use std::sync::Arc;

use quarry::{
    DdlNotifier, DdlOutcome, Error, ExecContext, Expr, FieldType, InsertExecutor, TableInfo, Value,
};

use crate::common::*;

fn users_table() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new("users")
            .column("id", FieldType::Int)
            .column("name", FieldType::String)
            .column("city", FieldType::String)
            .engine("memory"),
    )
}

fn logs_table() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new("logs")
            .column("id", FieldType::Int)
            .column("body", FieldType::String)
            .engine("search"),
    )
}

fn latency_table() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new("latency")
            .column("span_kind", FieldType::String)
            .column("duration", FieldType::Int)
            .engine("metrics"),
    )
}

fn status(op: &str, code: i64) -> Expr {
    Expr::call(
        op,
        vec![
            Expr::call("json_extract", vec![Expr::column("body"), Expr::literal("$.status")]),
            Expr::literal(code),
        ],
    )
}

fn ids(rows: &[Vec<Value>]) -> Vec<i64> {
    rows.iter().filter_map(|r| r[0].as_int()).collect()
}

// ============================================================================
// Memory engine
// ============================================================================

#[test]
fn test_memory_filter_is_subset_of_scan() {
    let (_dir, registry) = create_registry();
    let table = users_table();
    let all = scan_all(&registry, &table, 3).unwrap();
    assert_eq!(all.len(), 10);

    let filters = vec![
        vec![Expr::eq("city", "Lisbon")],
        vec![Expr::call("gt", vec![Expr::column("id"), Expr::literal(6)])],
        vec![Expr::call("like", vec![Expr::column("name"), Expr::literal("user-1%")])],
        vec![Expr::eq("nonexistent", 1)],
    ];
    for predicates in filters {
        let filtered = select_all(&registry, &table, predicates.clone(), 2).unwrap();
        assert!(filtered.iter().all(|r| all.contains(r)), "{:?}", predicates);
    }

    let lisbon = select_all(&registry, &table, vec![Expr::eq("city", "Lisbon")], 2).unwrap();
    assert_eq!(ids(&lisbon), vec![1, 4, 6, 9]);
}

#[test]
fn test_memory_is_read_only() {
    let (_dir, registry) = create_registry();
    let table = users_table();

    let mut insert = InsertExecutor::for_table(registry.clone(), table.clone()).unwrap();
    let err = insert.open(&ExecContext::new()).unwrap_err();
    assert!(matches!(err, Error::MissingHook { .. }));

    let ddl = DdlNotifier::new(registry);
    assert_eq!(ddl.on_create_table(&table).unwrap(), DdlOutcome::Unhandled);
}

// ============================================================================
// Search engine
// ============================================================================

#[test]
fn test_search_scan_returns_all_documents() {
    let (_dir, registry) = create_registry();
    let rows = scan_all(&registry, &logs_table(), 4).unwrap();
    assert_eq!(ids(&rows), (1..=10).collect::<Vec<_>>());
    assert!(rows[0][1].as_str().unwrap().contains("\"IP\":\"1.0.0.202\""));
}

#[test]
fn test_search_pushes_json_predicates() {
    let (_dir, registry) = create_registry();
    let table = logs_table();

    let errors = select_all(&registry, &table, vec![status("ne", 200)], 4).unwrap();
    assert_eq!(ids(&errors), vec![1, 2, 4, 5, 7, 10]);

    let server_errors_low_ids = select_all(
        &registry,
        &table,
        vec![status("eq", 500), Expr::call("lt", vec![Expr::column("id"), Expr::literal(5)])],
        4,
    )
    .unwrap();
    assert_eq!(ids(&server_errors_low_ids), vec![1, 4]);
}

#[test]
fn test_search_untranslatable_predicate_overfetches() {
    let (_dir, registry) = create_registry();
    let table = logs_table();
    let predicates = vec![Expr::call("soundex", vec![Expr::column("body")])];

    let rows = select_all(&registry, &table, predicates, 4).unwrap();
    assert_eq!(rows.len(), 10);
}

// ============================================================================
// Metrics engine
// ============================================================================

#[test]
fn test_metrics_scan_in_source_order() {
    let (_dir, registry) = create_registry();
    let rows = scan_all(&registry, &latency_table(), 2).unwrap();
    let durations: Vec<_> = rows.iter().filter_map(|r| r[1].as_int()).collect();
    assert_eq!(durations, vec![1, 20, 300, 4, 5000]);
}

#[test]
fn test_metrics_selection_slowest_first() {
    let (_dir, registry) = create_registry();
    let predicates = vec![Expr::call("lt", vec![Expr::column("duration"), Expr::literal(1000)])];

    let rows = select_all(&registry, &latency_table(), predicates, 2).unwrap();
    let kinds: Vec<_> = rows.iter().filter_map(|r| r[0].as_str().map(str::to_string)).collect();
    assert_eq!(kinds, vec!["GET /api3", "GET /api2", "GET /api4", "GET /api1"]);
}
