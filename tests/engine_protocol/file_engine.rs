//! File engine through DDL, insert and scan executors

use std::io::ErrorKind;
use std::time::Duration;

use quarry::{
    DdlNotifier, DdlOutcome, Error, ExecContext, Executor, Expr, InsertExecutor, ScanExecutor,
    SelectionExecutor, Schema, Value,
};

use crate::common::*;

#[test]
fn test_create_insert_scan() {
    let (dir, registry) = create_registry();
    let table = events_table("file");
    let ddl = DdlNotifier::new(registry.clone());

    assert_eq!(ddl.on_create_table(&table).unwrap(), DdlOutcome::Applied);
    assert!(dir.path().join("events.log").is_file());

    insert(&registry, &table, &[row(1, "a")]).unwrap();
    insert(&registry, &table, &[row(2, "b")]).unwrap();

    let rows = scan_all(&registry, &table, 1024).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Int(2), Value::from("b")],
        ]
    );
}

#[test]
fn test_insert_then_scan_returns_same_values() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");
    DdlNotifier::new(registry.clone()).on_create_table(&table).unwrap();

    let rows: Vec<_> = (0..37).map(|i| row(i, &format!("n{}", i))).collect();
    assert_eq!(insert(&registry, &table, &rows).unwrap(), 37);

    let scanned = scan_all(&registry, &table, 5).unwrap();
    assert_eq!(scanned.len(), 37);
    for (i, r) in scanned.iter().enumerate() {
        assert_eq!(r[0], Value::Int(i as i64));
        assert_eq!(r[1], Value::String(format!("n{}", i)));
    }
}

#[test]
fn test_drop_then_scan_fails_at_open() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");
    let ddl = DdlNotifier::new(registry.clone());
    ddl.on_create_table(&table).unwrap();
    ddl.on_drop_table(&table).unwrap();

    let mut scan = ScanExecutor::for_table(registry, table).unwrap();
    let err = scan.open(&ExecContext::new()).unwrap_err();
    assert!(matches!(err, Error::Io(ref e) if e.kind() == ErrorKind::NotFound));
    scan.close().unwrap();
}

#[test]
fn test_drop_unknown_table_surfaces_error() {
    let (_dir, registry) = create_registry();
    let err = DdlNotifier::new(registry).on_drop_table(&events_table("file")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_interleaved_scans_of_one_table() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");
    insert(&registry, &table, &[row(1, "a"), row(2, "b"), row(3, "c")]).unwrap();
    let ctx = ExecContext::new();

    let mut a = ScanExecutor::for_table(registry.clone(), table.clone()).unwrap();
    let mut b = ScanExecutor::for_table(registry, table).unwrap();
    a.open(&ctx).unwrap();
    b.open(&ctx).unwrap();
    let mut batch_a = a.new_batch(1);
    let mut batch_b = b.new_batch(1);

    a.next(&ctx, &mut batch_a).unwrap();
    a.next(&ctx, &mut batch_a).unwrap();
    b.next(&ctx, &mut batch_b).unwrap();

    assert_eq!(batch_a.get(0, 0), Some(&Value::Int(2)));
    assert_eq!(batch_b.get(0, 0), Some(&Value::Int(1)));
    a.close().unwrap();
    b.close().unwrap();
}

#[test]
fn test_cancelled_scan_stops() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");
    insert(&registry, &table, &[row(1, "a")]).unwrap();

    let ctx = ExecContext::new();
    let mut scan = ScanExecutor::for_table(registry, table).unwrap();
    scan.open(&ctx).unwrap();
    ctx.cancel();

    let mut batch = scan.new_batch(8);
    assert!(matches!(scan.next(&ctx, &mut batch), Err(Error::Cancelled)));
}

#[test]
fn test_expired_deadline_stops_insert() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");
    let ctx = ExecContext::new().with_timeout(Duration::ZERO);

    let mut insert = InsertExecutor::for_table(registry.clone(), table.clone()).unwrap();
    insert.open(&ctx).unwrap();
    assert!(matches!(insert.next(&ctx, &[row(1, "a")]), Err(Error::DeadlineExceeded)));
    insert.close().unwrap();

    assert!(scan_all(&registry, &table, 8).unwrap().is_empty());
}

#[test]
fn test_insert_type_error_reported() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");

    let bad = vec![vec![Expr::literal("one"), Expr::literal("a")]];
    let err = insert(&registry, &table, &bad).unwrap_err();
    assert!(matches!(err, Error::Column { .. }));
}

#[test]
fn test_file_engine_has_no_pushdown() {
    let (_dir, registry) = create_registry();
    let table = events_table("file");
    let schema = Schema::from_table(&table);
    let mut sel = SelectionExecutor::new(registry, "file", table, schema, vec![Expr::eq("id", 1)]);

    let err = sel.open(&ExecContext::new()).unwrap_err();
    assert!(matches!(err, Error::MissingHook { hook: "on_select_reader_next", .. }));
}
