//! Lifecycle properties over arbitrary data sizes and batch capacities, and
//! search pushdown checked against the in-process predicate evaluator

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use quarry::engines::memory::{self, MemoryRecord};
use quarry::engines::predicate;
use quarry::engines::search::{self, SearchIndex};
use quarry::{
    collect_rows, EngineRegistry, ExecContext, Executor, Expr, FieldType, ScanExecutor, Schema,
    SelectionExecutor, TableInfo, Value,
};

fn registry_with_records(n: i64) -> Arc<EngineRegistry> {
    let records = (0..n)
        .map(|i| MemoryRecord::new().with("id", i).with("bucket", i % 3))
        .collect();
    let registry = EngineRegistry::new();
    registry.register(memory::manifest("mem", records)).unwrap();
    Arc::new(registry)
}

fn table() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new("t")
            .column("id", FieldType::Int)
            .column("bucket", FieldType::Int)
            .engine("mem"),
    )
}

use crate::common::select_all;

// ============================================================================
// Search predicate generators
// ============================================================================

fn search_registry() -> Arc<EngineRegistry> {
    let registry = EngineRegistry::new();
    registry
        .register(search::manifest(Arc::new(SearchIndex::seeded())))
        .unwrap();
    Arc::new(registry)
}

fn logs_table() -> Arc<TableInfo> {
    Arc::new(
        TableInfo::new("logs")
            .column("id", FieldType::Int)
            .column("body", FieldType::String)
            .engine(search::ENGINE_NAME),
    )
}

fn search_operand() -> impl Strategy<Value = Expr> {
    prop_oneof![
        Just(Expr::column("id")),
        Just(Expr::column("body")),
        prop::sample::select(vec!["$.status", "$.IP", "$.message", "$.region"]).prop_map(|path| {
            Expr::call("json_extract", vec![Expr::column("body"), Expr::literal(path)])
        }),
    ]
}

fn search_literal() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..12).prop_map(Value::Int),
        prop::sample::select(vec![200i64, 401, 500]).prop_map(Value::Int),
        Just(Value::Float(2.0)),
        Just(Value::Bool(true)),
        prop::sample::select(vec![
            "1",
            "500",
            "1.0.0.2%",
            "%Error%",
            "ip:%",
            "2.0.0._2_",
            "%*%",
            "access web",
        ])
        .prop_map(Value::from),
    ]
}

fn search_leaf() -> impl Strategy<Value = Expr> {
    let ops = prop::sample::select(vec!["eq", "ne", "lt", "le", "gt", "ge", "like"]);
    prop_oneof![
        (ops, search_operand(), search_literal(), any::<bool>()).prop_map(
            |(op, field, lit, flipped)| {
                let lit = Expr::literal(lit);
                let args = if flipped { vec![lit, field] } else { vec![field, lit] };
                Expr::call(op, args)
            }
        ),
        (search_operand(), prop::collection::vec(search_literal(), 0..3)).prop_map(
            |(field, lits)| {
                let mut args = vec![field];
                args.extend(lits.into_iter().map(Expr::literal));
                Expr::call("in", args)
            }
        ),
        search_operand().prop_map(|field| Expr::call("isnull", vec![field])),
    ]
}

fn search_predicate() -> impl Strategy<Value = Expr> {
    search_leaf().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(|args| Expr::call("and", args)),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|args| Expr::call("or", args)),
            inner.prop_map(|e| Expr::call("not", vec![e])),
        ]
    })
}

proptest! {
    #[test]
    fn prop_scan_yields_every_record_then_stays_empty(
        n in 0i64..40,
        capacity in 1usize..8,
        extra_calls in 1usize..4,
    ) {
        let ctx = ExecContext::new();
        let mut scan = ScanExecutor::for_table(registry_with_records(n), table()).unwrap();
        scan.open(&ctx).unwrap();
        let mut batch = scan.new_batch(capacity);

        let rows = collect_rows(&mut scan, &ctx, &mut batch).unwrap();
        let ids: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();
        prop_assert_eq!(ids, (0..n).collect::<Vec<_>>());

        for _ in 0..extra_calls {
            scan.next(&ctx, &mut batch).unwrap();
            prop_assert!(batch.is_empty());
        }
        scan.close().unwrap();
    }

    #[test]
    fn prop_filtered_rows_are_subset_of_scan(
        n in 0i64..30,
        wanted in prop::collection::vec(0i64..40, 0..4),
        bucket in proptest::option::of(0i64..3),
        capacity in 1usize..6,
    ) {
        let registry = registry_with_records(n);
        let ctx = ExecContext::new();

        let mut scan = ScanExecutor::for_table(registry.clone(), table()).unwrap();
        scan.open(&ctx).unwrap();
        let mut batch = scan.new_batch(capacity);
        let all = collect_rows(&mut scan, &ctx, &mut batch).unwrap();

        let mut predicates = Vec::new();
        if !wanted.is_empty() {
            let mut args = vec![Expr::column("id")];
            args.extend(wanted.iter().map(|w| Expr::literal(*w)));
            predicates.push(Expr::call("in", args));
        }
        if let Some(b) = bucket {
            predicates.push(Expr::eq("bucket", b));
        }

        let t = table();
        let schema = Schema::from_table(&t);
        let mut sel = SelectionExecutor::new(registry, "mem", t, schema, predicates);
        sel.open(&ctx).unwrap();
        let mut batch = sel.new_batch(capacity);
        let filtered = collect_rows(&mut sel, &ctx, &mut batch).unwrap();

        for row in &filtered {
            prop_assert!(all.contains(row));
            if let Some(b) = bucket {
                prop_assert_eq!(&row[1], &Value::Int(b));
            }
        }
        if wanted.is_empty() && bucket.is_none() {
            prop_assert_eq!(filtered.len(), all.len());
        }
    }

    #[test]
    fn prop_search_pushdown_keeps_every_matching_document(
        predicates in prop::collection::vec(search_predicate(), 0..3),
        capacity in 1usize..5,
    ) {
        let rows = select_all(&search_registry(), &logs_table(), predicates.clone(), capacity).unwrap();
        let returned: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();

        for doc in SearchIndex::seeded().docs() {
            let record: BTreeMap<String, Value> = [
                ("id".to_string(), Value::Int(doc.id)),
                ("body".to_string(), Value::from(doc.body.as_str())),
            ]
            .into_iter()
            .collect();
            let kept = predicates
                .iter()
                .all(|p| predicate::truth(p, &record) == Some(true));
            if kept {
                prop_assert!(
                    returned.contains(&doc.id),
                    "document {} dropped for {:?}",
                    doc.id,
                    predicates
                );
            }
        }
    }
}
