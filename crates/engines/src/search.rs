//! Search-index engine
//!
//! Adapter to a document store holding `{id, body}` documents, where `body`
//! is a JSON object. Pushed-down predicates are translated into a boolean
//! query document in the store's query DSL at select open; the store runs
//! it once and the matching hits are paginated through `next`.
//!
//! Translation covers comparisons, `like`, `in`, `isnull`, `and`, `or` and
//! `not` over `id` and `json_extract(body, '$.path')` references. A
//! predicate that cannot be translated exactly is left out of the query,
//! which can only widen the hit set. That includes anything on the raw
//! `body` column, `like` on `id`, and non-numeric literals compared with
//! `id`.
//!
//! ## Query DSL
//!
//! ```text
//! {"bool": {"filter": [..], "should": [..], "must_not": [..]}}
//! {"term": {"body.status": 500}}
//! {"terms": {"id": [1, 2]}}
//! {"range": {"id": {"gte": 3, "lt": 8}}}
//! {"wildcard": {"body.IP": "1.0.*"}}
//! {"exists": {"field": "body.message"}}
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use quarry_core::{Error, Expr, Result, RowBatch, Value};
use quarry_plugin::{EngineManifest, ExecutorMeta, Session, SysVarScope};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tracing::{debug, info};

use crate::predicate::{json_path, json_to_value, like};

/// Default engine name
pub const ENGINE_NAME: &str = "search";

/// Sys var naming the index key
pub const KEY_VAR: &str = "search_key";

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDoc {
    /// Document id
    pub id: i64,
    /// JSON object text
    pub body: String,
}

impl SearchDoc {
    /// Access-log style document for `ip` answering with `status`
    pub fn access_log(id: i64, ip: &str, status: i64) -> Self {
        let outcome = match status {
            200 => "access web",
            401 => "unauthorized",
            500 => "Server Error",
            _ => "UNKNOWN",
        };
        let body = json!({
            "status": status,
            "IP": ip,
            "message": format!("ip:{} is {}", ip, outcome),
        });
        Self {
            id,
            body: body.to_string(),
        }
    }

    /// The document as the store indexes it: `body` parsed when it is JSON
    fn source(&self) -> Json {
        let body = serde_json::from_str(&self.body).unwrap_or_else(|_| Json::String(self.body.clone()));
        json!({ "id": self.id, "body": body })
    }
}

/// In-process document store
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    docs: Vec<SearchDoc>,
}

impl SearchIndex {
    /// Index over `docs`, kept in insertion order
    pub fn new(docs: Vec<SearchDoc>) -> Self {
        Self { docs }
    }

    /// The ten seeded access-log documents
    pub fn seeded() -> Self {
        Self::new(vec![
            SearchDoc::access_log(1, "1.0.0.202", 500),
            SearchDoc::access_log(2, "2.0.0.202", 401),
            SearchDoc::access_log(3, "3.0.0.202", 200),
            SearchDoc::access_log(4, "3.0.0.201", 500),
            SearchDoc::access_log(5, "1.0.0.220", 500),
            SearchDoc::access_log(6, "1.0.0.221", 200),
            SearchDoc::access_log(7, "2.0.0.222", 500),
            SearchDoc::access_log(8, "1.0.0.224", 200),
            SearchDoc::access_log(9, "1.0.0.225", 200),
            SearchDoc::access_log(10, "2.0.0.223", 401),
        ])
    }

    /// All documents
    pub fn docs(&self) -> &[SearchDoc] {
        &self.docs
    }

    /// Run `query`, returning matching document positions in index order
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed clause.
    pub fn search(&self, query: &Json) -> std::result::Result<Vec<usize>, String> {
        let mut hits = Vec::new();
        for (pos, doc) in self.docs.iter().enumerate() {
            if eval_clause(query, &doc.source())? {
                hits.push(pos);
            }
        }
        Ok(hits)
    }
}

// ============================================================================
// Predicate translation
// ============================================================================

/// Translate `predicates` into a boolean query; untranslatable predicates
/// are dropped
pub fn build_query(predicates: &[Expr]) -> Json {
    let mut filter = Vec::new();
    for p in predicates {
        collect_filters(p, &mut filter);
    }
    if filter.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "filter": filter } })
    }
}

fn collect_filters(expr: &Expr, out: &mut Vec<Json>) {
    if expr.is_call_to("and") {
        for arg in expr.args() {
            collect_filters(arg, out);
        }
    } else if let Some(clause) = clause(expr) {
        out.push(clause);
    } else {
        debug!(target: "quarry::engine", predicate = %expr, "Predicate not pushed to search index");
    }
}

/// Exact translation of one predicate, or `None`
fn clause(expr: &Expr) -> Option<Json> {
    let name = expr.func_name()?.to_ascii_lowercase();
    let args = expr.args();
    match name.as_str() {
        "and" => {
            let all = args.iter().map(clause).collect::<Option<Vec<_>>>()?;
            Some(json!({ "bool": { "filter": all } }))
        }
        "or" => {
            let any = args.iter().map(clause).collect::<Option<Vec<_>>>()?;
            Some(json!({ "bool": { "should": any, "minimum_should_match": 1 } }))
        }
        "not" => {
            let inner = clause(args.first()?)?;
            Some(json!({ "bool": { "must_not": [inner] } }))
        }
        "isnull" => {
            let field = Field::parse(args.first()?)?;
            Some(json!({ "bool": { "must_not": [{ "exists": { "field": field.path() } }] } }))
        }
        "like" => {
            let [target, pattern] = args else { return None };
            let Field::Body(path) = Field::parse(target)? else { return None };
            let pattern = pattern.as_literal()?.as_str()?;
            // `*` and `?` are wildcards in the store's syntax
            if pattern.contains(['*', '?']) {
                return None;
            }
            let pattern = pattern.replace('%', "*").replace('_', "?");
            Some(json!({ "wildcard": { path: pattern } }))
        }
        "in" => {
            let (target, candidates) = args.split_first()?;
            let field = Field::parse(target)?;
            let values = candidates
                .iter()
                .map(|c| c.as_literal().and_then(|v| field.literal(v)))
                .collect::<Option<Vec<_>>>()?;
            Some(json!({ "terms": { field.path(): values } }))
        }
        "eq" | "ne" | "lt" | "le" | "gt" | "ge" => {
            let (op, field, value) = comparison(&name, args)?;
            let term = json!({ "term": { field.clone(): value.clone() } });
            Some(match op {
                "eq" => term,
                "ne" => json!({ "bool": { "must_not": [term] } }),
                range => {
                    let bound = match range {
                        "lt" => "lt",
                        "le" => "lte",
                        "gt" => "gt",
                        _ => "gte",
                    };
                    json!({ "range": { field: { bound: value } } })
                }
            })
        }
        _ => None,
    }
}

/// `(op, field, literal)` with the field on the left
fn comparison<'a>(op: &'a str, args: &[Expr]) -> Option<(&'a str, String, Json)> {
    let [left, right] = args else { return None };
    if let (Some(field), Some(v)) = (Field::parse(left), right.as_literal()) {
        return Some((op, field.path(), field.literal(v)?));
    }
    let (field, v) = (Field::parse(right)?, left.as_literal()?);
    let mirrored = match op {
        "lt" => "gt",
        "le" => "ge",
        "gt" => "lt",
        "ge" => "le",
        same => same,
    };
    Some((mirrored, field.path(), field.literal(v)?))
}

/// A column reference the store can filter on
#[derive(Debug, Clone, PartialEq)]
enum Field {
    /// The integer document id
    Id,
    /// `json_extract(body, '$.a.b')`; the value type varies per document
    Body(String),
}

impl Field {
    /// `id` or `json_extract(body, '$.a.b')`. The raw `body` column is
    /// indexed as a parsed object, not as the text the host compares, so it
    /// is never translated.
    fn parse(expr: &Expr) -> Option<Self> {
        if let Some(col) = expr.as_column() {
            return col.eq_ignore_ascii_case("id").then_some(Field::Id);
        }
        if !expr.is_call_to("json_extract") {
            return None;
        }
        match expr.args() {
            [doc, path] if doc.as_column().is_some_and(|c| c.eq_ignore_ascii_case("body")) => {
                let rest = path.as_literal()?.as_str()?.trim().strip_prefix("$.")?;
                (!rest.is_empty()).then(|| Field::Body(rest.to_string()))
            }
            _ => None,
        }
    }

    fn path(&self) -> String {
        match self {
            Field::Id => "id".to_string(),
            Field::Body(rest) => format!("body.{}", rest),
        }
    }

    /// `value` as a query literal, or `None` when the store would compare it
    /// differently from the host. The host may coerce `'1'` to match id 1;
    /// the store would not, so id only takes numeric literals.
    fn literal(&self, value: &Value) -> Option<Json> {
        match (self, value) {
            (Field::Id, Value::Int(_) | Value::Float(_)) | (Field::Body(_), _) => literal_json(value),
            (Field::Id, _) => None,
        }
    }
}

fn literal_json(value: &Value) -> Option<Json> {
    match value {
        Value::Bool(b) => Some(Json::Bool(*b)),
        Value::Int(i) => Some(json!(i)),
        Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number),
        Value::String(s) => Some(Json::String(s.clone())),
        Value::Null | Value::Bytes(_) => None,
    }
}

// ============================================================================
// Query execution
// ============================================================================

fn lookup<'a>(source: &'a Json, field: &str) -> Option<&'a Json> {
    json_path(source, &format!("$.{}", field))
}

fn single_entry<'a>(clause: &'a Json, kind: &str) -> std::result::Result<(&'a String, &'a Json), String> {
    clause
        .as_object()
        .filter(|m| m.len() == 1)
        .and_then(|m| m.iter().next())
        .ok_or_else(|| format!("malformed {} clause: {}", kind, clause))
}

/// Text a wildcard runs against; numbers and booleans match their rendering
fn scalar_text(json: &Json) -> Option<String> {
    match json_to_value(json) {
        Value::String(s) => Some(s),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Bytes(_) => None,
    }
}

fn json_compare(a: &Json, b: &Json) -> Option<Ordering> {
    json_to_value(a).compare(&json_to_value(b))
}

fn eval_clause(clause: &Json, source: &Json) -> std::result::Result<bool, String> {
    let (kind, body) = single_entry(clause, "query")?;
    match kind.as_str() {
        "match_all" => Ok(true),
        "term" => {
            let (field, want) = single_entry(body, "term")?;
            Ok(lookup(source, field).is_some_and(|have| json_compare(have, want) == Some(Ordering::Equal)))
        }
        "terms" => {
            let (field, wanted) = single_entry(body, "terms")?;
            let wanted = wanted.as_array().ok_or_else(|| format!("terms on '{}' needs an array", field))?;
            Ok(lookup(source, field)
                .is_some_and(|have| wanted.iter().any(|w| json_compare(have, w) == Some(Ordering::Equal))))
        }
        "range" => {
            let (field, bounds) = single_entry(body, "range")?;
            let bounds = bounds.as_object().ok_or_else(|| format!("range on '{}' needs bounds", field))?;
            let Some(have) = lookup(source, field) else {
                return Ok(false);
            };
            for (bound, limit) in bounds {
                let ord = json_compare(have, limit);
                let ok = match bound.as_str() {
                    "lt" => ord == Some(Ordering::Less),
                    "lte" => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                    "gt" => ord == Some(Ordering::Greater),
                    "gte" => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
                    other => return Err(format!("unknown range bound '{}'", other)),
                };
                if !ok {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "wildcard" => {
            let (field, pattern) = single_entry(body, "wildcard")?;
            let pattern = pattern
                .as_str()
                .ok_or_else(|| format!("wildcard on '{}' needs a string", field))?
                .replace('*', "%")
                .replace('?', "_");
            Ok(lookup(source, field)
                .and_then(scalar_text)
                .is_some_and(|text| like(&text, &pattern)))
        }
        "exists" => {
            let field = body
                .get("field")
                .and_then(Json::as_str)
                .ok_or_else(|| "exists needs a field".to_string())?;
            Ok(lookup(source, field).is_some_and(|v| !v.is_null()))
        }
        "bool" => eval_bool(body, source),
        other => Err(format!("unsupported query clause '{}'", other)),
    }
}

fn eval_bool(body: &Json, source: &Json) -> std::result::Result<bool, String> {
    let empty = Map::new();
    let body = body.as_object().unwrap_or(&empty);
    let list = |key: &str| -> std::result::Result<Vec<Json>, String> {
        match body.get(key) {
            None => Ok(Vec::new()),
            Some(Json::Array(items)) => Ok(items.clone()),
            Some(other) => Err(format!("bool.{} must be an array, got {}", key, other)),
        }
    };

    for c in list("filter")? {
        if !eval_clause(&c, source)? {
            return Ok(false);
        }
    }
    for c in list("must_not")? {
        if eval_clause(&c, source)? {
            return Ok(false);
        }
    }
    let should = list("should")?;
    if should.is_empty() {
        return Ok(true);
    }
    let required = body
        .get("minimum_should_match")
        .and_then(Json::as_u64)
        .unwrap_or(1) as usize;
    let mut matched = 0;
    for c in &should {
        if eval_clause(c, source)? {
            matched += 1;
        }
    }
    Ok(matched >= required)
}

// ============================================================================
// Engine hooks
// ============================================================================

#[derive(Debug, Default)]
struct Cursor {
    pos: usize,
}

#[derive(Debug)]
struct Hits {
    positions: Vec<usize>,
    pos: usize,
}

fn write_doc(meta: &ExecutorMeta, batch: &mut RowBatch, doc: &SearchDoc) {
    meta.write_fields(
        batch,
        &[("id", Value::Int(doc.id)), ("body", Value::String(doc.body.clone()))],
    );
}

/// Manifest serving `index`
pub fn manifest(index: Arc<SearchIndex>) -> EngineManifest {
    let scan = Arc::clone(&index);
    let prepare = Arc::clone(&index);
    let page = index;

    EngineManifest::new(ENGINE_NAME, 1)
        .with_sys_var(KEY_VAR, SysVarScope::Global, "v1")
        .with_validate(|m| match m.sys_var(KEY_VAR) {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(Error::InvalidManifest {
                engine: m.name.clone(),
                reason: format!("{} must be set", KEY_VAR),
            }),
        })
        .with_init(|m| {
            let key = m.sys_var(KEY_VAR).unwrap_or_default();
            info!(target: "quarry::engine", engine = %m.name, key, "Search index attached");
            Ok(())
        })
        .with_reader_open(|_ctx, _meta| Ok(Session::new(Cursor::default())))
        .with_reader_next(move |ctx, batch, meta, session| {
            ctx.check()?;
            let cursor = session.get_or_insert_with(Cursor::default);
            while !batch.is_full() {
                let Some(doc) = scan.docs().get(cursor.pos) else { break };
                write_doc(meta, batch, doc);
                cursor.pos += 1;
            }
            Ok(())
        })
        .with_select_reader_open(move |ctx, predicates, meta| {
            ctx.check()?;
            let query = build_query(predicates);
            let positions = prepare
                .search(&query)
                .map_err(|reason| Error::backend(meta.engine(), reason))?;
            debug!(target: "quarry::engine", executor = %meta.id(), %query, hits = positions.len(), "Search query ran");
            Ok(Session::new(Hits { positions, pos: 0 }))
        })
        .with_select_reader_next(move |ctx, batch, _predicates, meta, session| {
            ctx.check()?;
            let hits = session
                .get_mut::<Hits>()
                .ok_or_else(|| Error::backend(meta.engine(), "select next without prepared hits"))?;
            while !batch.is_full() {
                let Some(&at) = hits.positions.get(hits.pos) else { break };
                if let Some(doc) = page.docs().get(at) {
                    write_doc(meta, batch, doc);
                }
                hits.pos += 1;
            }
            Ok(())
        })
}
