//! Remote-metrics engine
//!
//! Reads `(span_kind, duration)` samples from a metrics backend reached
//! through [`MetricsSource`]. Filtered scans push `eq(span_kind, ..)` and
//! integer range comparisons on `duration` into a [`MetricsQuery`], fetch
//! once at open, and return the samples slowest first. Full scans return
//! samples in source order.

use std::sync::Arc;

use quarry_core::{Error, Expr, Result, RowBatch, Value};
use quarry_plugin::{EngineManifest, ExecutorMeta, Session, SysVarScope};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::{debug, trace};

use crate::predicate::Record;

/// Default engine name
pub const ENGINE_NAME: &str = "metrics";

/// One latency sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Operation, e.g. `GET /api1`
    pub span_kind: String,
    /// Duration in milliseconds
    pub duration: i64,
}

impl MetricSample {
    /// Create a sample
    pub fn new(span_kind: impl Into<String>, duration: i64) -> Self {
        Self {
            span_kind: span_kind.into(),
            duration,
        }
    }
}

impl Record for MetricSample {
    fn field(&self, name: &str) -> Option<Value> {
        if name.eq_ignore_ascii_case("span_kind") {
            Some(Value::String(self.span_kind.clone()))
        } else if name.eq_ignore_ascii_case("duration") {
            Some(Value::Int(self.duration))
        } else {
            None
        }
    }
}

/// Filter understood by a metrics backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsQuery {
    /// Every entry must equal the sample's span kind
    pub span_kinds: Vec<String>,
    /// Inclusive lower bound on duration
    pub min_duration: Option<i64>,
    /// Inclusive upper bound on duration
    pub max_duration: Option<i64>,
}

impl MetricsQuery {
    /// Build a query from the predicates it can express; the rest are
    /// ignored
    pub fn from_predicates(predicates: &[Expr]) -> Self {
        let mut query = Self::default();
        for p in predicates {
            query.push(p);
        }
        query
    }

    fn push(&mut self, expr: &Expr) {
        if expr.is_call_to("and") {
            expr.args().iter().for_each(|a| self.push(a));
            return;
        }
        let Some(op) = expr.func_name().map(str::to_ascii_lowercase) else {
            return;
        };
        let (column, literal, op) = match expr.args() {
            [Expr::Column(c), Expr::Literal(v)] => (c, v, op),
            [Expr::Literal(v), Expr::Column(c)] => {
                let mirrored = match op.as_str() {
                    "lt" => "gt",
                    "le" => "ge",
                    "gt" => "lt",
                    "ge" => "le",
                    other => other,
                };
                (c, v, mirrored.to_string())
            }
            _ => return,
        };

        if column.eq_ignore_ascii_case("span_kind") {
            if let ("eq", Some(kind)) = (op.as_str(), literal.as_str()) {
                self.span_kinds.push(kind.to_string());
            }
            return;
        }
        if !column.eq_ignore_ascii_case("duration") {
            return;
        }
        let Some(bound) = literal.as_int() else { return };
        let (min, max) = match op.as_str() {
            "eq" => (Some(bound), Some(bound)),
            "gt" => (bound.checked_add(1), None),
            "ge" => (Some(bound), None),
            "lt" => (None, bound.checked_sub(1)),
            "le" => (None, Some(bound)),
            _ => return,
        };
        if let Some(min) = min {
            self.min_duration = Some(self.min_duration.map_or(min, |m| m.max(min)));
        }
        if let Some(max) = max {
            self.max_duration = Some(self.max_duration.map_or(max, |m| m.min(max)));
        }
    }

    /// True if `sample` satisfies every condition
    pub fn matches(&self, sample: &MetricSample) -> bool {
        self.span_kinds.iter().all(|k| *k == sample.span_kind)
            && self.min_duration.map_or(true, |m| sample.duration >= m)
            && self.max_duration.map_or(true, |m| sample.duration <= m)
    }
}

/// Failure reported by a metrics backend
#[derive(Debug, ThisError)]
pub enum SourceError {
    /// Backend could not be reached
    #[error("metrics backend unavailable: {0}")]
    Unavailable(String),
    /// Backend refused the query
    #[error("metrics query rejected: {0}")]
    Rejected(String),
}

/// Connection to a metrics backend
pub trait MetricsSource: Send + Sync {
    /// Samples matching `query`, in the backend's order
    fn fetch(&self, query: &MetricsQuery) -> std::result::Result<Vec<MetricSample>, SourceError>;
}

/// Fixed in-process sample set
#[derive(Debug, Clone, Default)]
pub struct StaticMetricsSource {
    samples: Vec<MetricSample>,
}

impl StaticMetricsSource {
    /// Source serving `samples`
    pub fn new(samples: Vec<MetricSample>) -> Self {
        Self { samples }
    }

    /// Five endpoint samples with durations spread over four magnitudes
    pub fn seeded() -> Self {
        Self::new(vec![
            MetricSample::new("GET /api1", 1),
            MetricSample::new("GET /api2", 20),
            MetricSample::new("GET /api3", 300),
            MetricSample::new("GET /api4", 4),
            MetricSample::new("GET /api5", 5000),
        ])
    }
}

impl MetricsSource for StaticMetricsSource {
    fn fetch(&self, query: &MetricsQuery) -> std::result::Result<Vec<MetricSample>, SourceError> {
        Ok(self.samples.iter().filter(|s| query.matches(s)).cloned().collect())
    }
}

// ============================================================================
// Engine hooks
// ============================================================================

#[derive(Debug)]
struct Page {
    samples: Vec<MetricSample>,
    pos: usize,
}

impl Page {
    fn fill(&mut self, batch: &mut RowBatch, meta: &ExecutorMeta) {
        while !batch.is_full() {
            let Some(sample) = self.samples.get(self.pos) else { break };
            meta.write_record(batch, |col| sample.field(&col.name));
            self.pos += 1;
        }
    }
}

fn fetch(source: &dyn MetricsSource, query: &MetricsQuery, engine: &str) -> Result<Vec<MetricSample>> {
    source.fetch(query).map_err(|e| Error::backend(engine, e.to_string()))
}

fn page<'a>(session: &'a mut Session, meta: &ExecutorMeta) -> Result<&'a mut Page> {
    session
        .get_mut::<Page>()
        .ok_or_else(|| Error::backend(meta.engine(), "next without fetched samples"))
}

/// Manifest reading from `source`
pub fn manifest(source: Arc<dyn MetricsSource>) -> EngineManifest {
    let scan = Arc::clone(&source);
    let select = source;

    EngineManifest::new(ENGINE_NAME, 1)
        .with_sys_var("metrics_key", SysVarScope::Global, "v1")
        .with_reader_open(move |ctx, meta| {
            ctx.check()?;
            let samples = fetch(scan.as_ref(), &MetricsQuery::default(), meta.engine())?;
            trace!(target: "quarry::engine", executor = %meta.id(), samples = samples.len(), "Metrics fetched");
            Ok(Session::new(Page { samples, pos: 0 }))
        })
        .with_reader_next(|ctx, batch, meta, session| {
            ctx.check()?;
            page(session, meta)?.fill(batch, meta);
            Ok(())
        })
        .with_reader_close(|meta, session| {
            let served = session.into_inner::<Page>().map(|p| p.pos).unwrap_or(0);
            trace!(target: "quarry::engine", executor = %meta.id(), served, "Metrics released");
        })
        .with_select_reader_open(move |ctx, predicates, meta| {
            ctx.check()?;
            let query = MetricsQuery::from_predicates(predicates);
            let mut samples = fetch(select.as_ref(), &query, meta.engine())?;
            samples.sort_by(|a, b| b.duration.cmp(&a.duration));
            debug!(target: "quarry::engine", executor = %meta.id(), ?query, samples = samples.len(), "Metrics query ran");
            Ok(Session::new(Page { samples, pos: 0 }))
        })
        .with_select_reader_next(|ctx, batch, _predicates, meta, session| {
            ctx.check()?;
            page(session, meta)?.fill(batch, meta);
            Ok(())
        })
}
