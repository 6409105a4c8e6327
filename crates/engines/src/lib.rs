//! Reference engine plugins for Quarry
//!
//! This crate provides:
//! - memory: a fixed record list with lazy in-process filtering
//! - search: a document index that translates predicates into a query DSL
//! - file: one append-only data file per table, with DDL support
//! - metrics: a remote metrics backend behind the MetricsSource trait
//! - predicate: three-valued evaluation of pushed-down predicates
//!
//! Every engine keeps its per-scan state in the executor's
//! [`quarry_plugin::Session`]; concurrent scans of one table never share a
//! cursor.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod memory;
pub mod metrics;
pub mod predicate;
pub mod search;

use std::sync::Arc;

use quarry_plugin::EngineManifest;

pub use file::{FileEngine, FileEngineConfig};
pub use memory::MemoryRecord;
pub use metrics::{MetricSample, MetricsQuery, MetricsSource, SourceError, StaticMetricsSource};
pub use predicate::Record;
pub use search::{SearchDoc, SearchIndex};

/// Manifests of every reference engine with seeded data; the file engine
/// stores under `file_config`
pub fn builtin_manifests(file_config: FileEngineConfig) -> Vec<EngineManifest> {
    vec![
        memory::manifest(memory::ENGINE_NAME, memory::sample_records()),
        search::manifest(Arc::new(SearchIndex::seeded())),
        file::manifest(file_config),
        metrics::manifest(Arc::new(StaticMetricsSource::seeded())),
    ]
}
