//! Quarry - pluggable storage engines for a relational query engine
//!
//! Quarry lets a query engine hand table storage to engine plugins. A plugin
//! is an [`EngineManifest`]: a fixed set of optional hooks for scans,
//! predicate-pushdown scans, inserts and table DDL. Executors drive those
//! hooks with the same open → next → close protocol the host uses for its
//! native tables.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quarry::{engines, EngineRegistry, ExecContext, Executor, ScanExecutor};
//!
//! let registry = Arc::new(EngineRegistry::new());
//! registry.register(engines::file::manifest(FileEngineConfig::new("/var/lib/quarry")))?;
//!
//! let mut scan = ScanExecutor::for_table(registry.clone(), table)?;
//! let ctx = ExecContext::new();
//! scan.open(&ctx)?;
//! let mut batch = scan.new_batch(1024);
//! let rows = quarry::collect_rows(&mut scan, &ctx, &mut batch)?;
//! scan.close()?;
//! ```
//!
//! # Architecture
//!
//! - `quarry-core`: values, expressions, table descriptors, row batches, errors
//! - `quarry-plugin`: manifests, sessions, executor context, registry, config
//! - `quarry-executor`: scan, selection, insert and DDL drivers
//! - `quarry-engines`: reference engines (memory, search, file, metrics)

pub use quarry_core::*;
pub use quarry_executor::*;
pub use quarry_plugin::*;

/// Reference engine plugins
pub use quarry_engines as engines;
