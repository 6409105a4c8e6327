//! Engine Protocol Tests
//!
//! End-to-end tests driving the reference engines through the executors:
//! - DDL, insert and scan against the file engine
//! - Predicate pushdown against the memory, search and metrics engines
//! - Registry loading from `quarry.toml`
//! - Lifecycle properties (exhaustion, filtered subset of unfiltered)

mod common;

mod config;
mod file_engine;
mod properties;
mod pushdown;
