//! Engine plugin contract for Quarry
//!
//! This crate provides:
//! - Manifest / EngineManifest: plugin identity and the optional hook slots
//!   a storage engine fills in
//! - Session: per-executor engine state threaded from open to close
//! - ExecutorMeta: per-operation context handed to every hook
//! - EngineRegistry: manifests by name, with validate/init/shutdown
//! - PluginConfig: `quarry.toml` plugin selection and variable overrides

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod manifest;
pub mod meta;
pub mod registry;
pub mod session;

pub use config::{PluginConfig, PluginId, CONFIG_FILE_NAME, DEFAULT_BATCH_CAPACITY};
pub use manifest::{
    EngineManifest, InsertCloseHook, InsertNextHook, LifecycleHook, Manifest, OpenHook,
    PluginKind, ReaderCloseHook, ReaderNextHook, SelectNextHook, SelectOpenHook, SysVar,
    SysVarScope, TableHook,
};
pub use meta::ExecutorMeta;
pub use registry::EngineRegistry;
pub use session::Session;
