//! Error types for the engine plugin protocol
//!
//! Every layer (registry, executors, engine hooks) reports failures through
//! the single [`Error`] enum so a hook's error can travel up through an
//! executor unchanged. We use `thiserror` for the `Display` and `Error` impls.
//!
//! # Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Resolution | `EngineNotFound`, `MissingHook`, `InvalidManifest`, `DuplicateEngine` |
//! | Lifecycle | `InvalidState` |
//! | Backend | `Io`, `Backend`, `TableNotFound`, `Serialization`, `Cancelled`, `DeadlineExceeded` |
//! | Configuration | `Config` |
//! | Data shape | `Column` |

use std::io;
use thiserror::Error;

/// Result type alias for plugin protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the registry, the executors and engine hooks
#[derive(Debug, Error)]
pub enum Error {
    // ==================== Resolution ====================
    /// No manifest is registered under the requested engine name
    #[error("engine not found: {engine}")]
    EngineNotFound {
        /// Requested engine name
        engine: String,
    },

    /// A hook the operation requires is not declared by the engine
    #[error("engine '{engine}' does not implement {hook}")]
    MissingHook {
        /// Engine name
        engine: String,
        /// Hook name, e.g. `on_reader_next`
        hook: &'static str,
    },

    /// The manifest's hook table is structurally inconsistent
    #[error("invalid manifest for engine '{engine}': {reason}")]
    InvalidManifest {
        /// Engine name
        engine: String,
        /// What is wrong with it
        reason: String,
    },

    /// An engine with this name is already registered
    #[error("engine already registered: {engine}")]
    DuplicateEngine {
        /// Engine name
        engine: String,
    },

    // ==================== Lifecycle ====================
    /// An executor method was called out of open → next → close order
    #[error("{executor} executor cannot {operation} while {state}")]
    InvalidState {
        /// Executor kind, e.g. `scan`
        executor: &'static str,
        /// Current state name
        state: &'static str,
        /// Attempted operation
        operation: &'static str,
    },

    // ==================== Backend ====================
    /// I/O error (files, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Engine backend failure that is not an I/O error
    #[error("backend error in engine '{engine}': {reason}")]
    Backend {
        /// Engine name
        engine: String,
        /// Backend message
        reason: String,
    },

    /// The engine has no backing resource for this table
    #[error("table not found: {table}")]
    TableNotFound {
        /// Table name
        table: String,
    },

    /// Encoding or decoding of stored rows failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The execution context was cancelled
    #[error("execution cancelled")]
    Cancelled,

    /// The execution context's deadline has passed
    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    // ==================== Configuration ====================
    /// Invalid plugin configuration
    #[error("configuration error: {0}")]
    Config(String),

    // ==================== Data shape ====================
    /// A row does not fit the table's columns
    #[error("column error: {reason}")]
    Column {
        /// What did not fit
        reason: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::Backend`] error
    pub fn backend(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Backend {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::MissingHook`] error
    pub fn missing_hook(engine: impl Into<String>, hook: &'static str) -> Self {
        Error::MissingHook {
            engine: engine.into(),
            hook,
        }
    }

    /// Resolution errors abort the statement before any hook runs
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::EngineNotFound { .. }
                | Error::MissingHook { .. }
                | Error::InvalidManifest { .. }
                | Error::DuplicateEngine { .. }
        )
    }
}
