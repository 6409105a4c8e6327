//! Executor lifecycle states

use quarry_core::Error;

/// Where an executor is in its open → next → close sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Constructed; `open` not yet called or it failed
    Unopened,
    /// Open succeeded; `next` may be called
    Opened,
    /// A `next` call returned zero rows; later calls return zero rows
    /// without reaching the engine (readers only)
    Exhausted,
    /// `close` was called
    Closed,
}

impl ExecState {
    /// Lower-case name used in errors and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecState::Unopened => "unopened",
            ExecState::Opened => "opened",
            ExecState::Exhausted => "exhausted",
            ExecState::Closed => "closed",
        }
    }

    pub(crate) fn misuse(self, executor: &'static str, operation: &'static str) -> Error {
        Error::InvalidState {
            executor,
            state: self.as_str(),
            operation,
        }
    }
}
