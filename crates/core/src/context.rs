//! Advisory execution context
//!
//! Every hook receives the [`ExecContext`] of the statement driving it. The
//! cancellation flag and deadline are advisory: nothing in the executor
//! layer interrupts a hook that is already running. Hooks doing long I/O
//! should call [`ExecContext::check`] between units of work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Cancellation flag and optional deadline for one statement
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// Context with no deadline that is never cancelled unless asked to be
    pub fn new() -> Self {
        Self::default()
    }

    /// Same cancellation flag, with a deadline `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation; visible to every clone of this context
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the statement was cancelled or its deadline passed
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
