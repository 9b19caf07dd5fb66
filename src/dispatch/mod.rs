//! Scheduling facility shared by listener sets and sink targets.
//!
//! Provides:
//! - [`SerialQueue`]: dedicated worker thread, strict FIFO, one job at a time
//! - [`ConcurrentQueue`]: jobs run in parallel on a tokio blocking pool
//! - [`TickQueue`]: "defer to next tick" for a single execution context
//!
//! Queues are always constructed and passed explicitly. There is no
//! process-wide default queue.

pub mod concurrent;
pub mod serial;
pub mod tick;

pub use concurrent::ConcurrentQueue;
pub use serial::SerialQueue;
pub use tick::{TickGuard, TickQueue};

use std::sync::Arc;
use thiserror::Error;

/// A unit of work submitted to a [`DispatchQueue`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Error type for job submission.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("queue '{0}' is closed")]
    Closed(String),

    #[error("no tokio runtime available for queue '{0}'")]
    NoRuntime(String),

    #[error("failed to spawn worker thread for queue '{label}': {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// An execution context that accepts jobs.
///
/// Serial implementations run jobs one at a time in submission order.
/// Concurrent implementations give no ordering guarantee between jobs.
pub trait DispatchQueue: Send + Sync {
    /// Human readable queue label, used in diagnostics.
    fn label(&self) -> &str;

    /// Submit a job. Returns immediately.
    fn dispatch(&self, job: Job) -> Result<(), DispatchError>;
}

/// Shared handle to any dispatch queue.
pub type QueueRef = Arc<dyn DispatchQueue>;

impl<Q: DispatchQueue + ?Sized> DispatchQueue for Arc<Q> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn dispatch(&self, job: Job) -> Result<(), DispatchError> {
        (**self).dispatch(job)
    }
}
