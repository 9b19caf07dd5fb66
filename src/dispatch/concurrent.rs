//! Concurrent execution context on a tokio runtime.
//!
//! Jobs are synchronous closures, so they go to the runtime's blocking pool
//! and may run in parallel with each other.

use tokio::runtime::Handle;

use super::{DispatchError, DispatchQueue, Job};

/// Concurrent queue that runs each job on the blocking pool of a runtime.
#[derive(Clone, Debug)]
pub struct ConcurrentQueue {
    label: String,
    handle: Handle,
}

impl ConcurrentQueue {
    /// Create a queue bound to the given runtime.
    pub fn new(label: impl Into<String>, handle: Handle) -> Self {
        Self {
            label: label.into(),
            handle,
        }
    }

    /// Create a queue bound to the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoRuntime`] outside of a tokio runtime.
    pub fn current(label: impl Into<String>) -> Result<Self, DispatchError> {
        let label = label.into();
        match Handle::try_current() {
            Ok(handle) => Ok(Self { label, handle }),
            Err(_) => Err(DispatchError::NoRuntime(label)),
        }
    }
}

impl DispatchQueue for ConcurrentQueue {
    fn label(&self) -> &str {
        &self.label
    }

    fn dispatch(&self, job: Job) -> Result<(), DispatchError> {
        // The join handle is dropped; the task keeps running detached.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
