//! Serial execution context backed by a dedicated worker thread.
//!
//! Jobs are sent over a tokio unbounded channel and executed by the worker
//! in submission order. The worker owns nothing but the receiving end, so it
//! exits once every handle is dropped (or [`SerialQueue::close`] is called)
//! and the remaining jobs have run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::sync::mpsc;

use super::{DispatchError, DispatchQueue, Job};

/// Handle to a serial worker. Cheap to clone; all clones feed the same thread.
#[derive(Clone)]
pub struct SerialQueue {
    inner: Arc<Inner>,
}

struct Inner {
    label: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl SerialQueue {
    /// Spawn a new worker thread named after `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to create the thread.
    pub fn spawn(label: impl Into<String>) -> Result<Self, DispatchError> {
        let label = label.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker_label = label.clone();
        thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                tracing::debug!(queue = %worker_label, "Serial worker started");
                while let Some(job) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!(queue = %worker_label, "Job panicked on serial worker");
                    }
                }
                tracing::debug!(queue = %worker_label, "Serial worker stopped");
            })
            .map_err(|source| DispatchError::Spawn {
                label: label.clone(),
                source,
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                label,
                sender: Mutex::new(Some(sender)),
            }),
        })
    }

    /// Stop accepting jobs.
    ///
    /// Jobs already submitted still run; the worker exits afterwards.
    pub fn close(&self) {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            tracing::debug!(queue = %self.inner.label, "Serial queue closed");
        }
    }

    /// Whether the queue still accepts jobs.
    pub fn is_closed(&self) -> bool {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, mpsc::UnboundedSender::is_closed)
    }
}

impl DispatchQueue for SerialQueue {
    fn label(&self) -> &str {
        &self.inner.label
    }

    fn dispatch(&self, job: Job) -> Result<(), DispatchError> {
        // Clone out of the lock: a rejected job is dropped on return and may
        // dispatch again from its destructor.
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            return Err(DispatchError::Closed(self.inner.label.clone()));
        };
        sender
            .send(job)
            .map_err(|_| DispatchError::Closed(self.inner.label.clone()))
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.inner.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}
