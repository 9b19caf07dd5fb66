//! Sink target that delivers on a dedicated serial worker.
//!
//! Every `writev` becomes one job on the target's worker queue. The worker is
//! serial, so jobs for one target never interleave and finish in call order.
//! Each job delivers at most `max_count_per_dispatch` values and then hands
//! the completion to the target's sequencer, which runs completions on the
//! caller's completion queue strictly in the order the writes finished, even
//! when that queue runs jobs concurrently.
//!
//! ```text
//!   writev(chunks) ──► [worker queue] ──► deliver ≤ N values ──► sink
//!                                              │
//!                                              └──► sequencer ──► [completion queue] ──► completion(err, count)
//! ```

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use super::{deliver, Chunks, Completion, Sink, WriteError};
use crate::dispatch::{DispatchQueue, Job, QueueRef, SerialQueue};

/// Label of the worker thread created per target.
pub const DEFAULT_WORKER_LABEL: &str = "weir.target.sink.async";

/// Configuration for an [`AsyncSinkTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncSinkConfig {
    /// Maximum number of values delivered per `writev`
    pub max_count_per_dispatch: usize,
    /// Thread name of the dedicated worker
    pub worker_label: String,
}

impl Default for AsyncSinkConfig {
    fn default() -> Self {
        Self {
            max_count_per_dispatch: 16,
            worker_label: DEFAULT_WORKER_LABEL.to_string(),
        }
    }
}

impl AsyncSinkConfig {
    /// Create an AsyncSinkConfig from application config values.
    pub fn from_config(max_count_per_dispatch: usize) -> Self {
        Self {
            max_count_per_dispatch,
            ..Self::default()
        }
    }
}

/// Delivers batches into a sink on a serial worker, capped per call.
///
/// The sink is only touched from the worker, so it does not need to be
/// thread safe itself beyond being `Send`.
pub struct AsyncSinkTarget<S> {
    target: Arc<Mutex<S>>,
    worker: SerialQueue,
    sequencer: Arc<Sequencer>,
    max_count_per_dispatch: usize,
}

impl<S> AsyncSinkTarget<S>
where
    S: Sink + Send + 'static,
    S::Item: Send + 'static,
{
    /// Declared readiness unit: one logical write in flight.
    pub const DEFAULT_HIGH_WATER_MARK: usize = 1;

    /// Create a target with its own worker thread and default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new(target: S) -> Result<Self, WriteError> {
        Self::with_config(target, AsyncSinkConfig::default())
    }

    /// Create a target with its own worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn with_config(target: S, config: AsyncSinkConfig) -> Result<Self, WriteError> {
        let worker = SerialQueue::spawn(config.worker_label.clone()).map_err(|e| {
            tracing::error!(error = %e, "Failed to spawn sink worker");
            WriteError::WorkerSpawn(e.to_string())
        })?;
        Ok(Self::with_worker(
            target,
            worker,
            config.max_count_per_dispatch,
        ))
    }

    /// Create a target on a supplied serial worker.
    ///
    /// The worker may be shared with other targets. `max_count_per_dispatch`
    /// is clamped to at least 1.
    pub fn with_worker(target: S, worker: SerialQueue, max_count_per_dispatch: usize) -> Self {
        Self {
            target: Arc::new(Mutex::new(target)),
            worker,
            sequencer: Arc::new(Sequencer::default()),
            max_count_per_dispatch: max_count_per_dispatch.max(1),
        }
    }

    /// Schedule delivery of `chunks` on the worker and return immediately.
    ///
    /// At most `max_count_per_dispatch` values are delivered; the count that
    /// was actually delivered is passed to `completion`, which runs on
    /// `completion_queue`. Callers re-invoke with the remainder when the
    /// count is short.
    pub fn writev(
        &self,
        chunks: Chunks<S::Item>,
        completion_queue: &QueueRef,
        completion: impl FnOnce(Option<WriteError>, usize) + Send + 'static,
    ) {
        let pending = PendingCompletion {
            completion: Some(Box::new(completion)),
            queue: Arc::clone(completion_queue),
            sequencer: Arc::clone(&self.sequencer),
            worker: self.worker.label().to_string(),
        };
        let target = Arc::clone(&self.target);
        let max = self.max_count_per_dispatch;

        let job: Job = Box::new(move || {
            let mut count = 0;
            let outcome = {
                let mut sink = target.lock().unwrap_or_else(PoisonError::into_inner);
                panic::catch_unwind(AssertUnwindSafe(|| {
                    deliver(&mut *sink, chunks, max, &mut count);
                }))
            };
            drop(target);

            match outcome {
                Ok(()) => {
                    tracing::trace!(count, max, "Delivered batch to sink");
                    pending.finish(None, count);
                }
                Err(_) => {
                    tracing::error!(accepted = count, "Sink panicked during delivery");
                    pending.finish(Some(WriteError::SinkPanicked { accepted: count }), count);
                }
            }
        });

        // On rejection the job is dropped and its PendingCompletion reports
        // WorkerClosed.
        if let Err(e) = self.worker.dispatch(job) {
            tracing::warn!(error = %e, "Sink worker rejected write");
        }
    }

    /// Stop the target: wait for every submitted write, then return the sink.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::WorkerClosed`] if the worker no longer runs jobs
    /// and [`WriteError::SinkInUse`] if a write still holds the sink.
    pub async fn shutdown(self) -> Result<S, WriteError> {
        let label = self.worker.label().to_string();
        let (tx, rx) = oneshot::channel();

        self.worker
            .dispatch(Box::new(move || {
                let _ = tx.send(());
            }))
            .map_err(|_| WriteError::WorkerClosed(label.clone()))?;
        rx.await.map_err(|_| WriteError::WorkerClosed(label.clone()))?;

        tracing::debug!(worker = %label, "Sink worker drained");

        let mutex = Arc::try_unwrap(self.target).map_err(|_| WriteError::SinkInUse)?;
        Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn high_water_mark(&self) -> usize {
        Self::DEFAULT_HIGH_WATER_MARK
    }

    pub fn max_count_per_dispatch(&self) -> usize {
        self.max_count_per_dispatch
    }

    pub fn worker(&self) -> &SerialQueue {
        &self.worker
    }
}

impl<S> std::fmt::Debug for AsyncSinkTarget<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSinkTarget")
            .field("worker", &self.worker.label())
            .field("max_count_per_dispatch", &self.max_count_per_dispatch)
            .finish_non_exhaustive()
    }
}

/// A completion that has not been reported yet.
///
/// Dropping it unreported (the job never ran) reports `WorkerClosed`.
struct PendingCompletion {
    completion: Option<Completion>,
    queue: QueueRef,
    sequencer: Arc<Sequencer>,
    worker: String,
}

impl PendingCompletion {
    fn finish(mut self, error: Option<WriteError>, count: usize) {
        if let Some(completion) = self.completion.take() {
            self.sequencer.push(&self.queue, completion, error, count);
        }
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            let error = WriteError::WorkerClosed(self.worker.clone());
            self.sequencer.push(&self.queue, completion, Some(error), 0);
        }
    }
}

type Ready = (Completion, Option<WriteError>, usize);

/// Hands finished writes to their completions one at a time, in the order
/// they were pushed.
///
/// Each push takes the next ticket and posts a drain job. Whichever drain job
/// runs first runs every ready completion whose ticket is next; the others
/// find `draining` set, or nothing ready, and return.
#[derive(Default)]
struct Sequencer {
    state: Mutex<SequencerState>,
}

#[derive(Default)]
struct SequencerState {
    issued: u64,
    next: u64,
    ready: BTreeMap<u64, Ready>,
    draining: bool,
}

impl Sequencer {
    fn lock(&self) -> MutexGuard<'_, SequencerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(
        self: &Arc<Self>,
        queue: &QueueRef,
        completion: Completion,
        error: Option<WriteError>,
        count: usize,
    ) {
        {
            let mut state = self.lock();
            let ticket = state.issued;
            state.issued += 1;
            state.ready.insert(ticket, (completion, error, count));
        }

        let sequencer = Arc::clone(self);
        if let Err(e) = queue.dispatch(Box::new(move || sequencer.drain())) {
            tracing::warn!(
                queue = queue.label(),
                error = %e,
                "Completion queue rejected callback, completing inline"
            );
            self.drain();
        }
    }

    fn drain(&self) {
        {
            let mut state = self.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            // Clearing `draining` under the same lock as the lookup means a
            // push either lands before the check or dispatches a fresh drain.
            let (completion, error, count) = {
                let mut state = self.lock();
                let next = state.next;
                match state.ready.remove(&next) {
                    Some(ready) => {
                        state.next += 1;
                        ready
                    }
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };

            if panic::catch_unwind(AssertUnwindSafe(|| completion(error, count))).is_err() {
                tracing::error!("Write completion panicked");
            }
        }
    }
}
