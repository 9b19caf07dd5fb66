//! Synchronous pass-through sink target.

use super::{deliver, Chunks, Sink, WriteError};

/// Delivers batches into a sink inline, on the caller's thread.
///
/// There is no internal buffering; the completion runs before `writev`
/// returns.
#[derive(Debug)]
pub struct SyncSinkTarget<S> {
    target: S,
}

impl<S: Sink> SyncSinkTarget<S> {
    /// Declared readiness unit: one logical write in flight.
    pub const DEFAULT_HIGH_WATER_MARK: usize = 1;

    pub fn new(target: S) -> Self {
        Self { target }
    }

    /// Deliver every value in `chunks`, then report `(None, count)`.
    pub fn writev(
        &mut self,
        chunks: Chunks<S::Item>,
        completion: impl FnOnce(Option<WriteError>, usize),
    ) {
        let mut count = 0;
        deliver(&mut self.target, chunks, usize::MAX, &mut count);
        tracing::trace!(count, "Delivered batch to sink");
        completion(None, count);
    }

    pub fn high_water_mark(&self) -> usize {
        Self::DEFAULT_HIGH_WATER_MARK
    }

    pub fn get_ref(&self) -> &S {
        &self.target
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.target
    }

    pub fn into_inner(self) -> S {
        self.target
    }
}
