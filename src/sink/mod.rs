//! Batched delivery of values into a sink capability.
//!
//! Provides:
//! - [`Sink`]: the "accept one value" capability
//! - [`SyncSinkTarget`]: delivers a batch inline on the caller's thread
//! - [`AsyncSinkTarget`]: delivers on a dedicated serial worker, capped per call
//!
//! Batches are "chunks of chunks": an ordered list of ordered value lists,
//! delivered outer list first, each inner list in order.

pub mod async_target;
pub mod sync_target;

pub use async_target::{AsyncSinkConfig, AsyncSinkTarget};
pub use sync_target::SyncSinkTarget;

use std::collections::VecDeque;
use std::marker::PhantomData;
use thiserror::Error;
use tokio::sync::mpsc;

/// An ordered batch of ordered value lists.
pub type Chunks<T> = Vec<Vec<T>>;

/// Completion callback for a batched write: `(error, delivered_count)`.
pub type Completion = Box<dyn FnOnce(Option<WriteError>, usize) + Send + 'static>;

/// Errors reported through a write completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("worker queue '{0}' is closed")]
    WorkerClosed(String),

    #[error("failed to start sink worker: {0}")]
    WorkerSpawn(String),

    #[error("sink panicked after accepting {accepted} values")]
    SinkPanicked { accepted: usize },

    #[error("sink is still referenced by pending work")]
    SinkInUse,
}

/// A consumer that accepts one value at a time.
///
/// Delivery is infallible at this layer. A sink that can fail has to report
/// that through its own channel.
pub trait Sink {
    type Item;

    fn accept(&mut self, value: Self::Item);
}

impl<T> Sink for Vec<T> {
    type Item = T;

    fn accept(&mut self, value: T) {
        self.push(value);
    }
}

impl<T> Sink for VecDeque<T> {
    type Item = T;

    fn accept(&mut self, value: T) {
        self.push_back(value);
    }
}

impl<T> Sink for mpsc::UnboundedSender<T> {
    type Item = T;

    fn accept(&mut self, value: T) {
        // A closed receiver means nobody is listening anymore.
        let _ = self.send(value);
    }
}

/// Adapts any `FnMut(T)` into a [`Sink`].
pub struct FnSink<T, F> {
    f: F,
    _item: PhantomData<fn(T)>,
}

/// Wrap a closure as a [`Sink`].
pub fn sink_fn<T, F: FnMut(T)>(f: F) -> FnSink<T, F> {
    FnSink {
        f,
        _item: PhantomData,
    }
}

impl<T, F: FnMut(T)> Sink for FnSink<T, F> {
    type Item = T;

    fn accept(&mut self, value: T) {
        (self.f)(value);
    }
}

impl<T, F> std::fmt::Debug for FnSink<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnSink")
    }
}

/// Feed `chunks` into `sink`, stopping after `max` values.
///
/// `count` is updated per value so callers still know how far delivery got
/// if the sink panics.
pub(crate) fn deliver<S: Sink>(
    sink: &mut S,
    chunks: Chunks<S::Item>,
    max: usize,
    count: &mut usize,
) {
    for value in chunks.into_iter().flatten().take(max) {
        sink.accept(value);
        *count += 1;
    }
}
