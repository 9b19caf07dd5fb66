//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - A recording sink whose contents stay observable after it is moved
//! - Completion collectors
//! - Polling helpers
//! - Test tracing initialisation

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use weir::sink::{Sink, WriteError};

pub use weir::observability::tracing::init_test_tracing;

/// Sink that records accepted values into shared storage.
///
/// Optionally sleeps per value to make worker ordering observable.
#[derive(Clone)]
pub struct RecordingSink<T> {
    values: Arc<Mutex<Vec<T>>>,
    delay: Option<Duration>,
}

impl<T: Clone> RecordingSink<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Snapshot of the values accepted so far.
    pub fn values(&self) -> Vec<T> {
        self.values.lock().expect("sink lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.values.lock().expect("sink lock poisoned").len()
    }
}

impl<T> Sink for RecordingSink<T> {
    type Item = T;

    fn accept(&mut self, value: T) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.values.lock().expect("sink lock poisoned").push(value);
    }
}

/// One reported completion, tagged with the write it belongs to.
pub type Reported = (usize, Option<WriteError>, usize);

/// Channel for collecting completions from any thread.
pub fn completions() -> (
    mpsc::UnboundedSender<Reported>,
    mpsc::UnboundedReceiver<Reported>,
) {
    mpsc::unbounded_channel()
}

/// Receive the next completion or fail after `timeout`.
pub async fn next_completion(
    rx: &mut mpsc::UnboundedReceiver<Reported>,
    timeout: Duration,
) -> Reported {
    tokio::time::timeout(timeout, rx.recv())
        .await
        .expect("timed out waiting for completion")
        .expect("completion channel closed")
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
