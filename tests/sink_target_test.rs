//! Behavioural tests for the sync and async sink targets.
//!
//! Covers batch exactness, per-dispatch capping, completion ordering on a
//! concurrent completion queue, and shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{completions, init_test_tracing, next_completion, wait_for, RecordingSink};
use weir::dispatch::{ConcurrentQueue, QueueRef, SerialQueue};
use weir::sink::{AsyncSinkConfig, AsyncSinkTarget, SyncSinkTarget, WriteError};

const TIMEOUT: Duration = Duration::from_secs(5);

fn concurrent_completions() -> QueueRef {
    Arc::new(ConcurrentQueue::current("test.completions").expect("runtime"))
}

/// Sync writev delivers every value in order and reports the total.
#[test]
fn test_sync_writev_exact() {
    let sink = RecordingSink::new();
    let mut target = SyncSinkTarget::new(sink.clone());
    let mut reported = None;

    target.writev(vec![vec![1, 2], vec![3]], |err, count| {
        reported = Some((err, count));
    });

    assert_eq!(reported, Some((None, 3)));
    assert_eq!(sink.values(), vec![1, 2, 3]);
}

/// Async writev stops at the cap; the remainder goes in a second call.
#[tokio::test(flavor = "multi_thread")]
async fn test_async_writev_capped() {
    let sink = RecordingSink::new();
    let target =
        AsyncSinkTarget::with_config(sink.clone(), AsyncSinkConfig::from_config(2)).unwrap();
    let queue = concurrent_completions();
    let (tx, mut rx) = completions();

    let first = tx.clone();
    target.writev(vec![vec![1, 2, 3, 4]], &queue, move |err, count| {
        let _ = first.send((0, err, count));
    });
    assert_eq!(next_completion(&mut rx, TIMEOUT).await, (0, None, 2));
    assert_eq!(sink.values(), vec![1, 2]);

    target.writev(vec![vec![3, 4]], &queue, move |err, count| {
        let _ = tx.send((1, err, count));
    });
    assert_eq!(next_completion(&mut rx, TIMEOUT).await, (1, None, 2));
    assert_eq!(sink.values(), vec![1, 2, 3, 4]);
}

/// Completions arrive in call order even on a concurrent completion queue.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_completions_in_call_order() {
    init_test_tracing();

    let sink = RecordingSink::with_delay(Duration::from_millis(10));
    let target = AsyncSinkTarget::new(sink.clone()).unwrap();
    let queue = concurrent_completions();
    let (tx, mut rx) = completions();

    for call in 0..5 {
        let tx = tx.clone();
        target.writev(vec![vec![call * 10, call * 10 + 1]], &queue, move |err, count| {
            let _ = tx.send((call, err, count));
        });
    }

    let mut order = Vec::new();
    for _ in 0..5 {
        let (call, err, count) = next_completion(&mut rx, TIMEOUT).await;
        assert_eq!(err, None);
        assert_eq!(count, 2);
        order.push(call);
    }

    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert_eq!(sink.values(), vec![0, 1, 10, 11, 20, 21, 30, 31, 40, 41]);
}

/// Many undelayed writes still complete in call order on a concurrent queue.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_completions_in_call_order_without_delay() {
    init_test_tracing();

    const CALLS: usize = 500;
    let sink = RecordingSink::new();
    let target = AsyncSinkTarget::new(sink.clone()).unwrap();
    let queue = concurrent_completions();
    let (tx, mut rx) = completions();

    for call in 0..CALLS {
        let tx = tx.clone();
        target.writev(vec![vec![call]], &queue, move |err, count| {
            let _ = tx.send((call, err, count));
        });
    }

    let mut order = Vec::with_capacity(CALLS);
    for _ in 0..CALLS {
        let (call, err, count) = next_completion(&mut rx, TIMEOUT).await;
        assert_eq!(err, None);
        assert_eq!(count, 1);
        order.push(call);
    }

    assert_eq!(order, (0..CALLS).collect::<Vec<_>>());
    assert_eq!(sink.values(), (0..CALLS).collect::<Vec<_>>());
}

/// writev returns before delivery happens.
#[tokio::test(flavor = "multi_thread")]
async fn test_async_writev_returns_immediately() {
    let sink = RecordingSink::with_delay(Duration::from_millis(50));
    let target = AsyncSinkTarget::new(sink.clone()).unwrap();
    let queue = concurrent_completions();

    target.writev(vec![vec!["a", "b"]], &queue, |_, _| {});
    assert!(sink.len() < 2);

    assert!(wait_for(TIMEOUT, || sink.len() == 2).await);
}

/// Two targets sharing one supplied serial worker still keep per-target order.
#[tokio::test(flavor = "multi_thread")]
async fn test_shared_worker_queue() {
    init_test_tracing();

    let worker = SerialQueue::spawn("test.shared.worker").unwrap();
    let left = RecordingSink::new();
    let right = RecordingSink::new();
    let left_target = AsyncSinkTarget::with_worker(left.clone(), worker.clone(), 3);
    let right_target = AsyncSinkTarget::with_worker(right.clone(), worker, 3);
    let queue = concurrent_completions();

    for batch in 0..3 {
        left_target.writev(vec![vec![batch]], &queue, |_, _| {});
        right_target.writev(vec![vec![batch + 100]], &queue, |_, _| {});
    }

    let left_sink = left_target.shutdown().await.unwrap();
    let right_sink = right_target.shutdown().await.unwrap();

    assert_eq!(left_sink.values(), vec![0, 1, 2]);
    assert_eq!(right_sink.values(), vec![100, 101, 102]);
}

/// Shutdown waits for queued writes and hands the sink back.
#[tokio::test]
async fn test_shutdown_drains_and_returns_sink() {
    let target = AsyncSinkTarget::new(Vec::new()).unwrap();
    let queue: QueueRef = Arc::new(SerialQueue::spawn("test.shutdown.completions").unwrap());

    for chunk in [vec![1, 2], vec![3], vec![4, 5, 6]] {
        target.writev(vec![chunk], &queue, |_, _| {});
    }

    let sink = target.shutdown().await.unwrap();
    assert_eq!(sink, vec![1, 2, 3, 4, 5, 6]);
}

/// Shutdown on a closed worker reports the error instead of hanging.
#[tokio::test]
async fn test_shutdown_on_closed_worker() {
    let worker = SerialQueue::spawn("test.shutdown.closed").unwrap();
    let target = AsyncSinkTarget::with_worker(Vec::<u8>::new(), worker.clone(), 4);
    worker.close();

    let result = target.shutdown().await;
    assert_eq!(
        result.unwrap_err(),
        WriteError::WorkerClosed("test.shutdown.closed".into())
    );
}
