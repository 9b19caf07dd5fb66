//! Weir pump: copies stdin to stdout through a listener set and an async sink.
//!
//! # Usage
//!
//! ```bash
//! seq 1 100 | weir --chunk-size 8 --max-count-per-dispatch 5
//! ```
//!
//! Environment variables can also be used:
//! - `WEIR_QUEUE_LENGTH`: Backlog bound for events emitted before listeners attach
//! - `WEIR_MAX_COUNT_PER_DISPATCH`: Values delivered per sink write
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

use weir::config::Config;
use weir::dispatch::{ConcurrentQueue, QueueRef};
use weir::events::{EventListenerSet, ListenerSetConfig};
use weir::observability::tracing::{init_json_tracing, init_tracing};
use weir::sink::{sink_fn, AsyncSinkTarget, Sink};

/// Write `batch` completely, re-issuing the remainder after short writes.
///
/// Waits for each completion before the next write (high-water mark 1).
async fn write_all<S>(
    target: &AsyncSinkTarget<S>,
    completions: &QueueRef,
    mut batch: Vec<String>,
) -> Result<usize>
where
    S: Sink<Item = String> + Send + 'static,
{
    let total = batch.len();
    while !batch.is_empty() {
        // Only the values one dispatch can accept are copied per write.
        let head = batch[..batch.len().min(target.max_count_per_dispatch())].to_vec();
        let (tx, rx) = oneshot::channel();
        target.writev(vec![head], completions, move |err, count| {
            let _ = tx.send((err, count));
        });

        let (err, count) = rx.await.context("completion dropped")?;
        if let Some(err) = err {
            bail!(err);
        }
        tracing::debug!(count, remaining = batch.len() - count, "Batch written");
        batch.drain(..count);
    }
    Ok(total)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    if config.log_json {
        init_json_tracing(&config.log_level);
    } else {
        init_tracing(&config.log_level);
    }

    let target = AsyncSinkTarget::with_config(
        sink_fn(|line: String| println!("{line}")),
        config.async_sink(),
    )?;
    let completions: QueueRef = Arc::new(ConcurrentQueue::current("weir.completions")?);

    // Lines are buffered into chunks by a listener; the main loop flushes them.
    let lines: EventListenerSet<String> = EventListenerSet::with_config(config.listener_set());
    let end: EventListenerSet<()> =
        EventListenerSet::with_config(ListenerSetConfig::from_config(1, true));
    let pending = Rc::new(RefCell::new(Vec::new()));

    let buffer = Rc::clone(&pending);
    lines.add(move |line: &String| buffer.borrow_mut().push(line.clone()));
    end.add_once(|_| tracing::info!("Input finished"));

    let chunk_size = config.chunk_size.max(1);
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    let mut written = 0;

    loop {
        tokio::select! {
            line = reader.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => lines.emit(line),
                    None => {
                        end.emit(());
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl+C), flushing and stopping...");
                break;
            }
        }

        if pending.borrow().len() >= chunk_size {
            let batch = std::mem::take(&mut *pending.borrow_mut());
            written += write_all(&target, &completions, batch).await?;
        }
    }

    let rest = std::mem::take(&mut *pending.borrow_mut());
    written += write_all(&target, &completions, rest).await?;

    target
        .shutdown()
        .await
        .map_err(|e| anyhow!("failed to stop sink: {e}"))?;

    tracing::info!(written, "Weir pump complete");
    Ok(())
}
